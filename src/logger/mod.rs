//! Logger module
//!
//! Provides logging utilities for the upload server including:
//! - Server lifecycle logging
//! - Access logging with multiple formats
//! - Upload outcome logging
//! - File-based logging support

mod format;
pub mod writer;

pub use format::AccessLogEntry;

use crate::config::Config;
use crate::error::UploadError;
use crate::storage::StoredFile;
use std::net::SocketAddr;
use std::str::FromStr;

/// Severity threshold from `logging.level`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Error,
    Warn,
    Info,
    Debug,
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" | "trace" => Ok(Self::Debug),
            other => Err(format!("Unknown log level: {other}")),
        }
    }
}

/// Initialize the logger with configuration
///
/// Should be called once at application startup.
pub fn init(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let level: Level = config.logging.level.parse()?;
    writer::init(
        level,
        config.logging.access_log_file.as_deref(),
        config.logging.error_log_file.as_deref(),
    )?;
    Ok(())
}

/// Whether messages at `level` pass the configured threshold
///
/// Before `init` runs (tests, early startup) everything but debug passes.
fn enabled(level: Level) -> bool {
    writer::get().map_or(level <= Level::Info, |w| level <= w.level())
}

fn write_info(message: &str) {
    if !enabled(Level::Info) {
        return;
    }
    match writer::get() {
        Some(w) => w.write_info(message),
        None => println!("{message}"),
    }
}

fn write_error(level: Level, message: &str) {
    if !enabled(level) {
        return;
    }
    match writer::get() {
        Some(w) => w.write_error(message),
        None => eprintln!("{message}"),
    }
}

fn write_access(message: &str) {
    match writer::get() {
        Some(w) => w.write_access(message),
        None => println!("{message}"),
    }
}

pub fn log_server_start(addr: &SocketAddr, config: &Config, image_base_url: &str) {
    write_info("======================================");
    write_info("Image upload server started");
    write_info(&format!("Listening on: http://{addr}"));
    write_info(&format!("Upload route: POST {}", config.upload.route));
    write_info(&format!("Images served at: {image_base_url}/<name>"));
    write_info(&format!(
        "Storage directory: {}",
        config.upload.storage_dir.display()
    ));
    write_info(&format!(
        "Max file size: {} bytes, allowed types: {} ({:?} matching)",
        config.upload.max_file_size,
        config.upload.allowed_types.join(", "),
        config.upload.match_mode
    ));
    write_info(&format!("Log level: {}", config.logging.level));
    if let Some(workers) = config.server.workers {
        write_info(&format!("Worker threads: {workers}"));
    }
    if let Some(ref path) = config.logging.access_log_file {
        write_info(&format!("Access log: {path}"));
    }
    if let Some(ref path) = config.logging.error_log_file {
        write_info(&format!("Error log: {path}"));
    }
    write_info("======================================");
}

pub fn log_connection_accepted(peer_addr: &SocketAddr) {
    if enabled(Level::Debug) {
        write_info(&format!("[Connection] Accepted from: {peer_addr}"));
    }
}

pub fn log_connection_error(err: &impl std::fmt::Debug) {
    write_error(Level::Error, &format!("[ERROR] Failed to serve connection: {err:?}"));
}

pub fn log_info(message: &str) {
    write_info(&format!("[INFO] {message}"));
}

pub fn log_error(message: &str) {
    write_error(Level::Error, &format!("[ERROR] {message}"));
}

pub fn log_warning(message: &str) {
    write_error(Level::Warn, &format!("[WARN] {message}"));
}

pub fn log_upload_stored(stored: &StoredFile) {
    write_info(&format!(
        "[Upload] Stored {:?} as {} ({} bytes)",
        stored.original_name, stored.stored_name, stored.size
    ));
}

/// Storage failures are errors; client mistakes are warnings
pub fn log_upload_rejected(peer_addr: &SocketAddr, err: &UploadError) {
    let message = format!("[Upload] Rejected from {peer_addr} ({}): {err}", err.kind());
    if matches!(err, UploadError::Storage(_)) {
        log_error(&message);
    } else {
        log_warning(&message);
    }
}

/// Log formatted access log entry
pub fn log_access(entry: &AccessLogEntry, format: &str) {
    write_access(&entry.format(format));
}

pub fn log_shutdown(active_connections: usize) {
    write_info(&format!(
        "[Shutdown] Listener closed, {active_connections} connection(s) still finishing"
    ));
}
