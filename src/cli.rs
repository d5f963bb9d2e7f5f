//! Command-line flags
//!
//! Every flag is optional; a flag that is given overrides the config file
//! and the environment.

use crate::config::ConfigOverrides;
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "image-upload-server",
    version,
    about = "Accepts image uploads and serves them back from local disk"
)]
pub struct Args {
    /// Config file path; the extension may be omitted
    #[arg(short, long, default_value = "config")]
    pub config: String,

    /// Address to bind
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Base URL put in front of returned image links, e.g. https://img.example.com
    #[arg(long)]
    pub public_url: Option<String>,

    /// Tokio worker threads (defaults to the CPU count)
    #[arg(long)]
    pub workers: Option<usize>,

    /// Directory uploads are written to and served from
    #[arg(long)]
    pub storage_dir: Option<PathBuf>,

    /// Largest accepted file, in bytes
    #[arg(long)]
    pub max_file_size: Option<u64>,

    /// Comma-separated allow-set, e.g. png,jpg,jpeg,gif
    #[arg(long, value_delimiter = ',')]
    pub allowed_types: Option<Vec<String>>,

    #[arg(long, value_parser = ["strict", "permissive"])]
    pub match_mode: Option<String>,

    #[arg(long, value_parser = ["error", "warn", "info", "debug"])]
    pub log_level: Option<String>,
}

impl Args {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            host: self.host.clone(),
            port: self.port,
            public_url: self.public_url.clone(),
            workers: self.workers,
            storage_dir: self.storage_dir.clone(),
            max_file_size: self.max_file_size,
            allowed_types: self.allowed_types.clone(),
            match_mode: self.match_mode.clone(),
            log_level: self.log_level.clone(),
        }
    }
}
