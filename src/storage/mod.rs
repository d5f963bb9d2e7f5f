//! Image storage module
//!
//! Owns the storage directory: validates incoming uploads, writes them under
//! generated unique names and reads them back for the static image route.
//! The directory itself is the only registry of stored files.

mod filter;
mod naming;

use filter::{extension, TypeFilter};
use naming::{is_safe_stored_name, stored_file_name, IngestClock};

use crate::config::UploadConfig;
use crate::error::{LimitScope, UploadError};
use crate::http::mime;
use crate::logger;
use std::io;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Attempts at finding a free name before giving up
const MAX_NAME_ATTEMPTS: usize = 16;

/// Result of a successful upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Generated name inside the storage directory
    pub stored_name: String,
    /// Name as sent by the client
    pub original_name: String,
    pub size: u64,
}

/// Flat directory of uploaded images
#[derive(Debug)]
pub struct ImageStore {
    canonical_dir: PathBuf,
    max_file_size: u64,
    filter: TypeFilter,
    clock: IngestClock,
}

impl ImageStore {
    /// Create the storage directory if needed and open the store
    ///
    /// Safe to call on every start; an existing directory is reused.
    pub async fn open(cfg: &UploadConfig) -> io::Result<Self> {
        fs::create_dir_all(&cfg.storage_dir).await?;
        let canonical_dir = fs::canonicalize(&cfg.storage_dir).await?;
        if !fs::metadata(&canonical_dir).await?.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a directory", cfg.storage_dir.display()),
            ));
        }

        Ok(Self {
            canonical_dir,
            max_file_size: cfg.max_file_size,
            filter: TypeFilter::new(&cfg.allowed_types, cfg.match_mode),
            clock: IngestClock::new(),
        })
    }

    pub const fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    /// Check name and content type against the allow-set
    pub fn check_type(&self, original_name: &str, content_type: &str) -> Result<(), UploadError> {
        self.filter.check(original_name, content_type)
    }

    pub const fn check_size(&self, size: u64) -> Result<(), UploadError> {
        if size > self.max_file_size {
            Err(UploadError::SizeLimit {
                limit: self.max_file_size,
                scope: LimitScope::File,
            })
        } else {
            Ok(())
        }
    }

    /// Validate and persist one upload
    ///
    /// Nothing is written unless every check passes, and a failed write
    /// removes whatever it left behind.
    pub async fn store(
        &self,
        original_name: &str,
        content_type: &str,
        data: &[u8],
    ) -> Result<StoredFile, UploadError> {
        self.check_type(original_name, content_type)?;
        self.check_size(data.len() as u64)?;

        let ext = extension(original_name);
        for _ in 0..MAX_NAME_ATTEMPTS {
            let stored_name = stored_file_name(self.clock.next(), original_name, ext.as_deref());
            let path = self.canonical_dir.join(&stored_name);

            let mut file = match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(f) => f,
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(UploadError::Storage(e)),
            };

            let written = async {
                file.write_all(data).await?;
                file.flush().await
            }
            .await;
            drop(file);

            if let Err(e) = written {
                if let Err(cleanup) = fs::remove_file(&path).await {
                    logger::log_error(&format!(
                        "Failed to remove partial file '{}': {cleanup}",
                        path.display()
                    ));
                }
                return Err(UploadError::Storage(e));
            }

            return Ok(StoredFile {
                stored_name,
                original_name: original_name.to_string(),
                size: data.len() as u64,
            });
        }

        Err(UploadError::Storage(io::Error::new(
            io::ErrorKind::AlreadyExists,
            "could not allocate a unique file name",
        )))
    }

    /// Load a stored file and its content type
    ///
    /// Returns `None` for unknown files and for names that would resolve
    /// outside the storage directory.
    pub async fn load(&self, name: &str) -> Option<(Vec<u8>, &'static str)> {
        if !is_safe_stored_name(name) {
            logger::log_warning(&format!("Rejected image lookup for unsafe name: {name:?}"));
            return None;
        }

        // File not found is common (404), no need to log at warning level
        let path = fs::canonicalize(self.canonical_dir.join(name)).await.ok()?;
        if !path.starts_with(&self.canonical_dir) {
            logger::log_warning(&format!(
                "Path traversal attempt blocked: {name} -> {}",
                path.display()
            ));
            return None;
        }
        if !fs::metadata(&path).await.ok()?.is_file() {
            return None;
        }

        let content = match fs::read(&path).await {
            Ok(c) => c,
            Err(e) => {
                logger::log_error(&format!("Failed to read file '{}': {e}", path.display()));
                return None;
            }
        };
        let content_type = mime::get_content_type(extension(name).as_deref());
        Some((content, content_type))
    }

    /// Readiness: the directory must still be there
    pub async fn is_ready(&self) -> bool {
        fs::metadata(&self.canonical_dir)
            .await
            .is_ok_and(|m| m.is_dir())
    }
}
