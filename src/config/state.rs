// Application state module
// Shared by every connection; holds the loaded config and the image store

use std::sync::atomic::AtomicUsize;

use super::types::Config;
use crate::storage::ImageStore;

/// Application state
pub struct AppState {
    pub config: Config,
    pub store: ImageStore,
    /// Prefix of every URL handed back to uploaders, e.g. `http://localhost:5000/images`
    pub image_base_url: String,
    pub active_connections: AtomicUsize,
}

impl AppState {
    /// Bootstrap the image store and build the state
    ///
    /// Fails if the storage directory cannot be created.
    pub async fn new(config: Config) -> std::io::Result<Self> {
        let store = ImageStore::open(&config.upload).await?;
        let image_base_url = format!("{}{}", config.public_base_url(), config.upload.public_prefix);

        Ok(Self {
            config,
            store,
            image_base_url,
            active_connections: AtomicUsize::new(0),
        })
    }

    /// Public URL for a stored file name
    pub fn image_url(&self, stored_name: &str) -> String {
        format!("{}/{stored_name}", self.image_base_url)
    }
}
