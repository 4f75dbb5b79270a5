// Application state module
// Shared, read-only state handed to every request

use std::path::PathBuf;

use super::types::Config;
use crate::storage::FileStore;

/// Application state
pub struct AppState {
    pub config: Config,
    /// Uploaded files
    pub store: FileStore,
    pub static_dir: PathBuf,
    pub template_path: PathBuf,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
            store: FileStore::new(&config.storage.upload_dir),
            static_dir: PathBuf::from(&config.storage.static_dir),
            template_path: PathBuf::from(&config.storage.template_path),
        }
    }
}
