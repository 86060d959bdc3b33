use std::path::PathBuf;

use crate::registry::UploadRegistry;

/// shared application state
pub struct AppState {
    /// directory that receives temporary and finalized uploads
    pub uploads_dir: PathBuf,
    /// in-flight chunked transfers keyed by identifier
    pub registry: UploadRegistry,
}

impl AppState {
    /// create a new app state rooted at the given uploads directory
    pub fn new(uploads_dir: PathBuf) -> Self {
        Self {
            registry: UploadRegistry::new(uploads_dir.clone()),
            uploads_dir,
        }
    }
}
