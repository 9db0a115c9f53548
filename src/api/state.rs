//! API server state

use std::sync::Arc;

use crate::config::{DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_UPLOAD_FOLDER};
use crate::ingest::Ingestor;
use crate::query::Aggregator;
use crate::storage::FileStore;

/// API server state
#[derive(Clone)]
pub struct AppState {
    /// Where uploaded files are persisted
    pub file_store: Arc<dyn FileStore>,

    /// Turns a stored file into database rows
    pub ingestor: Arc<dyn Ingestor>,

    /// Answers weekly-average queries
    pub aggregator: Arc<dyn Aggregator>,

    pub upload_folder: String,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(
        file_store: Arc<dyn FileStore>,
        ingestor: Arc<dyn Ingestor>,
        aggregator: Arc<dyn Aggregator>,
    ) -> Self {
        Self {
            file_store,
            ingestor,
            aggregator,
            upload_folder: DEFAULT_UPLOAD_FOLDER.to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    pub fn with_upload_folder(mut self, folder: impl Into<String>) -> Self {
        self.upload_folder = folder.into();
        self
    }

    pub fn with_max_upload_bytes(mut self, bytes: usize) -> Self {
        self.max_upload_bytes = bytes;
        self
    }
}
