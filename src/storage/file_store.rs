//! File store for uploaded trip files

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

use crate::{Error, Result};

use super::StorageBackend;

/// Persists uploaded files and returns the key they were stored under
#[async_trait]
pub trait FileStore: Send + Sync {
    async fn write(&self, folder: &str, filename: &str, data: Bytes) -> Result<String>;
}

/// [`FileStore`] over a [`StorageBackend`]
pub struct StorageFileStore {
    storage: Arc<dyn StorageBackend>,
}

impl StorageFileStore {
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl FileStore for StorageFileStore {
    async fn write(&self, folder: &str, filename: &str, data: Bytes) -> Result<String> {
        let name = sanitize_filename(filename)?;
        let key = format!("{}{}_{}", normalize_folder(folder), uuid::Uuid::new_v4(), name);
        let size = data.len();

        self.storage.put(&key, data).await?;

        tracing::info!(path = %key, bytes = size, "Stored uploaded file");
        Ok(key)
    }
}

/// Ensure a non-empty folder ends with exactly one `/`
pub fn normalize_folder(folder: &str) -> String {
    let trimmed = folder.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{}/", trimmed)
    }
}

/// Keep the basename of a client-supplied filename, restricted to `[A-Za-z0-9._-]`
pub fn sanitize_filename(filename: &str) -> Result<String> {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').to_string();

    if cleaned.is_empty() {
        return Err(Error::invalid_request(format!(
            "Invalid filename: '{}'",
            filename
        )));
    }
    Ok(cleaned)
}
