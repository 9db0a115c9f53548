//! Storage abstraction layer
//!
//! Uploaded trip files and the trip database both live behind
//! [`StorageBackend`], backed by the local filesystem or S3.

use async_trait::async_trait;
use bytes::Bytes;

use crate::Result;

pub mod file_store;
pub mod local;
pub mod s3;

pub use file_store::{FileStore, StorageFileStore};

/// Object storage backend
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Read object from storage
    async fn get(&self, key: &str) -> Result<Bytes>;

    /// Write object to storage, replacing any previous content
    async fn put(&self, key: &str, data: Bytes) -> Result<()>;

    /// Delete object from storage
    async fn delete(&self, key: &str) -> Result<()>;

    /// Check if object exists
    async fn exists(&self, key: &str) -> Result<bool>;

    /// List object keys under a prefix, sorted
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;
}

/// Storage configuration
#[derive(Debug, Clone, PartialEq)]
pub enum StorageConfig {
    S3 {
        bucket: String,
        region: String,
        endpoint: Option<String>,
    },
    Local {
        root_path: String,
    },
}

/// Create storage backend from config
pub async fn create_storage(config: StorageConfig) -> Result<Box<dyn StorageBackend>> {
    match config {
        StorageConfig::S3 {
            bucket,
            region,
            endpoint,
        } => {
            tracing::info!(%bucket, %region, "Using S3 storage backend");
            let backend = s3::S3Storage::new(bucket, region, endpoint).await?;
            Ok(Box::new(backend))
        }
        StorageConfig::Local { root_path } => {
            tracing::info!(%root_path, "Using local storage backend");
            let backend = local::LocalStorage::new(root_path)?;
            Ok(Box::new(backend))
        }
    }
}
