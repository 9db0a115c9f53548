//! Trip ingestion
//!
//! Reads a stored trip file, parses it and appends it to the trip database.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

use crate::database::TripDatabase;
use crate::storage::StorageBackend;
use crate::Result;

pub mod parser;

/// Outcome of a successful ingestion
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct IngestReport {
    pub file_path: String,
    pub trips: usize,
    pub segment_id: String,
}

/// Parses a stored file and writes its records into the database
#[async_trait]
pub trait Ingestor: Send + Sync {
    async fn ingest(&self, file_path: &str) -> Result<IngestReport>;
}

/// [`Ingestor`] for trip CSV files
pub struct TripIngestor {
    storage: Arc<dyn StorageBackend>,
    database: Arc<TripDatabase>,
}

impl TripIngestor {
    pub fn new(storage: Arc<dyn StorageBackend>, database: Arc<TripDatabase>) -> Self {
        Self { storage, database }
    }
}

#[async_trait]
impl Ingestor for TripIngestor {
    async fn ingest(&self, file_path: &str) -> Result<IngestReport> {
        let start = Instant::now();

        let data = self.storage.get(file_path).await?;
        let trips = parser::parse_trips(&data)?;
        let segment = self.database.append(&trips, file_path).await?;

        tracing::info!(
            path = %file_path,
            trips = trips.len(),
            segment_id = %segment.segment_id,
            took_ms = start.elapsed().as_millis() as u64,
            "Ingested trip file"
        );

        Ok(IngestReport {
            file_path: file_path.to_string(),
            trips: trips.len(),
            segment_id: segment.segment_id,
        })
    }
}
