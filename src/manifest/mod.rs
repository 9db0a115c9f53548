//! Trip table manifest management
//!
//! The manifest is the source of truth for a trip table:
//! - Segment list with per-segment pruning metadata
//! - Statistics

use bytes::Bytes;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::storage::StorageBackend;
use crate::types::BoundingBox;
use crate::{Error, Result};

/// Segment metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentInfo {
    pub segment_id: String,
    pub file_path: String,
    /// Storage key of the uploaded file the segment was ingested from
    pub source_path: String,
    pub row_count: usize,
    pub time_range: (NaiveDateTime, NaiveDateTime),
    /// Distinct regions, lowercased
    pub regions: BTreeSet<String>,
    /// Box around every origin and destination in the segment
    pub bounds: Option<BoundingBox>,
    pub created_at: DateTime<Utc>,
}

/// Table statistics
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct TableStats {
    pub total_trips: usize,
    pub segment_count: usize,
}

/// Trip table manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u64,
    pub table: String,
    pub segments: Vec<SegmentInfo>,
    pub stats: TableStats,
    pub updated_at: DateTime<Utc>,
}

impl Manifest {
    /// Create an empty manifest for a table
    pub fn new(table: String) -> Self {
        Self {
            version: 1,
            table,
            segments: Vec::new(),
            stats: TableStats::default(),
            updated_at: Utc::now(),
        }
    }

    /// Add a new segment to the manifest
    pub fn add_segment(&mut self, segment: SegmentInfo) {
        self.stats.total_trips += segment.row_count;
        self.segments.push(segment);
        self.stats.segment_count = self.segments.len();
        self.version += 1;
        self.updated_at = Utc::now();
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(Into::into)
    }

    /// Deserialize from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(Into::into)
    }
}

/// Manifest manager for loading and saving manifests
pub struct ManifestManager {
    storage: Arc<dyn StorageBackend>,
}

impl ManifestManager {
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage }
    }

    /// Get manifest key for a table
    pub fn manifest_key(table: &str) -> String {
        format!("{}/manifest.json", table)
    }

    /// Load the manifest, or an empty one if the table has never been written
    pub async fn load_or_default(&self, table: &str) -> Result<Manifest> {
        let key = Self::manifest_key(table);

        let data = match self.storage.get(&key).await {
            Ok(data) => data,
            Err(Error::NotFound(_)) => return Ok(Manifest::new(table.to_string())),
            Err(e) => return Err(e),
        };

        let json = String::from_utf8(data.to_vec())
            .map_err(|e| Error::internal(format!("Invalid UTF-8 in manifest: {}", e)))?;

        Manifest::from_json(&json)
    }

    /// Save manifest to storage
    ///
    /// Relies on `put` replacing the object atomically (S3 PUT, rename on the
    /// local filesystem), so concurrent loads never see a partial manifest.
    pub async fn save(&self, manifest: &Manifest) -> Result<()> {
        let json = manifest.to_json()?;
        let key = Self::manifest_key(&manifest.table);
        self.storage.put(&key, Bytes::from(json.into_bytes())).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::local::LocalStorage;
    use crate::types::GeoPoint;
    use tempfile::TempDir;

    fn segment(id: &str, rows: usize) -> SegmentInfo {
        let at = chrono::NaiveDate::from_ymd_opt(2018, 5, 28)
            .and_then(|d| d.and_hms_opt(9, 0, 0))
            .unwrap();
        SegmentInfo {
            segment_id: id.to_string(),
            file_path: format!("trips_db/segments/{}.parquet", id),
            source_path: "trips/upload.csv".to_string(),
            row_count: rows,
            time_range: (at, at),
            regions: ["prague".to_string()].into_iter().collect(),
            bounds: BoundingBox::enclosing(vec![GeoPoint::new(14.0, 50.0)]),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_add_segment_updates_stats() {
        let mut manifest = Manifest::new("trips_db".to_string());
        assert_eq!(manifest.version, 1);

        manifest.add_segment(segment("a", 3));
        manifest.add_segment(segment("b", 4));

        assert_eq!(manifest.version, 3);
        assert_eq!(
            manifest.stats,
            TableStats {
                total_trips: 7,
                segment_count: 2
            }
        );
    }

    #[tokio::test]
    async fn test_manifest_manager() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Arc::new(LocalStorage::new(temp_dir.path()).unwrap());
        let manager = ManifestManager::new(storage.clone());

        // Missing manifest reads as empty
        let empty = manager.load_or_default("trips_db").await.unwrap();
        assert!(empty.segments.is_empty());

        let mut manifest = empty;
        manifest.add_segment(segment("a", 3));
        manager.save(&manifest).await.unwrap();

        let loaded = manager.load_or_default("trips_db").await.unwrap();
        assert_eq!(loaded.version, manifest.version);
        assert_eq!(loaded.segments.len(), 1);
        assert!(loaded.segments[0].regions.contains("prague"));
        assert_eq!(
            storage.list("trips_db").await.unwrap(),
            vec!["trips_db/manifest.json".to_string()]
        );
    }
}
