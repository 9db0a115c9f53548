//! Trip database
//!
//! A trip table is a manifest plus a set of immutable Parquet segments, all
//! stored through a [`StorageBackend`]:
//!
//! ```text
//! {table}/manifest.json
//! {table}/segments/{segment_id}.parquet
//! ```

use std::sync::Arc;
use tokio::sync::Mutex;

use crate::manifest::{Manifest, ManifestManager, SegmentInfo};
use crate::segment::{SegmentReader, SegmentWriter};
use crate::storage::StorageBackend;
use crate::types::{BoundingBox, Trip, WeeklyAverageQuery};
use crate::{Error, Result};

/// Row filter applied during scans
#[derive(Debug, Clone, PartialEq)]
pub enum TripFilter {
    All,
    /// Region name, compared case-insensitively
    Region(String),
    /// Origin and destination both inside the box
    Area(BoundingBox),
}

impl TripFilter {
    pub fn region(name: &str) -> Self {
        TripFilter::Region(name.trim().to_lowercase())
    }

    pub fn matches(&self, trip: &Trip) -> bool {
        match self {
            TripFilter::All => true,
            TripFilter::Region(region) => trip.region.to_lowercase() == *region,
            TripFilter::Area(bbox) => bbox.contains(&trip.origin) && bbox.contains(&trip.destination),
        }
    }

    /// Whether a segment can hold any matching row
    pub fn may_match(&self, segment: &SegmentInfo) -> bool {
        match self {
            TripFilter::All => true,
            TripFilter::Region(region) => segment.regions.contains(region),
            TripFilter::Area(bbox) => segment
                .bounds
                .map(|bounds| bounds.intersects(bbox))
                .unwrap_or(false),
        }
    }
}

impl From<&WeeklyAverageQuery> for TripFilter {
    fn from(query: &WeeklyAverageQuery) -> Self {
        match query {
            WeeklyAverageQuery::Region(region) => TripFilter::region(region),
            WeeklyAverageQuery::Coordinates {
                first_point,
                second_point,
            } => TripFilter::Area(BoundingBox::from_corners(*first_point, *second_point)),
        }
    }
}

/// Append-only trip table
pub struct TripDatabase {
    table: String,
    storage: Arc<dyn StorageBackend>,
    manifest_manager: ManifestManager,

    /// Serializes manifest read-modify-write cycles
    write_lock: Mutex<()>,
}

impl TripDatabase {
    pub fn new(storage: Arc<dyn StorageBackend>, table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            manifest_manager: ManifestManager::new(storage.clone()),
            storage,
            write_lock: Mutex::new(()),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Current manifest
    pub async fn manifest(&self) -> Result<Manifest> {
        self.manifest_manager.load_or_default(&self.table).await
    }

    /// Write trips as a new segment and register it in the manifest
    pub async fn append(&self, trips: &[Trip], source_path: &str) -> Result<SegmentInfo> {
        if trips.is_empty() {
            return Err(Error::invalid_request("Cannot append an empty batch of trips"));
        }

        let segment_id = format!(
            "seg_{}_{}",
            chrono::Utc::now().timestamp_millis(),
            uuid::Uuid::new_v4().simple()
        );
        let segment_path = format!("{}/segments/{}.parquet", self.table, segment_id);

        let parquet_data = SegmentWriter::new().write_parquet(trips)?;
        self.storage.put(&segment_path, parquet_data).await?;

        let segment_info = SegmentInfo {
            segment_id,
            file_path: segment_path,
            source_path: source_path.to_string(),
            row_count: trips.len(),
            time_range: time_range(trips)?,
            regions: trips.iter().map(|t| t.region.to_lowercase()).collect(),
            bounds: BoundingBox::enclosing(
                trips.iter().flat_map(|t| [t.origin, t.destination]),
            ),
            created_at: chrono::Utc::now(),
        };

        let _guard = self.write_lock.lock().await;
        let mut manifest = self.manifest_manager.load_or_default(&self.table).await?;
        manifest.add_segment(segment_info.clone());
        self.manifest_manager.save(&manifest).await?;

        tracing::debug!(
            table = %self.table,
            segment_id = %segment_info.segment_id,
            rows = segment_info.row_count,
            version = manifest.version,
            "Appended segment"
        );

        Ok(segment_info)
    }

    /// Read every trip matching the filter
    pub async fn scan(&self, filter: &TripFilter) -> Result<Vec<Trip>> {
        let manifest = self.manifest().await?;
        let reader = SegmentReader::new();
        let mut matching = Vec::new();
        let mut skipped = 0usize;

        for segment in &manifest.segments {
            if !filter.may_match(segment) {
                skipped += 1;
                continue;
            }

            let data = self.storage.get(&segment.file_path).await?;
            matching.extend(
                reader
                    .read_parquet(data)?
                    .into_iter()
                    .filter(|trip| filter.matches(trip)),
            );
        }

        tracing::debug!(
            table = %self.table,
            segments = manifest.segments.len(),
            skipped,
            rows = matching.len(),
            "Scanned trip table"
        );

        Ok(matching)
    }
}

fn time_range(trips: &[Trip]) -> Result<(chrono::NaiveDateTime, chrono::NaiveDateTime)> {
    let min = trips.iter().map(|t| t.datetime).min();
    let max = trips.iter().map(|t| t.datetime).max();
    min.zip(max)
        .ok_or_else(|| Error::internal("Time range of an empty batch"))
}
