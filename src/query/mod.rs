//! Weekly-average aggregation

use async_trait::async_trait;
use chrono::Datelike;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::database::{TripDatabase, TripFilter};
use crate::types::{AggregateTable, Trip, WeeklyAverageQuery};
use crate::{Error, Result};

/// Column name of the weekly-average result
pub const WEEKLY_AVERAGE_COLUMN: &str = "weekly_average";

/// Answers weekly-average queries with a tabular result
#[async_trait]
pub trait Aggregator: Send + Sync {
    async fn weekly_average(&self, query: &WeeklyAverageQuery) -> Result<AggregateTable>;
}

/// [`Aggregator`] over the trip database
pub struct WeeklyAverageExecutor {
    database: Arc<TripDatabase>,
}

impl WeeklyAverageExecutor {
    pub fn new(database: Arc<TripDatabase>) -> Self {
        Self { database }
    }
}

#[async_trait]
impl Aggregator for WeeklyAverageExecutor {
    async fn weekly_average(&self, query: &WeeklyAverageQuery) -> Result<AggregateTable> {
        let start = Instant::now();

        let trips = self.database.scan(&TripFilter::from(query)).await?;
        let average = weekly_average(&trips)
            .ok_or_else(|| Error::query(format!("No trips found for {}", query)))?;

        tracing::info!(
            query = %query,
            trips = trips.len(),
            average,
            took_ms = start.elapsed().as_millis() as u64,
            "Computed weekly average"
        );

        Ok(AggregateTable::scalar(WEEKLY_AVERAGE_COLUMN, average))
    }
}

/// Trips per ISO week, averaged over the weeks that have at least one trip
pub fn weekly_average(trips: &[Trip]) -> Option<f64> {
    if trips.is_empty() {
        return None;
    }

    let mut per_week: HashMap<(i32, u32), usize> = HashMap::new();
    for trip in trips {
        let week = trip.datetime.iso_week();
        *per_week.entry((week.year(), week.week())).or_default() += 1;
    }

    Some(trips.len() as f64 / per_week.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::parser::parse_datetime;
    use crate::types::GeoPoint;

    fn trip_at(at: &str) -> Trip {
        Trip {
            region: "Prague".to_string(),
            origin: GeoPoint::new(14.4, 50.0),
            destination: GeoPoint::new(14.5, 50.1),
            datetime: parse_datetime(at).unwrap(),
            datasource: "test".to_string(),
        }
    }

    #[test]
    fn test_weekly_average() {
        assert_eq!(weekly_average(&[]), None);

        // Mon 2018-05-28 and Sun 2018-06-03 share ISO week 22; 2018-06-04 is week 23
        let trips = vec![
            trip_at("2018-05-28 09:00:00"),
            trip_at("2018-06-03 23:59:59"),
            trip_at("2018-05-30 12:00:00"),
            trip_at("2018-06-04 00:00:00"),
        ];
        assert_eq!(weekly_average(&trips), Some(2.0));
    }

    #[test]
    fn test_iso_week_spans_year_boundary() {
        // 2018-12-31 belongs to ISO week 1 of 2019
        let trips = vec![trip_at("2018-12-31 10:00:00"), trip_at("2019-01-02 10:00:00")];
        assert_eq!(weekly_average(&trips), Some(2.0));
    }
}
