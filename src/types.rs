//! Core types for trips

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// A longitude/latitude pair
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub lon: f64,
    pub lat: f64,
}

impl GeoPoint {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Parse a WKT point such as `POINT (14.49 50.00)`
    pub fn from_wkt(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let body = trimmed
            .get(..5)
            .filter(|head| head.eq_ignore_ascii_case("point"))
            .map(|_| trimmed[5..].trim())
            .ok_or_else(|| Error::parse(format!("Invalid WKT point: '{}'", input)))?;

        let inner = body
            .strip_prefix('(')
            .and_then(|b| b.strip_suffix(')'))
            .ok_or_else(|| Error::parse(format!("Invalid WKT point: '{}'", input)))?;

        let mut parts = inner.split_whitespace();
        let (lon, lat) = match (parts.next(), parts.next(), parts.next()) {
            (Some(lon), Some(lat), None) => (lon, lat),
            _ => return Err(Error::parse(format!("Invalid WKT point: '{}'", input))),
        };

        let point = Self::new(parse_coordinate(lon, input)?, parse_coordinate(lat, input)?);
        point.validate()?;
        Ok(point)
    }

    /// Read a point from a request body value.
    ///
    /// Accepts `[lon, lat]`, `{"lon": .., "lat": ..}` (also `longitude`/`latitude`
    /// and `x`/`y`) or a WKT string.
    pub fn from_json(value: &Value) -> Result<Self> {
        let point = match value {
            Value::String(s) => return Self::from_wkt(s),
            Value::Array(items) => match items.as_slice() {
                [lon, lat] => Self::new(json_number(lon)?, json_number(lat)?),
                _ => {
                    return Err(Error::invalid_request(
                        "A point array must contain exactly [longitude, latitude]",
                    ))
                }
            },
            Value::Object(map) => {
                let lon = ["lon", "longitude", "x"].iter().find_map(|k| map.get(*k));
                let lat = ["lat", "latitude", "y"].iter().find_map(|k| map.get(*k));
                match (lon, lat) {
                    (Some(lon), Some(lat)) => Self::new(json_number(lon)?, json_number(lat)?),
                    _ => {
                        return Err(Error::invalid_request(
                            "A point object must contain 'lon' and 'lat'",
                        ))
                    }
                }
            }
            other => {
                return Err(Error::invalid_request(format!(
                    "Unsupported point value: {}",
                    other
                )))
            }
        };

        point.validate()?;
        Ok(point)
    }

    fn validate(&self) -> Result<()> {
        if !(-180.0..=180.0).contains(&self.lon) || !(-90.0..=90.0).contains(&self.lat) {
            return Err(Error::invalid_request(format!(
                "Point out of range: ({}, {})",
                self.lon, self.lat
            )));
        }
        Ok(())
    }
}

impl FromStr for GeoPoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_wkt(s)
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "POINT ({} {})", self.lon, self.lat)
    }
}

fn parse_coordinate(raw: &str, input: &str) -> Result<f64> {
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| Error::parse(format!("Invalid coordinate '{}' in '{}'", raw, input)))
}

fn json_number(value: &Value) -> Result<f64> {
    value
        .as_f64()
        .ok_or_else(|| Error::invalid_request(format!("Coordinate must be a number, got {}", value)))
}

/// Axis-aligned box in longitude/latitude space; edges are inclusive
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    /// Box spanned by two opposite corners, given in any order
    pub fn from_corners(a: GeoPoint, b: GeoPoint) -> Self {
        Self {
            min_lon: a.lon.min(b.lon),
            min_lat: a.lat.min(b.lat),
            max_lon: a.lon.max(b.lon),
            max_lat: a.lat.max(b.lat),
        }
    }

    /// Smallest box holding every point, `None` for an empty iterator
    pub fn enclosing(points: impl IntoIterator<Item = GeoPoint>) -> Option<Self> {
        points.into_iter().fold(None, |acc, p| {
            Some(match acc {
                None => Self::from_corners(p, p),
                Some(b) => Self {
                    min_lon: b.min_lon.min(p.lon),
                    min_lat: b.min_lat.min(p.lat),
                    max_lon: b.max_lon.max(p.lon),
                    max_lat: b.max_lat.max(p.lat),
                },
            })
        })
    }

    pub fn contains(&self, p: &GeoPoint) -> bool {
        p.lon >= self.min_lon && p.lon <= self.max_lon && p.lat >= self.min_lat && p.lat <= self.max_lat
    }

    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_lon <= other.max_lon
            && other.min_lon <= self.max_lon
            && self.min_lat <= other.max_lat
            && other.min_lat <= self.max_lat
    }
}

/// A single trip record
#[derive(Debug, Clone, PartialEq)]
pub struct Trip {
    pub region: String,
    pub origin: GeoPoint,
    pub destination: GeoPoint,
    pub datetime: NaiveDateTime,
    pub datasource: String,
}

/// Validated weekly-average request
#[derive(Debug, Clone, PartialEq)]
pub enum WeeklyAverageQuery {
    Region(String),
    Coordinates {
        first_point: GeoPoint,
        second_point: GeoPoint,
    },
}

impl WeeklyAverageQuery {
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        match self {
            WeeklyAverageQuery::Region(_) => None,
            WeeklyAverageQuery::Coordinates {
                first_point,
                second_point,
            } => Some(BoundingBox::from_corners(*first_point, *second_point)),
        }
    }
}

impl fmt::Display for WeeklyAverageQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeeklyAverageQuery::Region(region) => write!(f, "region '{}'", region),
            WeeklyAverageQuery::Coordinates {
                first_point,
                second_point,
            } => write!(f, "area between {} and {}", first_point, second_point),
        }
    }
}

/// Tabular result returned by the aggregation service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AggregateTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

impl AggregateTable {
    /// One-row, one-column table
    pub fn scalar(column: impl Into<String>, value: f64) -> Self {
        Self {
            columns: vec![column.into()],
            rows: vec![vec![value]],
        }
    }

    /// Value at the first row and first column
    pub fn first_value(&self) -> Result<f64> {
        self.rows
            .first()
            .and_then(|row| row.first())
            .copied()
            .ok_or_else(|| Error::query("Aggregation returned an empty result"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wkt_point() {
        let p = GeoPoint::from_wkt("POINT (14.4973794438195 50.00136875782316)").unwrap();
        assert_eq!(p, GeoPoint::new(14.4973794438195, 50.00136875782316));

        let p: GeoPoint = "point(7.5 45)".parse().unwrap();
        assert_eq!(p, GeoPoint::new(7.5, 45.0));

        assert!(GeoPoint::from_wkt("POINT (1)").is_err());
        assert!(GeoPoint::from_wkt("LINESTRING (1 2, 3 4)").is_err());
        assert!(GeoPoint::from_wkt("POINT (a b)").is_err());
        assert!(GeoPoint::from_wkt("POINT (200 10)").is_err());
    }

    #[test]
    fn test_point_from_json() {
        assert_eq!(
            GeoPoint::from_json(&json!([10.0, 20.0])).unwrap(),
            GeoPoint::new(10.0, 20.0)
        );
        assert_eq!(
            GeoPoint::from_json(&json!({"longitude": 1, "latitude": 2})).unwrap(),
            GeoPoint::new(1.0, 2.0)
        );
        assert_eq!(
            GeoPoint::from_json(&json!("POINT (3 4)")).unwrap(),
            GeoPoint::new(3.0, 4.0)
        );
        assert!(GeoPoint::from_json(&json!([1.0])).is_err());
        assert!(GeoPoint::from_json(&json!({"lon": 1})).is_err());
        assert!(GeoPoint::from_json(&json!(true)).is_err());
    }

    #[test]
    fn test_bounding_box() {
        let bbox = BoundingBox::from_corners(GeoPoint::new(10.0, 50.0), GeoPoint::new(5.0, 40.0));
        assert_eq!(bbox.min_lon, 5.0);
        assert_eq!(bbox.max_lat, 50.0);
        assert!(bbox.contains(&GeoPoint::new(5.0, 40.0)));
        assert!(bbox.contains(&GeoPoint::new(7.0, 45.0)));
        assert!(!bbox.contains(&GeoPoint::new(11.0, 45.0)));

        let other = BoundingBox::enclosing(vec![GeoPoint::new(9.0, 49.0), GeoPoint::new(20.0, 60.0)])
            .unwrap();
        assert!(bbox.intersects(&other));
        let far = BoundingBox::from_corners(GeoPoint::new(100.0, 0.0), GeoPoint::new(101.0, 1.0));
        assert!(!bbox.intersects(&far));
        assert!(BoundingBox::enclosing(Vec::new()).is_none());
    }

    #[test]
    fn test_aggregate_table_first_value() {
        assert_eq!(AggregateTable::scalar("weekly_average", 12.5).first_value().unwrap(), 12.5);

        let empty = AggregateTable {
            columns: vec!["weekly_average".to_string()],
            rows: vec![],
        };
        assert!(empty.first_value().is_err());
    }
}
