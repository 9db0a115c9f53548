//! Trip file parsing
//!
//! Trip files carry a header row with the columns `region`, `origin_coord`,
//! `destination_coord`, `datetime` and `datasource`, in any order. Coordinates
//! are WKT points, e.g. `POINT (14.4973794438195 50.00136875782316)`.

use chrono::NaiveDateTime;

use crate::types::{GeoPoint, Trip};
use crate::{Error, Result};

const REQUIRED_COLUMNS: [&str; 5] = [
    "region",
    "origin_coord",
    "destination_coord",
    "datetime",
    "datasource",
];

const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Column positions resolved from the header row
struct ColumnIndex {
    region: usize,
    origin: usize,
    destination: usize,
    datetime: usize,
    datasource: usize,
}

impl ColumnIndex {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().trim_start_matches('\u{feff}').eq_ignore_ascii_case(name))
        };

        let missing: Vec<&str> = REQUIRED_COLUMNS
            .iter()
            .copied()
            .filter(|name| find(name).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(Error::parse(format!(
                "Missing required column(s): {}",
                missing.join(", ")
            )));
        }

        // All present, checked above
        let at = |name: &str| find(name).unwrap_or_default();
        Ok(Self {
            region: at("region"),
            origin: at("origin_coord"),
            destination: at("destination_coord"),
            datetime: at("datetime"),
            datasource: at("datasource"),
        })
    }
}

/// Parse a whole trip file; any malformed row fails the file
pub fn parse_trips(data: &[u8]) -> Result<Vec<Trip>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(data);

    let columns = ColumnIndex::from_headers(reader.headers()?)?;
    let mut trips = Vec::new();

    for result in reader.records() {
        let record = result?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        let trip = parse_record(&record, &columns).map_err(|e| {
            let reason = match e {
                Error::Parse(msg) | Error::InvalidRequest(msg) => msg,
                other => other.to_string(),
            };
            Error::parse(format!("Line {}: {}", line, reason))
        })?;
        trips.push(trip);
    }

    if trips.is_empty() {
        return Err(Error::parse("File contains no trips"));
    }

    Ok(trips)
}

fn parse_record(record: &csv::StringRecord, columns: &ColumnIndex) -> Result<Trip> {
    let field = |idx: usize, name: &str| {
        record
            .get(idx)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::parse(format!("missing value for '{}'", name)))
    };

    Ok(Trip {
        region: field(columns.region, "region")?.to_string(),
        origin: GeoPoint::from_wkt(field(columns.origin, "origin_coord")?)?,
        destination: GeoPoint::from_wkt(field(columns.destination, "destination_coord")?)?,
        datetime: parse_datetime(field(columns.datetime, "datetime")?)?,
        datasource: field(columns.datasource, "datasource")?.to_string(),
    })
}

pub fn parse_datetime(raw: &str) -> Result<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .ok_or_else(|| Error::parse(format!("invalid datetime '{}'", raw)))
}
