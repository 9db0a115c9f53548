//! Request validation and response bodies

use serde::Serialize;
use serde_json::{Map, Value};
use std::time::Duration;

use crate::types::{GeoPoint, WeeklyAverageQuery};

use super::error::ApiError;

pub const NO_FILE_PART: &str = "No file part";
pub const NO_SELECTED_FILE: &str = "No selected file";
pub const INGESTION_FINISHED: &str = "Ingestion finished sucessfully";

pub const REGION_AND_COORDINATES: &str =
    "Please provide either 'region' or 'coordinates', not both";
pub const REGION_OR_COORDINATES: &str =
    "Please provide either 'region' or 'coordinates' in the request";
pub const BOTH_POINTS_REQUIRED: &str =
    "Both 'first_point' and 'second_point' are required in 'coordinates'";

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub status: String,
    pub time: String,
    pub took_ms: u64,
    pub trips: usize,
}

#[derive(Debug, Serialize)]
pub struct WeeklyAverageResponse {
    pub result: f64,
    pub time: String,
    pub took_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Validate a weekly-average request body.
///
/// Key presence decides the query shape, so `{"region": null}` is a region
/// query with an invalid region rather than an empty request.
pub fn parse_weekly_average_request(body: &Value) -> Result<WeeklyAverageQuery, ApiError> {
    let object = body
        .as_object()
        .ok_or_else(|| ApiError::bad_request("Request body must be a JSON object"))?;

    match (object.get("region"), object.get("coordinates")) {
        (Some(_), Some(_)) => Err(ApiError::bad_request(REGION_AND_COORDINATES)),
        (None, None) => Err(ApiError::bad_request(REGION_OR_COORDINATES)),
        (Some(region), None) => region
            .as_str()
            .map(|r| WeeklyAverageQuery::Region(r.to_string()))
            .ok_or_else(|| ApiError::bad_request("'region' must be a string")),
        (None, Some(coordinates)) => {
            let empty = Map::new();
            let coordinates = coordinates.as_object().unwrap_or(&empty);

            let first = coordinates.get("first_point").filter(|v| is_truthy(v));
            let second = coordinates.get("second_point").filter(|v| is_truthy(v));

            match (first, second) {
                (Some(first), Some(second)) => Ok(WeeklyAverageQuery::Coordinates {
                    first_point: GeoPoint::from_json(first)?,
                    second_point: GeoPoint::from_json(second)?,
                }),
                _ => Err(ApiError::bad_request(BOTH_POINTS_REQUIRED)),
            }
        }
    }
}

/// JSON truthiness: `null`, `false`, `0`, `""`, `[]` and `{}` are falsy
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Elapsed time as `H:MM:SS.ffffff`
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!(
        "{}:{:02}:{:02}.{:06}",
        secs / 3600,
        (secs / 60) % 60,
        secs % 60,
        elapsed.subsec_micros()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message(body: Value) -> String {
        parse_weekly_average_request(&body).unwrap_err().message
    }

    #[test]
    fn test_region_query() {
        let query = parse_weekly_average_request(&json!({"region": "north"})).unwrap();
        assert_eq!(query, WeeklyAverageQuery::Region("north".to_string()));
    }

    #[test]
    fn test_coordinates_query() {
        let query = parse_weekly_average_request(&json!({
            "coordinates": {"first_point": [7.0, 44.0], "second_point": "POINT (8 46)"}
        }))
        .unwrap();
        assert_eq!(
            query,
            WeeklyAverageQuery::Coordinates {
                first_point: GeoPoint::new(7.0, 44.0),
                second_point: GeoPoint::new(8.0, 46.0),
            }
        );
    }

    #[test]
    fn test_shape_errors() {
        assert_eq!(
            message(json!({"region": "north", "coordinates": {}})),
            REGION_AND_COORDINATES
        );
        assert_eq!(message(json!({})), REGION_OR_COORDINATES);
        assert_eq!(message(json!({"other": 1})), REGION_OR_COORDINATES);
        assert_eq!(
            message(json!({"coordinates": {"first_point": null, "second_point": [1, 2]}})),
            BOTH_POINTS_REQUIRED
        );
        assert_eq!(
            message(json!({"coordinates": {"first_point": [1, 2]}})),
            BOTH_POINTS_REQUIRED
        );
        assert_eq!(
            message(json!({"coordinates": {"first_point": [], "second_point": [1, 2]}})),
            BOTH_POINTS_REQUIRED
        );
        assert_eq!(message(json!({"coordinates": null})), BOTH_POINTS_REQUIRED);
        assert_eq!(message(json!({"region": 5})), "'region' must be a string");
        assert_eq!(message(json!([1, 2])), "Request body must be a JSON object");
    }

    #[test]
    fn test_invalid_point_is_rejected() {
        let err = parse_weekly_average_request(&json!({
            "coordinates": {"first_point": "nowhere", "second_point": [1, 2]}
        }))
        .unwrap_err();
        assert!(err.message.contains("nowhere"));
    }

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(Duration::from_micros(12_345)), "0:00:00.012345");
        assert_eq!(format_elapsed(Duration::from_secs(3_725)), "1:02:05.000000");
    }
}
