//! API handlers

use axum::{
    body::Bytes,
    extract::{
        multipart::{Field, MultipartRejection},
        Multipart, State,
    },
    http::header,
    Json,
};
use serde_json::Value;
use std::time::Instant;

use crate::api::error::ApiError;
use crate::api::models::{
    format_elapsed, parse_weekly_average_request, HealthResponse, UploadResponse,
    WeeklyAverageResponse, INGESTION_FINISHED, NO_FILE_PART, NO_SELECTED_FILE,
};
use crate::api::AppState;

/// Health check
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Store an uploaded trip file and ingest it into the database
pub async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    let start = Instant::now();

    // A request that is not multipart has no file part
    let mut multipart = multipart.map_err(|_| ApiError::bad_request(NO_FILE_PART))?;

    let (filename, data) = loop {
        let field = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?
            .ok_or_else(|| ApiError::bad_request(NO_FILE_PART))?;

        if field.name() != Some("file") {
            continue;
        }
        // A `file` field without a filename is a plain form value
        let Some(filename) = part_filename(&field) else {
            continue;
        };
        if filename.is_empty() {
            return Err(ApiError::bad_request(NO_SELECTED_FILE));
        }

        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;
        break (filename, data);
    };

    let file_path = state
        .file_store
        .write(&state.upload_folder, &filename, data)
        .await
        .map_err(|e| {
            tracing::warn!(%filename, error = %e, "Failed to store upload");
            ApiError::from(e)
        })?;

    let report = state.ingestor.ingest(&file_path).await.map_err(|e| {
        tracing::warn!(path = %file_path, error = %e, "Ingestion failed");
        ApiError::from(e)
    })?;

    let elapsed = start.elapsed();

    Ok(Json(UploadResponse {
        status: INGESTION_FINISHED.to_string(),
        time: format_elapsed(elapsed),
        took_ms: elapsed.as_millis() as u64,
        trips: report.trips,
    }))
}

/// Filename of a multipart part; `Some("")` when the attribute is present but empty
fn part_filename(field: &Field<'_>) -> Option<String> {
    if let Some(name) = field.file_name() {
        return Some(name.to_string());
    }

    let has_filename_attribute = field
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .map(|v| {
            v.split(';')
                .any(|param| param.trim().to_ascii_lowercase().starts_with("filename"))
        })
        .unwrap_or(false);

    has_filename_attribute.then(String::new)
}

/// Weekly average number of trips for a region or an area
pub async fn get_weekly_average(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<WeeklyAverageResponse>, ApiError> {
    let start = Instant::now();

    let payload: Value = serde_json::from_slice(&body)
        .map_err(|e| ApiError::bad_request(format!("Invalid JSON body: {}", e)))?;
    let query = parse_weekly_average_request(&payload)?;

    let table = state.aggregator.weekly_average(&query).await.map_err(|e| {
        tracing::warn!(query = %query, error = %e, "Weekly average failed");
        ApiError::from(e)
    })?;
    let result = table.first_value()?;

    let elapsed = start.elapsed();

    Ok(Json(WeeklyAverageResponse {
        result,
        time: format_elapsed(elapsed),
        took_ms: elapsed.as_millis() as u64,
    }))
}
