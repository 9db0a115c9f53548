//! Shared helpers for HTTP tests

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

pub const BOUNDARY: &str = "trips-test-boundary";

/// Multipart body with a single part
pub fn multipart_body(name: &str, filename: Option<&str>, content: &str) -> String {
    let disposition = match filename {
        Some(filename) => format!(
            "form-data; name=\"{}\"; filename=\"{}\"",
            name, filename
        ),
        None => format!("form-data; name=\"{}\"", name),
    };

    format!(
        "--{b}\r\nContent-Disposition: {d}\r\nContent-Type: text/csv\r\n\r\n{c}\r\n--{b}--\r\n",
        b = BOUNDARY,
        d = disposition,
        c = content
    )
}

pub fn upload_request(body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

pub fn weekly_average_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/get_weekly_average")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Send a request and decode the JSON response
pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}
