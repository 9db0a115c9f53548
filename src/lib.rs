//! Trips - ingestion and weekly-average queries over trip data
//!
//! - Upload trip CSV files over HTTP and store them on S3 or local disk
//! - Ingest uploaded files into a Parquet-backed trip table
//! - Query the weekly average number of trips by region or bounding box

pub mod api;
pub mod config;
pub mod database;
pub mod error;
pub mod ingest;
pub mod manifest;
pub mod query;
pub mod segment;
pub mod storage;
pub mod types;

pub use error::{Error, Result};
