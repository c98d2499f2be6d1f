//! HTTP API server for the Vellum storage pipeline.
//!
//! This crate provides the HTTP surface:
//! - Multipart upload through the fallback pipeline
//! - Verified download as JSON/base64 or raw bytes
//! - Existence and metadata lookups by root hash
//! - A record sink for the surrounding application
//! - Prometheus metrics

pub mod bootstrap;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod records;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use records::{InMemoryRecords, RecordSink, StorageRecord};
pub use routes::create_router;
pub use state::AppState;
