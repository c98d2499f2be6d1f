//! Storage error types.

use thiserror::Error;

/// Storage operation errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("file not found: {0}")]
    NotFound(String),

    #[error("file not finalized yet: {0}")]
    NotFinalized(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage node unavailable at {endpoint}: {reason}")]
    Unavailable { endpoint: String, reason: String },

    #[error("{method} failed with rpc error {code}: {message}")]
    Rpc {
        method: String,
        code: i64,
        message: String,
    },

    #[error("segment {index} rejected: {reason}")]
    SegmentRejected { index: usize, reason: String },

    #[error("operation not supported by this node: {0}")]
    Unsupported(String),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("file {root} is already stored with {stored} bytes, not {requested}")]
    SizeConflict {
        root: String,
        stored: u64,
        requested: u64,
    },

    #[error("hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },

    #[error(transparent)]
    Core(#[from] vellum_core::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;
