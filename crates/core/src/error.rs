//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
///
/// Every variant describes malformed caller input; none of them are worth
/// retrying against another network.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("blob is empty")]
    EmptyBlob,

    #[error("blob of {size} bytes exceeds maximum of {max} bytes")]
    BlobTooLarge { size: u64, max: u64 },

    #[error("invalid root hash: {0}")]
    InvalidRootHash(String),

    #[error("invalid segment size: {size} (must be a non-zero multiple of {sector})")]
    InvalidSegmentSize { size: u64, sector: u64 },

    #[error("segment index {index} out of range (tree has {count} segments)")]
    SegmentOutOfRange { index: usize, count: usize },

    #[error("invalid submission: {0}")]
    InvalidSubmission(String),

    #[error("invalid network profile: {0}")]
    InvalidProfile(String),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
