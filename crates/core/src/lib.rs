//! Core domain types and shared logic for Vellum.
//!
//! This crate defines the canonical data model used across all other crates:
//! - Blobs and their size limits
//! - Root hashes and the segment Merkle tree
//! - Submission descriptors for the flow contract
//! - Network profiles and application configuration

pub mod blob;
pub mod config;
pub mod error;
pub mod hash;
pub mod merkle;
pub mod profile;
pub mod submission;

pub use blob::Blob;
pub use config::{AppConfig, FailurePolicy, PipelineConfig};
pub use error::{Error, Result};
pub use hash::RootHash;
pub use merkle::{MerkleProof, MerkleTree, SegmentInfo};
pub use profile::{NetworkProfile, NetworkRole, NetworksConfig};
pub use submission::{SubmissionDescriptor, SubmissionNode, SubmissionPlan, build_submission};

/// Storage sector size in bytes. Fees are charged per sector.
pub const SECTOR_SIZE: u64 = 256;

/// Default segment size: 256 KiB
pub const DEFAULT_SEGMENT_SIZE: u64 = 256 * 1024;

/// Default maximum blob size: 50 MiB
pub const DEFAULT_MAX_BLOB_SIZE: u64 = 50 * 1024 * 1024;
