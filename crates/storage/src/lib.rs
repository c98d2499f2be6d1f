//! Storage network access for Vellum.
//!
//! This crate provides:
//! - The `StorageNode` trait for ingest/serve endpoints
//! - Segment upload with per-segment Merkle proofs
//! - Download with root hash verification
//! - Backends: JSON-RPC storage node and a local filesystem network

pub mod backends;
pub mod downloader;
pub mod error;
pub mod traits;
pub mod uploader;

pub use backends::{filesystem::FilesystemNode, rpc::RpcStorageNode};
pub use downloader::{DownloadOptions, Downloader};
pub use error::{StorageError, StorageResult};
pub use traits::{FileInfo, SegmentAck, SegmentWithProof, StorageNode, SubmissionNotice};
pub use uploader::{UploadOptions, UploadReceipt, Uploader};

use std::sync::Arc;
use std::time::Duration;
use vellum_core::NetworkProfile;

/// Create a storage node client for a profile.
///
/// `file://` ingest URLs open a local filesystem network, anything else is
/// treated as a JSON-RPC endpoint.
pub async fn from_profile(
    profile: &NetworkProfile,
    timeout: Duration,
) -> StorageResult<Arc<dyn StorageNode>> {
    profile
        .validate()
        .map_err(|e| StorageError::Config(e.to_string()))?;

    match profile.storage_ingest_url.strip_prefix("file://") {
        Some(path) => {
            let node = FilesystemNode::new(path, profile.segment_size).await?;
            Ok(Arc::new(node))
        }
        None => {
            let node =
                RpcStorageNode::new(&profile.storage_ingest_url, profile.segment_size, timeout)?;
            Ok(Arc::new(node))
        }
    }
}
