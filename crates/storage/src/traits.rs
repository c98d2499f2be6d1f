//! Storage node trait definitions.

use crate::error::StorageResult;
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use vellum_core::{MerkleProof, RootHash};

/// What a storage node knows about a file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub root: RootHash,
    /// Unpadded size in bytes.
    pub size: u64,
    /// Number of segments.
    pub segments: u64,
    /// All segments are stored and the file can be served.
    pub finalized: bool,
    /// Replica count, when the node reports one.
    pub replicas: Option<u32>,
    pub uploaded_segments: u64,
}

/// A segment with the proof tying it to the file root.
///
/// `data` is the unpadded slice; nodes re-pad the last segment themselves.
#[derive(Clone, Debug)]
pub struct SegmentWithProof {
    pub root: RootHash,
    pub index: usize,
    pub data: Bytes,
    pub proof: MerkleProof,
    pub file_size: u64,
}

/// Acknowledgement of a segment upload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SegmentAck {
    Stored,
    /// The node already held this segment.
    AlreadyStored,
}

/// Submission details a node needs before it accepts segments.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubmissionNotice {
    pub root: RootHash,
    pub size: u64,
    pub segments: u64,
}

/// A storage network ingest/serve endpoint.
#[async_trait]
pub trait StorageNode: Send + Sync + 'static {
    /// Endpoint used for log and error context.
    fn endpoint(&self) -> &str;

    /// File status, `None` when the node has not seen the file.
    ///
    /// Nodes without a status call return `StorageError::Unsupported`.
    async fn file_info(&self, root: &RootHash) -> StorageResult<Option<FileInfo>>;

    /// Tell the node about a paid submission.
    ///
    /// Networks that follow the ledger discover submissions on their own and
    /// ignore this.
    async fn observe_submission(&self, _notice: &SubmissionNotice) -> StorageResult<()> {
        Ok(())
    }

    /// Store one segment. The node validates it against the root.
    async fn upload_segment(&self, segment: SegmentWithProof) -> StorageResult<SegmentAck>;

    /// Concatenated contents of segments `start..end`.
    ///
    /// The last segment of a file may come back padded; callers truncate to the file size.
    async fn download_segments(&self, root: &RootHash, start: u64, end: u64)
    -> StorageResult<Bytes>;
}
