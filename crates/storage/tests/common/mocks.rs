use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use vellum_core::RootHash;
use vellum_storage::{
    FileInfo, SegmentAck, SegmentWithProof, StorageError, StorageNode, StorageResult,
    SubmissionNotice,
};

/// Node that flips one bit in every download.
#[allow(dead_code)]
pub struct CorruptingNode {
    pub inner: Arc<dyn StorageNode>,
}

#[async_trait]
impl StorageNode for CorruptingNode {
    fn endpoint(&self) -> &str {
        "mock://corrupting"
    }

    async fn file_info(&self, root: &RootHash) -> StorageResult<Option<FileInfo>> {
        self.inner.file_info(root).await
    }

    async fn observe_submission(&self, notice: &SubmissionNotice) -> StorageResult<()> {
        self.inner.observe_submission(notice).await
    }

    async fn upload_segment(&self, segment: SegmentWithProof) -> StorageResult<SegmentAck> {
        self.inner.upload_segment(segment).await
    }

    async fn download_segments(
        &self,
        root: &RootHash,
        start: u64,
        end: u64,
    ) -> StorageResult<Bytes> {
        let data = self.inner.download_segments(root, start, end).await?;
        let mut corrupted = BytesMut::from(data.as_ref());
        if let Some(first) = corrupted.first_mut() {
            *first ^= 0x01;
        }
        Ok(corrupted.freeze())
    }
}

/// Node without a status call.
#[allow(dead_code)]
pub struct StatuslessNode {
    pub inner: Arc<dyn StorageNode>,
}

#[async_trait]
impl StorageNode for StatuslessNode {
    fn endpoint(&self) -> &str {
        "mock://statusless"
    }

    async fn file_info(&self, _root: &RootHash) -> StorageResult<Option<FileInfo>> {
        Err(StorageError::Unsupported("file_info".to_string()))
    }

    async fn observe_submission(&self, notice: &SubmissionNotice) -> StorageResult<()> {
        self.inner.observe_submission(notice).await
    }

    async fn upload_segment(&self, segment: SegmentWithProof) -> StorageResult<SegmentAck> {
        self.inner.upload_segment(segment).await
    }

    async fn download_segments(
        &self,
        root: &RootHash,
        start: u64,
        end: u64,
    ) -> StorageResult<Bytes> {
        self.inner.download_segments(root, start, end).await
    }
}

/// Node that counts segment uploads.
#[allow(dead_code)]
pub struct CountingNode {
    pub inner: Arc<dyn StorageNode>,
    pub uploads: AtomicUsize,
}

#[allow(dead_code)]
impl CountingNode {
    pub fn new(inner: Arc<dyn StorageNode>) -> Self {
        Self {
            inner,
            uploads: AtomicUsize::new(0),
        }
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StorageNode for CountingNode {
    fn endpoint(&self) -> &str {
        self.inner.endpoint()
    }

    async fn file_info(&self, root: &RootHash) -> StorageResult<Option<FileInfo>> {
        self.inner.file_info(root).await
    }

    async fn observe_submission(&self, notice: &SubmissionNotice) -> StorageResult<()> {
        self.inner.observe_submission(notice).await
    }

    async fn upload_segment(&self, segment: SegmentWithProof) -> StorageResult<SegmentAck> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        self.inner.upload_segment(segment).await
    }

    async fn download_segments(
        &self,
        root: &RootHash,
        start: u64,
        end: u64,
    ) -> StorageResult<Bytes> {
        self.inner.download_segments(root, start, end).await
    }
}

/// Node that reports fixed metadata and serves a fixed payload for every range.
#[allow(dead_code)]
pub struct MisreportingNode {
    pub info: FileInfo,
    pub payload: Bytes,
    pub downloads: AtomicUsize,
}

#[allow(dead_code)]
impl MisreportingNode {
    pub fn new(info: FileInfo, payload: Bytes) -> Self {
        Self {
            info,
            payload,
            downloads: AtomicUsize::new(0),
        }
    }

    pub fn download_count(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StorageNode for MisreportingNode {
    fn endpoint(&self) -> &str {
        "mock://misreporting"
    }

    async fn file_info(&self, _root: &RootHash) -> StorageResult<Option<FileInfo>> {
        Ok(Some(self.info.clone()))
    }

    async fn observe_submission(&self, _notice: &SubmissionNotice) -> StorageResult<()> {
        Ok(())
    }

    async fn upload_segment(&self, segment: SegmentWithProof) -> StorageResult<SegmentAck> {
        Err(StorageError::SegmentRejected {
            index: segment.index,
            reason: "read-only node".to_string(),
        })
    }

    async fn download_segments(
        &self,
        _root: &RootHash,
        _start: u64,
        _end: u64,
    ) -> StorageResult<Bytes> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        Ok(self.payload.clone())
    }
}
