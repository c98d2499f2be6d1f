//! Segment upload to a storage node.

use crate::error::{StorageError, StorageResult};
use crate::traits::{FileInfo, SegmentAck, SegmentWithProof, StorageNode, SubmissionNotice};
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, instrument};
use vellum_core::{Blob, NetworkProfile, RootHash, SubmissionPlan};

/// Timing for the upload state machine.
#[derive(Clone, Debug)]
pub struct UploadOptions {
    /// How long to wait for the node to observe the submission.
    pub submission_wait: Duration,
    pub finality_timeout: Duration,
    pub poll_interval: Duration,
    /// Segments in flight at once.
    pub segment_concurrency: usize,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            submission_wait: Duration::from_secs(60),
            finality_timeout: Duration::from_secs(300),
            poll_interval: Duration::from_secs(1),
            segment_concurrency: 4,
        }
    }
}

/// What the uploader did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UploadReceipt {
    /// The node already held the finalized file; nothing was sent.
    AlreadyPresent { root: RootHash },
    Uploaded {
        root: RootHash,
        segments_sent: usize,
        segments_skipped: usize,
        finalized: bool,
        replicas: Option<u32>,
    },
}

impl UploadReceipt {
    pub fn root(&self) -> RootHash {
        match self {
            Self::AlreadyPresent { root } | Self::Uploaded { root, .. } => *root,
        }
    }
}

/// Pushes the segments of a planned submission to a storage node.
#[derive(Clone, Debug, Default)]
pub struct Uploader;

impl Uploader {
    #[instrument(skip_all, fields(profile = %profile.name, root_hash = %plan.root(), size = blob.size_bytes()))]
    pub async fn upload(
        &self,
        plan: &SubmissionPlan,
        blob: &Blob,
        profile: &NetworkProfile,
        node: &dyn StorageNode,
        options: &UploadOptions,
    ) -> StorageResult<UploadReceipt> {
        let tree = &plan.tree;
        let root = tree.root();

        let reports_status = match node.file_info(&root).await {
            // Zero padding lets blobs of different lengths share a root.
            Ok(Some(info)) if info.size != tree.file_size() => {
                return Err(StorageError::SizeConflict {
                    root: root.to_string(),
                    stored: info.size,
                    requested: tree.file_size(),
                });
            }
            Ok(Some(info)) if info.finalized => {
                info!("file already finalized on node, skipping upload");
                return Ok(UploadReceipt::AlreadyPresent { root });
            }
            Ok(_) => true,
            Err(StorageError::Unsupported(_)) => false,
            Err(e) => return Err(e),
        };

        node.observe_submission(&SubmissionNotice {
            root,
            size: tree.file_size(),
            segments: tree.leaf_count() as u64,
        })
        .await?;
        if reports_status {
            let observed = self
                .poll_until(node, &root, options.submission_wait, options.poll_interval, |_| true)
                .await
                .map_err(|_| {
                    StorageError::Timeout(format!(
                        "node did not observe submission {root} within {:?}",
                        options.submission_wait
                    ))
                })?;
            debug!(uploaded = observed.uploaded_segments, "node observed submission");
        }

        let mut acks = stream::iter(0..tree.leaf_count())
            .map(|index| async move {
                let segment = SegmentWithProof {
                    root,
                    index,
                    data: Bytes::copy_from_slice(tree.segment_data(blob.data(), index)?),
                    proof: tree.proof(index)?,
                    file_size: tree.file_size(),
                };
                node.upload_segment(segment).await
            })
            .buffer_unordered(options.segment_concurrency.max(1));

        let mut sent = 0;
        let mut skipped = 0;
        while let Some(ack) = acks.next().await {
            match ack? {
                SegmentAck::Stored => sent += 1,
                SegmentAck::AlreadyStored => skipped += 1,
            }
        }
        info!(sent, skipped, "segments uploaded");

        let (finalized, replicas) = if profile.wait_for_finality && reports_status {
            let expected = profile.expected_replicas;
            let info = self
                .poll_until(node, &root, options.finality_timeout, options.poll_interval, |i| {
                    i.finalized && i.replicas.is_none_or(|r| r >= expected)
                })
                .await
                .map_err(|last| {
                    StorageError::Timeout(format!(
                        "file {root} not finalized with {expected} replicas within {:?} (last seen: {last:?})",
                        options.finality_timeout
                    ))
                })?;
            (true, info.replicas)
        } else {
            (false, None)
        };

        Ok(UploadReceipt::Uploaded {
            root,
            segments_sent: sent,
            segments_skipped: skipped,
            finalized,
            replicas,
        })
    }

    /// Poll `file_info` until `done` holds. On timeout returns the last info seen.
    async fn poll_until<F>(
        &self,
        node: &dyn StorageNode,
        root: &RootHash,
        timeout: Duration,
        interval: Duration,
        done: F,
    ) -> Result<FileInfo, Option<FileInfo>>
    where
        F: Fn(&FileInfo) -> bool,
    {
        let started = Instant::now();
        let mut last = None;
        loop {
            match node.file_info(root).await {
                Ok(Some(info)) if done(&info) => return Ok(info),
                Ok(info) => last = info,
                Err(e) => debug!(error = %e, "file info poll failed"),
            }
            if started.elapsed() >= timeout {
                return Err(last);
            }
            tokio::time::sleep(interval).await;
        }
    }
}
