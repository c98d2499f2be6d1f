//! Verified download from a storage node.

use crate::error::{StorageError, StorageResult};
use crate::traits::{FileInfo, StorageNode};
use bytes::{Bytes, BytesMut};
use tracing::{debug, instrument, warn};
use vellum_core::{NetworkProfile, RootHash, merkle};

/// Download behaviour.
#[derive(Clone, Debug)]
pub struct DownloadOptions {
    /// Re-derive the root from the bytes and compare.
    pub verify: bool,
    /// Segments requested per call.
    pub batch_size: u64,
    /// Largest file size a node may report before anything is fetched.
    pub max_size: u64,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            verify: true,
            batch_size: 16,
            max_size: vellum_core::DEFAULT_MAX_BLOB_SIZE,
        }
    }
}

/// Node-reported metadata is untrusted until it agrees with the profile.
fn check_reported_shape(
    info: &FileInfo,
    profile: &NetworkProfile,
    max_size: u64,
) -> StorageResult<()> {
    if info.size == 0 || info.size > max_size {
        return Err(StorageError::Malformed(format!(
            "node reported size {} outside 1..={max_size}",
            info.size
        )));
    }
    let expected = info.size.div_ceil(profile.segment_size.max(1));
    if info.segments != expected {
        return Err(StorageError::Malformed(format!(
            "node reported {} segments for {} bytes, expected {expected}",
            info.segments, info.size
        )));
    }
    Ok(())
}

/// Retrieves files by root hash.
#[derive(Clone, Debug, Default)]
pub struct Downloader;

impl Downloader {
    /// File status for the metadata endpoint. Absent files are `NotFound`.
    #[instrument(skip_all, fields(root_hash = %root))]
    pub async fn describe(&self, root: &RootHash, node: &dyn StorageNode) -> StorageResult<FileInfo> {
        node.file_info(root)
            .await?
            .ok_or_else(|| StorageError::NotFound(root.to_string()))
    }

    #[instrument(skip_all, fields(profile = %profile.name, root_hash = %root))]
    pub async fn download(
        &self,
        root: &RootHash,
        profile: &NetworkProfile,
        node: &dyn StorageNode,
        options: &DownloadOptions,
    ) -> StorageResult<Bytes> {
        let info = self.describe(root, node).await?;
        if !info.finalized {
            return Err(StorageError::NotFinalized(root.to_string()));
        }

        check_reported_shape(&info, profile, options.max_size)?;

        let batch = options.batch_size.max(1);
        let ceiling = info.segments.saturating_mul(profile.segment_size);
        let mut data = BytesMut::new();
        let mut start = 0u64;
        while start < info.segments {
            let end = start.checked_add(batch).unwrap_or(u64::MAX).min(info.segments);
            let chunk = node.download_segments(root, start, end).await?;
            debug!(start, end, bytes = chunk.len(), "segments downloaded");
            if data.len() as u64 + chunk.len() as u64 > ceiling {
                return Err(StorageError::Malformed(format!(
                    "node returned more than {ceiling} bytes for {} segments",
                    info.segments
                )));
            }
            data.extend_from_slice(&chunk);
            start = end;
        }

        if (data.len() as u64) < info.size {
            return Err(StorageError::HashMismatch {
                expected: root.to_string(),
                actual: format!("truncated download ({} of {} bytes)", data.len(), info.size),
            });
        }
        data.truncate(info.size as usize);
        let data = data.freeze();

        if options.verify {
            let actual = merkle::root_hash(&data, profile.segment_size)?;
            if actual != *root {
                warn!(%actual, "downloaded bytes do not match root hash");
                return Err(StorageError::HashMismatch {
                    expected: root.to_string(),
                    actual: actual.to_string(),
                });
            }
        }

        Ok(data)
    }

    /// Whether the node holds a finalized copy of `root`.
    ///
    /// Nodes without a status call are checked with a full verified download.
    #[instrument(skip_all, fields(profile = %profile.name, root_hash = %root))]
    pub async fn verify_exists(
        &self,
        root: &RootHash,
        profile: &NetworkProfile,
        node: &dyn StorageNode,
    ) -> StorageResult<bool> {
        match node.file_info(root).await {
            Ok(info) => Ok(info.is_some_and(|i| i.finalized)),
            Err(StorageError::Unsupported(method)) => {
                debug!(%method, "status call unsupported, falling back to download");
                match self.download_without_status(root, profile, node).await {
                    Ok(_) => Ok(true),
                    Err(StorageError::NotFound(_)) => Ok(false),
                    Err(e) => Err(e),
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Download when the size is unknown: fetch segments one at a time until
    /// the node runs out, then verify.
    async fn download_without_status(
        &self,
        root: &RootHash,
        profile: &NetworkProfile,
        node: &dyn StorageNode,
    ) -> StorageResult<Bytes> {
        let ceiling = vellum_core::DEFAULT_MAX_BLOB_SIZE.saturating_add(profile.segment_size);
        let mut data = BytesMut::new();
        let mut index = 0u64;
        loop {
            match node.download_segments(root, index, index.saturating_add(1)).await {
                Ok(chunk) if chunk.is_empty() => break,
                Ok(chunk) => {
                    if data.len() as u64 + chunk.len() as u64 > ceiling {
                        return Err(StorageError::Malformed(format!(
                            "node kept returning segments past {ceiling} bytes"
                        )));
                    }
                    data.extend_from_slice(&chunk);
                }
                Err(StorageError::NotFound(_)) if index > 0 => break,
                Err(e) => return Err(e),
            }
            index += 1;
        }

        // Zero padding does not change the root, so verify the padded bytes directly.
        let actual = merkle::root_hash(&data, profile.segment_size)
            .map_err(|_| StorageError::NotFound(root.to_string()))?;
        if actual != *root {
            return Err(StorageError::HashMismatch {
                expected: root.to_string(),
                actual: actual.to_string(),
            });
        }
        Ok(data.freeze())
    }
}
