//! Local filesystem storage network.
//!
//! Behaves like a single storage node for development and tests: it learns
//! about submissions through [`StorageNode::observe_submission`], validates
//! every segment against its proof, and reports a file as finalized once all
//! of its segments are on disk.
//!
//! Layout under the root directory:
//! `files/aa/bb/<hex>/info.json` and `files/aa/bb/<hex>/segments/<index>`.

use crate::error::{StorageError, StorageResult};
use crate::traits::{FileInfo, SegmentAck, SegmentWithProof, StorageNode, SubmissionNotice};
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};
use uuid::Uuid;
use vellum_core::RootHash;
use vellum_core::merkle::{hash_segment, validate_segment_size};

const INFO_FILE: &str = "info.json";
const SEGMENTS_DIR: &str = "segments";

#[derive(Debug, Serialize, Deserialize)]
struct StoredInfo {
    size: u64,
    segments: u64,
}

/// Storage node backed by a local directory.
pub struct FilesystemNode {
    root: PathBuf,
    endpoint: String,
    segment_size: u64,
}

impl FilesystemNode {
    /// Open (or create) a local network rooted at `root`.
    pub async fn new(root: impl AsRef<Path>, segment_size: u64) -> StorageResult<Self> {
        validate_segment_size(segment_size)?;
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self {
            endpoint: format!("file://{}", root.display()),
            root,
            segment_size,
        })
    }

    /// Directory for a file, rejecting keys that would leave the root.
    fn file_dir(&self, root_hash: &RootHash) -> StorageResult<PathBuf> {
        let key = root_hash.to_object_key();
        if !Path::new(&key)
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(StorageError::InvalidKey(format!(
                "contains unsafe path component: {key}"
            )));
        }
        Ok(self.root.join(key))
    }

    fn segment_path(dir: &Path, index: u64) -> PathBuf {
        dir.join(SEGMENTS_DIR).join(index.to_string())
    }

    async fn read_info(&self, dir: &Path) -> StorageResult<Option<StoredInfo>> {
        match fs::read(dir.join(INFO_FILE)).await {
            Ok(raw) => serde_json::from_slice(&raw)
                .map(Some)
                .map_err(|e| StorageError::Malformed(format!("corrupt {INFO_FILE}: {e}"))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    async fn count_segments(dir: &Path) -> StorageResult<u64> {
        let mut entries = match fs::read_dir(dir.join(SEGMENTS_DIR)).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(StorageError::Io(e)),
        };
        let mut count = 0;
        while let Some(entry) = entries.next_entry().await? {
            // Skip in-flight temp files.
            if entry.file_type().await?.is_file()
                && entry.file_name().to_string_lossy().parse::<u64>().is_ok()
            {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Write to a temp file with a unique name, fsync, then rename.
    async fn write_atomic(path: &Path, data: &[u8]) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let temp_path = path.with_file_name(format!(
            "{}.tmp.{}",
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            Uuid::new_v4()
        ));
        {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(data).await?;
            file.sync_all().await?;
        }
        fs::rename(&temp_path, path).await?;
        Ok(())
    }

    fn check_segment(&self, info: &StoredInfo, segment: &SegmentWithProof) -> Result<(), String> {
        let index = segment.index as u64;
        if index >= info.segments {
            return Err(format!("index out of range (file has {} segments)", info.segments));
        }
        if segment.file_size != info.size {
            return Err(format!(
                "file size {} does not match submission size {}",
                segment.file_size, info.size
            ));
        }
        let expected_len = (info.size - index * self.segment_size).min(self.segment_size);
        if segment.data.len() as u64 != expected_len {
            return Err(format!(
                "segment is {} bytes, expected {expected_len}",
                segment.data.len()
            ));
        }
        if segment.proof.leaf_index != segment.index {
            return Err("proof is for a different segment".to_string());
        }
        let leaf = hash_segment(&segment.data, self.segment_size as usize);
        if !segment.proof.verify(&segment.root, &leaf) {
            return Err("proof does not match root".to_string());
        }
        Ok(())
    }
}

#[async_trait]
impl StorageNode for FilesystemNode {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    #[instrument(skip(self), fields(backend = "filesystem", root = %root))]
    async fn file_info(&self, root: &RootHash) -> StorageResult<Option<FileInfo>> {
        let dir = self.file_dir(root)?;
        let Some(info) = self.read_info(&dir).await? else {
            return Ok(None);
        };
        let uploaded = Self::count_segments(&dir).await?;
        let finalized = uploaded >= info.segments;
        Ok(Some(FileInfo {
            root: *root,
            size: info.size,
            segments: info.segments,
            finalized,
            replicas: finalized.then_some(1),
            uploaded_segments: uploaded,
        }))
    }

    #[instrument(skip(self, notice), fields(backend = "filesystem", root = %notice.root))]
    async fn observe_submission(&self, notice: &SubmissionNotice) -> StorageResult<()> {
        let dir = self.file_dir(&notice.root)?;
        if let Some(existing) = self.read_info(&dir).await? {
            if existing.size != notice.size {
                return Err(StorageError::SizeConflict {
                    root: notice.root.to_string(),
                    stored: existing.size,
                    requested: notice.size,
                });
            }
            return Ok(());
        }
        let info = StoredInfo {
            size: notice.size,
            segments: notice.segments,
        };
        let raw = serde_json::to_vec(&info)
            .map_err(|e| StorageError::Malformed(format!("encode {INFO_FILE}: {e}")))?;
        Self::write_atomic(&dir.join(INFO_FILE), &raw).await?;
        debug!(size = notice.size, segments = notice.segments, "submission recorded");
        Ok(())
    }

    #[instrument(skip(self, segment), fields(backend = "filesystem", root = %segment.root, index = segment.index, size = segment.data.len()))]
    async fn upload_segment(&self, segment: SegmentWithProof) -> StorageResult<SegmentAck> {
        let dir = self.file_dir(&segment.root)?;
        let info = self
            .read_info(&dir)
            .await?
            .ok_or_else(|| StorageError::SegmentRejected {
                index: segment.index,
                reason: "no submission recorded for this root".to_string(),
            })?;
        self.check_segment(&info, &segment)
            .map_err(|reason| StorageError::SegmentRejected {
                index: segment.index,
                reason,
            })?;

        let path = Self::segment_path(&dir, segment.index as u64);
        if fs::try_exists(&path).await? {
            return Ok(SegmentAck::AlreadyStored);
        }
        Self::write_atomic(&path, &segment.data).await?;
        Ok(SegmentAck::Stored)
    }

    #[instrument(skip(self), fields(backend = "filesystem", root = %root))]
    async fn download_segments(
        &self,
        root: &RootHash,
        start: u64,
        end: u64,
    ) -> StorageResult<Bytes> {
        let dir = self.file_dir(root)?;
        let mut out = Vec::new();
        for index in start..end {
            let data = fs::read(Self::segment_path(&dir, index))
                .await
                .map_err(|e| {
                    if e.kind() == std::io::ErrorKind::NotFound {
                        StorageError::NotFound(format!("{root} segment {index}"))
                    } else {
                        StorageError::Io(e)
                    }
                })?;
            out.extend_from_slice(&data);
        }
        Ok(Bytes::from(out))
    }
}
