//! Retrieval by root hash across the profiles of a network type.

use crate::error::{ErrorKind, PipelineError, PipelineResult, Stage};
use crate::registry::ProfileHandle;
use bytes::Bytes;
use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};
use vellum_core::{NetworkRole, RootHash};
use vellum_storage::{DownloadOptions, Downloader, FileInfo, StorageResult};

/// Bytes and the profile that served them.
#[derive(Clone, Debug)]
pub struct Retrieved<T> {
    pub value: T,
    pub profile: String,
    pub role: NetworkRole,
}

/// Reads from the first profile that has the file.
///
/// Missing, unreachable and corrupt copies all move on to the next profile.
/// When every profile fails, a corrupt copy is reported ahead of an absent one.
#[derive(Clone, Debug)]
pub struct Retriever {
    downloader: Downloader,
    options: DownloadOptions,
}

impl Retriever {
    pub fn new(options: DownloadOptions) -> Self {
        Self {
            downloader: Downloader,
            options,
        }
    }

    #[instrument(skip_all, fields(root_hash = %root))]
    pub async fn download(
        &self,
        root: &RootHash,
        handles: &[ProfileHandle],
        cancel: &CancellationToken,
    ) -> PipelineResult<Retrieved<Bytes>> {
        self.first_success(handles, cancel, |handle| async move {
            self.downloader
                .download(
                    root,
                    &handle.profile,
                    handle.storage.as_ref(),
                    &self.options,
                )
                .await
        })
        .await
    }

    #[instrument(skip_all, fields(root_hash = %root))]
    pub async fn describe(
        &self,
        root: &RootHash,
        handles: &[ProfileHandle],
        cancel: &CancellationToken,
    ) -> PipelineResult<Retrieved<FileInfo>> {
        self.first_success(handles, cancel, |handle| async move {
            self.downloader.describe(root, handle.storage.as_ref()).await
        })
        .await
    }

    /// `false` only when every profile answered and none holds the file.
    #[instrument(skip_all, fields(root_hash = %root))]
    pub async fn exists(
        &self,
        root: &RootHash,
        handles: &[ProfileHandle],
        cancel: &CancellationToken,
    ) -> PipelineResult<bool> {
        let mut last_error = None;
        for handle in handles {
            let check = self
                .downloader
                .verify_exists(root, &handle.profile, handle.storage.as_ref());
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(PipelineError::cancelled(Stage::Download, Some(handle.name()))),
                r = check => r,
            };
            match result {
                Ok(true) => return Ok(true),
                Ok(false) => debug!(profile = %handle.name(), "file not on profile"),
                Err(e) => {
                    warn!(profile = %handle.name(), error = %e, "existence check failed");
                    last_error = Some(PipelineError::from_storage(Stage::Download, handle.name(), e));
                }
            }
        }
        match last_error {
            Some(err) if err.kind != ErrorKind::NotFound => Err(err),
            _ => Ok(false),
        }
    }

    async fn first_success<'a, T, F, Fut>(
        &self,
        handles: &'a [ProfileHandle],
        cancel: &CancellationToken,
        op: F,
    ) -> PipelineResult<Retrieved<T>>
    where
        F: Fn(&'a ProfileHandle) -> Fut,
        Fut: Future<Output = StorageResult<T>>,
    {
        let mut best: Option<PipelineError> = None;
        for (index, handle) in handles.iter().enumerate() {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(PipelineError::cancelled(Stage::Download, Some(handle.name()))),
                r = op(handle) => r,
            };
            match result {
                Ok(value) => {
                    return Ok(Retrieved {
                        value,
                        profile: handle.name().to_string(),
                        role: NetworkRole::for_index(index),
                    });
                }
                Err(e) => {
                    let err = PipelineError::from_storage(Stage::Download, handle.name(), e);
                    if err.kind == ErrorKind::Corrupted {
                        warn!(profile = %handle.name(), error = %err, "profile served corrupt data");
                    } else {
                        debug!(profile = %handle.name(), error = %err, "profile could not serve file");
                    }
                    if best.as_ref().is_none_or(|b| outranks(&err, b)) {
                        best = Some(err);
                    }
                }
            }
        }
        Err(best.unwrap_or_else(|| {
            PipelineError::invalid_input(Stage::Download, "no network profiles configured")
        }))
    }
}

/// Corruption beats everything, and a real fault beats a plain miss.
fn outranks(candidate: &PipelineError, current: &PipelineError) -> bool {
    let rank = |kind: ErrorKind| match kind {
        ErrorKind::Corrupted => 2,
        ErrorKind::NotFound => 0,
        _ => 1,
    };
    rank(candidate.kind) > rank(current.kind)
}
