//! The Vellum storage pipeline.
//!
//! This crate provides:
//! - Connected network profiles grouped by network type
//! - The upload chain: tree, fee, payment, segment upload
//! - Ordered fallback across profiles with per-attempt and overall deadlines
//! - Verified retrieval across profiles
//! - Optional AES-256-GCM sealing of payloads

pub mod download;
pub mod error;
pub mod registry;
pub mod sealing;
pub mod selector;
pub mod upload;

pub use download::{Retrieved, Retriever};
pub use error::{ErrorKind, PipelineError, PipelineResult, Stage};
pub use registry::{NetworkRegistry, ProfileHandle};
pub use sealing::{SealingError, SealingKey, open, seal};
pub use selector::{AttemptRecord, NetworkSelector, SelectorEvent, SelectorState, UploadOutcome};
pub use upload::{AttemptSuccess, UploadPipeline};

use bytes::Bytes;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use vellum_core::{Blob, PipelineConfig, RootHash};
use vellum_ledger::LedgerSigner;
use vellum_storage::{DownloadOptions, FileInfo};

/// Entry point for collaborators: hand in bytes and get a root hash and a
/// payment receipt back, or hand in a root hash and get verified bytes.
pub struct StoragePipeline {
    registry: NetworkRegistry,
    selector: NetworkSelector,
    retriever: Retriever,
    signer: Arc<dyn LedgerSigner>,
    max_blob_size: u64,
}

impl StoragePipeline {
    pub fn new(
        registry: NetworkRegistry,
        config: &PipelineConfig,
        signer: Arc<dyn LedgerSigner>,
    ) -> Self {
        Self {
            registry,
            selector: NetworkSelector::new(config),
            retriever: Retriever::new(DownloadOptions {
                verify: true,
                batch_size: config.download_batch_size as u64,
                max_size: config.max_blob_size,
            }),
            signer,
            max_blob_size: config.max_blob_size,
        }
    }

    pub fn registry(&self) -> &NetworkRegistry {
        &self.registry
    }

    /// Upload `data` to the first profile of `network_type` that accepts it.
    ///
    /// Input and network type problems are returned as errors before any
    /// attempt starts. Attempt failures are described by the outcome.
    pub async fn upload(
        &self,
        data: Bytes,
        mime_type: Option<String>,
        network_type: Option<&str>,
        cancel: &CancellationToken,
    ) -> PipelineResult<(String, UploadOutcome)> {
        let blob = Blob::new(data, mime_type, self.max_blob_size)
            .map_err(|e| PipelineError::from_core(Stage::Prepare, None, e))?;
        let (network_type, handles) = self.registry.resolve(network_type)?;
        let outcome = self
            .selector
            .upload_with_fallback(&blob, handles, self.signer.as_ref(), cancel)
            .await;
        Ok((network_type.to_string(), outcome))
    }

    pub async fn download(
        &self,
        root: &RootHash,
        network_type: Option<&str>,
        cancel: &CancellationToken,
    ) -> PipelineResult<(String, Retrieved<Bytes>)> {
        let (network_type, handles) = self.registry.resolve(network_type)?;
        let retrieved = self.retriever.download(root, handles, cancel).await?;
        Ok((network_type.to_string(), retrieved))
    }

    pub async fn exists(
        &self,
        root: &RootHash,
        network_type: Option<&str>,
        cancel: &CancellationToken,
    ) -> PipelineResult<(String, bool)> {
        let (network_type, handles) = self.registry.resolve(network_type)?;
        let exists = self.retriever.exists(root, handles, cancel).await?;
        Ok((network_type.to_string(), exists))
    }

    pub async fn describe(
        &self,
        root: &RootHash,
        network_type: Option<&str>,
        cancel: &CancellationToken,
    ) -> PipelineResult<(String, Retrieved<FileInfo>)> {
        let (network_type, handles) = self.registry.resolve(network_type)?;
        let info = self.retriever.describe(root, handles, cancel).await?;
        Ok((network_type.to_string(), info))
    }
}

/// Parse a root hash from user input, with or without the `0x` prefix.
pub fn parse_root(input: &str) -> PipelineResult<RootHash> {
    RootHash::from_hex(input).map_err(|e| PipelineError::from_core(Stage::Setup, None, e))
}
