//! Pipeline error classification.
//!
//! Every failure inside an attempt is tagged with the stage it happened in,
//! the profile it happened on and an [`ErrorKind`] that drives fallback.

use serde::Serialize;
use std::fmt;
use thiserror::Error;
use vellum_ledger::LedgerError;
use vellum_storage::StorageError;

pub type PipelineResult<T> = Result<T, PipelineError>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Where in the pipeline a failure happened.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Setup,
    /// A whole attempt, when it was cut off from outside.
    Attempt,
    Prepare,
    Fee,
    Payment,
    Upload,
    Download,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Setup => "setup",
            Self::Attempt => "attempt",
            Self::Prepare => "prepare",
            Self::Fee => "fee",
            Self::Payment => "payment",
            Self::Upload => "upload",
            Self::Download => "download",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    ProviderUnavailable,
    FeeEstimationDegraded,
    TransactionReverted,
    AmbiguousLedgerFault,
    StorageUploadFailed,
    NotFound,
    Corrupted,
    Cancelled,
    Timeout,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid_input",
            Self::ProviderUnavailable => "provider_unavailable",
            Self::FeeEstimationDegraded => "fee_estimation_degraded",
            Self::TransactionReverted => "transaction_reverted",
            Self::AmbiguousLedgerFault => "ambiguous_ledger_fault",
            Self::StorageUploadFailed => "storage_upload_failed",
            Self::NotFound => "not_found",
            Self::Corrupted => "corrupted",
            Self::Cancelled => "cancelled",
            Self::Timeout => "timeout",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("{kind} during {stage} on {}: {source}", .profile.as_deref().unwrap_or("-"))]
pub struct PipelineError {
    pub stage: Stage,
    pub profile: Option<String>,
    pub kind: ErrorKind,
    #[source]
    pub source: BoxError,
}

impl PipelineError {
    pub fn new(
        stage: Stage,
        profile: Option<&str>,
        kind: ErrorKind,
        source: impl Into<BoxError>,
    ) -> Self {
        Self {
            stage,
            profile: profile.map(str::to_string),
            kind,
            source: source.into(),
        }
    }

    pub fn invalid_input(stage: Stage, source: impl Into<BoxError>) -> Self {
        Self::new(stage, None, ErrorKind::InvalidInput, source)
    }

    pub fn cancelled(stage: Stage, profile: Option<&str>) -> Self {
        Self::new(stage, profile, ErrorKind::Cancelled, "operation cancelled")
    }

    pub fn from_core(stage: Stage, profile: Option<&str>, err: vellum_core::Error) -> Self {
        Self::new(stage, profile, ErrorKind::InvalidInput, err)
    }

    pub fn from_ledger(stage: Stage, profile: &str, err: LedgerError) -> Self {
        Self::new(stage, Some(profile), ledger_kind(&err), err)
    }

    pub fn from_storage(stage: Stage, profile: &str, err: StorageError) -> Self {
        Self::new(stage, Some(profile), storage_kind(&err), err)
    }

    /// Kind, stage and profile only. Safe to show outside the process.
    pub fn summary(&self) -> String {
        format!(
            "{} during {} on {}",
            self.kind,
            self.stage,
            self.profile.as_deref().unwrap_or("-")
        )
    }

    /// Invalid input fails the same way everywhere and a cancelled caller is
    /// gone, everything else may succeed on another network.
    pub fn is_retryable_on_next_profile(&self) -> bool {
        !matches!(self.kind, ErrorKind::InvalidInput | ErrorKind::Cancelled)
    }
}

fn ledger_kind(err: &LedgerError) -> ErrorKind {
    match err {
        LedgerError::ProviderUnavailable { .. } | LedgerError::ChainMismatch { .. } => {
            ErrorKind::ProviderUnavailable
        }
        LedgerError::FeeEstimationDegraded(_) => ErrorKind::FeeEstimationDegraded,
        LedgerError::TransactionReverted { .. } => ErrorKind::TransactionReverted,
        LedgerError::Rpc { .. } if err.revert_reason().is_some() => ErrorKind::TransactionReverted,
        LedgerError::Rpc { .. }
        | LedgerError::AmbiguousLedgerFault { .. }
        | LedgerError::ConfirmationTimeout { .. } => ErrorKind::AmbiguousLedgerFault,
        LedgerError::Signer(_) | LedgerError::Config(_) => ErrorKind::InvalidInput,
    }
}

fn storage_kind(err: &StorageError) -> ErrorKind {
    match err {
        StorageError::NotFound(_) | StorageError::NotFinalized(_) => ErrorKind::NotFound,
        StorageError::Unavailable { .. } => ErrorKind::ProviderUnavailable,
        StorageError::HashMismatch { .. } => ErrorKind::Corrupted,
        StorageError::Timeout(_) => ErrorKind::Timeout,
        StorageError::InvalidKey(_)
        | StorageError::SizeConflict { .. }
        | StorageError::Core(_) => ErrorKind::InvalidInput,
        StorageError::Io(_)
        | StorageError::Rpc { .. }
        | StorageError::SegmentRejected { .. }
        | StorageError::Unsupported(_)
        | StorageError::Malformed(_)
        | StorageError::Config(_) => ErrorKind::StorageUploadFailed,
    }
}
