//! Ordered fallback across the profiles of a network type.
//!
//! The selector runs the full upload chain against the primary profile and
//! moves to the next profile on any failure that another network could
//! plausibly survive. Attempts share no state: a payment made by an attempt
//! that later fails is not carried over, so a fallback can pay twice.

use crate::error::{ErrorKind, PipelineError, Stage};
use crate::registry::ProfileHandle;
use crate::upload::{AttemptSuccess, UploadPipeline};
use alloy_primitives::B256;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use vellum_core::{Blob, NetworkRole, PipelineConfig, RootHash};
use vellum_ledger::{FeeQuote, LedgerSigner};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectorState {
    Pending,
    TryingProfile(usize),
    Succeeded(usize),
    /// Every profile failed, or the deadline ran out.
    Exhausted,
    /// A failure no other profile could fix.
    Rejected,
    Cancelled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectorEvent {
    Start,
    Succeeded,
    Failed { retryable: bool },
    DeadlineExceeded,
    Cancelled,
}

impl SelectorState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending | Self::TryingProfile(_))
    }

    pub fn transition(self, event: SelectorEvent, profile_count: usize) -> Self {
        match (self, event) {
            (Self::Pending, SelectorEvent::Start) if profile_count == 0 => Self::Exhausted,
            (Self::Pending, SelectorEvent::Start) => Self::TryingProfile(0),
            (Self::TryingProfile(i), SelectorEvent::Succeeded) => Self::Succeeded(i),
            (Self::TryingProfile(_), SelectorEvent::Failed { retryable: false }) => Self::Rejected,
            (Self::TryingProfile(i), SelectorEvent::Failed { retryable: true })
                if i + 1 < profile_count =>
            {
                Self::TryingProfile(i + 1)
            }
            (Self::TryingProfile(_), SelectorEvent::Failed { .. })
            | (Self::TryingProfile(_), SelectorEvent::DeadlineExceeded) => Self::Exhausted,
            (Self::Pending | Self::TryingProfile(_), SelectorEvent::Cancelled) => Self::Cancelled,
            (state, _) => state,
        }
    }
}

/// One profile tried during a run.
#[derive(Clone, Debug)]
pub struct AttemptRecord {
    pub profile: String,
    pub role: NetworkRole,
    pub elapsed: Duration,
    /// `None` for the attempt that succeeded.
    pub error_kind: Option<ErrorKind>,
    pub stage: Option<Stage>,
    /// Full error text including the source chain. Not for end users.
    pub message: Option<String>,
}

impl AttemptRecord {
    /// Kind, stage and profile of a failed attempt, without transport detail.
    pub fn summary(&self) -> Option<String> {
        let kind = self.error_kind?;
        Some(match self.stage {
            Some(stage) => format!("{kind} during {stage} on {}", self.profile),
            None => format!("{kind} on {}", self.profile),
        })
    }
}

/// Result of a fallback run. Never thrown: failures are described here.
#[derive(Debug)]
pub struct UploadOutcome {
    pub success: bool,
    pub state: SelectorState,
    pub root_hash: Option<RootHash>,
    pub tx_hash: Option<B256>,
    pub explorer_url: Option<String>,
    pub payment_confirmed: bool,
    pub fee: Option<FeeQuote>,
    /// Profile that succeeded.
    pub network: Option<String>,
    pub role: Option<NetworkRole>,
    pub attempts: Vec<AttemptRecord>,
    /// The error of the last failed attempt when the run failed.
    pub error: Option<PipelineError>,
}

impl UploadOutcome {
    /// Number of times the run moved past a failed profile.
    pub fn fallbacks(&self) -> usize {
        self.attempts.len().saturating_sub(1)
    }

    fn failed(state: SelectorState, attempts: Vec<AttemptRecord>, error: PipelineError) -> Self {
        Self {
            success: false,
            state,
            root_hash: None,
            tx_hash: None,
            explorer_url: None,
            payment_confirmed: false,
            fee: None,
            network: None,
            role: None,
            attempts,
            error: Some(error),
        }
    }
}

pub struct NetworkSelector {
    pipeline: UploadPipeline,
    profile_timeout: Duration,
    pipeline_deadline: Duration,
}

impl NetworkSelector {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            pipeline: UploadPipeline::new(config),
            profile_timeout: config.profile_timeout(),
            pipeline_deadline: config.pipeline_deadline(),
        }
    }

    #[instrument(skip_all, fields(size = blob.size_bytes(), profiles = handles.len()))]
    pub async fn upload_with_fallback(
        &self,
        blob: &Blob,
        handles: &[ProfileHandle],
        signer: &dyn LedgerSigner,
        cancel: &CancellationToken,
    ) -> UploadOutcome {
        let deadline = Instant::now() + self.pipeline_deadline;
        let count = handles.len();
        let mut attempts = Vec::with_capacity(count);
        let mut last_error = None;
        let mut success = None;

        let mut state = SelectorState::Pending.transition(SelectorEvent::Start, count);
        while let SelectorState::TryingProfile(index) = state {
            let handle = &handles[index];
            let role = NetworkRole::for_index(index);
            if index > 0 {
                info!(profile = %handle.name(), %role, "falling back to next profile");
            }

            let started = Instant::now();
            let attempt_deadline = (started + self.profile_timeout).min(deadline);
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(PipelineError::cancelled(Stage::Attempt, Some(handle.name()))),
                r = tokio::time::timeout_at(attempt_deadline, self.pipeline.attempt(blob, handle, signer)) => {
                    r.unwrap_or_else(|_| {
                        Err(PipelineError::new(
                            Stage::Attempt,
                            Some(handle.name()),
                            ErrorKind::Timeout,
                            format!("attempt exceeded {:?}", attempt_deadline - started),
                        ))
                    })
                }
            };

            match result {
                Ok(done) => {
                    attempts.push(AttemptRecord {
                        profile: handle.name().to_string(),
                        role,
                        elapsed: started.elapsed(),
                        error_kind: None,
                        stage: None,
                        message: None,
                    });
                    state = state.transition(SelectorEvent::Succeeded, count);
                    success = Some(done);
                }
                Err(err) => {
                    warn!(profile = %handle.name(), %role, kind = %err.kind, error = %err, "upload attempt failed");
                    attempts.push(AttemptRecord {
                        profile: handle.name().to_string(),
                        role,
                        elapsed: started.elapsed(),
                        error_kind: Some(err.kind),
                        stage: Some(err.stage),
                        message: Some(err.to_string()),
                    });
                    let event = if err.kind == ErrorKind::Cancelled {
                        SelectorEvent::Cancelled
                    } else if Instant::now() >= deadline {
                        SelectorEvent::DeadlineExceeded
                    } else {
                        SelectorEvent::Failed {
                            retryable: err.is_retryable_on_next_profile(),
                        }
                    };
                    state = state.transition(event, count);
                    last_error = Some(err);
                }
            }
        }

        match (state, success) {
            (SelectorState::Succeeded(index), Some(done)) => {
                self.succeeded(state, &handles[index], index, done, attempts)
            }
            _ => {
                let error = last_error.unwrap_or_else(|| {
                    PipelineError::invalid_input(Stage::Setup, "no network profiles configured")
                });
                UploadOutcome::failed(state, attempts, error)
            }
        }
    }

    fn succeeded(
        &self,
        state: SelectorState,
        handle: &ProfileHandle,
        index: usize,
        done: AttemptSuccess,
        attempts: Vec<AttemptRecord>,
    ) -> UploadOutcome {
        let AttemptSuccess {
            root,
            payment,
            fee,
            receipt: _,
        } = done;
        let tx_hash = payment.as_ref().and_then(|p| p.tx_hash());
        let explorer_url = tx_hash.and_then(|tx| handle.profile.explorer_url(&tx.to_string()));
        // Content already held by the network needed no payment.
        let payment_confirmed = payment.as_ref().is_none_or(|p| p.is_confirmed());
        info!(root_hash = %root, profile = %handle.name(), ?tx_hash, "upload complete");

        UploadOutcome {
            success: true,
            state,
            root_hash: Some(root),
            tx_hash,
            explorer_url,
            payment_confirmed,
            fee,
            network: Some(handle.name().to_string()),
            role: Some(NetworkRole::for_index(index)),
            attempts,
            error: None,
        }
    }
}
