//! One upload attempt against one profile.

use crate::error::{PipelineError, PipelineResult, Stage};
use crate::registry::ProfileHandle;
use tracing::{debug, info, instrument, warn};
use vellum_core::{Blob, PipelineConfig, RootHash, build_submission};
use vellum_ledger::{FeeCalculator, FeeQuote, LedgerSigner, PaymentOutcome, TransactionSubmitter};
use vellum_storage::{StorageError, UploadOptions, UploadReceipt, Uploader};

/// What a successful attempt produced.
#[derive(Clone, Debug)]
pub struct AttemptSuccess {
    pub root: RootHash,
    /// `None` when the network already held the file and nothing was paid.
    pub payment: Option<PaymentOutcome>,
    pub fee: Option<FeeQuote>,
    pub receipt: UploadReceipt,
}

/// Runs tree build, fee, payment and segment upload in order.
#[derive(Clone, Debug)]
pub struct UploadPipeline {
    fees: FeeCalculator,
    submitter: TransactionSubmitter,
    uploader: Uploader,
    upload_options: UploadOptions,
}

impl UploadPipeline {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            fees: FeeCalculator::new(config.fallback_gas_limit),
            submitter: TransactionSubmitter::new(
                config.confirmation_timeout(),
                config.poll_interval(),
                config.failure_policy,
            ),
            uploader: Uploader,
            upload_options: UploadOptions {
                submission_wait: config.submission_wait(),
                finality_timeout: config.finality_timeout(),
                poll_interval: config.poll_interval(),
                segment_concurrency: config.segment_concurrency,
            },
        }
    }

    #[instrument(skip_all, fields(profile = %handle.name(), size = blob.size_bytes()))]
    pub async fn attempt(
        &self,
        blob: &Blob,
        handle: &ProfileHandle,
        signer: &dyn LedgerSigner,
    ) -> PipelineResult<AttemptSuccess> {
        let profile = handle.profile.as_ref();
        let name = profile.name.as_str();

        let plan = build_submission(blob, profile.segment_size)
            .map_err(|e| PipelineError::from_core(Stage::Prepare, Some(name), e))?;
        let root = plan.root();
        debug!(root_hash = %root, segments = plan.tree.leaf_count(), "submission planned");

        // A finalized copy of the same length means a previous run already
        // paid for this content. Zero padding lets a different length share
        // the root, and that must never be reported as stored.
        match handle.storage.file_info(&root).await {
            Ok(Some(info)) if info.size != plan.tree.file_size() => {
                return Err(PipelineError::from_storage(
                    Stage::Prepare,
                    name,
                    StorageError::SizeConflict {
                        root: root.to_string(),
                        stored: info.size,
                        requested: plan.tree.file_size(),
                    },
                ));
            }
            Ok(Some(info)) if info.finalized => {
                info!(root_hash = %root, "file already stored on network, skipping payment");
                return Ok(AttemptSuccess {
                    root,
                    payment: None,
                    fee: None,
                    receipt: UploadReceipt::AlreadyPresent { root },
                });
            }
            Ok(_) => {}
            Err(e) => debug!(error = %e, "pre-payment status check failed"),
        }

        let fee = self
            .fees
            .calculate(
                &plan.submission,
                profile,
                handle.ledger.as_ref(),
                Some(signer.address()),
            )
            .await
            .map_err(|e| PipelineError::from_ledger(Stage::Fee, name, e))?;
        let formatted = fee.formatted();
        info!(
            root_hash = %root,
            sectors = fee.sectors,
            storage_fee = %formatted.storage_fee,
            total_fee = %formatted.total_fee,
            degraded = fee.is_degraded(),
            "fee quoted"
        );

        let payment = self
            .submitter
            .submit(
                profile,
                handle.ledger.as_ref(),
                &plan.submission,
                &fee,
                signer,
            )
            .await
            .map_err(|e| PipelineError::from_ledger(Stage::Payment, name, e))?;
        if let PaymentOutcome::Unconfirmed { tx_hash, reason } = &payment {
            warn!(?tx_hash, %reason, "continuing with unconfirmed payment");
        }

        let receipt = self
            .uploader
            .upload(
                &plan,
                blob,
                profile,
                handle.storage.as_ref(),
                &self.upload_options,
            )
            .await
            .map_err(|e| PipelineError::from_storage(Stage::Upload, name, e))?;

        Ok(AttemptSuccess {
            root,
            payment: Some(payment),
            fee: Some(fee),
            receipt,
        })
    }
}
