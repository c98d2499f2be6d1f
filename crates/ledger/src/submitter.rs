//! Payable submission of a descriptor to the flow contract.

use crate::abi;
use crate::client::{CallRequest, LedgerClient, RpcReceipt};
use crate::error::{LedgerError, LedgerResult};
use crate::fees::FeeQuote;
use crate::policy::{self, FailurePolicy};
use crate::signer::{LedgerSigner, SigningMode, UnsignedTransaction};
use alloy_primitives::B256;
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};
use vellum_core::{NetworkProfile, SubmissionDescriptor};

/// Mined transaction summary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TransactionReceipt {
    pub tx_hash: B256,
    pub block_number: u64,
    pub gas_used: u64,
    pub confirmed: bool,
}

impl From<RpcReceipt> for TransactionReceipt {
    fn from(r: RpcReceipt) -> Self {
        Self {
            tx_hash: r.transaction_hash,
            block_number: r.block_number,
            gas_used: r.gas_used,
            confirmed: r.status,
        }
    }
}

/// Result of paying for a submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PaymentOutcome {
    Confirmed(TransactionReceipt),
    /// Accepted without confirmation under [`FailurePolicy::FailOpen`].
    Unconfirmed {
        tx_hash: Option<B256>,
        reason: String,
    },
}

impl PaymentOutcome {
    pub fn tx_hash(&self) -> Option<B256> {
        match self {
            Self::Confirmed(receipt) => Some(receipt.tx_hash),
            Self::Unconfirmed { tx_hash, .. } => *tx_hash,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed(_))
    }
}

/// Sends submissions and waits for their receipts.
#[derive(Clone, Debug)]
pub struct TransactionSubmitter {
    confirmation_timeout: Duration,
    poll_interval: Duration,
    policy: FailurePolicy,
}

impl TransactionSubmitter {
    pub fn new(confirmation_timeout: Duration, poll_interval: Duration, policy: FailurePolicy) -> Self {
        Self {
            confirmation_timeout,
            poll_interval,
            policy,
        }
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Pay for `submission` and wait for the transaction to be mined.
    #[instrument(skip_all, fields(profile = %profile.name, contract = %profile.contract_address))]
    pub async fn submit(
        &self,
        profile: &NetworkProfile,
        client: &dyn LedgerClient,
        submission: &SubmissionDescriptor,
        quote: &FeeQuote,
        signer: &dyn LedgerSigner,
    ) -> LedgerResult<PaymentOutcome> {
        match self.try_submit(profile, client, submission, quote, signer).await {
            Ok(receipt) => Ok(PaymentOutcome::Confirmed(receipt)),
            Err(err) => policy::resolve(self.policy, err),
        }
    }

    async fn try_submit(
        &self,
        profile: &NetworkProfile,
        client: &dyn LedgerClient,
        submission: &SubmissionDescriptor,
        quote: &FeeQuote,
        signer: &dyn LedgerSigner,
    ) -> LedgerResult<TransactionReceipt> {
        let chain_id = client.chain_id().await?;
        if let Some(expected) = profile.chain_id
            && expected != chain_id
        {
            return Err(LedgerError::ChainMismatch {
                expected,
                actual: chain_id,
            });
        }

        let from = signer.address();
        let nonce = client.transaction_count(from).await?;
        let tx = UnsignedTransaction {
            chain_id,
            nonce,
            from,
            to: profile.contract_address,
            value: quote.total_fee,
            input: abi::encode_submit(submission),
            gas_limit: quote.gas_limit,
            gas_price: quote.gas_price,
        };

        let sent = match signer.sign(&tx).await? {
            SigningMode::Raw(raw) => client.send_raw_transaction(&raw).await,
            SigningMode::NodeAccount => client.send_transaction(&tx).await,
        };
        let tx_hash = sent.map_err(classify_send_error)?;
        info!(%tx_hash, nonce, value = %tx.value, "submission transaction sent");

        let receipt = self.wait_for_receipt(client, tx_hash).await?;
        if !receipt.status {
            let reason = self.revert_reason(client, &tx, receipt.block_number).await;
            warn!(%tx_hash, %reason, "submission transaction reverted");
            return Err(LedgerError::TransactionReverted {
                tx_hash: Some(tx_hash),
                reason,
            });
        }

        info!(%tx_hash, block = receipt.block_number, gas_used = receipt.gas_used, "submission confirmed");
        Ok(receipt.into())
    }

    async fn wait_for_receipt(
        &self,
        client: &dyn LedgerClient,
        tx_hash: B256,
    ) -> LedgerResult<RpcReceipt> {
        let started = Instant::now();
        loop {
            match client.transaction_receipt(tx_hash).await {
                Ok(Some(receipt)) => return Ok(receipt),
                Ok(None) => debug!(%tx_hash, "receipt not yet available"),
                // The transaction is already broadcast, keep polling through transient faults.
                Err(e) => warn!(%tx_hash, error = %e, "receipt poll failed"),
            }
            if started.elapsed() >= self.confirmation_timeout {
                return Err(LedgerError::ConfirmationTimeout {
                    tx_hash,
                    waited: started.elapsed(),
                });
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Replay a reverted transaction as a call at its block to recover the reason.
    async fn revert_reason(
        &self,
        client: &dyn LedgerClient,
        tx: &UnsignedTransaction,
        block: u64,
    ) -> String {
        match client.call(&CallRequest::from(tx), Some(block)).await {
            Err(e) => e
                .revert_reason()
                .unwrap_or_else(|| format!("execution reverted ({e})")),
            Ok(data) => abi::decode_revert_reason(&data)
                .unwrap_or_else(|| "execution reverted without reason".to_string()),
        }
    }
}

/// A send that fails with revert data is definite, anything else leaves the
/// payment state unknown.
fn classify_send_error(err: LedgerError) -> LedgerError {
    if !matches!(err, LedgerError::Rpc { .. }) {
        return err;
    }
    match err.revert_reason() {
        Some(reason) => LedgerError::TransactionReverted {
            tx_hash: None,
            reason,
        },
        None => LedgerError::ambiguous(err.to_string()),
    }
}
