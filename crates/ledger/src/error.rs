//! Ledger error types.

use alloy_primitives::{B256, Bytes};
use std::time::Duration;
use thiserror::Error;

/// Ledger operation errors.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The node could not be reached or answered with an HTTP failure.
    #[error("ledger provider unavailable at {endpoint}: {reason}")]
    ProviderUnavailable { endpoint: String, reason: String },

    /// The node answered with a JSON-RPC error object.
    #[error("{method} failed with rpc error {code}: {message}")]
    Rpc {
        method: String,
        code: i64,
        message: String,
        data: Option<Bytes>,
    },

    /// Gas simulation failed and a fixed limit was used instead.
    #[error("fee estimation degraded: {0}")]
    FeeEstimationDegraded(String),

    /// The transaction was rejected by contract execution.
    #[error("transaction reverted: {reason}")]
    TransactionReverted {
        tx_hash: Option<B256>,
        reason: String,
    },

    /// The ledger returned something that cannot be interpreted as success or failure.
    #[error("ambiguous ledger response: {reason}")]
    AmbiguousLedgerFault {
        tx_hash: Option<B256>,
        reason: String,
    },

    #[error("transaction {tx_hash} not confirmed after {waited:?}")]
    ConfirmationTimeout { tx_hash: B256, waited: Duration },

    #[error("chain id mismatch: profile expects {expected}, node reports {actual}")]
    ChainMismatch { expected: u64, actual: u64 },

    #[error("signer error: {0}")]
    Signer(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl LedgerError {
    pub(crate) fn ambiguous(reason: impl Into<String>) -> Self {
        Self::AmbiguousLedgerFault {
            tx_hash: None,
            reason: reason.into(),
        }
    }

    /// Revert reason carried by a JSON-RPC error, if any.
    pub fn revert_reason(&self) -> Option<String> {
        match self {
            Self::TransactionReverted { reason, .. } => Some(reason.clone()),
            Self::Rpc { data: Some(data), .. } => crate::abi::decode_revert_reason(data),
            Self::Rpc { message, .. } if message.contains("execution reverted") => {
                Some(message.clone())
            }
            _ => None,
        }
    }

    /// Whether the outcome of a payment is unknown rather than failed.
    pub fn is_ambiguous(&self) -> bool {
        matches!(
            self,
            Self::AmbiguousLedgerFault { .. } | Self::ConfirmationTimeout { .. }
        )
    }

    /// Transaction hash associated with the failure, if one was broadcast.
    pub fn tx_hash(&self) -> Option<B256> {
        match self {
            Self::TransactionReverted { tx_hash, .. }
            | Self::AmbiguousLedgerFault { tx_hash, .. } => *tx_hash,
            Self::ConfirmationTimeout { tx_hash, .. } => Some(*tx_hash),
            _ => None,
        }
    }
}

/// Result type for ledger operations.
pub type LedgerResult<T> = std::result::Result<T, LedgerError>;
