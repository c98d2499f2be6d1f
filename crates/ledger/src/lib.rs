//! Ledger access for Vellum.
//!
//! This crate provides:
//! - A `LedgerClient` trait with a JSON-RPC implementation
//! - ABI encoding for the flow and market contracts
//! - Fee calculation and payable submission with receipt tracking
//! - The signer seam and the policy for unconfirmed payments

pub mod abi;
pub mod client;
pub mod error;
pub mod fees;
pub mod policy;
pub mod signer;
pub mod submitter;

pub use client::{CallRequest, JsonRpcLedger, LedgerClient, RpcReceipt};
pub use error::{LedgerError, LedgerResult};
pub use fees::{FeeCalculator, FeeQuote, GasEstimate};
pub use policy::FailurePolicy;
pub use signer::{LedgerSigner, NodeAccountSigner, SigningMode, UnsignedTransaction};
pub use submitter::{PaymentOutcome, TransactionReceipt, TransactionSubmitter};

use std::sync::Arc;
use std::time::Duration;
use vellum_core::NetworkProfile;

/// Create a ledger client for a profile.
pub fn from_profile(profile: &NetworkProfile, timeout: Duration) -> LedgerResult<Arc<dyn LedgerClient>> {
    Ok(Arc::new(JsonRpcLedger::new(&profile.ledger_rpc_url, timeout)?))
}
