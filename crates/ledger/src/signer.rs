//! Transaction signing seam.
//!
//! Key custody lives outside this crate. A signer either returns a fully
//! signed raw transaction, or asks the ledger node to sign with an account it
//! has unlocked.

use crate::error::LedgerResult;
use alloy_primitives::{Address, Bytes, U256};
use async_trait::async_trait;

/// A legacy transaction ready to be signed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnsignedTransaction {
    pub chain_id: u64,
    pub nonce: u64,
    pub from: Address,
    pub to: Address,
    pub value: U256,
    pub input: Bytes,
    pub gas_limit: u64,
    pub gas_price: U256,
}

/// How a transaction reaches the ledger.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SigningMode {
    /// RLP-encoded signed transaction for `eth_sendRawTransaction`.
    Raw(Bytes),
    /// Let the node sign via `eth_sendTransaction`.
    NodeAccount,
}

/// Produces signatures for ledger transactions.
#[async_trait]
pub trait LedgerSigner: Send + Sync {
    /// Sender address.
    fn address(&self) -> Address;

    async fn sign(&self, tx: &UnsignedTransaction) -> LedgerResult<SigningMode>;
}

/// Signer for an account unlocked on the ledger node.
#[derive(Clone, Debug)]
pub struct NodeAccountSigner {
    address: Address,
}

impl NodeAccountSigner {
    pub fn new(address: Address) -> Self {
        Self { address }
    }
}

#[async_trait]
impl LedgerSigner for NodeAccountSigner {
    fn address(&self) -> Address {
        self.address
    }

    async fn sign(&self, _tx: &UnsignedTransaction) -> LedgerResult<SigningMode> {
        Ok(SigningMode::NodeAccount)
    }
}
