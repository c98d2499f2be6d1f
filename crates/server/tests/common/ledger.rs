//! In-memory ledger standing in for a development chain.

use alloy_primitives::{Address, B256, Bytes as AbiBytes, U256, keccak256};
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use vellum_ledger::{
    CallRequest, LedgerClient, LedgerError, LedgerResult, RpcReceipt, UnsignedTransaction, abi,
};

pub const CHAIN_ID: u64 = 31337;
pub const MARKET: Address = Address::repeat_byte(0x4d);

/// Ledger that prices at 10 wei per sector and mines every transaction at once.
/// An unreachable ledger refuses every call.
pub struct FakeLedger {
    reachable: bool,
    nonce: AtomicU64,
}

#[allow(dead_code)]
impl FakeLedger {
    pub fn healthy() -> Arc<Self> {
        Arc::new(Self {
            reachable: true,
            nonce: AtomicU64::new(0),
        })
    }

    pub fn unreachable() -> Arc<Self> {
        Arc::new(Self {
            reachable: false,
            nonce: AtomicU64::new(0),
        })
    }

    /// Number of payments accepted so far.
    pub fn payments(&self) -> u64 {
        self.nonce.load(Ordering::SeqCst)
    }

    fn gate(&self) -> LedgerResult<()> {
        if self.reachable {
            Ok(())
        } else {
            Err(LedgerError::ProviderUnavailable {
                endpoint: "mock://ledger".into(),
                reason: "connection refused".into(),
            })
        }
    }
}

#[async_trait]
impl LedgerClient for FakeLedger {
    fn endpoint(&self) -> &str {
        "mock://ledger"
    }

    async fn chain_id(&self) -> LedgerResult<u64> {
        self.gate()?;
        Ok(CHAIN_ID)
    }

    async fn call(&self, call: &CallRequest, _block: Option<u64>) -> LedgerResult<AbiBytes> {
        self.gate()?;
        let selector = &call.data[..4];
        if selector == abi::selector(abi::MARKET_SIGNATURE) {
            let mut out = [0u8; 32];
            out[12..].copy_from_slice(MARKET.as_slice());
            Ok(AbiBytes::from(out.to_vec()))
        } else if selector == abi::selector(abi::PRICE_PER_SECTOR_SIGNATURE) {
            Ok(AbiBytes::from(U256::from(10).to_be_bytes::<32>().to_vec()))
        } else {
            Ok(AbiBytes::new())
        }
    }

    async fn estimate_gas(&self, _call: &CallRequest) -> LedgerResult<u64> {
        self.gate()?;
        Ok(21_000)
    }

    async fn gas_price(&self) -> LedgerResult<U256> {
        self.gate()?;
        Ok(U256::from(2))
    }

    async fn transaction_count(&self, _address: Address) -> LedgerResult<u64> {
        self.gate()?;
        Ok(self.nonce.load(Ordering::SeqCst))
    }

    async fn send_raw_transaction(&self, _raw: &AbiBytes) -> LedgerResult<B256> {
        Err(LedgerError::Signer("raw transactions not supported".into()))
    }

    async fn send_transaction(&self, _tx: &UnsignedTransaction) -> LedgerResult<B256> {
        self.gate()?;
        let nonce = self.nonce.fetch_add(1, Ordering::SeqCst);
        Ok(keccak256(nonce.to_be_bytes()))
    }

    async fn transaction_receipt(&self, tx_hash: B256) -> LedgerResult<Option<RpcReceipt>> {
        self.gate()?;
        Ok(Some(RpcReceipt {
            transaction_hash: tx_hash,
            block_number: 7,
            gas_used: 21_000,
            status: true,
        }))
    }
}
