#![allow(dead_code)]

use alloy_primitives::{Address, B256, Bytes as AbiBytes, U256, keccak256};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use vellum_core::{AppConfig, NetworkProfile, PipelineConfig, RootHash, SECTOR_SIZE};
use vellum_ledger::{
    CallRequest, LedgerClient, LedgerError, LedgerResult, NodeAccountSigner, RpcReceipt,
    UnsignedTransaction, abi,
};
use vellum_pipeline::{NetworkRegistry, ProfileHandle};
use vellum_storage::{
    FileInfo, FilesystemNode, SegmentAck, SegmentWithProof, StorageError, StorageNode,
    StorageResult, SubmissionNotice,
};

pub const CHAIN_ID: u64 = 31337;
pub const MARKET: Address = Address::repeat_byte(0x4d);
pub const SENDER: Address = Address::repeat_byte(0x5e);

/// Generate deterministic test data using a seeded pseudo-random generator.
pub fn seeded_bytes(seed: u64, len: usize) -> Bytes {
    let mut data = vec![0u8; len];
    let mut state = seed;
    for chunk in data.chunks_mut(8) {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
        let bytes = state.to_le_bytes();
        for (i, byte) in chunk.iter_mut().enumerate() {
            *byte = bytes[i % 8];
        }
    }
    Bytes::from(data)
}

#[derive(Clone, Debug)]
pub enum Behaviour {
    Healthy,
    Unavailable,
    Reverts(String),
    /// Transactions are accepted but never mined.
    NeverMined,
    /// Every call stalls for the given time first.
    Slow(Duration),
}

/// In-memory ledger that prices at 10 wei per sector and mines instantly.
pub struct FakeLedger {
    behaviour: Behaviour,
    nonce: AtomicU64,
    sent: Mutex<Vec<UnsignedTransaction>>,
}

impl FakeLedger {
    pub fn new(behaviour: Behaviour) -> Arc<Self> {
        Arc::new(Self {
            behaviour,
            nonce: AtomicU64::new(0),
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn sent(&self) -> Vec<UnsignedTransaction> {
        self.sent.lock().unwrap().clone()
    }

    async fn gate(&self) -> LedgerResult<()> {
        match &self.behaviour {
            Behaviour::Unavailable => Err(LedgerError::ProviderUnavailable {
                endpoint: "mock://ledger".into(),
                reason: "connection refused".into(),
            }),
            Behaviour::Slow(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

fn word(value: U256) -> AbiBytes {
    AbiBytes::from(value.to_be_bytes::<32>().to_vec())
}

fn revert_data(reason: &str) -> AbiBytes {
    let mut out = abi::ERROR_STRING_SELECTOR.to_vec();
    out.extend_from_slice(&U256::from(32).to_be_bytes::<32>());
    out.extend_from_slice(&U256::from(reason.len()).to_be_bytes::<32>());
    let mut msg = reason.as_bytes().to_vec();
    msg.resize(reason.len().div_ceil(32) * 32, 0);
    out.extend_from_slice(&msg);
    AbiBytes::from(out)
}

#[async_trait]
impl LedgerClient for FakeLedger {
    fn endpoint(&self) -> &str {
        "mock://ledger"
    }

    async fn chain_id(&self) -> LedgerResult<u64> {
        self.gate().await?;
        Ok(CHAIN_ID)
    }

    async fn call(&self, call: &CallRequest, _block: Option<u64>) -> LedgerResult<AbiBytes> {
        self.gate().await?;
        let selector = &call.data[..4];
        if selector == abi::selector(abi::MARKET_SIGNATURE) {
            let mut out = [0u8; 32];
            out[12..].copy_from_slice(MARKET.as_slice());
            Ok(AbiBytes::from(out.to_vec()))
        } else if selector == abi::selector(abi::PRICE_PER_SECTOR_SIGNATURE) {
            Ok(word(U256::from(10)))
        } else {
            Ok(AbiBytes::new())
        }
    }

    async fn estimate_gas(&self, _call: &CallRequest) -> LedgerResult<u64> {
        self.gate().await?;
        Ok(21_000)
    }

    async fn gas_price(&self) -> LedgerResult<U256> {
        self.gate().await?;
        Ok(U256::from(2))
    }

    async fn transaction_count(&self, _address: Address) -> LedgerResult<u64> {
        self.gate().await?;
        Ok(self.nonce.load(Ordering::SeqCst))
    }

    async fn send_raw_transaction(&self, _raw: &AbiBytes) -> LedgerResult<B256> {
        Err(LedgerError::Signer("raw transactions not supported".into()))
    }

    async fn send_transaction(&self, tx: &UnsignedTransaction) -> LedgerResult<B256> {
        self.gate().await?;
        if let Behaviour::Reverts(reason) = &self.behaviour {
            return Err(LedgerError::Rpc {
                method: "eth_sendTransaction".into(),
                code: 3,
                message: "execution reverted".into(),
                data: Some(revert_data(reason)),
            });
        }
        let nonce = self.nonce.fetch_add(1, Ordering::SeqCst);
        self.sent.lock().unwrap().push(tx.clone());
        Ok(keccak256(nonce.to_be_bytes()))
    }

    async fn transaction_receipt(&self, tx_hash: B256) -> LedgerResult<Option<RpcReceipt>> {
        self.gate().await?;
        if matches!(self.behaviour, Behaviour::NeverMined) {
            return Ok(None);
        }
        Ok(Some(RpcReceipt {
            transaction_hash: tx_hash,
            block_number: 7,
            gas_used: 21_000,
            status: true,
        }))
    }
}

/// Node that flips one bit in every download.
pub struct CorruptingNode {
    pub inner: Arc<dyn StorageNode>,
}

#[async_trait]
impl StorageNode for CorruptingNode {
    fn endpoint(&self) -> &str {
        "mock://corrupting"
    }

    async fn file_info(&self, root: &RootHash) -> StorageResult<Option<FileInfo>> {
        self.inner.file_info(root).await
    }

    async fn observe_submission(&self, notice: &SubmissionNotice) -> StorageResult<()> {
        self.inner.observe_submission(notice).await
    }

    async fn upload_segment(&self, segment: SegmentWithProof) -> StorageResult<SegmentAck> {
        self.inner.upload_segment(segment).await
    }

    async fn download_segments(
        &self,
        root: &RootHash,
        start: u64,
        end: u64,
    ) -> StorageResult<Bytes> {
        let data = self.inner.download_segments(root, start, end).await?;
        let mut corrupted = BytesMut::from(data.as_ref());
        if let Some(first) = corrupted.first_mut() {
            *first ^= 0x01;
        }
        Ok(corrupted.freeze())
    }
}

/// Node that accepts submissions but refuses every segment.
pub struct RejectingNode {
    pub inner: Arc<dyn StorageNode>,
}

#[async_trait]
impl StorageNode for RejectingNode {
    fn endpoint(&self) -> &str {
        "mock://rejecting"
    }

    async fn file_info(&self, root: &RootHash) -> StorageResult<Option<FileInfo>> {
        self.inner.file_info(root).await
    }

    async fn observe_submission(&self, notice: &SubmissionNotice) -> StorageResult<()> {
        self.inner.observe_submission(notice).await
    }

    async fn upload_segment(&self, segment: SegmentWithProof) -> StorageResult<SegmentAck> {
        Err(StorageError::SegmentRejected {
            index: segment.index,
            reason: "disk quota exceeded".to_string(),
        })
    }

    async fn download_segments(
        &self,
        root: &RootHash,
        start: u64,
        end: u64,
    ) -> StorageResult<Bytes> {
        self.inner.download_segments(root, start, end).await
    }
}

pub fn signer() -> NodeAccountSigner {
    NodeAccountSigner::new(SENDER)
}

pub fn profile(name: &str) -> NetworkProfile {
    let mut profile = NetworkProfile::local(name, "http://127.0.0.1:8545", "file:///unused");
    profile.segment_size = SECTOR_SIZE;
    profile.chain_id = Some(CHAIN_ID);
    profile
}

pub fn pipeline_config() -> PipelineConfig {
    AppConfig::for_testing().pipeline
}

/// One profile of a test network: its ledger, its local storage node and the
/// directory backing that node.
pub struct TestProfile {
    pub ledger: Arc<FakeLedger>,
    pub node: Arc<FilesystemNode>,
    pub handle: ProfileHandle,
    _dir: TempDir,
}

impl TestProfile {
    pub async fn new(name: &str, behaviour: Behaviour) -> Self {
        Self::with_profile(profile(name), behaviour).await
    }

    pub async fn with_profile(profile: NetworkProfile, behaviour: Behaviour) -> Self {
        Self::with_node(profile, behaviour, |node| node).await
    }

    /// Like [`TestProfile::with_profile`], with the storage node seen by the
    /// pipeline wrapped by `wrap`. `node` stays the unwrapped backend.
    pub async fn with_node(
        profile: NetworkProfile,
        behaviour: Behaviour,
        wrap: impl FnOnce(Arc<dyn StorageNode>) -> Arc<dyn StorageNode>,
    ) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let node = Arc::new(FilesystemNode::new(dir.path(), SECTOR_SIZE).await.unwrap());
        let ledger = FakeLedger::new(behaviour);
        let storage = wrap(node.clone() as Arc<dyn StorageNode>);
        let handle = ProfileHandle::new(profile, ledger.clone(), storage);
        Self {
            ledger,
            node,
            handle,
            _dir: dir,
        }
    }
}

pub fn handles(profiles: &[&TestProfile]) -> Vec<ProfileHandle> {
    profiles.iter().map(|p| p.handle.clone()).collect()
}

pub fn registry(profiles: &[&TestProfile]) -> NetworkRegistry {
    let mut networks = BTreeMap::new();
    networks.insert("standard".to_string(), handles(profiles));
    NetworkRegistry::new(networks, "standard").unwrap()
}
