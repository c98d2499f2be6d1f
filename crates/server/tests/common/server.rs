//! Server test utilities.

use crate::common::ledger::{CHAIN_ID, FakeLedger};
use std::collections::BTreeMap;
use std::sync::Arc;
use tempfile::TempDir;
use vellum_core::{AppConfig, NetworkProfile, SECTOR_SIZE};
use vellum_ledger::NodeAccountSigner;
use vellum_pipeline::{NetworkRegistry, ProfileHandle, StoragePipeline};
use vellum_server::bootstrap::DEV_ACCOUNT;
use vellum_server::{AppState, InMemoryRecords, create_router};
use vellum_storage::FilesystemNode;

/// A test server wrapper with all dependencies.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    pub records: Arc<InMemoryRecords>,
    pub primary: Arc<FakeLedger>,
    pub fallback: Arc<FakeLedger>,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestServer {
    /// Two healthy profiles sharing one storage network.
    pub async fn new() -> Self {
        Self::with_ledgers(FakeLedger::healthy(), FakeLedger::healthy(), |_| {}).await
    }

    /// Primary ledger refuses connections, uploads land on the fallback.
    pub async fn with_unreachable_primary() -> Self {
        Self::with_ledgers(FakeLedger::unreachable(), FakeLedger::healthy(), |_| {}).await
    }

    /// Every ledger refuses connections, so every upload fails.
    pub async fn with_unreachable_ledgers() -> Self {
        Self::with_ledgers(FakeLedger::unreachable(), FakeLedger::unreachable(), |_| {}).await
    }

    pub async fn with_config(customize: impl FnOnce(&mut AppConfig)) -> Self {
        Self::with_ledgers(FakeLedger::healthy(), FakeLedger::healthy(), customize).await
    }

    async fn with_ledgers(
        primary: Arc<FakeLedger>,
        fallback: Arc<FakeLedger>,
        customize: impl FnOnce(&mut AppConfig),
    ) -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let node = Arc::new(
            FilesystemNode::new(temp_dir.path().join("storage"), SECTOR_SIZE)
                .await
                .expect("Failed to create storage node"),
        );

        let mut config = AppConfig::for_testing();
        customize(&mut config);

        let handles = [("primary", primary.clone()), ("fallback", fallback.clone())]
            .into_iter()
            .map(|(name, ledger)| {
                let mut profile =
                    NetworkProfile::local(name, "http://127.0.0.1:8545", "file:///unused");
                profile.segment_size = SECTOR_SIZE;
                profile.chain_id = Some(CHAIN_ID);
                profile.explorer_url_template = Some("https://explorer.test/tx/{tx}".into());
                ProfileHandle::new(profile, ledger, node.clone())
            })
            .collect();

        let mut networks = BTreeMap::new();
        networks.insert("standard".to_string(), handles);
        let registry =
            NetworkRegistry::new(networks, "standard").expect("Failed to build registry");
        let pipeline = StoragePipeline::new(
            registry,
            &config.pipeline,
            Arc::new(NodeAccountSigner::new(DEV_ACCOUNT)),
        );

        let records = Arc::new(InMemoryRecords::new());
        let state = AppState::new(config, pipeline, records.clone());
        let router = create_router(state.clone());

        Self {
            router,
            state,
            records,
            primary,
            fallback,
            _temp_dir: temp_dir,
        }
    }
}
