//! Connected network profiles, grouped by network type.

use crate::error::{ErrorKind, PipelineError, PipelineResult, Stage};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;
use vellum_core::{AppConfig, NetworkProfile};
use vellum_ledger::LedgerClient;
use vellum_storage::StorageNode;

/// A profile together with the clients that talk to it.
#[derive(Clone)]
pub struct ProfileHandle {
    pub profile: Arc<NetworkProfile>,
    pub ledger: Arc<dyn LedgerClient>,
    pub storage: Arc<dyn StorageNode>,
}

impl ProfileHandle {
    pub fn new(
        profile: NetworkProfile,
        ledger: Arc<dyn LedgerClient>,
        storage: Arc<dyn StorageNode>,
    ) -> Self {
        Self {
            profile: Arc::new(profile),
            ledger,
            storage,
        }
    }

    pub fn name(&self) -> &str {
        &self.profile.name
    }
}

impl std::fmt::Debug for ProfileHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileHandle")
            .field("profile", &self.profile.name)
            .field("ledger", &self.ledger.endpoint())
            .field("storage", &self.storage.endpoint())
            .finish()
    }
}

/// Ordered profile lists keyed by network type.
#[derive(Clone, Debug)]
pub struct NetworkRegistry {
    networks: BTreeMap<String, Vec<ProfileHandle>>,
    default_type: String,
}

impl NetworkRegistry {
    /// Connect every configured profile.
    pub async fn from_config(config: &AppConfig) -> PipelineResult<Self> {
        let timeout = config.pipeline.rpc_timeout();
        let mut networks = BTreeMap::new();

        for (network_type, profiles) in &config.networks.0 {
            let mut handles = Vec::with_capacity(profiles.len());
            for profile in profiles {
                let ledger = vellum_ledger::from_profile(profile, timeout).map_err(|e| {
                    PipelineError::new(Stage::Setup, Some(&profile.name), ErrorKind::InvalidInput, e)
                })?;
                let storage = vellum_storage::from_profile(profile, timeout)
                    .await
                    .map_err(|e| {
                        PipelineError::new(
                            Stage::Setup,
                            Some(&profile.name),
                            ErrorKind::InvalidInput,
                            e,
                        )
                    })?;
                info!(
                    network_type = %network_type,
                    profile = %profile.name,
                    ledger = %ledger.endpoint(),
                    storage = %storage.endpoint(),
                    "network profile connected"
                );
                handles.push(ProfileHandle::new(profile.clone(), ledger, storage));
            }
            networks.insert(network_type.clone(), handles);
        }

        Self::new(networks, &config.server.default_network_type)
    }

    pub fn new(
        networks: BTreeMap<String, Vec<ProfileHandle>>,
        default_type: &str,
    ) -> PipelineResult<Self> {
        if !networks.contains_key(default_type) {
            return Err(PipelineError::invalid_input(
                Stage::Setup,
                format!("default network type '{default_type}' has no profiles"),
            ));
        }
        Ok(Self {
            networks,
            default_type: default_type.to_string(),
        })
    }

    pub fn default_type(&self) -> &str {
        &self.default_type
    }

    pub fn network_types(&self) -> impl Iterator<Item = &str> {
        self.networks.keys().map(String::as_str)
    }

    /// Resolve a network type (the default when `None`) to its ordered profiles.
    pub fn resolve(&self, network_type: Option<&str>) -> PipelineResult<(&str, &[ProfileHandle])> {
        let requested = network_type
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(self.default_type.as_str());
        match self.networks.get_key_value(requested) {
            Some((name, handles)) if !handles.is_empty() => Ok((name.as_str(), handles.as_slice())),
            _ => Err(PipelineError::invalid_input(
                Stage::Setup,
                format!("unknown network type '{requested}'"),
            )),
        }
    }
}
