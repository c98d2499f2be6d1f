//! Network profiles.
//!
//! A profile binds one ledger endpoint, one storage ingest endpoint and the
//! contract addresses used to pay for uploads. Profiles are grouped by network
//! type (`standard`, `turbo`, ...) into ordered lists where the first entry is
//! the primary and every later entry is a fallback.

use alloy_primitives::{Address, address};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Network type used when a request does not name one.
pub const DEFAULT_NETWORK_TYPE: &str = "standard";

/// Flow contract address of a freshly started local development chain.
pub const DEV_FLOW_CONTRACT: Address = address!("5FbDB2315678afecb367f032d93F642f64180aa3");

/// Position of a profile within its network type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkRole {
    Primary,
    Fallback,
}

impl NetworkRole {
    /// Role of the profile at `index` in an ordered list.
    pub fn for_index(index: usize) -> Self {
        if index == 0 {
            Self::Primary
        } else {
            Self::Fallback
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Fallback => "fallback",
        }
    }
}

impl fmt::Display for NetworkRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static configuration for one ledger + storage network pair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkProfile {
    /// Short identifier, unique within its network type.
    pub name: String,
    /// JSON-RPC endpoint of the ledger node.
    pub ledger_rpc_url: String,
    /// Storage ingest endpoint. `file://` URLs select the local filesystem network.
    pub storage_ingest_url: String,
    /// Block explorer link with a `{tx}` placeholder.
    #[serde(default)]
    pub explorer_url_template: Option<String>,
    /// Flow contract receiving submissions.
    pub contract_address: Address,
    /// Market contract. Resolved through `flow.market()` when unset.
    #[serde(default)]
    pub market_address: Option<Address>,
    /// Expected chain id. Fetched from the node when unset.
    #[serde(default)]
    pub chain_id: Option<u64>,
    #[serde(default = "default_segment_size")]
    pub segment_size: u64,
    /// Replica count required before an upload counts as final.
    #[serde(default = "default_expected_replicas")]
    pub expected_replicas: u32,
    #[serde(default)]
    pub wait_for_finality: bool,
}

fn default_segment_size() -> u64 {
    crate::DEFAULT_SEGMENT_SIZE
}

fn default_expected_replicas() -> u32 {
    1
}

impl NetworkProfile {
    /// Profile pointing at local development endpoints.
    pub fn local(name: &str, ledger_rpc_url: &str, storage_ingest_url: &str) -> Self {
        Self {
            name: name.to_string(),
            ledger_rpc_url: ledger_rpc_url.to_string(),
            storage_ingest_url: storage_ingest_url.to_string(),
            explorer_url_template: None,
            contract_address: DEV_FLOW_CONTRACT,
            market_address: None,
            chain_id: None,
            segment_size: default_segment_size(),
            expected_replicas: default_expected_replicas(),
            wait_for_finality: false,
        }
    }

    /// Link to a transaction on the block explorer, if one is configured.
    pub fn explorer_url(&self, tx_hash: &str) -> Option<String> {
        self.explorer_url_template
            .as_ref()
            .map(|template| template.replace("{tx}", tx_hash))
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.name.trim().is_empty() {
            return Err(crate::Error::InvalidProfile("name is empty".into()));
        }
        for (field, url) in [
            ("ledger_rpc_url", &self.ledger_rpc_url),
            ("storage_ingest_url", &self.storage_ingest_url),
        ] {
            if !(url.starts_with("http://")
                || url.starts_with("https://")
                || url.starts_with("file://"))
            {
                return Err(crate::Error::InvalidProfile(format!(
                    "{}: {field} must be an http(s) or file URL, got {url:?}",
                    self.name
                )));
            }
        }
        if self.ledger_rpc_url.starts_with("file://") {
            return Err(crate::Error::InvalidProfile(format!(
                "{}: ledger_rpc_url cannot be a file URL",
                self.name
            )));
        }
        crate::merkle::validate_segment_size(self.segment_size).map_err(|e| {
            crate::Error::InvalidProfile(format!("{}: {e}", self.name))
        })?;
        if self.expected_replicas == 0 {
            return Err(crate::Error::InvalidProfile(format!(
                "{}: expected_replicas must be at least 1",
                self.name
            )));
        }
        Ok(())
    }
}

/// Ordered profile lists keyed by network type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetworksConfig(pub BTreeMap<String, Vec<NetworkProfile>>);

impl NetworksConfig {
    /// Built-in development networks: `standard` and `turbo`, each with a
    /// primary and one fallback on localhost.
    pub fn development() -> Self {
        let mut map = BTreeMap::new();
        map.insert(
            "standard".to_string(),
            vec![
                NetworkProfile::local(
                    "primary",
                    "http://127.0.0.1:8545",
                    "http://127.0.0.1:5678",
                ),
                NetworkProfile::local(
                    "fallback",
                    "http://127.0.0.1:8546",
                    "http://127.0.0.1:5679",
                ),
            ],
        );
        map.insert(
            "turbo".to_string(),
            vec![
                NetworkProfile::local(
                    "primary",
                    "http://127.0.0.1:8547",
                    "http://127.0.0.1:5680",
                ),
                NetworkProfile::local(
                    "fallback",
                    "http://127.0.0.1:8548",
                    "http://127.0.0.1:5681",
                ),
            ],
        );
        Self(map)
    }

    /// Profiles for a network type, primary first.
    pub fn profiles(&self, network_type: &str) -> Option<&[NetworkProfile]> {
        self.0.get(network_type).map(Vec::as_slice)
    }

    pub fn network_types(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Override endpoint URLs from variables named
    /// `VELLUM_<TYPE>_<PROFILE>_LEDGER_RPC_URL` and `..._STORAGE_URL`.
    ///
    /// `lookup` is injected so tests do not have to touch the process environment.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        for (network_type, profiles) in self.0.iter_mut() {
            for profile in profiles.iter_mut() {
                let prefix = format!(
                    "VELLUM_{}_{}",
                    env_segment(network_type),
                    env_segment(&profile.name)
                );
                if let Some(url) = lookup(&format!("{prefix}_LEDGER_RPC_URL")) {
                    tracing::debug!(%network_type, profile = %profile.name, "ledger url overridden from env");
                    profile.ledger_rpc_url = url;
                }
                if let Some(url) = lookup(&format!("{prefix}_STORAGE_URL")) {
                    tracing::debug!(%network_type, profile = %profile.name, "storage url overridden from env");
                    profile.storage_ingest_url = url;
                }
            }
        }
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.0.is_empty() {
            return Err(crate::Error::Config("no networks configured".into()));
        }
        for (network_type, profiles) in &self.0 {
            if profiles.is_empty() {
                return Err(crate::Error::Config(format!(
                    "network type {network_type:?} has no profiles"
                )));
            }
            let mut seen = std::collections::HashSet::new();
            for profile in profiles {
                profile.validate()?;
                if !seen.insert(profile.name.as_str()) {
                    return Err(crate::Error::Config(format!(
                        "network type {network_type:?} has duplicate profile {:?}",
                        profile.name
                    )));
                }
            }
        }
        Ok(())
    }
}

impl Default for NetworksConfig {
    fn default() -> Self {
        Self::development()
    }
}

fn env_segment(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_development_networks_are_valid() {
        let networks = NetworksConfig::development();
        networks.validate().unwrap();
        assert_eq!(networks.network_types().collect::<Vec<_>>(), ["standard", "turbo"]);
        let standard = networks.profiles("standard").unwrap();
        assert_eq!(standard.len(), 2);
        assert_eq!(standard[0].contract_address, DEV_FLOW_CONTRACT);
    }

    #[test]
    fn test_role_for_index() {
        assert_eq!(NetworkRole::for_index(0), NetworkRole::Primary);
        assert_eq!(NetworkRole::for_index(3), NetworkRole::Fallback);
        assert_eq!(NetworkRole::Fallback.to_string(), "fallback");
    }

    #[test]
    fn test_env_overrides_target_single_profile() {
        let vars: HashMap<String, String> = [(
            "VELLUM_TURBO_FALLBACK_STORAGE_URL".to_string(),
            "http://storage.example:5678".to_string(),
        )]
        .into();
        let mut networks = NetworksConfig::development();
        networks.apply_env_overrides(|k| vars.get(k).cloned());

        let turbo = networks.profiles("turbo").unwrap();
        assert_eq!(turbo[1].storage_ingest_url, "http://storage.example:5678");
        assert_eq!(turbo[0].storage_ingest_url, "http://127.0.0.1:5680");
        assert_eq!(
            networks.profiles("standard").unwrap()[1].storage_ingest_url,
            "http://127.0.0.1:5679"
        );
    }

    #[test]
    fn test_profile_validation() {
        let mut profile = NetworkProfile::local("p", "http://a", "file:///tmp/net");
        profile.validate().unwrap();

        profile.segment_size = 300;
        assert!(profile.validate().is_err());

        let bad_url = NetworkProfile::local("p", "ftp://a", "http://b");
        assert!(bad_url.validate().is_err());

        let file_ledger = NetworkProfile::local("p", "file:///x", "http://b");
        assert!(file_ledger.validate().is_err());
    }

    #[test]
    fn test_duplicate_profile_names_rejected() {
        let mut networks = NetworksConfig::development();
        let dup = networks.0["standard"][0].clone();
        networks.0.get_mut("standard").unwrap().push(dup);
        assert!(networks.validate().is_err());
    }

    #[test]
    fn test_explorer_url_template() {
        let mut profile = NetworkProfile::local("p", "http://a", "http://b");
        assert_eq!(profile.explorer_url("0xabc"), None);
        profile.explorer_url_template = Some("https://scan.example/tx/{tx}".into());
        assert_eq!(
            profile.explorer_url("0xabc").as_deref(),
            Some("https://scan.example/tx/0xabc")
        );
    }

    #[test]
    fn test_profile_deserializes_with_defaults() {
        let json = r#"{
            "name": "primary",
            "ledger_rpc_url": "http://127.0.0.1:8545",
            "storage_ingest_url": "http://127.0.0.1:5678",
            "contract_address": "0x5FbDB2315678afecb367f032d93F642f64180aa3"
        }"#;
        let profile: NetworkProfile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.segment_size, crate::DEFAULT_SEGMENT_SIZE);
        assert_eq!(profile.expected_replicas, 1);
        assert!(!profile.wait_for_finality);
    }
}
