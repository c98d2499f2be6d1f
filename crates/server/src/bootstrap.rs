//! Startup wiring: configuration loading, signer selection, network connection.

use crate::records::InMemoryRecords;
use crate::state::AppState;
use alloy_primitives::{Address, address};
use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use std::path::Path;
use std::sync::Arc;
use vellum_core::AppConfig;
use vellum_core::config::SignerConfig;
use vellum_ledger::{LedgerSigner, NodeAccountSigner};
use vellum_pipeline::{NetworkRegistry, StoragePipeline};

/// First unlocked account of a freshly started local development chain.
pub const DEV_ACCOUNT: Address = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");

const ENV_PREFIX: &str = "VELLUM_";

/// Load configuration from an optional TOML file and `VELLUM_` variables.
///
/// Nested keys use `__` (`VELLUM_SERVER__BIND`). Per-profile endpoint
/// overrides (`VELLUM_STANDARD_PRIMARY_LEDGER_RPC_URL`) are applied last.
pub fn load_config<F>(path: &Path, lookup: F) -> Result<AppConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut figment = Figment::new();
    if path.exists() {
        tracing::info!(config_path = %path.display(), "Loading configuration from file");
        figment = figment.merge(Toml::file(path));
    } else {
        tracing::info!(
            config_path = %path.display(),
            "No config file found, using embedded development networks"
        );
    }

    let mut config: AppConfig = figment
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .context("failed to load configuration")?;
    config.networks.apply_env_overrides(lookup);
    config.validate().context("invalid configuration")?;
    Ok(config)
}

/// The node-account signer for the configured sender.
pub fn resolve_signer(config: &SignerConfig) -> Arc<dyn LedgerSigner> {
    let account = config.account.unwrap_or_else(|| {
        tracing::warn!(
            account = %DEV_ACCOUNT,
            "No signer account configured, using the development chain account"
        );
        DEV_ACCOUNT
    });
    tracing::info!(%account, "Transactions will be signed by the ledger node");
    Arc::new(NodeAccountSigner::new(account))
}

/// Connect every profile and assemble the application state.
pub async fn build_state(config: AppConfig) -> Result<AppState> {
    let registry = NetworkRegistry::from_config(&config)
        .await
        .context("failed to connect network profiles")?;
    let signer = resolve_signer(&config.signer);
    let pipeline = StoragePipeline::new(registry, &config.pipeline, signer);
    Ok(AppState::new(
        config,
        pipeline,
        Arc::new(InMemoryRecords::new()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn missing_file_yields_development_networks() {
        let temp = tempfile::tempdir().unwrap();
        let config = load_config(&temp.path().join("absent.toml"), |_| None).unwrap();
        assert_eq!(config.server.default_network_type, "standard");
        assert!(config.networks.profiles("standard").is_some());
        assert!(config.networks.profiles("turbo").is_some());
    }

    #[test]
    fn file_values_and_profile_overrides_apply() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("server.toml");
        std::fs::write(
            &path,
            r#"
[server]
bind = "0.0.0.0:9000"

[pipeline]
failure_policy = "fail_open"
"#,
        )
        .unwrap();

        let overrides: HashMap<&str, &str> = HashMap::from([(
            "VELLUM_STANDARD_FALLBACK_LEDGER_RPC_URL",
            "http://ledger.internal:8545",
        )]);
        let config = load_config(&path, |k| overrides.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(config.server.bind, "0.0.0.0:9000");
        assert_eq!(
            config.pipeline.failure_policy,
            vellum_core::FailurePolicy::FailOpen
        );
        let fallback = &config.networks.profiles("standard").unwrap()[1];
        assert_eq!(fallback.ledger_rpc_url, "http://ledger.internal:8545");
    }

    #[test]
    fn signer_defaults_to_development_account() {
        let signer = resolve_signer(&SignerConfig::default());
        assert_eq!(signer.address(), DEV_ACCOUNT);

        let configured = Address::repeat_byte(0x11);
        let signer = resolve_signer(&SignerConfig {
            account: Some(configured),
        });
        assert_eq!(signer.address(), configured);
    }

    #[tokio::test]
    async fn build_state_connects_file_networks() {
        let temp = tempfile::tempdir().unwrap();
        let mut config = AppConfig::for_testing();
        for profiles in config.networks.0.values_mut() {
            for profile in profiles.iter_mut() {
                profile.storage_ingest_url = format!(
                    "file://{}",
                    temp.path().join(&profile.name).display()
                );
            }
        }

        let state = build_state(config).await.unwrap();
        let (network_type, handles) = state.pipeline.registry().resolve(None).unwrap();
        assert_eq!(network_type, "standard");
        assert_eq!(handles.len(), 2);
    }
}
