//! Configuration types shared across crates.

use crate::profile::{DEFAULT_NETWORK_TYPE, NetworksConfig};
use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum size of a multipart upload body in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
    /// Network type used when a request does not specify one.
    #[serde(default = "default_network_type")]
    pub default_network_type: String,
    /// Enable the /metrics endpoint for Prometheus scraping (default: true).
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_max_upload_bytes() -> u64 {
    crate::DEFAULT_MAX_BLOB_SIZE
}

fn default_network_type() -> String {
    DEFAULT_NETWORK_TYPE.to_string()
}

fn default_metrics_enabled() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_upload_bytes: default_max_upload_bytes(),
            default_network_type: default_network_type(),
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

/// How to treat a payment whose outcome the ledger could not confirm.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Abort the attempt on this profile.
    #[default]
    FailClosed,
    /// Record the payment as unconfirmed and continue with the upload.
    FailOpen,
}

/// Timeouts and limits for the upload/download pipeline.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Largest blob accepted for upload.
    #[serde(default = "default_max_blob_size")]
    pub max_blob_size: u64,
    /// Upper bound for one attempt against one profile.
    #[serde(default = "default_profile_timeout_secs")]
    pub profile_timeout_secs: u64,
    /// Upper bound for a whole upload including every fallback.
    #[serde(default = "default_pipeline_deadline_secs")]
    pub pipeline_deadline_secs: u64,
    /// Per-request timeout for ledger and storage RPC calls.
    #[serde(default = "default_rpc_timeout_secs")]
    pub rpc_timeout_secs: u64,
    /// How long to wait for a transaction receipt.
    #[serde(default = "default_confirmation_timeout_secs")]
    pub confirmation_timeout_secs: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Gas limit used when simulation fails.
    #[serde(default = "default_fallback_gas_limit")]
    pub fallback_gas_limit: u64,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    /// How long the storage node may take to observe a submission.
    #[serde(default = "default_submission_wait_secs")]
    pub submission_wait_secs: u64,
    /// How long to wait for finality when a profile asks for it.
    #[serde(default = "default_finality_timeout_secs")]
    pub finality_timeout_secs: u64,
    /// Segments fetched per download batch.
    #[serde(default = "default_download_batch_size")]
    pub download_batch_size: usize,
    /// Segments in flight at once during an upload.
    #[serde(default = "default_segment_concurrency")]
    pub segment_concurrency: usize,
}

fn default_max_blob_size() -> u64 {
    crate::DEFAULT_MAX_BLOB_SIZE
}

fn default_profile_timeout_secs() -> u64 {
    300
}

fn default_pipeline_deadline_secs() -> u64 {
    900
}

fn default_rpc_timeout_secs() -> u64 {
    30
}

fn default_confirmation_timeout_secs() -> u64 {
    120
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_fallback_gas_limit() -> u64 {
    500_000
}

fn default_submission_wait_secs() -> u64 {
    60
}

fn default_finality_timeout_secs() -> u64 {
    300
}

fn default_download_batch_size() -> usize {
    16
}

fn default_segment_concurrency() -> usize {
    4
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_blob_size: default_max_blob_size(),
            profile_timeout_secs: default_profile_timeout_secs(),
            pipeline_deadline_secs: default_pipeline_deadline_secs(),
            rpc_timeout_secs: default_rpc_timeout_secs(),
            confirmation_timeout_secs: default_confirmation_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            fallback_gas_limit: default_fallback_gas_limit(),
            failure_policy: FailurePolicy::default(),
            submission_wait_secs: default_submission_wait_secs(),
            finality_timeout_secs: default_finality_timeout_secs(),
            download_batch_size: default_download_batch_size(),
            segment_concurrency: default_segment_concurrency(),
        }
    }
}

impl PipelineConfig {
    pub fn profile_timeout(&self) -> Duration {
        Duration::from_secs(self.profile_timeout_secs)
    }

    pub fn pipeline_deadline(&self) -> Duration {
        Duration::from_secs(self.pipeline_deadline_secs)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn submission_wait(&self) -> Duration {
        Duration::from_secs(self.submission_wait_secs)
    }

    pub fn finality_timeout(&self) -> Duration {
        Duration::from_secs(self.finality_timeout_secs)
    }

    /// Validate pipeline configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_blob_size == 0 {
            return Err("max_blob_size must be greater than 0".to_string());
        }
        if self.profile_timeout_secs == 0 || self.pipeline_deadline_secs == 0 {
            return Err("profile_timeout_secs and pipeline_deadline_secs must be non-zero".into());
        }
        if self.pipeline_deadline_secs < self.profile_timeout_secs {
            return Err(format!(
                "pipeline_deadline_secs ({}) must not be shorter than profile_timeout_secs ({})",
                self.pipeline_deadline_secs, self.profile_timeout_secs
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err("poll_interval_ms must be greater than 0".to_string());
        }
        if self.download_batch_size == 0 || self.segment_concurrency == 0 {
            return Err("download_batch_size and segment_concurrency must be non-zero".into());
        }
        if self.fallback_gas_limit == 0 {
            return Err("fallback_gas_limit must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Ledger account configuration.
///
/// Keys are never loaded here. Transactions are either signed by the ledger
/// node for `account`, or by a signer injected by the embedding application.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SignerConfig {
    /// Sender address unlocked on the ledger node.
    #[serde(default)]
    pub account: Option<Address>,
}

/// Complete application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Pipeline limits and policy.
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Network profiles keyed by network type. Falls back to local development networks.
    #[serde(default)]
    pub networks: NetworksConfig,
    #[serde(default)]
    pub signer: SignerConfig,
}

impl AppConfig {
    /// Create a test configuration with sensible defaults.
    ///
    /// **For testing only.** Uses the development networks with short timeouts.
    pub fn for_testing() -> Self {
        Self {
            server: ServerConfig::default(),
            pipeline: PipelineConfig {
                profile_timeout_secs: 10,
                pipeline_deadline_secs: 30,
                rpc_timeout_secs: 5,
                confirmation_timeout_secs: 5,
                poll_interval_ms: 10,
                submission_wait_secs: 5,
                finality_timeout_secs: 5,
                ..PipelineConfig::default()
            },
            networks: NetworksConfig::development(),
            signer: SignerConfig::default(),
        }
    }

    /// Validate the whole configuration.
    pub fn validate(&self) -> crate::Result<()> {
        self.pipeline.validate().map_err(crate::Error::Config)?;
        self.networks.validate()?;
        if self.networks.profiles(&self.server.default_network_type).is_none() {
            return Err(crate::Error::Config(format!(
                "default network type {:?} is not configured",
                self.server.default_network_type
            )));
        }
        if self.server.max_upload_bytes > self.pipeline.max_blob_size {
            tracing::warn!(
                max_upload_bytes = self.server.max_upload_bytes,
                max_blob_size = self.pipeline.max_blob_size,
                "server accepts uploads larger than the pipeline will process"
            );
        }
        Ok(())
    }
}
