//! Gateway configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use soulfra_registry::{HealthState, ProviderDescriptor};
use soulfra_types::id::ProviderId;
use soulfra_types::params::GatewayParams;
use soulfra_types::tier::TrustTier;

use crate::error::GatewayError;

/// Configuration for a Soulfra gateway instance.
///
/// Can be loaded from a TOML file via [`GatewayConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Address to bind the HTTP listener on.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Port for the HTTP listener.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Data directory for the LMDB environment.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Storage backend: "lmdb" or "memory".
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Secret mixed into bearer-token account derivation. Raw tokens never
    /// reach the ledger or logs, only the keyed digest does.
    #[serde(default = "default_auth_secret")]
    pub auth_secret: String,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Engine tunables. Omit the table to take the defaults.
    #[serde(default)]
    pub params: GatewayParams,

    /// Providers seeded into the registry at startup.
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

/// One provider entry from the `[[providers]]` config table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub id: String,
    pub endpoint: String,
    pub capabilities: Vec<String>,
    /// SpendableCoin charged per usage unit.
    pub cost_per_unit: u64,
    #[serde(default)]
    pub tier_requirement: u8,
    /// Seed value for the latency average until probes refine it.
    #[serde(default = "default_expected_latency_ms")]
    pub expected_latency_ms: u64,
}

impl ProviderConfig {
    /// Registry descriptor for this entry. New providers start healthy;
    /// the health machine downgrades them if probes disagree.
    pub fn descriptor(&self) -> ProviderDescriptor {
        ProviderDescriptor {
            id: ProviderId::new(self.id.clone()),
            capability_tags: self.capabilities.clone(),
            cost_per_unit: u128::from(self.cost_per_unit),
            avg_latency_ms: self.expected_latency_ms,
            health: HealthState::Healthy,
            tier_requirement: TrustTier::new(self.tier_requirement),
            endpoint: self.endpoint.clone(),
        }
    }
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_listen_addr() -> String {
    "127.0.0.1".to_string()
}

fn default_listen_port() -> u16 {
    8080
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./soulfra_data")
}

fn default_backend() -> String {
    "lmdb".to_string()
}

fn default_auth_secret() -> String {
    "insecure-dev-secret".to_string()
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_expected_latency_ms() -> u64 {
    200
}

// ── Impl ───────────────────────────────────────────────────────────────

impl GatewayConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &str) -> Result<Self, GatewayError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| GatewayError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, GatewayError> {
        toml::from_str(s).map_err(|e| GatewayError::Config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> String {
        toml::to_string_pretty(self).expect("GatewayConfig is always serializable to TOML")
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            listen_port: default_listen_port(),
            data_dir: default_data_dir(),
            backend: default_backend(),
            auth_secret: default_auth_secret(),
            log_format: default_log_format(),
            log_level: default_log_level(),
            params: GatewayParams::default(),
            providers: Vec::new(),
        }
    }
}
