//! Configuration management for the peg orchestrator
//!
//! Loads configuration from TOML files with environment variable substitution.

use anyhow::{Context, Result};
use chrono::Duration as ChronoDuration;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

lazy_static! {
    static ref ENV_VAR: Regex = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap();
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub bridge: BridgeConfig,
    pub provider_api: ProviderApiConfig,
    pub chain: ChainConfig,
    pub api: ApiConfig,
    pub metrics: MetricsConfig,
}

/// Orchestrator behaviour
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Quote validity when the provider supplies no expiry
    pub default_quote_ttl_secs: u64,
    pub provider_timeout_ms: u64,
    pub deposit_timeout_ms: u64,
    pub event_channel_capacity: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            default_quote_ttl_secs: 300,
            provider_timeout_ms: 10_000,
            deposit_timeout_ms: 60_000,
            event_channel_capacity: 1_024,
        }
    }
}

impl BridgeConfig {
    pub fn default_quote_ttl(&self) -> ChronoDuration {
        let max_secs = (i64::MAX / 1_000) as u64;
        ChronoDuration::seconds(self.default_quote_ttl_secs.min(max_secs) as i64)
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_millis(self.provider_timeout_ms)
    }

    pub fn deposit_timeout(&self) -> Duration {
        Duration::from_millis(self.deposit_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderApiConfig {
    pub base_url: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub rpc_url: String,
    pub bridge_contract_address: String,
    /// Name of the environment variable holding the signing key
    pub private_key_env: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Settings {
    /// Load settings from the file named by `PEG_ORCHESTRATOR_CONFIG`
    pub fn load() -> Result<Self> {
        let config_path = env::var("PEG_ORCHESTRATOR_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/default.toml"));

        Self::from_path(&config_path)
    }

    pub fn from_path(config_path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        Self::from_toml(&config_str)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        // Substitute environment variables
        let config_str = substitute_env_vars(raw);

        let settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.provider_api.base_url.is_empty() {
            anyhow::bail!("provider_api.base_url must be set");
        }
        if self.chain.rpc_url.is_empty() {
            anyhow::bail!("chain.rpc_url must be set");
        }
        if self.bridge.default_quote_ttl_secs == 0 {
            anyhow::bail!("bridge.default_quote_ttl_secs must be greater than zero");
        }
        if self.bridge.provider_timeout_ms == 0 || self.bridge.deposit_timeout_ms == 0 {
            anyhow::bail!("bridge timeouts must be greater than zero");
        }
        if self.bridge.event_channel_capacity == 0 {
            anyhow::bail!("bridge.event_channel_capacity must be greater than zero");
        }
        if self.chain.bridge_contract_address.is_empty() {
            tracing::warn!("No bridge contract address configured - peg-out deposits will fail");
        }

        Ok(())
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    let mut result = input.to_string();

    for cap in ENV_VAR.captures_iter(input) {
        let var_name = &cap[1];
        let var_value = env::var(var_name).unwrap_or_default();
        result = result.replace(&cap[0], &var_value);
    }

    result
}
