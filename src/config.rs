//! Configuration for the workflow compiler
//!
//! Loaded from a TOML file; every field has a serde default so a partial file
//! (or none at all) still yields a usable configuration. `.env` is read first
//! and `SOLFLOW_RPC_URL` / `SOLFLOW_KEYPAIR` override the file.

use serde::{Deserialize, Serialize};
use solana_sdk::commitment_config::{CommitmentConfig, CommitmentLevel};
use std::collections::BTreeMap;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub rpc: RpcConfig,

    #[serde(default)]
    pub wallet: WalletConfig,

    /// Swap quoting service
    #[serde(default)]
    pub quote: QuoteConfig,

    /// Liquidity service sidecar
    #[serde(default)]
    pub liquidity: LiquidityConfig,

    #[serde(default)]
    pub compute_budget: ComputeBudgetConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub monitoring: MonitoringConfig,

    /// Token id -> mint address overrides, merged over the built-in registry
    #[serde(default)]
    pub tokens: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    #[serde(default = "default_rpc_url")]
    pub url: String,

    /// processed | confirmed | finalized
    #[serde(default = "default_commitment")]
    pub commitment: String,

    #[serde(default = "default_confirm_poll_interval")]
    pub confirm_poll_interval_ms: u64,

    #[serde(default = "default_confirm_timeout")]
    pub confirm_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletConfig {
    /// Path to keypair file (JSON byte array)
    #[serde(default = "default_keypair_path")]
    pub keypair_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteConfig {
    #[serde(default = "default_quote_url")]
    pub base_url: String,

    #[serde(default)]
    pub api_key: Option<String>,

    /// Client-side request rate limit; 0 disables limiting
    #[serde(default)]
    pub rate_limit_rps: u32,

    #[serde(default = "default_true")]
    pub restrict_intermediate_tokens: bool,

    #[serde(default = "default_max_priority_fee")]
    pub max_priority_fee_lamports: u64,

    #[serde(default = "default_priority_level")]
    pub priority_level: String,

    /// Leading instructions of a built swap transaction owned by the service
    #[serde(default = "default_swap_leading")]
    pub leading_instructions: usize,

    #[serde(default = "default_slippage")]
    pub default_slippage_bps: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidityConfig {
    /// Base URL of the liquidity sidecar; liquidity nodes fail when unset
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default = "default_liquidity_timeout")]
    pub timeout_secs: u64,

    /// Leading instructions of each liquidity build owned by the service
    #[serde(default = "default_liquidity_leading")]
    pub leading_instructions: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputeBudgetConfig {
    #[serde(default = "default_unit_price")]
    pub unit_price_micro_lamports: u64,

    /// Headroom added on top of the simulated estimate
    #[serde(default)]
    pub margin_percent: u32,

    /// Skip simulation entirely and attach only the price instruction
    #[serde(default = "default_true")]
    pub simulate: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_path")]
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    #[serde(default = "default_true")]
    pub enable_metrics: bool,

    /// Print the Prometheus text exposition when the binary exits
    #[serde(default)]
    pub print_metrics_on_exit: bool,

    #[serde(default)]
    pub json_logs: bool,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// Default value functions
fn default_rpc_url() -> String { "https://api.mainnet-beta.solana.com".to_string() }
fn default_commitment() -> String { "confirmed".to_string() }
fn default_confirm_poll_interval() -> u64 { 500 }
fn default_confirm_timeout() -> u64 { 90 }
fn default_keypair_path() -> String { "~/.config/solana/id.json".to_string() }
fn default_quote_url() -> String { "https://api.jup.ag/swap/v1".to_string() }
fn default_max_priority_fee() -> u64 { 1_000_000 }
fn default_priority_level() -> String { "veryHigh".to_string() }
fn default_swap_leading() -> usize { 2 }
fn default_slippage() -> u16 { 100 }
fn default_liquidity_timeout() -> u64 { 30 }
fn default_liquidity_leading() -> usize { 1 }
fn default_unit_price() -> u64 { 100 }
fn default_storage_path() -> String { "solflow.db".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_true() -> bool { true }

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: default_rpc_url(),
            commitment: default_commitment(),
            confirm_poll_interval_ms: default_confirm_poll_interval(),
            confirm_timeout_secs: default_confirm_timeout(),
        }
    }
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            keypair_path: default_keypair_path(),
        }
    }
}

impl Default for QuoteConfig {
    fn default() -> Self {
        Self {
            base_url: default_quote_url(),
            api_key: None,
            rate_limit_rps: 0,
            restrict_intermediate_tokens: true,
            max_priority_fee_lamports: default_max_priority_fee(),
            priority_level: default_priority_level(),
            leading_instructions: default_swap_leading(),
            default_slippage_bps: default_slippage(),
        }
    }
}

impl Default for LiquidityConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: default_liquidity_timeout(),
            leading_instructions: default_liquidity_leading(),
        }
    }
}

impl Default for ComputeBudgetConfig {
    fn default() -> Self {
        Self {
            unit_price_micro_lamports: default_unit_price(),
            margin_percent: 0,
            simulate: true,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enable_metrics: true,
            print_metrics_on_exit: false,
            json_logs: false,
            log_level: default_log_level(),
        }
    }
}

impl RpcConfig {
    /// Parsed commitment; unknown strings fall back to `confirmed`
    pub fn commitment_config(&self) -> CommitmentConfig {
        let level = match self.commitment.to_ascii_lowercase().as_str() {
            "processed" => CommitmentLevel::Processed,
            "finalized" => CommitmentLevel::Finalized,
            _ => CommitmentLevel::Confirmed,
        };
        CommitmentConfig { commitment: level }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration with `.env` and environment variable overrides
    pub fn from_file_with_env(path: &str) -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Defaults plus environment overrides, for running without a file
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("SOLFLOW_RPC_URL") {
            if !url.trim().is_empty() {
                self.rpc.url = url;
            }
        }
        if let Ok(path) = std::env::var("SOLFLOW_KEYPAIR") {
            if !path.trim().is_empty() {
                self.wallet.keypair_path = path;
            }
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.rpc.url.trim().is_empty() {
            anyhow::bail!("rpc.url must not be empty");
        }
        if self.rpc.confirm_poll_interval_ms == 0 {
            anyhow::bail!("rpc.confirm_poll_interval_ms must be greater than 0");
        }
        if self.quote.base_url.trim().is_empty() {
            anyhow::bail!("quote.base_url must not be empty");
        }
        if self.quote.default_slippage_bps > 10_000 {
            anyhow::bail!(
                "quote.default_slippage_bps must be <= 10000, got {}",
                self.quote.default_slippage_bps
            );
        }
        if let Some(url) = &self.liquidity.base_url {
            if url.trim().is_empty() {
                anyhow::bail!("liquidity.base_url must not be empty when set");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [rpc]
            url = "http://localhost:8899"

            [compute_budget]
            margin_percent = 10

            [tokens]
            WIF = "EKpQGSJtjMFqKZ9KQanSqYXRcF8fBopzLHYxdM65zcjm"
            "#,
        )
        .unwrap();

        assert_eq!(config.rpc.url, "http://localhost:8899");
        assert_eq!(config.rpc.confirm_timeout_secs, 90);
        assert_eq!(config.compute_budget.margin_percent, 10);
        assert_eq!(config.compute_budget.unit_price_micro_lamports, 100);
        assert_eq!(config.quote.leading_instructions, 2);
        assert_eq!(config.liquidity.leading_instructions, 1);
        assert_eq!(config.tokens.len(), 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_commitment_parsing() {
        let mut rpc = RpcConfig::default();
        assert_eq!(rpc.commitment_config(), CommitmentConfig::confirmed());
        rpc.commitment = "Finalized".to_string();
        assert_eq!(rpc.commitment_config(), CommitmentConfig::finalized());
        rpc.commitment = "bogus".to_string();
        assert_eq!(rpc.commitment_config(), CommitmentConfig::confirmed());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.rpc.confirm_poll_interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.quote.default_slippage_bps = 10_001;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.rpc.url = "  ".to_string();
        assert!(config.validate().is_err());
    }
}
