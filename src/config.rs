//! Configuration module for the stress relayer
//!
//! This module handles all configuration loading from TOML files,
//! environment variables, and provides structured configuration types.
//! Every tunable is a constant with a serde default; nothing is negotiated
//! at runtime.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::types::Amount;

/// Main relayer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Funding serializer configuration
    #[serde(default)]
    pub funding: FundingConfig,

    /// Inter-operation rate limiting
    #[serde(default)]
    pub rate: RateConfig,

    /// Balance confirmation polling
    #[serde(default)]
    pub poll: PollConfig,

    /// Transaction dispatch configuration
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Overall per-request deadline in seconds (0 disables)
    #[serde(default = "default_request_deadline_secs")]
    pub request_deadline_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundingConfig {
    /// Amount transferred to each ephemeral wallet (enough for one tx)
    #[serde(default = "default_funding_amount")]
    pub amount: Amount,

    /// Balance threshold at which funding counts as confirmed
    #[serde(default = "default_confirm_threshold")]
    pub confirm_threshold: Amount,

    /// Fee-rate boost over the observed baseline, as a ratio (12/10 = +20%)
    #[serde(default = "default_fee_boost_numerator")]
    pub fee_boost_numerator: u32,

    #[serde(default = "default_fee_boost_denominator")]
    pub fee_boost_denominator: u32,

    /// Gas ceiling for the plain funding transfer
    #[serde(default = "default_transfer_gas_limit")]
    pub gas_limit: u64,

    /// Depth of the funding job queue
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateConfig {
    /// Minimum interval between the starts of two stress operations (ms)
    #[serde(default = "default_min_start_interval_ms")]
    pub min_start_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// Maximum balance polls before giving up
    #[serde(default = "default_poll_max_attempts")]
    pub max_attempts: u32,

    /// Interval between balance polls (ms)
    #[serde(default = "default_poll_interval_ms")]
    pub interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Value attached to value-bearing variants
    #[serde(default = "default_dispatch_value")]
    pub value_amount: Amount,
}

// Default value functions
fn default_funding_amount() -> Amount {
    2_000_000_000_000_000 // 0.002
}
fn default_confirm_threshold() -> Amount {
    1_500_000_000_000_000 // 0.0015
}
fn default_fee_boost_numerator() -> u32 {
    12
}
fn default_fee_boost_denominator() -> u32 {
    10
}
fn default_transfer_gas_limit() -> u64 {
    21_000
}
fn default_queue_depth() -> usize {
    256
}
fn default_min_start_interval_ms() -> u64 {
    20
}
fn default_poll_max_attempts() -> u32 {
    20
}
fn default_poll_interval_ms() -> u64 {
    2_000
}
fn default_dispatch_value() -> Amount {
    500_000_000_000_000 // 0.0005
}
fn default_request_deadline_secs() -> u64 {
    120
}

impl Default for FundingConfig {
    fn default() -> Self {
        Self {
            amount: default_funding_amount(),
            confirm_threshold: default_confirm_threshold(),
            fee_boost_numerator: default_fee_boost_numerator(),
            fee_boost_denominator: default_fee_boost_denominator(),
            gas_limit: default_transfer_gas_limit(),
            queue_depth: default_queue_depth(),
        }
    }
}

impl Default for RateConfig {
    fn default() -> Self {
        Self {
            min_start_interval_ms: default_min_start_interval_ms(),
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_poll_max_attempts(),
            interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            value_amount: default_dispatch_value(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            funding: FundingConfig::default(),
            rate: RateConfig::default(),
            poll: PollConfig::default(),
            dispatch: DispatchConfig::default(),
            request_deadline_secs: default_request_deadline_secs(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides
    pub fn from_file_with_env(path: &str) -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_file(path)
    }

    pub fn min_start_interval(&self) -> Duration {
        Duration::from_millis(self.rate.min_start_interval_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll.interval_ms)
    }

    /// Per-request overall deadline, if enabled.
    pub fn request_deadline(&self) -> Option<Duration> {
        if self.request_deadline_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.request_deadline_secs))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_the_fixed_constants() {
        let config = Config::default();
        assert_eq!(config.funding.amount, 2_000_000_000_000_000);
        assert_eq!(config.funding.confirm_threshold, 1_500_000_000_000_000);
        assert_eq!(config.funding.fee_boost_numerator, 12);
        assert_eq!(config.poll.max_attempts, 20);
        assert_eq!(config.poll.interval_ms, 2_000);
        assert_eq!(config.rate.min_start_interval_ms, 20);
        assert_eq!(config.dispatch.value_amount, 500_000_000_000_000);
        assert_eq!(config.request_deadline(), Some(Duration::from_secs(120)));
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let config: Config = toml::from_str(
            r#"
            [poll]
            max_attempts = 5
            interval_ms = 100

            [rate]
            min_start_interval_ms = 7
            "#,
        )
        .unwrap();
        assert_eq!(config.poll.max_attempts, 5);
        assert_eq!(config.rate.min_start_interval_ms, 7);
        assert_eq!(config.funding.amount, 2_000_000_000_000_000);
    }

    #[test]
    fn from_file_round_trips() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "request_deadline_secs = 0\n").unwrap();
        let config = Config::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.request_deadline(), None);
    }
}
