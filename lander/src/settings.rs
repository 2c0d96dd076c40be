//! Caller-facing configuration.
//!
//! Durations are written as humantime strings (`"500ms"`, `"30s"`, `"5m"`).
//! [`load_settings`] layers defaults, an optional JSON or TOML file and
//! `SYNAPSE_`-prefixed environment variables, e.g.
//! `SYNAPSE_SUBMISSION__MAX_RETRIES=5` or `SYNAPSE_RECEIPT__TIMEOUT=10m`.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File};
use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use synapse_core::Address;

use crate::{LanderError, LanderResult};

const ENV_PREFIX: &str = "SYNAPSE";
const ENV_SEPARATOR: &str = "__";

pub const DEFAULT_GAS_BUFFER_PERCENT: i64 = 10;

/// Exponential backoff parameters for a retried operation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: u32,
    #[serde(with = "humantime_duration")]
    pub initial_backoff: Duration,
    #[serde(with = "humantime_duration")]
    pub max_backoff: Duration,
    pub multiplier: f64,
}

impl RetryConfig {
    /// Defaults for the transaction submission path.
    pub const fn submission() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }

    /// Defaults for generic polling and read retries.
    pub const fn poll() -> Self {
        Self {
            max_retries: 10,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            multiplier: 1.5,
        }
    }

    pub fn validate(&self, name: &str) -> LanderResult<()> {
        if self.initial_backoff.is_zero() {
            return Err(invalid(format!("{name}.initial_backoff must be > 0")));
        }
        if self.max_backoff.is_zero() {
            return Err(invalid(format!("{name}.max_backoff must be > 0")));
        }
        if !self.multiplier.is_finite() || self.multiplier <= 1.0 {
            return Err(invalid(format!(
                "{name}.multiplier must be > 1, got {}",
                self.multiplier
            )));
        }
        Ok(())
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::submission()
    }
}

/// Receipt polling parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiptWaitConfig {
    /// Overall bound on the wait
    #[serde(with = "humantime_duration")]
    pub timeout: Duration,
    #[serde(with = "humantime_duration")]
    pub poll_interval: Duration,
    /// RPC errors in a row before giving up. A "not found" answer resets the
    /// count.
    pub max_consecutive_errors: u32,
}

impl Default for ReceiptWaitConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5 * 60),
            poll_interval: Duration::from_secs(1),
            max_consecutive_errors: 5,
        }
    }
}

impl ReceiptWaitConfig {
    pub fn validate(&self) -> LanderResult<()> {
        if self.timeout.is_zero() {
            return Err(invalid("receipt.timeout must be > 0"));
        }
        if self.poll_interval.is_zero() {
            return Err(invalid("receipt.poll_interval must be > 0"));
        }
        if self.max_consecutive_errors == 0 {
            return Err(invalid("receipt.max_consecutive_errors must be > 0"));
        }
        Ok(())
    }
}

/// Everything the orchestrator and data-set manager can be tuned with.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LanderSettings {
    pub submission: RetryConfig,
    pub poll: RetryConfig,
    pub receipt: ReceiptWaitConfig,
    /// Blocks required on top of the inclusion block
    pub confirmations: u64,
    /// Safety margin added to gas estimates, in percent
    pub gas_buffer_percent: i64,
    /// Scales suggested fees; ignored unless greater than 1
    pub gas_price_multiplier: f64,
    /// Overrides the network's default contract address
    pub contract_address: Option<Address>,
}

impl Default for LanderSettings {
    fn default() -> Self {
        Self {
            submission: RetryConfig::submission(),
            poll: RetryConfig::poll(),
            receipt: ReceiptWaitConfig::default(),
            confirmations: 0,
            gas_buffer_percent: DEFAULT_GAS_BUFFER_PERCENT,
            gas_price_multiplier: 1.0,
            contract_address: None,
        }
    }
}

impl LanderSettings {
    /// Check every numeric range. Runs before any network call.
    pub fn validate(&self) -> LanderResult<()> {
        self.submission.validate("submission")?;
        self.poll.validate("poll")?;
        self.receipt.validate()?;
        validate_gas_buffer_percent(self.gas_buffer_percent)?;
        if !self.gas_price_multiplier.is_finite() || self.gas_price_multiplier <= 0.0 {
            return Err(invalid(format!(
                "gas_price_multiplier must be a positive number, got {}",
                self.gas_price_multiplier
            )));
        }
        Ok(())
    }
}

pub(crate) fn validate_gas_buffer_percent(percent: i64) -> LanderResult<()> {
    if !(0..=100).contains(&percent) {
        return Err(invalid(format!(
            "gas buffer percent must be between 0 and 100, got {percent}"
        )));
    }
    Ok(())
}

fn invalid(msg: impl Into<String>) -> LanderError {
    LanderError::InvalidConfig(msg.into())
}

/// Load settings from defaults, an optional file and the process
/// environment, then validate them.
pub fn load_settings(path: Option<&Path>) -> Result<LanderSettings> {
    load_settings_with_env(path, std::env::vars().collect())
}

/// Like [`load_settings`] but reads environment overrides from `env`.
pub fn load_settings_with_env(
    path: Option<&Path>,
    env: HashMap<String, String>,
) -> Result<LanderSettings> {
    let mut builder = Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(File::from(path));
    }
    let config = builder
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator(ENV_SEPARATOR)
                .source(Some(env)),
        )
        .build()
        .context("Building lander settings")?;

    let settings: LanderSettings = config
        .try_deserialize()
        .context("Deserializing lander settings")?;
    settings.validate().context("Validating lander settings")?;
    Ok(settings)
}

mod humantime_duration {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&humantime::format_duration(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}
