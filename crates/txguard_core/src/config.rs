//! Engine configuration.
//!
//! # Responsibility
//! - Hold tunables for atomic execution, storage and logging.
//! - Load them from the environment or any serde source.
//!
//! # Invariants
//! - Validated configs never carry zero timeouts or unknown log levels.

use crate::logging::{default_log_level, normalize_level};
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

pub const ENV_ATOMIC_TIMEOUT_MS: &str = "TXGUARD_ATOMIC_TIMEOUT_MS";
pub const ENV_BUSY_TIMEOUT_MS: &str = "TXGUARD_BUSY_TIMEOUT_MS";
pub const ENV_LOG_LEVEL: &str = "TXGUARD_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "TXGUARD_LOG_DIR";

const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidNumber { key: &'static str, value: String },
    ZeroTimeout(&'static str),
    InvalidLogLevel(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidNumber { key, value } => {
                write!(f, "`{key}` must be a non-negative integer, got `{value}`")
            }
            Self::ZeroTimeout(key) => write!(f, "`{key}` must be greater than zero"),
            Self::InvalidLogLevel(message) => write!(f, "{message}"),
        }
    }
}

impl Error for ConfigError {}

/// Tunables for the transactional engine.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound on one atomic operation's step execution. `None` = unbounded.
    pub atomic_timeout_ms: Option<u64>,
    /// How long a connection waits on a locked database before failing.
    pub busy_timeout_ms: u64,
    pub log_level: String,
    /// Absolute directory for rolling log files. `None` leaves logging to the host.
    pub log_dir: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            atomic_timeout_ms: None,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            log_level: default_log_level().to_string(),
            log_dir: None,
        }
    }
}

impl EngineConfig {
    /// Reads `TXGUARD_*` variables over the defaults and validates the result.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`EngineConfig::from_env`] with an injectable variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(value) = lookup(ENV_ATOMIC_TIMEOUT_MS) {
            config.atomic_timeout_ms = Some(parse_millis(ENV_ATOMIC_TIMEOUT_MS, &value)?);
        }
        if let Some(value) = lookup(ENV_BUSY_TIMEOUT_MS) {
            config.busy_timeout_ms = parse_millis(ENV_BUSY_TIMEOUT_MS, &value)?;
        }
        if let Some(value) = lookup(ENV_LOG_LEVEL) {
            config.log_level = value;
        }
        if let Some(value) = lookup(ENV_LOG_DIR) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                config.log_dir = Some(trimmed.to_string());
            }
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.atomic_timeout_ms == Some(0) {
            return Err(ConfigError::ZeroTimeout(ENV_ATOMIC_TIMEOUT_MS));
        }
        if self.busy_timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout(ENV_BUSY_TIMEOUT_MS));
        }
        normalize_level(&self.log_level).map_err(ConfigError::InvalidLogLevel)?;
        Ok(())
    }

    pub fn atomic_timeout(&self) -> Option<Duration> {
        self.atomic_timeout_ms.map(Duration::from_millis)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

fn parse_millis(key: &'static str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::InvalidNumber {
            key,
            value: value.to_string(),
        })
}
