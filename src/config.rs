//! Transfer settings, loaded from TOML.
//!
//! ```toml
//! capacity = 3
//! items = 10
//! producers = 1
//! consumers = 2
//! join_timeout_ms = 5000
//! log_filter = "info"
//! ```
//!
//! Every key is optional. Without `join_timeout_ms` a transfer waits for its
//! workers as long as they take. Counts are read as signed integers so that a
//! negative capacity is reported as invalid rather than as a type error.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawTransferConfig")]
pub struct TransferConfig {
    pub capacity: usize,
    /// Length of the generated source sequence `0..items`.
    pub items: usize,
    pub producers: usize,
    pub consumers: usize,
    /// One deadline shared by every join of a transfer. `None` waits forever.
    pub join_timeout: Option<Duration>,
    pub log_filter: String,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            capacity: 3,
            items: 10,
            producers: 1,
            consumers: 1,
            join_timeout: None,
            log_filter: String::from("info"),
        }
    }
}

impl TransferConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Rejects settings that cannot run. Configs built in code skip the
    /// checks done at parse time, so callers run this before using one.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::invalid("capacity", "must be positive, got 0"));
        }
        if self.producers == 0 {
            return Err(ConfigError::invalid("producers", "at least one producer is required"));
        }
        if self.consumers == 0 {
            return Err(ConfigError::invalid("consumers", "at least one consumer is required"));
        }
        if self.join_timeout.is_some_and(|timeout| timeout.is_zero()) {
            return Err(ConfigError::invalid("join_timeout_ms", "must be positive"));
        }
        Ok(())
    }
}

// =============================================================================
// Wire shape
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawTransferConfig {
    capacity: i64,
    items: i64,
    producers: i64,
    consumers: i64,
    join_timeout_ms: Option<i64>,
    log_filter: String,
}

impl Default for RawTransferConfig {
    fn default() -> Self {
        let defaults = TransferConfig::default();
        Self {
            capacity: defaults.capacity as i64,
            items: defaults.items as i64,
            producers: defaults.producers as i64,
            consumers: defaults.consumers as i64,
            join_timeout_ms: defaults.join_timeout.map(|t| t.as_millis() as i64),
            log_filter: defaults.log_filter,
        }
    }
}

fn positive(field: &'static str, value: i64) -> Result<usize, ConfigError> {
    if value <= 0 {
        return Err(ConfigError::invalid(field, format!("must be positive, got {value}")));
    }
    usize::try_from(value).map_err(|_| ConfigError::invalid(field, format!("{value} is too large")))
}

impl TryFrom<RawTransferConfig> for TransferConfig {
    type Error = ConfigError;

    fn try_from(raw: RawTransferConfig) -> Result<Self, Self::Error> {
        if raw.items < 0 {
            return Err(ConfigError::invalid(
                "items",
                format!("must not be negative, got {}", raw.items),
            ));
        }

        let config = TransferConfig {
            capacity: positive("capacity", raw.capacity)?,
            items: usize::try_from(raw.items)
                .map_err(|_| ConfigError::invalid("items", "too large"))?,
            producers: positive("producers", raw.producers)?,
            consumers: positive("consumers", raw.consumers)?,
            join_timeout: raw
                .join_timeout_ms
                .map(|ms| positive("join_timeout_ms", ms).map(|ms| Duration::from_millis(ms as u64)))
                .transpose()?,
            log_filter: raw.log_filter,
        };
        config.validate()?;
        Ok(config)
    }
}
