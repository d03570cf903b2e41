//! Configuration for the timer table and loop driver.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Limits and tuning knobs for an event loop.
///
/// Every field has a default, so a TOML file only needs the keys it
/// overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoopConfig {
    /// Smallest accepted timer delay in milliseconds. Shorter delays are
    /// silently raised to this value.
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: f64,

    /// Shortest blocking wait between ticks, so near-due timers do not
    /// busy-spin the loop.
    #[serde(default = "default_min_wait_ms")]
    pub min_wait_ms: f64,

    /// Longest blocking wait between ticks. The loop re-checks its timers
    /// at least this often.
    #[serde(default = "default_max_wait_ms")]
    pub max_wait_ms: f64,

    /// Maximum number of timers fired in a single tick.
    #[serde(default = "default_max_expiries_per_tick")]
    pub max_expiries_per_tick: usize,

    /// Capacity of the timer table.
    #[serde(default = "default_max_timers")]
    pub max_timers: usize,

    /// Record elapsed time and memory growth for each run.
    #[serde(default)]
    pub gather_stats: bool,

    /// Page size used to turn process page counts into bytes.
    #[serde(default = "default_page_size_bytes")]
    pub page_size_bytes: u64,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: default_min_delay_ms(),
            min_wait_ms: default_min_wait_ms(),
            max_wait_ms: default_max_wait_ms(),
            max_expiries_per_tick: default_max_expiries_per_tick(),
            max_timers: default_max_timers(),
            gather_stats: false,
            page_size_bytes: default_page_size_bytes(),
        }
    }
}

impl LoopConfig {
    /// Create a new config with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the timer table capacity.
    #[must_use]
    pub const fn with_max_timers(mut self, max_timers: usize) -> Self {
        self.max_timers = max_timers;
        self
    }

    /// Set the per-tick expiry cap.
    #[must_use]
    pub const fn with_max_expiries_per_tick(mut self, max_expiries: usize) -> Self {
        self.max_expiries_per_tick = max_expiries;
        self
    }

    /// Enable or disable phase statistics.
    #[must_use]
    pub const fn with_gather_stats(mut self, gather_stats: bool) -> Self {
        self.gather_stats = gather_stats;
        self
    }

    /// Parse a config from TOML text and validate it.
    ///
    /// # Errors
    ///
    /// Returns `TomlParseFailed` for malformed TOML or unknown keys, and
    /// `InvalidConfig` if the values fail validation.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| Error::toml_parse_failed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a config file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigReadFailed` if the file cannot be read, otherwise the
    /// errors of [`LoopConfig::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::config_read_failed(path, e.to_string()))?;
        let config = Self::from_toml_str(&text)?;
        debug!(path = %path.display(), "Loaded loop configuration");
        Ok(config)
    }

    /// Render the config as TOML.
    ///
    /// # Errors
    ///
    /// Returns `TomlParseFailed` if serialization fails.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| Error::toml_parse_failed(e.to_string()))
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.max_timers == 0 {
            return Err(Error::invalid_config("max_timers must be greater than 0"));
        }

        if self.max_expiries_per_tick == 0 {
            return Err(Error::invalid_config(
                "max_expiries_per_tick must be greater than 0",
            ));
        }

        if !is_non_negative(self.min_delay_ms) {
            return Err(Error::invalid_config(
                "min_delay_ms must be a finite, non-negative number",
            ));
        }

        if !is_non_negative(self.min_wait_ms) || !is_non_negative(self.max_wait_ms) {
            return Err(Error::invalid_config(
                "min_wait_ms and max_wait_ms must be finite, non-negative numbers",
            ));
        }

        if self.min_wait_ms > self.max_wait_ms {
            return Err(Error::invalid_config(format!(
                "min_wait_ms ({}) must not exceed max_wait_ms ({})",
                self.min_wait_ms, self.max_wait_ms
            )));
        }

        if self.page_size_bytes == 0 {
            return Err(Error::invalid_config(
                "page_size_bytes must be greater than 0",
            ));
        }

        Ok(())
    }
}

fn is_non_negative(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}

const fn default_min_delay_ms() -> f64 {
    1.0
}

const fn default_min_wait_ms() -> f64 {
    1.0
}

const fn default_max_wait_ms() -> f64 {
    60_000.0
}

const fn default_max_expiries_per_tick() -> usize {
    10
}

const fn default_max_timers() -> usize {
    4096
}

const fn default_page_size_bytes() -> u64 {
    4096
}
