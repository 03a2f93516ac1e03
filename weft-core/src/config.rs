//! Engine configuration.
//!
//! Every field has a default, so an empty JSON object is a valid config.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Timing defaults used by components and the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Defaults for debounced inputs created through `Scope::debouncer`.
    pub debounce: DebounceConfig,

    /// Delay before a stream-backed property reacts to its first value.
    pub first_tick_delay_ms: u64,
}

impl Config {
    /// Parse a configuration from JSON.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// `first_tick_delay_ms` as a `Duration`.
    pub fn first_tick_delay(&self) -> Duration {
        Duration::from_millis(self.first_tick_delay_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debounce: DebounceConfig::default(),
            first_tick_delay_ms: 0,
        }
    }
}

/// Delays for a [`DebouncingTimer`](crate::timer::DebouncingTimer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebounceConfig {
    /// Delay applied to every call after the first.
    pub delay_ms: u64,

    /// Delay applied to the first call the timer ever receives.
    pub first_delay_ms: u64,
}

impl DebounceConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn first_delay(&self) -> Duration {
        Duration::from_millis(self.first_delay_ms)
    }
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            delay_ms: 250,
            first_delay_ms: 50,
        }
    }
}
