//! Interpreter configuration

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::ScriptError;

/// Script engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptConfig {
    /// Fixed number of event queue slots
    pub event_queue_capacity: usize,

    /// Queued events processed per tick (0 = no limit)
    pub event_drain_limit: usize,

    /// Entities visited by one heartbeat
    pub heartbeat_batch: usize,

    /// Maximum nesting of immediate event sends
    pub max_dispatch_depth: usize,

    /// Seed for `random` and `^rnd_`; entropy when unset
    pub rng_seed: Option<u64>,

    /// Suppression table to load at startup
    pub suppressions: Option<PathBuf>,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            event_queue_capacity: 800,
            event_drain_limit: 20,
            heartbeat_batch: 10,
            max_dispatch_depth: 64,
            rng_seed: None,
            suppressions: None,
        }
    }
}

impl ScriptConfig {
    /// Load a configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScriptError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Load a configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, ScriptError> {
        let config: ScriptConfig = toml::from_str(content)?;
        Ok(config)
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.event_queue_capacity = capacity;
        self
    }

    pub fn with_drain_limit(mut self, limit: usize) -> Self {
        self.event_drain_limit = limit;
        self
    }

    pub fn with_heartbeat_batch(mut self, batch: usize) -> Self {
        self.heartbeat_batch = batch;
        self
    }

    pub fn with_max_dispatch_depth(mut self, depth: usize) -> Self {
        self.max_dispatch_depth = depth;
        self
    }

    /// Make `random` and `^rnd_` reproducible
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    pub fn with_suppressions(mut self, path: impl Into<PathBuf>) -> Self {
        self.suppressions = Some(path.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ScriptConfig::default();
        assert_eq!(config.event_queue_capacity, 800);
        assert_eq!(config.event_drain_limit, 20);
        assert_eq!(config.heartbeat_batch, 10);
        assert!(config.rng_seed.is_none());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ScriptConfig::from_toml_str("rng_seed = 7\nevent_drain_limit = 0\n").unwrap();
        assert_eq!(config.rng_seed, Some(7));
        assert_eq!(config.event_drain_limit, 0);
        assert_eq!(config.event_queue_capacity, 800);
    }

    #[test]
    fn test_builders() {
        let config = ScriptConfig::default().with_queue_capacity(4).with_seed(1);
        assert_eq!(config.event_queue_capacity, 4);
        assert_eq!(config.rng_seed, Some(1));
    }

    #[test]
    fn test_bad_toml_is_error() {
        assert!(ScriptConfig::from_toml_str("event_queue_capacity = \"lots\"").is_err());
    }
}
