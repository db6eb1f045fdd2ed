//! Engine configuration

use crate::error::{Result, RuntimeError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Engine tuning knobs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Independent worker networks; records are dispatched round-robin
    pub workers: usize,
    /// Concurrent process invocations across all workers
    pub process_slots: usize,
    /// Concurrent SQL invocations across all workers
    pub sql_slots: usize,
    /// Capacity of every stage channel
    pub channel_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            workers: 1,
            process_slots: 4,
            sql_slots: 4,
            channel_capacity: 16,
        }
    }
}

impl EngineConfig {
    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: EngineConfig =
            serde_yaml::from_str(text).map_err(|e| RuntimeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| RuntimeError::Config(e.to_string()))?;
        Self::from_yaml(&text)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("workers", self.workers),
            ("process_slots", self.process_slots),
            ("sql_slots", self.sql_slots),
            ("channel_capacity", self.channel_capacity),
        ] {
            if value == 0 {
                return Err(RuntimeError::Config(format!("{name} must be at least 1")));
            }
        }
        Ok(())
    }
}
