//! Batcher thresholds as loaded from configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Size and interval thresholds for a [`Batcher`](crate::Batcher)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatcherConfig {
    /// Items per batch before a release is forced
    pub size: usize,
    /// Longest a partial batch may wait, in milliseconds
    pub interval_ms: u64,
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            size: 100,
            interval_ms: 1000,
        }
    }
}

impl BatcherConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.size == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        Ok(())
    }
}
