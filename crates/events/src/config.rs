//! Bus configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::access::AccessPolicy;

/// Initial capacity of the task queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 12;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid bus config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid bus config: {0}")]
    Invalid(String),
}

/// Settings for one [`EventBus`](crate::EventBus).
///
/// ```json
/// { "access": "same_thread", "queue_capacity": 32 }
/// ```
///
/// Missing fields take their defaults; unknown fields are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BusConfig {
    pub access: AccessPolicy,
    pub queue_capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            access: AccessPolicy::Unchecked,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl BusConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: BusConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid("queue_capacity must be > 0".into()));
        }
        Ok(())
    }
}
