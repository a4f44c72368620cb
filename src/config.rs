/// configuration for the lock cache and the task supervisor; everything
/// has a default so an empty json object is a valid config.
///
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_MAX_SIZE: usize = 500;
pub const DEFAULT_GRACE_MS: u64 = 5_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockCacheConfig {
    /// the maximum number of idle locks kept in the cache
    pub max_size: usize,
}

impl Default for LockCacheConfig {
    fn default() -> Self {
        LockCacheConfig {
            max_size: DEFAULT_MAX_SIZE,
        }
    }
}

impl LockCacheConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_size == 0 {
            return Err(Error::InvalidCapacity(self.max_size));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// used as the log target prefix and in status reports
    pub name: String,
    /// how long shutdown waits for in-flight tasks
    pub grace_ms: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        SupervisorConfig {
            name: "supervisor".to_string(),
            grace_ms: DEFAULT_GRACE_MS,
        }
    }
}

impl SupervisorConfig {
    pub fn grace(&self) -> Duration {
        Duration::from_millis(self.grace_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub lock_cache: LockCacheConfig,
    pub supervisor: SupervisorConfig,
}

impl Config {
    /// parse and validate a json config
    pub fn from_json(json: &str) -> Result<Config> {
        let config: Config = serde_json::from_str(json)?;
        config.lock_cache.validate()?;

        Ok(config)
    }
}
