use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Largest payload carried by a single frame on the remote worker boundary.
pub const DEFAULT_FRAME_LIMIT: usize = 3 * 1024 * 1024;

/// Capacity of each worker's output channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Engine tuning knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  pub channel_capacity: usize,
  pub frame_limit: usize,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      channel_capacity: DEFAULT_CHANNEL_CAPACITY,
      frame_limit: DEFAULT_FRAME_LIMIT,
    }
  }
}

impl EngineConfig {
  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.channel_capacity == 0 {
      return Err(ConfigError::InvalidSetting {
        field: "channel_capacity".to_string(),
        message: "must be at least 1".to_string(),
      });
    }
    if self.frame_limit == 0 {
      return Err(ConfigError::InvalidSetting {
        field: "frame_limit".to_string(),
        message: "must be at least 1".to_string(),
      });
    }
    Ok(())
  }
}
