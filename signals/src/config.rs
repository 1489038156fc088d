use serde::{Deserialize, Serialize};

use crate::error::{SignalError, SignalResult};

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Units evaluated at once within a batch; 1 is strictly sequential
    #[serde(default = "default_max_concurrent_units")]
    pub max_concurrent_units: usize,
}

fn default_max_concurrent_units() -> usize {
    4
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_units: default_max_concurrent_units(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> SignalResult<()> {
        if self.max_concurrent_units == 0 {
            return Err(SignalError::ConfigError(
                "max_concurrent_units must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
