//! TOML-based engine configuration.
//!
//! Stores the tunables for the decision pipeline:
//! - Candidate lead-time windows and exploration bonus
//! - Confidence thresholds and the event horizon
//! - Optimizer node budget and pruning toggle
//!
//! Configuration is stored at `~/.config/cueist/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::engine::DecisionConfig;
use crate::error::ConfigError;
use crate::optimizer::OptimizerConfig;
use crate::storage::data_dir;
use crate::timing::TimingConfig;

/// Engine configuration.
///
/// Serialized to/from TOML at `~/.config/cueist/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub decision: DecisionConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub optimizer: OptimizerConfig,
}

impl EngineConfig {
    fn config_path() -> Result<PathBuf, ConfigError> {
        let dir = data_dir().map_err(|e| ConfigError::LoadFailed {
            path: PathBuf::from("~/.config/cueist"),
            message: e.to_string(),
        })?;
        Ok(dir.join("config.toml"))
    }

    /// Load the configuration, falling back to defaults when the file does
    /// not exist yet.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::LoadFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
            path,
            message: e.to_string(),
        })
    }

    /// Save the configuration.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::config_path()?;
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        std::fs::write(&path, content).map_err(|e| ConfigError::SaveFailed {
            path,
            message: e.to_string(),
        })
    }
}
