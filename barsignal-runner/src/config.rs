//! Engine configuration loaded from TOML.
//!
//! ```toml
//! [engine]
//! max_workers = 8
//!
//! [session]
//! regular_hours_only = false
//!
//! [[instances]]
//! account_id = "DU100"
//! symbol = "ES"
//! security_type = "FUT"
//! benchmark = "sma_20"
//! open = { algorithm = "sma", params = { num_stats_bars = 20 } }
//! close = { algorithm = "reset", params = { max_position = 10 } }
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use barsignal_core::calendar::SessionTable;
use barsignal_core::domain::StrategyInstanceKey;
use barsignal_core::factory::{build_instance, FactoryError};
use barsignal_core::instance::{InstanceConfig, StrategyInstance};

/// Errors from loading or resolving an engine configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("instance {key}: {source}")]
    Instance {
        key: StrategyInstanceKey,
        #[source]
        source: FactoryError,
    },

    #[error("duplicate strategy instance {0}")]
    DuplicateInstance(StrategyInstanceKey),

    #[error("engine.max_workers must be >= 1")]
    NoWorkers,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    /// Upper bound on concurrent evaluations per bar update.
    pub max_workers: usize,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self { max_workers: 8 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    /// Restrict stocks to 09:30–16:00 instead of extended hours.
    pub regular_hours_only: bool,
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub engine: EngineSection,
    #[serde(default)]
    pub session: SessionSection,
    #[serde(default)]
    pub instances: Vec<InstanceConfig>,
}

impl EngineConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(content)?;
        if config.engine.max_workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        Ok(config)
    }

    /// Resolve every configured instance, failing on the first unknown
    /// algorithm, invalid parameter or duplicate key.
    pub fn build_instances(&self) -> Result<Vec<StrategyInstance>, ConfigError> {
        let mut seen = HashSet::new();
        let mut built = Vec::with_capacity(self.instances.len());
        for cfg in &self.instances {
            let key = cfg.key();
            if !seen.insert(key.clone()) {
                return Err(ConfigError::DuplicateInstance(key));
            }
            let instance =
                build_instance(cfg).map_err(|source| ConfigError::Instance { key, source })?;
            built.push(instance);
        }
        Ok(built)
    }

    /// Session calendar for the configured hours.
    pub fn calendar(&self) -> SessionTable {
        SessionTable::us_default(self.session.regular_hours_only)
    }
}
