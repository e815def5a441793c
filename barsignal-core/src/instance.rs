//! Strategy instance definitions: the serializable configuration and the
//! resolved runtime instance.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::algorithms::{CloseAlgorithm, OpenAlgorithm};
use crate::domain::{SecurityType, StrategyInstanceKey};

/// Algorithm name plus numeric parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmConfig {
    pub algorithm: String,
    #[serde(default)]
    pub params: BTreeMap<String, f64>,
}

impl AlgorithmConfig {
    pub fn new(algorithm: impl Into<String>) -> Self {
        Self {
            algorithm: algorithm.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, name: &str, value: f64) -> Self {
        self.params.insert(name.to_string(), value);
        self
    }
}

/// One configured strategy instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceConfig {
    pub account_id: String,
    pub symbol: String,
    pub security_type: SecurityType,
    pub benchmark: String,
    pub open: AlgorithmConfig,
    #[serde(default)]
    pub close: Option<AlgorithmConfig>,
}

impl InstanceConfig {
    pub fn key(&self) -> StrategyInstanceKey {
        StrategyInstanceKey::new(
            self.account_id.clone(),
            self.symbol.clone(),
            self.security_type,
            self.benchmark.clone(),
        )
    }
}

/// A resolved instance: its key plus the algorithms chosen at start-up.
pub struct StrategyInstance {
    pub key: StrategyInstanceKey,
    pub open: Box<dyn OpenAlgorithm>,
    pub close: Option<Box<dyn CloseAlgorithm>>,
}

impl StrategyInstance {
    pub fn new(
        key: StrategyInstanceKey,
        open: Box<dyn OpenAlgorithm>,
        close: Option<Box<dyn CloseAlgorithm>>,
    ) -> Self {
        Self { key, open, close }
    }

    /// Bars requested from the bar source for one evaluation.
    pub fn required_bars(&self) -> usize {
        let close = self.close.as_ref().map_or(1, |c| c.required_bars());
        self.open.required_bars().max(close).max(1)
    }
}

impl fmt::Debug for StrategyInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategyInstance")
            .field("key", &self.key)
            .field("open", &self.open.name())
            .field("close", &self.close.as_ref().map(|c| c.name().to_string()))
            .finish()
    }
}
