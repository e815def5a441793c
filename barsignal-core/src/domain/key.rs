//! Instance identity: security type and the four-part strategy instance key.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Position divisor applied to every non-future security type before the
/// position offset is scaled into a margin.
pub const NON_FUTURE_LOT_SIZE: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SecurityType {
    #[serde(rename = "STK")]
    Stock,
    #[serde(rename = "FUT")]
    Future,
    #[serde(rename = "CASH")]
    Forex,
    #[serde(rename = "CRYPTO")]
    Crypto,
}

impl SecurityType {
    pub fn code(&self) -> &'static str {
        match self {
            SecurityType::Stock => "STK",
            SecurityType::Future => "FUT",
            SecurityType::Forex => "CASH",
            SecurityType::Crypto => "CRYPTO",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "STK" => Some(SecurityType::Stock),
            "FUT" => Some(SecurityType::Future),
            "CASH" => Some(SecurityType::Forex),
            "CRYPTO" => Some(SecurityType::Crypto),
            _ => None,
        }
    }

    /// Divisor used to normalize a raw position for margin purposes.
    pub fn lot_divisor(&self) -> f64 {
        match self {
            SecurityType::Future => 1.0,
            _ => NON_FUTURE_LOT_SIZE,
        }
    }
}

impl fmt::Display for SecurityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Identifies one running strategy instance. All persisted trade state is
/// scoped to exactly one key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StrategyInstanceKey {
    pub account_id: String,
    pub symbol: String,
    pub security_type: SecurityType,
    pub benchmark: String,
}

impl StrategyInstanceKey {
    pub fn new(
        account_id: impl Into<String>,
        symbol: impl Into<String>,
        security_type: SecurityType,
        benchmark: impl Into<String>,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            symbol: symbol.into(),
            security_type,
            benchmark: benchmark.into(),
        }
    }

    /// Does this instance listen to bar updates for `symbol`/`security_type`?
    pub fn matches(&self, symbol: &str, security_type: SecurityType) -> bool {
        self.symbol == symbol && self.security_type == security_type
    }
}

impl fmt::Display for StrategyInstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.account_id, self.symbol, self.security_type, self.benchmark
        )
    }
}
