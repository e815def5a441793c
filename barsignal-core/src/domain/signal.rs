//! Signal: the engine's only output.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use super::key::{SecurityType, StrategyInstanceKey};

/// Direction of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// +1 for buys, -1 for sells.
    pub fn sign(&self) -> i64 {
        match self {
            Side::Buy => 1,
            Side::Sell => -1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderKind {
    Open,
    Close,
}

/// A trading decision handed to the delivery sinks.
///
/// `quantity` is signed: positive buys, negative sells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub valid: bool,
    pub account_id: String,
    pub symbol: String,
    pub security_type: SecurityType,
    pub reference_price: f64,
    pub quantity: i64,
    pub order_kind: OrderKind,
    pub benchmark: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_in_force_secs: Option<u64>,
    pub algorithm: String,
    pub timestamp: DateTime<FixedOffset>,
}

impl Signal {
    /// An entry of `size` units in direction `side`.
    pub fn open(
        key: &StrategyInstanceKey,
        side: Side,
        size: i64,
        reference_price: f64,
        algorithm: &str,
        timestamp: DateTime<FixedOffset>,
    ) -> Self {
        Self::build(
            key,
            side.sign() * size.abs(),
            reference_price,
            OrderKind::Open,
            algorithm,
            timestamp,
        )
    }

    /// An exit of `quantity` (already signed to offset the position).
    pub fn close(
        key: &StrategyInstanceKey,
        quantity: i64,
        reference_price: f64,
        algorithm: &str,
        timestamp: DateTime<FixedOffset>,
    ) -> Self {
        Self::build(
            key,
            quantity,
            reference_price,
            OrderKind::Close,
            algorithm,
            timestamp,
        )
    }

    fn build(
        key: &StrategyInstanceKey,
        quantity: i64,
        reference_price: f64,
        order_kind: OrderKind,
        algorithm: &str,
        timestamp: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            valid: true,
            account_id: key.account_id.clone(),
            symbol: key.symbol.clone(),
            security_type: key.security_type,
            reference_price,
            quantity,
            order_kind,
            benchmark: key.benchmark.clone(),
            time_in_force_secs: None,
            algorithm: algorithm.to_string(),
            timestamp,
        }
    }

    /// Attach a good-till-date horizon.
    pub fn with_time_in_force(mut self, secs: Option<u64>) -> Self {
        self.time_in_force_secs = secs;
        self
    }

    /// A signal that is flagged invalid or carries no quantity is treated as
    /// no signal at all.
    pub fn is_actionable(&self) -> bool {
        self.valid && self.quantity != 0 && self.reference_price.is_finite()
    }

    pub fn side(&self) -> Option<Side> {
        match self.quantity.signum() {
            1 => Some(Side::Buy),
            -1 => Some(Side::Sell),
            _ => None,
        }
    }

    pub fn key(&self) -> StrategyInstanceKey {
        StrategyInstanceKey::new(
            self.account_id.clone(),
            self.symbol.clone(),
            self.security_type,
            self.benchmark.clone(),
        )
    }

    /// Deterministic BLAKE3 digest of key, timestamp, kind and quantity.
    ///
    /// Re-deliveries of the same decision share a fingerprint, so consumers
    /// can de-duplicate.
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.key().to_string().as_bytes());
        hasher.update(self.timestamp.to_rfc3339().as_bytes());
        let kind: &[u8] = match self.order_kind {
            OrderKind::Open => b"open",
            OrderKind::Close => b"close",
        };
        hasher.update(kind);
        hasher.update(&self.quantity.to_le_bytes());
        hasher.finalize().to_hex().to_string()
    }
}
