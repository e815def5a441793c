//! Persisted trade state, keyed by `StrategyInstanceKey`.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use super::signal::Side;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LastAction {
    #[default]
    None,
    Buy,
    Sell,
}

impl From<Side> for LastAction {
    fn from(side: Side) -> Self {
        match side {
            Side::Buy => LastAction::Buy,
            Side::Sell => LastAction::Sell,
        }
    }
}

/// The most recent entry an open algorithm fired for a key.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActionState {
    pub last_action: LastAction,
    #[serde(default)]
    pub timestamp: Option<DateTime<FixedOffset>>,
}

impl ActionState {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn fired(side: Side, at: DateTime<FixedOffset>) -> Self {
        Self {
            last_action: side.into(),
            timestamp: Some(at),
        }
    }

    /// Seconds from the recorded action to `now`, if one is recorded.
    pub fn seconds_since(&self, now: DateTime<FixedOffset>) -> Option<i64> {
        self.timestamp.map(|t| (now - t).num_seconds())
    }
}

/// An order placed for a key, as recorded by the order feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub order_id: String,
    pub quantity: i64,
    pub timestamp: DateTime<FixedOffset>,
}

/// Extreme prices seen since the most recent order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceExtremes {
    pub max_price: f64,
    pub min_price: f64,
}

impl PriceExtremes {
    pub fn starting_at(price: f64) -> Self {
        Self {
            max_price: price,
            min_price: price,
        }
    }

    /// Widen the extremes to include `price`.
    pub fn observe(&mut self, price: f64) {
        if price > self.max_price {
            self.max_price = price;
        }
        if price < self.min_price {
            self.min_price = price;
        }
    }
}

/// A hard-limit reset for a key: either scheduled for `reset_at`, or already
/// fired at `reset_at` and held until the position is back under the limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetState {
    pub reset_at: DateTime<FixedOffset>,
    #[serde(default)]
    pub fired: bool,
}

impl ResetState {
    pub fn scheduled(reset_at: DateTime<FixedOffset>) -> Self {
        Self {
            reset_at,
            fired: false,
        }
    }

    pub fn fired(at: DateTime<FixedOffset>) -> Self {
        Self {
            reset_at: at,
            fired: true,
        }
    }

    /// Scheduled and not yet fired.
    pub fn is_pending(&self) -> bool {
        !self.fired
    }
}
