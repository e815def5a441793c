//! Trade-state store adapter: typed reads and writes of per-key trade state
//! over the shared `KeyValueCache`.
//!
//! Values are JSON. A value that fails to decode is logged and treated as
//! absent; it is overwritten by the next successful write.

pub mod memory;

pub use memory::{MemoryBarSource, MemoryCache};

use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::domain::{
    ActionState, OrderRecord, PriceExtremes, ResetState, SecurityType, StrategyInstanceKey,
};
use crate::ports::{KeyValueCache, StoreError};
use crate::volatility::PriceRange;

/// Attempts made by read-modify-write helpers before giving up.
const RMW_ATTEMPTS: usize = 8;

/// A decoded value plus the raw text it was read from, so a later write can
/// be made conditional on nothing having changed in between.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot<T> {
    pub value: T,
    raw: Option<String>,
}

impl<T> Snapshot<T> {
    pub fn is_present(&self) -> bool {
        self.raw.is_some()
    }
}

#[derive(Clone)]
pub struct StateStore {
    cache: Arc<dyn KeyValueCache>,
}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStore").finish_non_exhaustive()
    }
}

// ─── Cache keys ──────────────────────────────────────────────────────

fn action_key(key: &StrategyInstanceKey) -> String {
    format!("action:{key}")
}

fn reset_key(key: &StrategyInstanceKey) -> String {
    format!("reset:{key}")
}

fn orders_key(key: &StrategyInstanceKey) -> String {
    format!("orders:{key}")
}

fn extremes_key(key: &StrategyInstanceKey) -> String {
    format!("extremes:{key}")
}

fn position_key(account_id: &str, symbol: &str, security_type: SecurityType) -> String {
    format!("position:{account_id}:{symbol}:{security_type}")
}

fn ema_key(symbol: &str, security_type: SecurityType, span: usize) -> String {
    format!("ema:{symbol}:{security_type}:{span}")
}

fn session_range_key(symbol: &str, security_type: SecurityType) -> String {
    format!("session_range:{symbol}:{security_type}")
}

fn decode<T: DeserializeOwned>(cache_key: &str, raw: &str) -> Option<T> {
    match serde_json::from_str(raw) {
        Ok(v) => Some(v),
        Err(err) => {
            tracing::warn!(cache_key, error = %err, "malformed cached value treated as absent");
            None
        }
    }
}

fn encode<T: Serialize>(value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|e| StoreError::Backend(format!("encode: {e}")))
}

impl StateStore {
    pub fn new(cache: Arc<dyn KeyValueCache>) -> Self {
        Self { cache }
    }

    /// Store over a fresh in-process cache.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryCache::new()))
    }

    pub fn cache(&self) -> &Arc<dyn KeyValueCache> {
        &self.cache
    }

    fn read<T: DeserializeOwned>(&self, cache_key: &str) -> Result<Snapshot<Option<T>>, StoreError> {
        let raw = self.cache.get(cache_key)?;
        let value = raw.as_deref().and_then(|r| decode(cache_key, r));
        Ok(Snapshot { value, raw })
    }

    // ─── Action state ────────────────────────────────────────────────

    /// Last action for `key`; `NONE` when nothing (or nothing readable) is stored.
    pub fn last_action(
        &self,
        key: &StrategyInstanceKey,
    ) -> Result<Snapshot<ActionState>, StoreError> {
        let snap = self.read::<ActionState>(&action_key(key))?;
        Ok(Snapshot {
            value: snap.value.unwrap_or_default(),
            raw: snap.raw,
        })
    }

    pub fn set_last_action(
        &self,
        key: &StrategyInstanceKey,
        state: &ActionState,
    ) -> Result<(), StoreError> {
        self.cache.set(&action_key(key), &encode(state)?)
    }

    /// Write `state` only if the stored action is still what `seen` recorded.
    /// Returns false when another evaluation got there first.
    pub fn swap_last_action(
        &self,
        key: &StrategyInstanceKey,
        seen: &Snapshot<ActionState>,
        state: &ActionState,
    ) -> Result<bool, StoreError> {
        let encoded = encode(state)?;
        self.cache
            .compare_and_swap(&action_key(key), seen.raw.as_deref(), Some(&encoded))
    }

    pub fn clear_last_action(&self, key: &StrategyInstanceKey) -> Result<(), StoreError> {
        self.cache.delete(&action_key(key))
    }

    // ─── Position ────────────────────────────────────────────────────

    /// Net position for the instance's account and contract; 0 when unknown.
    pub fn position(&self, key: &StrategyInstanceKey) -> Result<i64, StoreError> {
        let cache_key = position_key(&key.account_id, &key.symbol, key.security_type);
        Ok(self.read::<i64>(&cache_key)?.value.unwrap_or(0))
    }

    pub fn set_position(
        &self,
        account_id: &str,
        symbol: &str,
        security_type: SecurityType,
        position: i64,
    ) -> Result<(), StoreError> {
        let cache_key = position_key(account_id, symbol, security_type);
        self.cache.set(&cache_key, &position.to_string())
    }

    // ─── Hard-limit reset ────────────────────────────────────────────

    pub fn reset_state(&self, key: &StrategyInstanceKey) -> Result<Option<ResetState>, StoreError> {
        Ok(self.read::<ResetState>(&reset_key(key))?.value)
    }

    /// Record `state` unless a reset (pending or fired) is already held.
    /// Returns false when one already existed.
    pub fn schedule_reset(
        &self,
        key: &StrategyInstanceKey,
        state: &ResetState,
    ) -> Result<bool, StoreError> {
        let encoded = encode(state)?;
        self.cache
            .compare_and_swap(&reset_key(key), None, Some(&encoded))
    }

    pub fn clear_reset(&self, key: &StrategyInstanceKey) -> Result<(), StoreError> {
        self.cache.delete(&reset_key(key))
    }

    /// Replace the schedule `scheduled` with a fired marker stamped `at`, only
    /// if it is still stored. Exactly one caller observes `true` for a given
    /// schedule. The marker stays until `clear_reset`.
    pub fn complete_reset(
        &self,
        key: &StrategyInstanceKey,
        scheduled: &ResetState,
        at: DateTime<FixedOffset>,
    ) -> Result<bool, StoreError> {
        let expected = encode(scheduled)?;
        let marker = encode(&ResetState::fired(at))?;
        self.cache
            .compare_and_swap(&reset_key(key), Some(&expected), Some(&marker))
    }

    // ─── Order history & extremes ────────────────────────────────────

    /// Orders for `key`, oldest first. Empty when nothing is recorded.
    pub fn order_history(&self, key: &StrategyInstanceKey) -> Result<Vec<OrderRecord>, StoreError> {
        Ok(self
            .read::<Vec<OrderRecord>>(&orders_key(key))?
            .value
            .unwrap_or_default())
    }

    pub fn append_order(
        &self,
        key: &StrategyInstanceKey,
        order: OrderRecord,
    ) -> Result<(), StoreError> {
        self.update_orders(key, |orders| {
            orders.push(order.clone());
            true
        })
        .map(|_| ())
    }

    /// Drop the order with `order_id`. Returns false when it was not present.
    pub fn remove_order(&self, key: &StrategyInstanceKey, order_id: &str) -> Result<bool, StoreError> {
        self.update_orders(key, |orders| {
            let before = orders.len();
            orders.retain(|o| o.order_id != order_id);
            orders.len() != before
        })
    }

    pub fn clear_order_history(&self, key: &StrategyInstanceKey) -> Result<(), StoreError> {
        self.cache.delete(&orders_key(key))
    }

    /// Apply `edit` to the stored list with a conditional write, retrying on
    /// contention. `edit` returns whether it changed anything.
    fn update_orders<F>(&self, key: &StrategyInstanceKey, mut edit: F) -> Result<bool, StoreError>
    where
        F: FnMut(&mut Vec<OrderRecord>) -> bool,
    {
        let cache_key = orders_key(key);
        for _ in 0..RMW_ATTEMPTS {
            let snap = self.read::<Vec<OrderRecord>>(&cache_key)?;
            let mut orders = snap.value.unwrap_or_default();
            if !edit(&mut orders) {
                return Ok(false);
            }
            let encoded = encode(&orders)?;
            if self
                .cache
                .compare_and_swap(&cache_key, snap.raw.as_deref(), Some(&encoded))?
            {
                return Ok(true);
            }
        }
        Err(StoreError::Backend(format!(
            "order history for {key} kept changing during update"
        )))
    }

    pub fn price_extremes(
        &self,
        key: &StrategyInstanceKey,
    ) -> Result<Option<PriceExtremes>, StoreError> {
        Ok(self.read::<PriceExtremes>(&extremes_key(key))?.value)
    }

    pub fn set_price_extremes(
        &self,
        key: &StrategyInstanceKey,
        extremes: &PriceExtremes,
    ) -> Result<(), StoreError> {
        self.cache.set(&extremes_key(key), &encode(extremes)?)
    }

    pub fn clear_price_extremes(&self, key: &StrategyInstanceKey) -> Result<(), StoreError> {
        self.cache.delete(&extremes_key(key))
    }

    // ─── Cached indicators ───────────────────────────────────────────

    /// Continuously maintained EMA for a contract and span.
    pub fn cached_ema(
        &self,
        symbol: &str,
        security_type: SecurityType,
        span: usize,
    ) -> Result<Option<f64>, StoreError> {
        let value = self
            .read::<f64>(&ema_key(symbol, security_type, span))?
            .value;
        Ok(value.filter(|v| v.is_finite()))
    }

    pub fn set_cached_ema(
        &self,
        symbol: &str,
        security_type: SecurityType,
        span: usize,
        value: f64,
    ) -> Result<(), StoreError> {
        self.cache
            .set(&ema_key(symbol, security_type, span), &encode(&value)?)
    }

    /// High/low of the contract's most recently completed session.
    pub fn session_range(
        &self,
        symbol: &str,
        security_type: SecurityType,
    ) -> Result<Option<PriceRange>, StoreError> {
        let range = self
            .read::<PriceRange>(&session_range_key(symbol, security_type))?
            .value;
        Ok(range.filter(|r| r.max.is_finite() && r.min.is_finite() && r.max >= r.min))
    }

    pub fn set_session_range(
        &self,
        symbol: &str,
        security_type: SecurityType,
        range: &PriceRange,
    ) -> Result<(), StoreError> {
        self.cache
            .set(&session_range_key(symbol, security_type), &encode(range)?)
    }
}
