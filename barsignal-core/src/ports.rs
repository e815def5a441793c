//! Collaborator ports: where the engine meets the bar store, the shared
//! cache, the session calendar, and signal delivery.
//!
//! Every port is `Send + Sync` so evaluations can run on a worker pool.

use chrono::{DateTime, Duration, FixedOffset};
use thiserror::Error;

use crate::domain::{Bar, SecurityType, Signal, StrategyInstanceKey};

/// Failure talking to an external store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store operation failed: {0}")]
    Backend(String),
}

/// Failure handing a signal to a delivery target.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("delivery rejected: {0}")]
    Rejected(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Source of recent bars for an instance.
pub trait BarSource: Send + Sync {
    /// The most recent bars (oldest first) when at least `min_bars` are
    /// available; `Ok(None)` otherwise.
    fn bar_window(
        &self,
        key: &StrategyInstanceKey,
        min_bars: usize,
    ) -> Result<Option<Vec<Bar>>, StoreError>;
}

/// String key/value cache shared between the engine and the feed side.
pub trait KeyValueCache: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Atomically replace the value at `key` with `new` (deleting on `None`)
    /// iff the current value equals `expected` (absent on `None`).
    fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        new: Option<&str>,
    ) -> Result<bool, StoreError>;
}

/// Trading-session oracle.
pub trait SessionCalendar: Send + Sync {
    fn is_trading_now(
        &self,
        symbol: &str,
        security_type: SecurityType,
        at: DateTime<FixedOffset>,
    ) -> bool;

    /// True while trading and within `seconds_before` of the session close.
    fn is_close_to_closing(
        &self,
        symbol: &str,
        security_type: SecurityType,
        at: DateTime<FixedOffset>,
        seconds_before: i64,
    ) -> bool;

    /// True when the market is closed at some whole minute strictly between
    /// `from` and `to`, i.e. the two instants belong to different sessions.
    /// Gaps longer than a week always count.
    fn session_break_between(
        &self,
        symbol: &str,
        security_type: SecurityType,
        from: DateTime<FixedOffset>,
        to: DateTime<FixedOffset>,
    ) -> bool {
        if to - from > Duration::days(7) {
            return true;
        }
        let mut at = from + Duration::minutes(1);
        while at < to {
            if !self.is_trading_now(symbol, security_type, at) {
                return true;
            }
            at += Duration::minutes(1);
        }
        false
    }
}

/// Fire-and-forget delivery target for signals.
pub trait SignalSink: Send + Sync {
    fn name(&self) -> &str;

    fn deliver(&self, signal: &Signal) -> Result<(), SinkError>;
}
