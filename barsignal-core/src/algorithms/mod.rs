//! Open and close algorithms.
//!
//! An open algorithm decides entries (and, for DMA, the exit of its own
//! position); a close algorithm runs only when the open side produced nothing.
//! Both see one `EvalContext` and return at most one signal. Any state they
//! persist is written only when they actually fire.

pub mod close;
pub mod open;

use std::fmt;

use chrono::{DateTime, FixedOffset};

use crate::domain::{BarWindow, Quote, Signal, StrategyInstanceKey};
use crate::ports::SessionCalendar;
use crate::store::StateStore;

pub use close::{HardLimitReset, MacdClose, PortfolioFlatten, TrailingStop};
pub use open::{DmaCross, EmaBand, EntryRules, GuardBlock, SmaBand, WilliamsGate};

/// Everything an algorithm may read while evaluating one instance.
pub struct EvalContext<'a> {
    pub key: &'a StrategyInstanceKey,
    pub window: &'a BarWindow,
    pub position: i64,
    pub quote: Option<Quote>,
    pub now: DateTime<FixedOffset>,
    pub state: &'a StateStore,
    pub calendar: &'a dyn SessionCalendar,
}

impl fmt::Debug for EvalContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvalContext")
            .field("key", &self.key)
            .field("bars", &self.window.len())
            .field("position", &self.position)
            .field("quote", &self.quote)
            .field("now", &self.now)
            .finish()
    }
}

impl EvalContext<'_> {
    pub fn in_session(&self, at: DateTime<FixedOffset>) -> bool {
        self.calendar
            .is_trading_now(&self.key.symbol, self.key.security_type, at)
    }

    /// Whether the newest bar opens a session the previous bar was not in.
    pub fn starts_new_session(&self) -> bool {
        match self.window.bars() {
            [.., previous, latest] => self.calendar.session_break_between(
                &self.key.symbol,
                self.key.security_type,
                previous.timestamp,
                latest.timestamp,
            ),
            _ => false,
        }
    }

    /// Clear the open-side action state after a position-closing decision.
    /// Failure is logged; the close signal still goes out.
    pub(crate) fn forget_last_action(&self) {
        if let Err(err) = self.state.clear_last_action(self.key) {
            tracing::warn!(key = %self.key, error = %err, "failed to clear action state");
        }
    }

    /// A close that flattens the whole position at the latest vwap.
    pub(crate) fn flatten(&self, algorithm: &str) -> Signal {
        Signal::close(
            self.key,
            -self.position,
            self.window.latest().vwap,
            algorithm,
            self.now,
        )
    }
}

/// Entry-side decision logic.
pub trait OpenAlgorithm: Send + Sync {
    fn name(&self) -> &str;

    /// Bars needed before the algorithm can say anything.
    fn required_bars(&self) -> usize;

    fn evaluate(&self, ctx: &EvalContext<'_>) -> Option<Signal>;
}

/// Exit-side decision logic.
pub trait CloseAlgorithm: Send + Sync {
    fn name(&self) -> &str;

    fn required_bars(&self) -> usize {
        1
    }

    fn evaluate(&self, ctx: &EvalContext<'_>) -> Option<Signal>;
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::calendar::AlwaysOpen;
    use crate::domain::{SecurityType, StrategyInstanceKey};
    use crate::indicators::make_bars;

    pub fn key() -> StrategyInstanceKey {
        StrategyInstanceKey::new("DU1", "ES", SecurityType::Future, "bench")
    }

    pub fn window(vwaps: &[f64]) -> BarWindow {
        BarWindow::new(make_bars(vwaps)).unwrap()
    }

    pub fn ctx<'a>(
        key: &'a StrategyInstanceKey,
        window: &'a BarWindow,
        position: i64,
        state: &'a StateStore,
    ) -> EvalContext<'a> {
        EvalContext {
            key,
            window,
            position,
            quote: None,
            now: window.latest().timestamp,
            state,
            calendar: &AlwaysOpen,
        }
    }
}
