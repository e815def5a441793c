//! Evaluation orchestrator: runs one strategy instance for one bar update.
//!
//! Order per evaluation:
//! 1. session open for the event time, else stop
//! 2. bar window of `required_bars` (absent, invalid or short → stop)
//! 3. current position (unreadable → stop)
//! 4. open algorithm; an actionable signal is returned immediately
//! 5. otherwise the close algorithm, when configured

use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::algorithms::EvalContext;
use crate::domain::{BarWindow, Quote, SecurityType, Signal};
use crate::instance::StrategyInstance;
use crate::ports::{BarSource, SessionCalendar};
use crate::store::StateStore;

/// A new bar has been published for a contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarUpdate {
    pub symbol: String,
    pub security_type: SecurityType,
    pub timestamp: DateTime<FixedOffset>,
    #[serde(default)]
    pub quote: Option<Quote>,
}

/// Shared collaborators for every evaluation.
#[derive(Clone)]
pub struct Evaluator {
    bars: Arc<dyn BarSource>,
    state: StateStore,
    calendar: Arc<dyn SessionCalendar>,
}

impl std::fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Evaluator").finish_non_exhaustive()
    }
}

impl Evaluator {
    pub fn new(
        bars: Arc<dyn BarSource>,
        state: StateStore,
        calendar: Arc<dyn SessionCalendar>,
    ) -> Self {
        Self {
            bars,
            state,
            calendar,
        }
    }

    pub fn state(&self) -> &StateStore {
        &self.state
    }

    /// Evaluate `instance` for `update`. At most one signal comes back, and
    /// only an actionable one.
    pub fn evaluate(&self, instance: &StrategyInstance, update: &BarUpdate) -> Option<Signal> {
        let key = &instance.key;
        if !self
            .calendar
            .is_trading_now(&key.symbol, key.security_type, update.timestamp)
        {
            tracing::debug!(%key, at = %update.timestamp, "market closed");
            return None;
        }

        let needed = instance.required_bars();
        let bars = match self.bars.bar_window(key, needed) {
            Ok(Some(bars)) => bars,
            Ok(None) => {
                tracing::debug!(%key, needed, "bar window unavailable");
                return None;
            }
            Err(err) => {
                tracing::warn!(%key, error = %err, "bar window unreadable; no signal");
                return None;
            }
        };
        if bars.len() < needed {
            tracing::debug!(%key, needed, got = bars.len(), "insufficient bars");
            return None;
        }
        let window = match BarWindow::new(bars) {
            Ok(w) => w,
            Err(err) => {
                tracing::warn!(%key, error = %err, "bar window rejected; no signal");
                return None;
            }
        };

        let position = match self.state.position(key) {
            Ok(p) => p,
            Err(err) => {
                tracing::warn!(%key, error = %err, "position unreadable; no signal");
                return None;
            }
        };

        let ctx = EvalContext {
            key,
            window: &window,
            position,
            quote: update.quote,
            now: update.timestamp,
            state: &self.state,
            calendar: self.calendar.as_ref(),
        };

        if let Some(signal) = instance.open.evaluate(&ctx).filter(Signal::is_actionable) {
            tracing::info!(%key, algorithm = %signal.algorithm, quantity = signal.quantity, price = signal.reference_price, "open-side signal");
            return Some(signal);
        }

        let close = instance.close.as_ref()?;
        let signal = close.evaluate(&ctx).filter(Signal::is_actionable)?;
        tracing::info!(%key, algorithm = %signal.algorithm, quantity = signal.quantity, price = signal.reference_price, "close-side signal");
        Some(signal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::{AlwaysOpen, SessionTable};
    use crate::domain::{OrderKind, StrategyInstanceKey};
    use crate::factory::build_instance;
    use crate::indicators::make_bars;
    use crate::instance::{AlgorithmConfig, InstanceConfig};
    use crate::ports::StoreError;
    use crate::store::MemoryBarSource;

    fn sma_instance(close: Option<&str>) -> StrategyInstance {
        build_instance(&InstanceConfig {
            account_id: "DU1".into(),
            symbol: "ES".into(),
            security_type: SecurityType::Future,
            benchmark: "sma_3".into(),
            open: AlgorithmConfig::new("sma")
                .with_param("num_stats_bars", 3.0)
                .with_param("signal_margin", 0.05)
                .with_param("max_position", 10.0),
            close: close.map(|name| AlgorithmConfig::new(name)),
        })
        .unwrap()
    }

    fn source_with(vwaps: &[f64]) -> Arc<MemoryBarSource> {
        let source = Arc::new(MemoryBarSource::new(100));
        for bar in make_bars(vwaps) {
            source.push("ES", SecurityType::Future, bar);
        }
        source
    }

    fn update_at(source: &MemoryBarSource) -> BarUpdate {
        let key = StrategyInstanceKey::new("x", "ES", SecurityType::Future, "x");
        let bars = source.bar_window(&key, 1).unwrap().unwrap();
        BarUpdate {
            symbol: "ES".into(),
            security_type: SecurityType::Future,
            timestamp: bars[bars.len() - 1].timestamp,
            quote: None,
        }
    }

    struct BrokenBars;

    impl BarSource for BrokenBars {
        fn bar_window(
            &self,
            _: &StrategyInstanceKey,
            _: usize,
        ) -> Result<Option<Vec<crate::domain::Bar>>, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
    }

    #[test]
    fn open_signal_wins() {
        let source = source_with(&[10.0, 10.0, 10.0, 7.0]);
        let update = update_at(&source);
        let eval = Evaluator::new(source, StateStore::in_memory(), Arc::new(AlwaysOpen));
        let s = eval.evaluate(&sma_instance(Some("portfolio")), &update).unwrap();
        assert_eq!(s.order_kind, OrderKind::Open);
        assert_eq!(s.quantity, 1);
    }

    #[test]
    fn close_runs_when_open_is_silent() {
        let source = source_with(&[10.0, 10.0, 10.0, 10.0]);
        let update = update_at(&source);
        let state = StateStore::in_memory();
        state
            .set_position("DU1", "ES", SecurityType::Future, 2)
            .unwrap();
        let eval = Evaluator::new(source, state, Arc::new(AlwaysOpen));
        let s = eval.evaluate(&sma_instance(Some("portfolio")), &update).unwrap();
        assert_eq!(s.order_kind, OrderKind::Close);
        assert_eq!(s.quantity, -2);
    }

    #[test]
    fn no_close_configured_is_silent() {
        let source = source_with(&[10.0, 10.0, 10.0, 10.0]);
        let update = update_at(&source);
        let eval = Evaluator::new(source, StateStore::in_memory(), Arc::new(AlwaysOpen));
        assert!(eval.evaluate(&sma_instance(None), &update).is_none());
    }

    #[test]
    fn short_history_is_silent() {
        let source = source_with(&[10.0, 7.0]);
        let update = update_at(&source);
        let eval = Evaluator::new(source, StateStore::in_memory(), Arc::new(AlwaysOpen));
        assert!(eval.evaluate(&sma_instance(None), &update).is_none());
    }

    #[test]
    fn closed_market_is_silent() {
        let source = source_with(&[10.0, 10.0, 10.0, 7.0]);
        let mut update = update_at(&source);
        // Saturday noon, Eastern.
        update.timestamp = DateTime::parse_from_rfc3339("2024-01-06T12:00:00-05:00").unwrap();
        let eval = Evaluator::new(
            source,
            StateStore::in_memory(),
            Arc::new(SessionTable::us_default(false)),
        );
        assert!(eval.evaluate(&sma_instance(None), &update).is_none());
    }

    #[test]
    fn unreadable_bars_degrade_to_nothing() {
        let update = BarUpdate {
            symbol: "ES".into(),
            security_type: SecurityType::Future,
            timestamp: DateTime::parse_from_rfc3339("2024-01-03T10:00:00-05:00").unwrap(),
            quote: None,
        };
        let eval = Evaluator::new(
            Arc::new(BrokenBars),
            StateStore::in_memory(),
            Arc::new(AlwaysOpen),
        );
        assert!(eval.evaluate(&sma_instance(None), &update).is_none());
    }

    #[test]
    fn out_of_order_window_is_rejected() {
        let source = Arc::new(MemoryBarSource::new(10));
        let mut bars = make_bars(&[10.0, 10.0, 10.0, 7.0]);
        bars.swap(1, 2);
        for bar in bars {
            source.push("ES", SecurityType::Future, bar);
        }
        let update = update_at(&source);
        let eval = Evaluator::new(source, StateStore::in_memory(), Arc::new(AlwaysOpen));
        assert!(eval.evaluate(&sma_instance(None), &update).is_none());
    }
}
