//! SMA band: enter when the bar vwap strays outside a band around its own
//! simple moving average.
//!
//! BUY when vwap <= benchmark * (1 - buyMargin), SELL when
//! vwap >= benchmark * (1 + sellMargin).
//!
//! The action state is per session. The evaluator only runs for in-session
//! events, so a newest stored bar outside the session means the bar feed is
//! lagging the event: the state is cleared and nothing signals. The first
//! bar after a session break also starts from a cleared state.

use crate::algorithms::{EvalContext, OpenAlgorithm};
use crate::domain::Signal;
use crate::indicators::{rolling_mean, value_back};
use crate::margin::MarginParams;
use crate::volatility::VolatilityCurve;

use super::{band_side, band_thresholds, EntryRules};

#[derive(Debug, Clone)]
pub struct SmaBand {
    pub num_stats_bars: usize,
    pub margin: MarginParams,
    pub curve: VolatilityCurve,
    pub rules: EntryRules,
}

impl SmaBand {
    pub fn new(
        num_stats_bars: usize,
        margin: MarginParams,
        curve: VolatilityCurve,
        rules: EntryRules,
    ) -> Self {
        assert!(num_stats_bars >= 1, "num_stats_bars must be >= 1");
        Self {
            num_stats_bars,
            margin,
            curve,
            rules,
        }
    }
}

impl OpenAlgorithm for SmaBand {
    fn name(&self) -> &str {
        "sma"
    }

    fn required_bars(&self) -> usize {
        self.num_stats_bars
    }

    fn evaluate(&self, ctx: &EvalContext<'_>) -> Option<Signal> {
        if ctx.window.len() < self.num_stats_bars {
            return None;
        }

        let latest = ctx.window.latest();
        if !ctx.in_session(latest.timestamp) {
            tracing::debug!(key = %ctx.key, bar = %latest.timestamp, "bar outside session; action state cleared");
            ctx.forget_last_action();
            return None;
        }
        if ctx.starts_new_session() {
            tracing::debug!(key = %ctx.key, bar = %latest.timestamp, "first bar of a new session; action state cleared");
            ctx.forget_last_action();
        }

        let benchmark = value_back(&rolling_mean(&ctx.window.vwaps(), self.num_stats_bars), 0)?;
        let thresholds = band_thresholds(ctx, &self.margin, &self.curve, benchmark);
        let side = band_side(latest.vwap, latest.vwap, &thresholds)?;

        self.rules.try_enter(ctx, side, latest.vwap, self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::test_support::{ctx, key, window};
    use crate::domain::{ActionState, LastAction, OrderKind, Side};
    use crate::store::StateStore;

    fn sma(n: usize) -> SmaBand {
        SmaBand::new(
            n,
            MarginParams::new(0.05, 0.0),
            VolatilityCurve::flat(),
            EntryRules {
                order_size: 3,
                max_position: 10,
                hard_limit_fraction: 1.0,
                min_interval_secs: 300,
            },
        )
    }

    #[test]
    fn dip_below_band_buys() {
        // benchmark = mean(10, 10, 7) = 9; buy threshold = 8.55
        let k = key();
        let w = window(&[10.0, 10.0, 10.0, 7.0]);
        let store = StateStore::in_memory();
        let signal = sma(3).evaluate(&ctx(&k, &w, 0, &store)).unwrap();
        assert_eq!(signal.quantity, 3);
        assert_eq!(signal.order_kind, OrderKind::Open);
        assert_eq!(signal.reference_price, 7.0);
        assert_eq!(signal.algorithm, "sma");
        assert_eq!(
            store.last_action(&k).unwrap().value.last_action,
            LastAction::Buy
        );
    }

    #[test]
    fn spike_above_band_sells() {
        let k = key();
        let w = window(&[10.0, 10.0, 10.0, 13.0]);
        let store = StateStore::in_memory();
        let signal = sma(3).evaluate(&ctx(&k, &w, 0, &store)).unwrap();
        assert_eq!(signal.quantity, -3);
    }

    #[test]
    fn inside_band_is_silent() {
        let k = key();
        let w = window(&[10.0, 10.0, 10.0, 10.1]);
        let store = StateStore::in_memory();
        assert!(sma(3).evaluate(&ctx(&k, &w, 0, &store)).is_none());
        assert!(!store.last_action(&k).unwrap().is_present());
    }

    #[test]
    fn short_window_is_silent() {
        let k = key();
        let w = window(&[10.0, 5.0]);
        let store = StateStore::in_memory();
        assert!(sma(3).evaluate(&ctx(&k, &w, 0, &store)).is_none());
    }

    #[test]
    fn repeat_buy_within_interval_is_debounced() {
        let k = key();
        let w = window(&[10.0, 10.0, 10.0, 7.0]);
        let store = StateStore::in_memory();
        store
            .set_last_action(&k, &ActionState::fired(Side::Buy, w.latest().timestamp))
            .unwrap();
        assert!(sma(3).evaluate(&ctx(&k, &w, 0, &store)).is_none());
    }

    #[test]
    fn new_session_starts_from_cleared_action_state() {
        use crate::calendar::SessionTable;
        use crate::domain::{Bar, BarWindow};
        use chrono::DateTime;

        let at = |ts: &str| DateTime::parse_from_rfc3339(ts).unwrap();
        // Friday close, then the Sunday evening futures open.
        let bars: Vec<Bar> = [
            ("2024-01-12T16:57:00-05:00", 10.0),
            ("2024-01-12T16:58:00-05:00", 10.0),
            ("2024-01-12T16:59:00-05:00", 10.0),
            ("2024-01-14T18:00:00-05:00", 7.0),
        ]
        .iter()
        .map(|&(ts, vwap)| Bar {
            timestamp: at(ts),
            vwap,
            volatility: 0.0,
            high: vwap,
            low: vwap,
            close: vwap,
            volume: 10,
        })
        .collect();
        let w = BarWindow::new(bars).unwrap();
        let k = key();
        let store = StateStore::in_memory();
        store
            .set_last_action(&k, &ActionState::fired(Side::Buy, at("2024-01-12T16:59:00-05:00")))
            .unwrap();

        let mut algo = sma(3);
        algo.rules.min_interval_secs = 3 * 24 * 3600;
        let calendar = SessionTable::us_default(false);
        let c = EvalContext {
            calendar: &calendar,
            ..ctx(&k, &w, 0, &store)
        };
        assert!(c.starts_new_session());
        let signal = algo.evaluate(&c).expect("debounce reset by the new session");
        assert_eq!(signal.quantity, 3);
    }

    #[test]
    #[should_panic(expected = "num_stats_bars must be >= 1")]
    fn zero_bars_panics() {
        sma(0);
    }
}
