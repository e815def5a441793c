//! Dual moving average crossover with optional trend and Williams %R gates.
//!
//! fast/slow are rolling means of vwap; values are read `d`, `d + 1` and
//! `d + 2` bars back (`*0`, `*1`, `*2`) where `d` is the configured delay.
//!
//! Long entry needs both:
//! - a fresh gold cross: f1 > s1 && f2 <= s2
//! - the cross holding without fading: f0 > s0 && (f0 - s0) >= (f1 - s1)
//!
//! Short entry is symmetric. A position whose cross has reversed
//! (long with f1 < s1, short with f1 > s1) is flattened without consulting
//! the gates.

use serde::{Deserialize, Serialize};

use crate::algorithms::{EvalContext, OpenAlgorithm};
use crate::domain::{Side, Signal};
use crate::indicators::{rolling_mean, value_back, williams_r};

use super::EntryRules;

/// Williams %R entry filter: longs need %R >= `long_min`, shorts need
/// %R <= `short_max`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WilliamsGate {
    pub period: usize,
    pub long_min: f64,
    pub short_max: f64,
}

#[derive(Debug, Clone)]
pub struct DmaCross {
    pub fast_period: usize,
    pub slow_period: usize,
    /// 0 disables the trend gate.
    pub trend_period: usize,
    pub delay_bars: usize,
    pub williams: Option<WilliamsGate>,
    pub rules: EntryRules,
}

/// Fast/slow values at the three read points.
#[derive(Debug, Clone, Copy)]
struct CrossPoints {
    f0: f64,
    f1: f64,
    f2: f64,
    s0: f64,
    s1: f64,
    s2: f64,
}

impl CrossPoints {
    fn fresh_gold(&self) -> bool {
        self.f1 > self.s1 && self.f2 <= self.s2
    }

    fn holding_gold(&self) -> bool {
        self.f0 > self.s0 && (self.f0 - self.s0) >= (self.f1 - self.s1)
    }

    fn fresh_death(&self) -> bool {
        self.f1 < self.s1 && self.f2 >= self.s2
    }

    fn holding_death(&self) -> bool {
        self.f0 < self.s0 && (self.s0 - self.f0) >= (self.s1 - self.f1)
    }
}

impl DmaCross {
    pub fn new(
        fast_period: usize,
        slow_period: usize,
        trend_period: usize,
        delay_bars: usize,
        williams: Option<WilliamsGate>,
        rules: EntryRules,
    ) -> Self {
        assert!(fast_period >= 1, "fast_period must be >= 1");
        assert!(
            slow_period > fast_period,
            "slow_period must be > fast_period"
        );
        if let Some(gate) = &williams {
            assert!(gate.period >= 1, "williams period must be >= 1");
        }
        Self {
            fast_period,
            slow_period,
            trend_period,
            delay_bars,
            williams,
            rules,
        }
    }

    /// Bars per delay from a delay in seconds and the bar length.
    pub fn delay_bars_for(delay_secs: u64, bar_secs: u64) -> usize {
        if bar_secs == 0 {
            0
        } else {
            (delay_secs / bar_secs) as usize
        }
    }

    fn cross_points(&self, vwaps: &[f64]) -> Option<CrossPoints> {
        let fast = rolling_mean(vwaps, self.fast_period);
        let slow = rolling_mean(vwaps, self.slow_period);
        let d = self.delay_bars;
        Some(CrossPoints {
            f0: value_back(&fast, d)?,
            f1: value_back(&fast, d + 1)?,
            f2: value_back(&fast, d + 2)?,
            s0: value_back(&slow, d)?,
            s1: value_back(&slow, d + 1)?,
            s2: value_back(&slow, d + 2)?,
        })
    }

    fn trend_allows(&self, side: Side, vwaps: &[f64], slow0: f64) -> bool {
        if self.trend_period == 0 {
            return true;
        }
        let Some(trend0) = value_back(&rolling_mean(vwaps, self.trend_period), self.delay_bars)
        else {
            return false;
        };
        match side {
            Side::Buy => slow0 > trend0,
            Side::Sell => slow0 < trend0,
        }
    }

    fn williams_allows(&self, side: Side, ctx: &EvalContext<'_>) -> bool {
        let Some(gate) = &self.williams else {
            return true;
        };
        let series = williams_r(
            &ctx.window.highs(),
            &ctx.window.lows(),
            &ctx.window.closes(),
            gate.period,
        );
        let Some(wr) = value_back(&series, self.delay_bars) else {
            return false;
        };
        match side {
            Side::Buy => wr >= gate.long_min,
            Side::Sell => wr <= gate.short_max,
        }
    }
}

impl OpenAlgorithm for DmaCross {
    fn name(&self) -> &str {
        "dma"
    }

    fn required_bars(&self) -> usize {
        let longest = self
            .slow_period
            .max(self.trend_period)
            .max(self.williams.map_or(0, |g| g.period));
        longest + self.delay_bars + 2
    }

    fn evaluate(&self, ctx: &EvalContext<'_>) -> Option<Signal> {
        if ctx.window.len() < self.required_bars() {
            return None;
        }
        let vwaps = ctx.window.vwaps();
        let p = self.cross_points(&vwaps)?;

        let reversed = (ctx.position > 0 && p.f1 < p.s1) || (ctx.position < 0 && p.f1 > p.s1);
        if reversed {
            tracing::debug!(key = %ctx.key, position = ctx.position, "cross reversed; closing");
            ctx.forget_last_action();
            return Some(ctx.flatten(self.name()));
        }

        let side = if p.fresh_gold() && p.holding_gold() {
            Side::Buy
        } else if p.fresh_death() && p.holding_death() {
            Side::Sell
        } else {
            return None;
        };

        if !self.trend_allows(side, &vwaps, p.s0) {
            tracing::debug!(key = %ctx.key, ?side, "cross rejected by trend gate");
            return None;
        }
        if !self.williams_allows(side, ctx) {
            tracing::debug!(key = %ctx.key, ?side, "cross rejected by williams %R gate");
            return None;
        }

        self.rules
            .try_enter(ctx, side, ctx.window.latest().vwap, self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::test_support::{ctx, key, window};
    use crate::domain::OrderKind;
    use crate::store::StateStore;

    fn rules() -> EntryRules {
        EntryRules {
            order_size: 1,
            max_position: 5,
            hard_limit_fraction: 1.0,
            min_interval_secs: 0,
        }
    }

    fn dma() -> DmaCross {
        DmaCross::new(2, 4, 0, 0, None, rules())
    }

    // Flat then rising: fast crosses slow between bars 4 and 5.
    const RISING: [f64; 7] = [10.0, 10.0, 10.0, 10.0, 10.0, 11.0, 12.0];

    #[test]
    fn gold_cross_buys() {
        let k = key();
        let w = window(&RISING);
        let store = StateStore::in_memory();
        let s = dma().evaluate(&ctx(&k, &w, 0, &store)).unwrap();
        assert_eq!(s.quantity, 1);
        assert_eq!(s.order_kind, OrderKind::Open);
        assert_eq!(s.algorithm, "dma");
    }

    #[test]
    fn stale_cross_does_not_reenter() {
        let k = key();
        let w = window(&[10.0, 10.0, 10.0, 10.0, 10.0, 11.0, 12.0, 13.0]);
        let store = StateStore::in_memory();
        assert!(dma().evaluate(&ctx(&k, &w, 0, &store)).is_none());
    }

    #[test]
    fn death_cross_sells() {
        let k = key();
        let w = window(&[10.0, 10.0, 10.0, 10.0, 10.0, 9.0, 8.0]);
        let store = StateStore::in_memory();
        let s = dma().evaluate(&ctx(&k, &w, 0, &store)).unwrap();
        assert_eq!(s.quantity, -1);
    }

    #[test]
    fn reversed_long_is_flattened() {
        let k = key();
        let w = window(&[10.0, 10.0, 10.0, 10.0, 10.0, 9.0, 8.0]);
        let store = StateStore::in_memory();
        let s = dma().evaluate(&ctx(&k, &w, 3, &store)).unwrap();
        assert_eq!(s.order_kind, OrderKind::Close);
        assert_eq!(s.quantity, -3);
    }

    #[test]
    fn trend_gate_blocks_counter_trend_long() {
        // Long-run decline then a short bounce: slow stays under the 8-bar trend.
        let k = key();
        let w = window(&[20.0, 18.0, 16.0, 14.0, 10.0, 10.0, 10.0, 10.0, 10.0, 11.0, 12.0]);
        let store = StateStore::in_memory();
        let gated = DmaCross::new(2, 4, 8, 0, None, rules());
        assert!(gated.evaluate(&ctx(&k, &w, 0, &store)).is_none());
        assert!(dma().evaluate(&ctx(&k, &w, 0, &store)).is_some());
    }

    #[test]
    fn williams_gate_blocks_weak_close() {
        let k = key();
        let mut bars = crate::indicators::make_bars(&RISING);
        // Latest bar closes at the lowest low of the lookback: %R = -100.
        let last = bars.len() - 1;
        bars[last].low = 9.0;
        bars[last].close = 9.0;
        let w = crate::domain::BarWindow::new(bars).unwrap();
        let store = StateStore::in_memory();
        let gate = WilliamsGate {
            period: 3,
            long_min: -50.0,
            short_max: -50.0,
        };
        let gated = DmaCross::new(2, 4, 0, 0, Some(gate), rules());
        assert!(gated.evaluate(&ctx(&k, &w, 0, &store)).is_none());
    }

    #[test]
    fn delay_shifts_read_points() {
        // With one bar of delay the cross must sit one bar further back.
        let k = key();
        let w = window(&[10.0, 10.0, 10.0, 10.0, 10.0, 11.0, 12.0, 13.0]);
        let store = StateStore::in_memory();
        let delayed = DmaCross::new(2, 4, 0, 1, None, rules());
        assert_eq!(delayed.required_bars(), 7);
        assert!(delayed.evaluate(&ctx(&k, &w, 0, &store)).is_some());
    }

    #[test]
    fn short_window_is_silent() {
        let k = key();
        let w = window(&[10.0, 10.0, 11.0, 12.0, 13.0]);
        let store = StateStore::in_memory();
        assert!(dma().evaluate(&ctx(&k, &w, 0, &store)).is_none());
    }

    #[test]
    fn delay_bars_from_seconds() {
        assert_eq!(DmaCross::delay_bars_for(300, 60), 5);
        assert_eq!(DmaCross::delay_bars_for(90, 60), 1);
        assert_eq!(DmaCross::delay_bars_for(90, 0), 0);
    }

    #[test]
    #[should_panic(expected = "slow_period must be > fast_period")]
    fn slow_not_above_fast_panics() {
        DmaCross::new(4, 4, 0, 0, None, rules());
    }
}
