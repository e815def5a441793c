//! Volatility model: turns a windowed high/low spread into a bounded ratio,
//! and the ratio into a margin multiplier.
//!
//! ratio      = (max(prevMax, currMax) - min(prevMin, currMin)) / min(prevMin, currMin)
//! multiplier = 1 + a + b*v + c*v^2

use serde::{Deserialize, Serialize};

use crate::domain::{Bar, BarWindow};

/// Default upper bound for the volatility ratio.
pub const DEFAULT_RATIO_CAP: f64 = 1.0;

/// High/low extremes of a span of bars.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    pub max: f64,
    pub min: f64,
}

impl PriceRange {
    pub fn new(max: f64, min: f64) -> Self {
        Self { max, min }
    }

    /// Extremes over `bars`, ignoring NaN highs/lows. `None` for an empty or
    /// all-NaN slice.
    pub fn of_bars(bars: &[Bar]) -> Option<Self> {
        let max = bars
            .iter()
            .map(|b| b.high)
            .filter(|v| !v.is_nan())
            .fold(f64::NEG_INFINITY, f64::max);
        let min = bars
            .iter()
            .map(|b| b.low)
            .filter(|v| !v.is_nan())
            .fold(f64::INFINITY, f64::min);
        (max.is_finite() && min.is_finite()).then_some(Self { max, min })
    }

    /// The smallest range covering both.
    pub fn merge(self, other: PriceRange) -> PriceRange {
        PriceRange {
            max: self.max.max(other.max),
            min: self.min.min(other.min),
        }
    }
}

/// Spread of the combined extremes relative to the combined minimum, bounded
/// to `[0, cap]`.
///
/// A non-positive minimum is replaced by `current_price` as the denominator.
/// Returns 0 when no usable denominator exists.
pub fn volatility_ratio(
    prev: Option<PriceRange>,
    curr: PriceRange,
    current_price: f64,
    cap: f64,
) -> f64 {
    let range = match prev {
        Some(p) => p.merge(curr),
        None => curr,
    };
    let denominator = if range.min > 0.0 {
        range.min
    } else {
        current_price
    };
    if denominator <= 0.0 || !denominator.is_finite() {
        return 0.0;
    }
    let ratio = (range.max - range.min) / denominator;
    if ratio.is_nan() {
        return 0.0;
    }
    ratio.clamp(0.0, cap.max(0.0))
}

/// Volatility of the newest bar in `window`: the feed-supplied ratio when
/// present, otherwise the ratio of the window's price range merged with the
/// prior session's range, if known.
pub fn window_volatility(window: &BarWindow, prior_session: Option<PriceRange>) -> f64 {
    let latest = window.latest();
    if latest.has_volatility() {
        return latest.volatility;
    }
    match PriceRange::of_bars(window.bars()) {
        Some(range) => volatility_ratio(prior_session, range, latest.vwap, DEFAULT_RATIO_CAP),
        None => 0.0,
    }
}

/// Quadratic mapping from volatility ratio to margin multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolatilityCurve {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl VolatilityCurve {
    pub fn new(a: f64, b: f64, c: f64) -> Self {
        Self { a, b, c }
    }

    /// The curve that always yields 1.0.
    pub fn flat() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// `1 + a + b*v + c*v^2`, floored at zero. A non-finite `v` reads as 0.
    pub fn multiplier(&self, v: f64) -> f64 {
        let v = if v.is_finite() { v } else { 0.0 };
        let m = 1.0 + self.a + self.b * v + self.c * v * v;
        if m.is_finite() {
            m.max(0.0)
        } else {
            1.0
        }
    }
}

impl Default for VolatilityCurve {
    fn default() -> Self {
        Self::flat()
    }
}
