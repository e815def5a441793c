//! Indicator library over plain `f64` series.
//!
//! All functions are pure: equal inputs give bit-identical outputs. Missing
//! values are `f64::NAN`, both for warm-up positions and for propagated gaps.

pub mod ema;
pub mod rolling;
pub mod williams_r;

pub use ema::{latest_ema, seeded_ema, span_alpha};
pub use rolling::{lag, rolling_mean, value_back};
pub use williams_r::williams_r;

/// Create one-minute bars from vwap values for testing.
///
/// high = vwap + 0.5, low = vwap - 0.5, close = vwap, volatility = 0.0.
#[cfg(test)]
pub fn make_bars(vwaps: &[f64]) -> Vec<crate::domain::Bar> {
    use chrono::{FixedOffset, TimeZone};
    let base = FixedOffset::west_opt(5 * 3600)
        .unwrap()
        .with_ymd_and_hms(2024, 1, 3, 10, 0, 0)
        .unwrap();
    vwaps
        .iter()
        .enumerate()
        .map(|(i, &vwap)| crate::domain::Bar {
            timestamp: base + chrono::Duration::minutes(i as i64),
            vwap,
            volatility: 0.0,
            high: vwap + 0.5,
            low: vwap - 0.5,
            close: vwap,
            volume: 1000,
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
