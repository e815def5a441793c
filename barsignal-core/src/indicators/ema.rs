//! Seeded exponential smoothing.
//!
//! Seed: EMA[seed - 1] = mean(series[0..seed]).
//! Recursive: EMA[t] = series[t] * alpha + EMA[t-1] * (1 - alpha), with a NaN
//! predecessor read as 0.
//! Lookback: seed - 1.

/// Smoothing factor for an EMA of the given span: `2 / (span + 1)`.
pub fn span_alpha(span: usize) -> f64 {
    2.0 / (span as f64 + 1.0)
}

/// Exponentially smooth `series`, seeding with the simple mean of the first
/// `seed_window` values.
///
/// Entries before the seed point are NaN. A NaN predecessor (for instance a
/// seed window that itself contained NaN) is treated as zero.
pub fn seeded_ema(series: &[f64], alpha: f64, seed_window: usize) -> Vec<f64> {
    let n = series.len();
    let mut result = vec![f64::NAN; n];
    if seed_window == 0 || n < seed_window {
        return result;
    }

    let seed = series[..seed_window].iter().sum::<f64>() / seed_window as f64;
    result[seed_window - 1] = seed;

    let mut prev = seed;
    for i in seed_window..n {
        let base = if prev.is_nan() { 0.0 } else { prev };
        let value = series[i] * alpha + base * (1.0 - alpha);
        result[i] = value;
        prev = value;
    }
    result
}

/// Latest seeded EMA of `series` for `span`, or `None` when the series is too
/// short or the result is NaN.
pub fn latest_ema(series: &[f64], span: usize) -> Option<f64> {
    let values = seeded_ema(series, span_alpha(span), span);
    values.last().copied().filter(|v| !v.is_nan())
}
