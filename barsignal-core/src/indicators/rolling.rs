//! Rolling mean and lag over a plain `f64` series.
//!
//! Rolling mean: MEAN[i] = mean(series[i - window + 1 ..= i])
//! Lookback: window - 1. Any NaN inside a window makes that output NaN.

/// Mean of the trailing `window` values ending at each index.
///
/// Entries before the first full window are NaN; a zero window yields an
/// all-NaN series.
pub fn rolling_mean(series: &[f64], window: usize) -> Vec<f64> {
    let n = series.len();
    let mut result = vec![f64::NAN; n];
    if window == 0 || n < window {
        return result;
    }

    for (i, out) in result.iter_mut().enumerate().skip(window - 1) {
        let slice = &series[i + 1 - window..=i];
        if slice.iter().any(|v| v.is_nan()) {
            continue;
        }
        *out = slice.iter().sum::<f64>() / window as f64;
    }
    result
}

/// Shift `series` forward by `k` positions; the first `k` entries are NaN.
pub fn lag(series: &[f64], k: usize) -> Vec<f64> {
    let n = series.len();
    let mut result = vec![f64::NAN; n];
    if k >= n {
        return result;
    }
    result[k..].copy_from_slice(&series[..n - k]);
    result
}

/// Value `k` positions back from the end of `series`, if it exists and is not NaN.
pub fn value_back(series: &[f64], k: usize) -> Option<f64> {
    let idx = series.len().checked_sub(k + 1)?;
    let v = series[idx];
    (!v.is_nan()).then_some(v)
}
