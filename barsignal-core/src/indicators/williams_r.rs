//! Williams %R.
//!
//! %R[t] = (HH - close[t]) / (HH - LL) * -100 over the trailing `period` bars,
//! where HH/LL are the highest high and lowest low. Range [-100, 0].
//! Lookback: period - 1. A flat range reads as the midpoint, -50.

pub fn williams_r(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Vec<f64> {
    let n = close.len().min(high.len()).min(low.len());
    let mut result = vec![f64::NAN; n];
    if period == 0 || n < period {
        return result;
    }

    for (i, out) in result.iter_mut().enumerate().skip(period - 1) {
        let start = i + 1 - period;
        let hh = high[start..=i].iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let ll = low[start..=i].iter().copied().fold(f64::INFINITY, f64::min);
        if hh.is_nan() || ll.is_nan() || close[i].is_nan() {
            continue;
        }
        let range = hh - ll;
        *out = if range <= 0.0 {
            -50.0
        } else {
            (hh - close[i]) / range * -100.0
        };
    }
    result
}
