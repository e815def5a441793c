//! Entry algorithms: SMA and EMA benchmark bands, and the DMA crossover.

pub mod dma;
pub mod ema;
pub mod guard;
pub mod sma;

pub use dma::{DmaCross, WilliamsGate};
pub use ema::EmaBand;
pub use guard::{EntryRules, GuardBlock};
pub use sma::SmaBand;

use crate::algorithms::EvalContext;
use crate::domain::Side;
use crate::margin::{MarginParams, Thresholds};
use crate::volatility::{window_volatility, VolatilityCurve};

/// Benchmark-relative thresholds for the current position and volatility.
pub(crate) fn band_thresholds(
    ctx: &EvalContext<'_>,
    margin: &MarginParams,
    curve: &VolatilityCurve,
    benchmark: f64,
) -> Thresholds {
    let prior_session = ctx
        .state
        .session_range(&ctx.key.symbol, ctx.key.security_type)
        .unwrap_or_else(|err| {
            tracing::warn!(key = %ctx.key, error = %err, "session range unreadable; window range only");
            None
        });
    let multiplier = curve.multiplier(window_volatility(ctx.window, prior_session));
    margin
        .margins_for(ctx.position, ctx.key.security_type, multiplier)
        .thresholds(benchmark)
}

/// Which side, if any, a price pair crosses: `buy_price` at or under the buy
/// threshold, else `sell_price` at or over the sell threshold.
pub(crate) fn band_side(buy_price: f64, sell_price: f64, thresholds: &Thresholds) -> Option<Side> {
    if buy_price <= thresholds.buy {
        Some(Side::Buy)
    } else if sell_price >= thresholds.sell {
        Some(Side::Sell)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_side_prefers_buy() {
        let t = Thresholds {
            buy: 95.0,
            sell: 105.0,
        };
        assert_eq!(band_side(95.0, 95.0, &t), Some(Side::Buy));
        assert_eq!(band_side(100.0, 105.0, &t), Some(Side::Sell));
        assert_eq!(band_side(100.0, 100.0, &t), None);
    }
}
