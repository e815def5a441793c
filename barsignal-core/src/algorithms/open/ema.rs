//! EMA band: enter when the live quote crosses a band around the cached EMA.
//!
//! BUY when ask <= benchmark * (1 - buyMargin), SELL when
//! bid >= benchmark * (1 + sellMargin). The benchmark is the EMA the feed
//! keeps in the shared cache; on a cache miss it is computed from the window.

use crate::algorithms::{EvalContext, OpenAlgorithm};
use crate::domain::{Quote, Side, Signal};
use crate::indicators::latest_ema;
use crate::margin::MarginParams;
use crate::volatility::VolatilityCurve;

use super::{band_side, band_thresholds, EntryRules};

#[derive(Debug, Clone)]
pub struct EmaBand {
    pub span: usize,
    pub margin: MarginParams,
    pub curve: VolatilityCurve,
    pub rules: EntryRules,
    /// Good-till-date horizon attached to entries.
    pub gtd_secs: Option<u64>,
}

impl EmaBand {
    pub fn new(
        span: usize,
        margin: MarginParams,
        curve: VolatilityCurve,
        rules: EntryRules,
        gtd_secs: Option<u64>,
    ) -> Self {
        assert!(span >= 1, "EMA span must be >= 1");
        Self {
            span,
            margin,
            curve,
            rules,
            gtd_secs,
        }
    }

    fn benchmark(&self, ctx: &EvalContext<'_>) -> Option<f64> {
        match ctx
            .state
            .cached_ema(&ctx.key.symbol, ctx.key.security_type, self.span)
        {
            Ok(Some(v)) => Some(v),
            Ok(None) => latest_ema(&ctx.window.vwaps(), self.span),
            Err(err) => {
                tracing::warn!(key = %ctx.key, error = %err, "cached EMA unreadable; no signal");
                None
            }
        }
    }
}

impl OpenAlgorithm for EmaBand {
    fn name(&self) -> &str {
        "ema"
    }

    fn required_bars(&self) -> usize {
        self.span
    }

    fn evaluate(&self, ctx: &EvalContext<'_>) -> Option<Signal> {
        if ctx.window.len() < self.span {
            return None;
        }
        let Some(quote) = ctx.quote.filter(Quote::is_valid) else {
            tracing::debug!(key = %ctx.key, "no usable quote");
            return None;
        };

        let benchmark = self.benchmark(ctx)?;
        let thresholds = band_thresholds(ctx, &self.margin, &self.curve, benchmark);
        let side = band_side(quote.ask, quote.bid, &thresholds)?;
        let price = match side {
            Side::Buy => quote.ask,
            Side::Sell => quote.bid,
        };

        self.rules
            .try_enter(ctx, side, price, self.name())
            .map(|s| s.with_time_in_force(self.gtd_secs))
    }
}
