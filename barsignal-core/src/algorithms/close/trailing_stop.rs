//! Trailing stop on the most recent order.
//!
//! Active only while `min_duration_secs <= now - last_order <= max_duration_secs`.
//! Long: fire when vwap <= maxPrice * (1 - threshold).
//! Short: fire when vwap >= minPrice * (1 + threshold).
//! The close offsets the last order's quantity, never more than the position.

use crate::algorithms::{CloseAlgorithm, EvalContext};
use crate::domain::Signal;

#[derive(Debug, Clone)]
pub struct TrailingStop {
    pub threshold: f64,
    pub min_duration_secs: i64,
    pub max_duration_secs: i64,
}

impl TrailingStop {
    pub fn new(threshold: f64, min_duration_secs: i64, max_duration_secs: i64) -> Self {
        assert!(
            threshold > 0.0 && threshold < 1.0,
            "trailing threshold must be in (0, 1)"
        );
        assert!(
            max_duration_secs >= min_duration_secs,
            "max_duration_secs must be >= min_duration_secs"
        );
        Self {
            threshold,
            min_duration_secs,
            max_duration_secs,
        }
    }
}

impl CloseAlgorithm for TrailingStop {
    fn name(&self) -> &str {
        "trailing_stop"
    }

    fn evaluate(&self, ctx: &EvalContext<'_>) -> Option<Signal> {
        if ctx.position == 0 {
            return None;
        }

        let history = match ctx.state.order_history(ctx.key) {
            Ok(h) => h,
            Err(err) => {
                tracing::warn!(key = %ctx.key, error = %err, "order history unreadable; no signal");
                return None;
            }
        };
        let last = history.last()?;
        let extremes = match ctx.state.price_extremes(ctx.key) {
            Ok(e) => e?,
            Err(err) => {
                tracing::warn!(key = %ctx.key, error = %err, "price extremes unreadable; no signal");
                return None;
            }
        };

        let elapsed = (ctx.now - last.timestamp).num_seconds();
        if elapsed < self.min_duration_secs || elapsed > self.max_duration_secs {
            return None;
        }

        let price = ctx.window.latest().vwap;
        let quantity = if ctx.position > 0 {
            if last.quantity <= 0 || price > extremes.max_price * (1.0 - self.threshold) {
                return None;
            }
            -last.quantity.min(ctx.position)
        } else {
            if last.quantity >= 0 || price < extremes.min_price * (1.0 + self.threshold) {
                return None;
            }
            (-last.quantity).min(-ctx.position)
        };

        match ctx.state.remove_order(ctx.key, &last.order_id) {
            Ok(true) => Some(Signal::close(ctx.key, quantity, price, self.name(), ctx.now)),
            Ok(false) => {
                tracing::debug!(key = %ctx.key, order = %last.order_id, "order already offset");
                None
            }
            Err(err) => {
                tracing::warn!(key = %ctx.key, error = %err, "failed to retire offset order; no signal");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::test_support::{ctx, key, window};
    use crate::domain::{OrderRecord, PriceExtremes};
    use crate::store::StateStore;
    use chrono::Duration;

    fn stop() -> TrailingStop {
        TrailingStop::new(0.02, 60, 600)
    }

    fn seed(store: &StateStore, qty: i64, secs_ago: i64, now: chrono::DateTime<chrono::FixedOffset>, ex: PriceExtremes) {
        let k = key();
        store
            .append_order(
                &k,
                OrderRecord {
                    order_id: "o1".into(),
                    quantity: qty,
                    timestamp: now - Duration::seconds(secs_ago),
                },
            )
            .unwrap();
        store.set_price_extremes(&k, &ex).unwrap();
    }

    #[test]
    fn long_stop_fires_below_trail() {
        let k = key();
        let w = window(&[97.0]);
        let store = StateStore::in_memory();
        let c = ctx(&k, &w, 5, &store);
        seed(&store, 3, 120, c.now, PriceExtremes { max_price: 100.0, min_price: 96.0 });
        // trail = 98.0; 97 <= 98
        let s = stop().evaluate(&c).unwrap();
        assert_eq!(s.quantity, -3);
        assert!(store.order_history(&k).unwrap().is_empty());
        // The offset order is gone, so nothing fires twice.
        assert!(stop().evaluate(&c).is_none());
    }

    #[test]
    fn long_stop_holds_above_trail() {
        let k = key();
        let w = window(&[99.0]);
        let store = StateStore::in_memory();
        let c = ctx(&k, &w, 5, &store);
        seed(&store, 3, 120, c.now, PriceExtremes { max_price: 100.0, min_price: 96.0 });
        assert!(stop().evaluate(&c).is_none());
    }

    #[test]
    fn outside_duration_band_is_silent() {
        let k = key();
        let w = window(&[90.0]);
        let store = StateStore::in_memory();
        let c = ctx(&k, &w, 5, &store);
        seed(&store, 3, 30, c.now, PriceExtremes { max_price: 100.0, min_price: 90.0 });
        assert!(stop().evaluate(&c).is_none());

        let store = StateStore::in_memory();
        let c = ctx(&k, &w, 5, &store);
        seed(&store, 3, 601, c.now, PriceExtremes { max_price: 100.0, min_price: 90.0 });
        assert!(stop().evaluate(&c).is_none());
    }

    #[test]
    fn short_stop_fires_above_trail_and_clamps() {
        let k = key();
        let w = window(&[103.0]);
        let store = StateStore::in_memory();
        let c = ctx(&k, &w, -2, &store);
        seed(&store, -4, 60, c.now, PriceExtremes { max_price: 104.0, min_price: 100.0 });
        // trail = 102.0; 103 >= 102; offset 4 clamped to position 2
        let s = stop().evaluate(&c).unwrap();
        assert_eq!(s.quantity, 2);
    }

    #[test]
    fn mismatched_order_sign_is_silent() {
        let k = key();
        let w = window(&[90.0]);
        let store = StateStore::in_memory();
        let c = ctx(&k, &w, 5, &store);
        seed(&store, -3, 120, c.now, PriceExtremes { max_price: 100.0, min_price: 90.0 });
        assert!(stop().evaluate(&c).is_none());
    }

    #[test]
    fn no_history_is_silent() {
        let k = key();
        let w = window(&[90.0]);
        let store = StateStore::in_memory();
        assert!(stop().evaluate(&ctx(&k, &w, 5, &store)).is_none());
    }
}
