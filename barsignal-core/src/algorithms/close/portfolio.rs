//! Portfolio flatten: close the whole position.
//!
//! With `close_window_secs == 0` it fires whenever a position exists;
//! otherwise only inside the last `close_window_secs` of the session.

use crate::algorithms::{CloseAlgorithm, EvalContext};
use crate::domain::Signal;

#[derive(Debug, Clone, Default)]
pub struct PortfolioFlatten {
    pub close_window_secs: i64,
}

impl PortfolioFlatten {
    pub fn new(close_window_secs: i64) -> Self {
        Self { close_window_secs }
    }
}

impl CloseAlgorithm for PortfolioFlatten {
    fn name(&self) -> &str {
        "portfolio"
    }

    fn evaluate(&self, ctx: &EvalContext<'_>) -> Option<Signal> {
        if ctx.position == 0 {
            return None;
        }
        if self.close_window_secs > 0
            && !ctx.calendar.is_close_to_closing(
                &ctx.key.symbol,
                ctx.key.security_type,
                ctx.now,
                self.close_window_secs,
            )
        {
            return None;
        }
        ctx.forget_last_action();
        Some(ctx.flatten(self.name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::test_support::{ctx, key, window};
    use crate::domain::{ActionState, OrderKind, Side};
    use crate::store::StateStore;

    #[test]
    fn flattens_any_position() {
        let k = key();
        let w = window(&[10.0, 11.0]);
        let store = StateStore::in_memory();
        store
            .set_last_action(&k, &ActionState::fired(Side::Buy, w.latest().timestamp))
            .unwrap();
        let s = PortfolioFlatten::default()
            .evaluate(&ctx(&k, &w, -7, &store))
            .unwrap();
        assert_eq!(s.quantity, 7);
        assert_eq!(s.order_kind, OrderKind::Close);
        assert_eq!(s.reference_price, 11.0);
        assert!(!store.last_action(&k).unwrap().is_present());
    }

    #[test]
    fn flat_book_is_silent() {
        let k = key();
        let w = window(&[10.0]);
        let store = StateStore::in_memory();
        assert!(PortfolioFlatten::default()
            .evaluate(&ctx(&k, &w, 0, &store))
            .is_none());
    }

    #[test]
    fn close_window_needs_calendar_agreement() {
        // AlwaysOpen is never close to closing.
        let k = key();
        let w = window(&[10.0]);
        let store = StateStore::in_memory();
        assert!(PortfolioFlatten::new(300)
            .evaluate(&ctx(&k, &w, 2, &store))
            .is_none());
    }
}
