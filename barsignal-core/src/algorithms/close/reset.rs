//! Hard-limit reset: schedule a forced flatten once the position breaches
//! `max_position * hard_limit_fraction`, and fire it after a delay.
//!
//! - below the limit: any schedule or fired marker is cleared
//! - first breach: schedule `now + min_duration_secs`, or flatten at once if
//!   that instant falls outside the session
//! - schedule due: swap it for a fired marker and flatten
//!
//! Every flatten is claimed with a conditional write on the reset record, and
//! the fired marker is held until the position is back under the limit, so a
//! breach flattens once even while the fill is outstanding.

use chrono::Duration;

use crate::algorithms::{CloseAlgorithm, EvalContext};
use crate::domain::{ResetState, Signal};

#[derive(Debug, Clone)]
pub struct HardLimitReset {
    pub max_position: i64,
    pub hard_limit_fraction: f64,
    pub min_duration_secs: i64,
}

impl HardLimitReset {
    pub fn new(max_position: i64, hard_limit_fraction: f64, min_duration_secs: i64) -> Self {
        assert!(max_position >= 1, "max_position must be >= 1");
        Self {
            max_position,
            hard_limit_fraction,
            min_duration_secs,
        }
    }

    pub fn limit(&self) -> f64 {
        self.max_position as f64 * self.hard_limit_fraction
    }

    fn fire(&self, ctx: &EvalContext<'_>) -> Signal {
        tracing::info!(key = %ctx.key, position = ctx.position, "hard-limit reset firing");
        ctx.forget_last_action();
        ctx.flatten(self.name())
    }
}

impl CloseAlgorithm for HardLimitReset {
    fn name(&self) -> &str {
        "reset"
    }

    fn evaluate(&self, ctx: &EvalContext<'_>) -> Option<Signal> {
        let pending = match ctx.state.reset_state(ctx.key) {
            Ok(p) => p,
            Err(err) => {
                tracing::warn!(key = %ctx.key, error = %err, "reset state unreadable; no signal");
                return None;
            }
        };

        let breached = ctx.position != 0 && ctx.position.unsigned_abs() as f64 >= self.limit();
        if !breached {
            if pending.is_some() {
                tracing::debug!(key = %ctx.key, "position back under limit; reset cancelled");
                if let Err(err) = ctx.state.clear_reset(ctx.key) {
                    tracing::warn!(key = %ctx.key, error = %err, "failed to cancel reset");
                }
            }
            return None;
        }

        match pending {
            Some(held) if held.fired => {
                tracing::debug!(key = %ctx.key, fired_at = %held.reset_at, "reset already fired for this breach");
                None
            }
            None => {
                let reset_at = ctx.now + Duration::seconds(self.min_duration_secs);
                if !ctx.in_session(reset_at) {
                    return match ctx.state.schedule_reset(ctx.key, &ResetState::fired(ctx.now)) {
                        Ok(true) => Some(self.fire(ctx)),
                        Ok(false) => {
                            tracing::debug!(key = %ctx.key, "reset taken by a concurrent evaluation");
                            None
                        }
                        Err(err) => {
                            tracing::warn!(key = %ctx.key, error = %err, "failed to record reset; no signal");
                            None
                        }
                    };
                }
                match ctx.state.schedule_reset(ctx.key, &ResetState::scheduled(reset_at)) {
                    Ok(true) => {
                        tracing::info!(key = %ctx.key, %reset_at, "hard-limit reset scheduled")
                    }
                    Ok(false) => tracing::debug!(key = %ctx.key, "reset already scheduled"),
                    Err(err) => {
                        tracing::warn!(key = %ctx.key, error = %err, "failed to schedule reset")
                    }
                }
                None
            }
            Some(scheduled) if ctx.now >= scheduled.reset_at => {
                match ctx.state.complete_reset(ctx.key, &scheduled, ctx.now) {
                    Ok(true) => Some(self.fire(ctx)),
                    Ok(false) => {
                        tracing::debug!(key = %ctx.key, "reset taken by a concurrent evaluation");
                        None
                    }
                    Err(err) => {
                        tracing::warn!(key = %ctx.key, error = %err, "failed to record reset; no signal");
                        None
                    }
                }
            }
            Some(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::test_support::{ctx, key, window};
    use crate::domain::OrderKind;
    use crate::store::StateStore;

    fn reset() -> HardLimitReset {
        HardLimitReset::new(4, 1.0, 120)
    }

    #[test]
    fn below_limit_is_silent() {
        let k = key();
        let w = window(&[10.0]);
        let store = StateStore::in_memory();
        assert!(reset().evaluate(&ctx(&k, &w, 3, &store)).is_none());
        assert!(store.reset_state(&k).unwrap().is_none());
    }

    #[test]
    fn breach_schedules_then_fires_after_delay() {
        let k = key();
        let w = window(&[10.0]);
        let store = StateStore::in_memory();
        let mut c = ctx(&k, &w, 4, &store);
        let t0 = c.now;

        assert!(reset().evaluate(&c).is_none());
        let scheduled = store.reset_state(&k).unwrap().unwrap();
        assert_eq!(scheduled.reset_at, t0 + Duration::seconds(120));

        c.now = t0 + Duration::seconds(119);
        assert!(reset().evaluate(&c).is_none());

        c.now = t0 + Duration::seconds(120);
        let s = reset().evaluate(&c).unwrap();
        assert_eq!(s.quantity, -4);
        assert_eq!(s.order_kind, OrderKind::Close);
        assert_eq!(store.reset_state(&k).unwrap(), Some(ResetState::fired(c.now)));
    }

    #[test]
    fn unfilled_flatten_is_not_repeated() {
        let k = key();
        let w = window(&[10.0]);
        let store = StateStore::in_memory();
        let mut c = ctx(&k, &w, 4, &store);
        let t0 = c.now;

        assert!(reset().evaluate(&c).is_none());
        c.now = t0 + Duration::seconds(120);
        assert!(reset().evaluate(&c).is_some());

        // Position still breached: no second flatten and no new schedule.
        for secs in [180, 240, 600] {
            c.now = t0 + Duration::seconds(secs);
            assert!(reset().evaluate(&c).is_none());
        }
        assert!(store.reset_state(&k).unwrap().unwrap().fired);

        // Fill lands: the marker is dropped and the next breach schedules anew.
        assert!(reset().evaluate(&ctx(&k, &w, 0, &store)).is_none());
        assert!(store.reset_state(&k).unwrap().is_none());
        assert!(reset().evaluate(&ctx(&k, &w, 4, &store)).is_none());
        assert!(store.reset_state(&k).unwrap().unwrap().is_pending());
    }

    #[test]
    fn recovering_position_cancels_schedule() {
        let k = key();
        let w = window(&[10.0]);
        let store = StateStore::in_memory();
        assert!(reset().evaluate(&ctx(&k, &w, -5, &store)).is_none());
        assert!(store.reset_state(&k).unwrap().is_some());
        assert!(reset().evaluate(&ctx(&k, &w, -2, &store)).is_none());
        assert!(store.reset_state(&k).unwrap().is_none());
    }

    #[test]
    fn fraction_lowers_limit() {
        let k = key();
        let w = window(&[10.0]);
        let store = StateStore::in_memory();
        let r = HardLimitReset::new(4, 0.5, 60);
        assert!(r.evaluate(&ctx(&k, &w, 2, &store)).is_none());
        assert!(store.reset_state(&k).unwrap().is_some());
    }
}
