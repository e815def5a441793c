//! Trade-state guard shared by every entry algorithm.
//!
//! An entry on `side` is permitted only when:
//! - the last action was not the same side, or it is older than the minimum interval
//! - `|position + signed order size| <= max_position * hard_limit_fraction`
//! - no hard-limit reset is pending for the key

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::algorithms::EvalContext;
use crate::domain::{ActionState, LastAction, Side, Signal};

/// Why the guard refused an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardBlock {
    Debounce,
    PositionLimit,
    ResetPending,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EntryRules {
    pub order_size: i64,
    pub max_position: i64,
    pub hard_limit_fraction: f64,
    pub min_interval_secs: i64,
}

impl EntryRules {
    pub fn position_limit(&self) -> f64 {
        self.max_position as f64 * self.hard_limit_fraction
    }

    pub fn check(
        &self,
        side: Side,
        last: &ActionState,
        position: i64,
        reset_pending: bool,
        now: DateTime<FixedOffset>,
    ) -> Result<(), GuardBlock> {
        if last.last_action == LastAction::from(side) {
            // An unrecorded timestamp counts as stale.
            if let Some(elapsed) = last.seconds_since(now) {
                if elapsed <= self.min_interval_secs {
                    return Err(GuardBlock::Debounce);
                }
            }
        }

        let after = position.saturating_add(side.sign() * self.order_size);
        if after.unsigned_abs() as f64 > self.position_limit() {
            return Err(GuardBlock::PositionLimit);
        }

        if reset_pending {
            return Err(GuardBlock::ResetPending);
        }
        Ok(())
    }

    /// Run the guard for `side` and, if it passes, record the action with a
    /// conditional write and build the entry signal.
    ///
    /// Store failures and lost races yield no signal.
    pub fn try_enter(
        &self,
        ctx: &EvalContext<'_>,
        side: Side,
        reference_price: f64,
        algorithm: &str,
    ) -> Option<Signal> {
        let seen = match ctx.state.last_action(ctx.key) {
            Ok(s) => s,
            Err(err) => {
                tracing::warn!(key = %ctx.key, error = %err, "action state unreadable; no signal");
                return None;
            }
        };
        let reset_pending = match ctx.state.reset_state(ctx.key) {
            Ok(r) => r.is_some_and(|r| r.is_pending()),
            Err(err) => {
                tracing::warn!(key = %ctx.key, error = %err, "reset state unreadable; no signal");
                return None;
            }
        };

        if let Err(block) = self.check(side, &seen.value, ctx.position, reset_pending, ctx.now) {
            tracing::debug!(key = %ctx.key, ?side, reason = ?block, "entry blocked");
            return None;
        }

        let fired = ActionState::fired(side, ctx.now);
        match ctx.state.swap_last_action(ctx.key, &seen, &fired) {
            Ok(true) => Some(Signal::open(
                ctx.key,
                side,
                self.order_size,
                reference_price,
                algorithm,
                ctx.now,
            )),
            Ok(false) => {
                tracing::debug!(key = %ctx.key, ?side, "action state changed concurrently; entry dropped");
                None
            }
            Err(err) => {
                tracing::warn!(key = %ctx.key, error = %err, "failed to record action; no signal");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn rules() -> EntryRules {
        EntryRules {
            order_size: 2,
            max_position: 4,
            hard_limit_fraction: 1.0,
            min_interval_secs: 60,
        }
    }

    fn t0() -> DateTime<FixedOffset> {
        FixedOffset::west_opt(5 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 1, 9, 11, 0, 0)
            .unwrap()
    }

    #[test]
    fn fresh_state_permits_both_sides() {
        let none = ActionState::none();
        assert_eq!(rules().check(Side::Buy, &none, 0, false, t0()), Ok(()));
        assert_eq!(rules().check(Side::Sell, &none, 0, false, t0()), Ok(()));
    }

    #[test]
    fn same_side_within_interval_is_debounced() {
        let last = ActionState::fired(Side::Buy, t0());
        let now = t0() + Duration::seconds(60);
        assert_eq!(
            rules().check(Side::Buy, &last, 0, false, now),
            Err(GuardBlock::Debounce)
        );
        let later = t0() + Duration::seconds(61);
        assert_eq!(rules().check(Side::Buy, &last, 0, false, later), Ok(()));
    }

    #[test]
    fn opposite_side_is_not_debounced() {
        let last = ActionState::fired(Side::Buy, t0());
        assert_eq!(rules().check(Side::Sell, &last, 0, false, t0()), Ok(()));
    }

    #[test]
    fn missing_timestamp_counts_as_stale() {
        let last = ActionState {
            last_action: LastAction::Sell,
            timestamp: None,
        };
        assert_eq!(rules().check(Side::Sell, &last, 0, false, t0()), Ok(()));
    }

    #[test]
    fn position_limit_is_inclusive() {
        let none = ActionState::none();
        assert_eq!(rules().check(Side::Buy, &none, 2, false, t0()), Ok(()));
        assert_eq!(
            rules().check(Side::Buy, &none, 3, false, t0()),
            Err(GuardBlock::PositionLimit)
        );
        // Reducing exposure from the limit is fine.
        assert_eq!(rules().check(Side::Sell, &none, 4, false, t0()), Ok(()));
    }

    #[test]
    fn hard_limit_fraction_scales_limit() {
        let mut r = rules();
        r.hard_limit_fraction = 0.5;
        let none = ActionState::none();
        assert_eq!(r.check(Side::Sell, &none, 0, false, t0()), Ok(()));
        assert_eq!(
            r.check(Side::Sell, &none, -1, false, t0()),
            Err(GuardBlock::PositionLimit)
        );
    }

    #[test]
    fn pending_reset_blocks() {
        let none = ActionState::none();
        assert_eq!(
            rules().check(Side::Buy, &none, 0, true, t0()),
            Err(GuardBlock::ResetPending)
        );
    }
}
