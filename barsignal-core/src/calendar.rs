//! Session calendars: per-security-type trading hours evaluated on the
//! timestamp's own wall clock.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::domain::SecurityType;
use crate::ports::SessionCalendar;

/// Weekly trading-hours shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Schedule {
    /// Monday–Friday, `open` to `close` on the same day.
    Intraday { open: NaiveTime, close: NaiveTime },
    /// Sunday `reopen` through Friday `close`, halted daily between `close`
    /// and `reopen`.
    Overnight { close: NaiveTime, reopen: NaiveTime },
    /// Never closes.
    Continuous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionStatus {
    Closed,
    OpenUntil(NaiveDateTime),
    AlwaysOpen,
}

fn hm(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap_or(NaiveTime::MIN)
}

fn is_weekday(day: Weekday) -> bool {
    day.num_days_from_monday() < 5
}

impl Schedule {
    fn status(&self, at: NaiveDateTime) -> SessionStatus {
        let day = at.weekday();
        let time = at.time();
        match *self {
            Schedule::Continuous => SessionStatus::AlwaysOpen,
            Schedule::Intraday { open, close } => {
                if is_weekday(day) && time >= open && time < close {
                    SessionStatus::OpenUntil(at.date().and_time(close))
                } else {
                    SessionStatus::Closed
                }
            }
            Schedule::Overnight { close, reopen } => {
                if time >= close && time < reopen {
                    SessionStatus::Closed
                } else if time >= reopen {
                    // Evening leg: closes tomorrow. Open Sunday through Thursday evenings.
                    if day == Weekday::Fri || day == Weekday::Sat {
                        SessionStatus::Closed
                    } else {
                        SessionStatus::OpenUntil((at.date() + Duration::days(1)).and_time(close))
                    }
                } else if is_weekday(day) {
                    SessionStatus::OpenUntil(at.date().and_time(close))
                } else {
                    SessionStatus::Closed
                }
            }
        }
    }
}

/// Trading hours per security type, with optional per-symbol overrides.
#[derive(Debug, Clone)]
pub struct SessionTable {
    by_type: HashMap<SecurityType, Schedule>,
    by_symbol: HashMap<String, Schedule>,
}

impl SessionTable {
    /// US hours: stocks 04:00–20:00 (09:30–16:00 when `regular_hours_only`),
    /// futures with a 17:00–18:00 maintenance halt, FX with a 17:00–17:05
    /// roll halt, crypto around the clock.
    pub fn us_default(regular_hours_only: bool) -> Self {
        let stock = if regular_hours_only {
            Schedule::Intraday {
                open: hm(9, 30),
                close: hm(16, 0),
            }
        } else {
            Schedule::Intraday {
                open: hm(4, 0),
                close: hm(20, 0),
            }
        };
        let by_type = HashMap::from([
            (SecurityType::Stock, stock),
            (
                SecurityType::Future,
                Schedule::Overnight {
                    close: hm(17, 0),
                    reopen: hm(18, 0),
                },
            ),
            (
                SecurityType::Forex,
                Schedule::Overnight {
                    close: hm(17, 0),
                    reopen: hm(17, 5),
                },
            ),
            (SecurityType::Crypto, Schedule::Continuous),
        ]);
        Self {
            by_type,
            by_symbol: HashMap::new(),
        }
    }

    pub fn with_type_schedule(mut self, security_type: SecurityType, schedule: Schedule) -> Self {
        self.by_type.insert(security_type, schedule);
        self
    }

    pub fn with_symbol_schedule(mut self, symbol: impl Into<String>, schedule: Schedule) -> Self {
        self.by_symbol.insert(symbol.into(), schedule);
        self
    }

    fn schedule(&self, symbol: &str, security_type: SecurityType) -> Schedule {
        self.by_symbol
            .get(symbol)
            .or_else(|| self.by_type.get(&security_type))
            .copied()
            .unwrap_or(Schedule::Continuous)
    }

    fn status(
        &self,
        symbol: &str,
        security_type: SecurityType,
        at: DateTime<FixedOffset>,
    ) -> SessionStatus {
        self.schedule(symbol, security_type).status(at.naive_local())
    }
}

impl SessionCalendar for SessionTable {
    fn is_trading_now(
        &self,
        symbol: &str,
        security_type: SecurityType,
        at: DateTime<FixedOffset>,
    ) -> bool {
        !matches!(self.status(symbol, security_type, at), SessionStatus::Closed)
    }

    fn is_close_to_closing(
        &self,
        symbol: &str,
        security_type: SecurityType,
        at: DateTime<FixedOffset>,
        seconds_before: i64,
    ) -> bool {
        match self.status(symbol, security_type, at) {
            SessionStatus::OpenUntil(close) => {
                (close - at.naive_local()).num_seconds() <= seconds_before
            }
            SessionStatus::Closed | SessionStatus::AlwaysOpen => false,
        }
    }
}

/// Calendar that is always open and never near a close.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysOpen;

impl SessionCalendar for AlwaysOpen {
    fn is_trading_now(&self, _: &str, _: SecurityType, _: DateTime<FixedOffset>) -> bool {
        true
    }

    fn is_close_to_closing(&self, _: &str, _: SecurityType, _: DateTime<FixedOffset>, _: i64) -> bool {
        false
    }

    fn session_break_between(
        &self,
        _: &str,
        _: SecurityType,
        _: DateTime<FixedOffset>,
        _: DateTime<FixedOffset>,
    ) -> bool {
        false
    }
}
