//! barsignal runner: configuration, dispatch, sinks and replay.
//!
//! This crate builds on `barsignal-core` to provide:
//! - TOML engine configuration resolved into strategy instances
//! - Bar-update dispatch over a bounded rayon worker pool
//! - Signal sinks (JSONL audit file, structured log, in-memory collector)
//! - CSV bar replay with simulated fills
//! - Tracing subscriber initialisation

pub mod config;
pub mod dispatcher;
pub mod logging;
pub mod replay;
pub mod sinks;

pub use config::{ConfigError, EngineConfig, EngineSection, SessionSection};
pub use dispatcher::Dispatcher;
pub use logging::{init_tracing, LogFormat, LoggingError};
pub use replay::{
    load_bar_events, read_bar_events, BarEvent, ReplayError, ReplayReport, ReplaySession,
};
pub use sinks::{AuditRecord, CollectingSink, JsonlAuditSink, TracingSink};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn dispatcher_is_send_sync() {
        assert_send::<Dispatcher>();
        assert_sync::<Dispatcher>();
    }

    #[test]
    fn sinks_are_send_sync() {
        assert_send::<JsonlAuditSink>();
        assert_sync::<JsonlAuditSink>();
        assert_send::<CollectingSink>();
        assert_sync::<CollectingSink>();
    }

    #[test]
    fn config_is_send_sync() {
        assert_send::<EngineConfig>();
        assert_sync::<EngineConfig>();
    }
}
