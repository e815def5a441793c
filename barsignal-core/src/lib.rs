//! barsignal core: the signal decision engine.
//!
//! This crate turns a rolling window of price bars into at most one trading
//! decision per strategy instance:
//! - Domain types (bars, instance keys, signals, persisted trade state)
//! - Indicator library (rolling mean, lag, seeded EMA, Williams %R)
//! - Volatility model and position-adjusted margin calculator
//! - Trade-state store adapter over a shared key/value cache
//! - Open algorithms (SMA band, EMA band, DMA crossover) with a shared entry guard
//! - Close algorithms (portfolio flatten, hard-limit reset, trailing stop)
//! - Algorithm registry and the per-instance evaluation orchestrator

pub mod algorithms;
pub mod calendar;
pub mod domain;
pub mod factory;
pub mod indicators;
pub mod instance;
pub mod margin;
pub mod orchestrator;
pub mod ports;
pub mod store;
pub mod volatility;

pub use orchestrator::{BarUpdate, Evaluator};
