//! CSV bar replay with simulated fills.
//!
//! Rows are `timestamp,symbol,security_type,vwap,high,low,close,volume,
//! volatility,bid,ask`; the last three may be empty. Each row is buffered,
//! published as a bar update through the dispatcher, and every emitted
//! signal is filled immediately at its reference price:
//! - the contract position moves by the signal quantity
//! - an open appends to the instance's order history and starts or widens
//!   its price extremes
//! - any fill that flattens the position clears history and extremes
//!
//! Between bars the session also keeps the per-span EMA cache current, the
//! way a live feed would, and stores each contract's high/low for the session
//! just ended once a bar arrives across a session break.

use std::collections::{BTreeSet, HashMap};
use std::io;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use serde::Deserialize;
use thiserror::Error;

use barsignal_core::domain::{
    Bar, OrderKind, OrderRecord, PriceExtremes, Quote, SecurityType, Signal,
};
use barsignal_core::indicators::latest_ema;
use barsignal_core::ports::{SessionCalendar, SignalSink, StoreError};
use barsignal_core::store::{MemoryBarSource, StateStore};
use barsignal_core::volatility::PriceRange;
use barsignal_core::{BarUpdate, Evaluator};

use crate::config::{ConfigError, EngineConfig};
use crate::dispatcher::Dispatcher;

/// Bars kept per contract when no instance needs more.
pub const DEFAULT_BAR_CAPACITY: usize = 1_000;

const DEFAULT_EMA_SPAN: f64 = 20.0;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("open bar file {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("bar file row {row}: {source}")]
    Row {
        row: usize,
        #[source]
        source: csv::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("state store: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Deserialize)]
struct BarRow {
    timestamp: DateTime<FixedOffset>,
    symbol: String,
    security_type: SecurityType,
    vwap: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: u64,
    #[serde(default)]
    volatility: Option<f64>,
    #[serde(default)]
    bid: Option<f64>,
    #[serde(default)]
    ask: Option<f64>,
}

/// One replayed row: a bar for a contract plus the quote at its close.
#[derive(Debug, Clone, PartialEq)]
pub struct BarEvent {
    pub symbol: String,
    pub security_type: SecurityType,
    pub bar: Bar,
    pub quote: Option<Quote>,
}

impl From<BarRow> for BarEvent {
    fn from(row: BarRow) -> Self {
        let quote = match (row.bid, row.ask) {
            (Some(bid), Some(ask)) => Some(Quote::new(bid, ask)),
            _ => None,
        };
        BarEvent {
            symbol: row.symbol,
            security_type: row.security_type,
            bar: Bar {
                timestamp: row.timestamp,
                vwap: row.vwap,
                volatility: row.volatility.unwrap_or(f64::NAN),
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume,
            },
            quote,
        }
    }
}

/// Parse bar events from CSV with a header row.
pub fn read_bar_events<R: io::Read>(reader: R) -> Result<Vec<BarEvent>, ReplayError> {
    let mut csv = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    csv.deserialize::<BarRow>()
        .enumerate()
        .map(|(i, row)| {
            row.map(BarEvent::from)
                .map_err(|source| ReplayError::Row { row: i + 1, source })
        })
        .collect()
}

/// Load bar events from a CSV file.
pub fn load_bar_events(path: &Path) -> Result<Vec<BarEvent>, ReplayError> {
    let file = std::fs::File::open(path).map_err(|source| ReplayError::Open {
        path: path.display().to_string(),
        source,
    })?;
    read_bar_events(io::BufReader::new(file))
}

/// Outcome of a replay run.
#[derive(Debug, Clone, Default)]
pub struct ReplayReport {
    pub bars: usize,
    pub skipped: usize,
    pub signals: Vec<Signal>,
}

/// An in-memory engine driven by replayed bars.
pub struct ReplaySession {
    bars: Arc<MemoryBarSource>,
    state: StateStore,
    dispatcher: Dispatcher,
    calendar: Arc<dyn SessionCalendar>,
    ema_spans: HashMap<(String, SecurityType), BTreeSet<usize>>,
    last_seen: HashMap<(String, SecurityType), DateTime<FixedOffset>>,
    session_ranges: HashMap<(String, SecurityType), PriceRange>,
    next_order: u64,
}

impl ReplaySession {
    pub fn new(config: &EngineConfig) -> Result<Self, ReplayError> {
        let state = StateStore::in_memory();
        let instances = config.build_instances()?;
        let capacity = instances
            .iter()
            .map(|inst| inst.required_bars())
            .max()
            .unwrap_or(1)
            .max(DEFAULT_BAR_CAPACITY);
        let bars = Arc::new(MemoryBarSource::new(capacity));
        let calendar: Arc<dyn SessionCalendar> = Arc::new(config.calendar());
        let evaluator = Evaluator::new(bars.clone(), state.clone(), calendar.clone());
        let dispatcher = Dispatcher::new(instances, evaluator, config.engine.max_workers);

        let mut ema_spans: HashMap<(String, SecurityType), BTreeSet<usize>> = HashMap::new();
        for cfg in config.instances.iter().filter(|c| c.open.algorithm == "ema") {
            let span = cfg
                .open
                .params
                .get("span")
                .copied()
                .unwrap_or(DEFAULT_EMA_SPAN);
            ema_spans
                .entry((cfg.symbol.clone(), cfg.security_type))
                .or_default()
                .insert(span as usize);
        }

        Ok(Self {
            bars,
            state,
            dispatcher,
            calendar,
            ema_spans,
            last_seen: HashMap::new(),
            session_ranges: HashMap::new(),
            next_order: 0,
        })
    }

    pub fn with_sink(mut self, sink: Arc<dyn SignalSink>) -> Self {
        self.dispatcher = self.dispatcher.with_sink(sink);
        self
    }

    pub fn state(&self) -> &StateStore {
        &self.state
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Publish one bar and fill whatever it triggers. A bar not newer than
    /// the previous one for its contract is skipped and yields `None`.
    pub fn step(&mut self, event: &BarEvent) -> Result<Option<Vec<Signal>>, ReplayError> {
        let contract = (event.symbol.clone(), event.security_type);
        let previous = self.last_seen.get(&contract).copied();
        if previous.is_some_and(|prev| event.bar.timestamp <= prev) {
            tracing::warn!(symbol = %event.symbol, at = %event.bar.timestamp, "out-of-order bar skipped");
            return Ok(None);
        }
        self.last_seen.insert(contract.clone(), event.bar.timestamp);
        self.track_session_range(contract, event, previous)?;

        self.bars
            .push(&event.symbol, event.security_type, event.bar.clone());
        self.refresh_ema(event)?;
        self.track_extremes(event)?;

        let update = BarUpdate {
            symbol: event.symbol.clone(),
            security_type: event.security_type,
            timestamp: event.bar.timestamp,
            quote: event.quote,
        };
        let signals = self.dispatcher.on_bar_update(&update);
        for signal in &signals {
            self.fill(signal)?;
        }
        Ok(Some(signals))
    }

    /// Replay every event in order.
    pub fn run(&mut self, events: &[BarEvent]) -> Result<ReplayReport, ReplayError> {
        let mut report = ReplayReport::default();
        for event in events {
            match self.step(event)? {
                Some(signals) => {
                    report.bars += 1;
                    report.signals.extend(signals);
                }
                None => report.skipped += 1,
            }
        }
        tracing::info!(
            bars = report.bars,
            skipped = report.skipped,
            signals = report.signals.len(),
            "replay finished"
        );
        Ok(report)
    }

    fn refresh_ema(&self, event: &BarEvent) -> Result<(), ReplayError> {
        let Some(spans) = self
            .ema_spans
            .get(&(event.symbol.clone(), event.security_type))
        else {
            return Ok(());
        };
        let vwaps: Vec<f64> = self
            .bars
            .snapshot(&event.symbol, event.security_type)
            .iter()
            .map(|b| b.vwap)
            .collect();
        for &span in spans {
            if let Some(value) = latest_ema(&vwaps, span) {
                self.state
                    .set_cached_ema(&event.symbol, event.security_type, span, value)?;
            }
        }
        Ok(())
    }

    /// Widen the contract's running session range with `event`, first storing
    /// the finished range when `event` lies across a session break.
    fn track_session_range(
        &mut self,
        contract: (String, SecurityType),
        event: &BarEvent,
        previous: Option<DateTime<FixedOffset>>,
    ) -> Result<(), ReplayError> {
        let rolled = previous.is_some_and(|prev| {
            self.calendar.session_break_between(
                &event.symbol,
                event.security_type,
                prev,
                event.bar.timestamp,
            )
        });
        if rolled {
            if let Some(done) = self.session_ranges.remove(&contract) {
                tracing::debug!(symbol = %event.symbol, max = done.max, min = done.min, "session range stored");
                self.state
                    .set_session_range(&event.symbol, event.security_type, &done)?;
            }
        }
        if let Some(range) = PriceRange::of_bars(std::slice::from_ref(&event.bar)) {
            self.session_ranges
                .entry(contract)
                .and_modify(|r| *r = r.merge(range))
                .or_insert(range);
        }
        Ok(())
    }

    fn track_extremes(&self, event: &BarEvent) -> Result<(), ReplayError> {
        for inst in self.dispatcher.instances() {
            let key = &inst.key;
            if !key.matches(&event.symbol, event.security_type) {
                continue;
            }
            if let Some(mut extremes) = self.state.price_extremes(key)? {
                extremes.observe(event.bar.vwap);
                self.state.set_price_extremes(key, &extremes)?;
            }
        }
        Ok(())
    }

    fn fill(&mut self, signal: &Signal) -> Result<(), ReplayError> {
        let key = signal.key();
        let before = self.state.position(&key)?;
        let after = before + signal.quantity;
        self.state
            .set_position(&key.account_id, &key.symbol, key.security_type, after)?;

        if after == 0 {
            self.state.clear_order_history(&key)?;
            self.state.clear_price_extremes(&key)?;
        } else if signal.order_kind == OrderKind::Open {
            self.next_order += 1;
            self.state.append_order(
                &key,
                OrderRecord {
                    order_id: format!("sim-{}", self.next_order),
                    quantity: signal.quantity,
                    timestamp: signal.timestamp,
                },
            )?;
            let same_direction = before.signum() == after.signum();
            let extremes = match self.state.price_extremes(&key)? {
                Some(mut e) if same_direction => {
                    e.observe(signal.reference_price);
                    e
                }
                _ => PriceExtremes::starting_at(signal.reference_price),
            };
            self.state.set_price_extremes(&key, &extremes)?;
        }
        tracing::debug!(%key, before, after, "simulated fill");
        Ok(())
    }
}
