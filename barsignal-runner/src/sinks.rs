//! Signal sinks: append-only JSONL audit file, structured log, and an
//! in-memory collector.
//!
//! Delivery is fire-and-forget. The dispatcher logs a failed delivery and
//! moves on; trade state already written for the signal is not rolled back.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use barsignal_core::domain::Signal;
use barsignal_core::ports::{SignalSink, SinkError};

/// One line of the audit file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub fingerprint: String,
    pub signal: Signal,
}

/// Appends every delivered signal to a JSONL file, one object per line.
pub struct JsonlAuditSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonlAuditSink {
    /// Open (or create) the audit file for appending, creating parent
    /// directories as needed.
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read back every record, skipping blank and malformed lines.
    pub fn read_all(path: &Path) -> io::Result<Vec<AuditRecord>> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let reader = io::BufReader::new(File::open(path)?);
        let mut records = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<AuditRecord>(&line) {
                Ok(record) => records.push(record),
                Err(err) => tracing::warn!(path = %path.display(), error = %err, "skipping malformed audit line"),
            }
        }
        Ok(records)
    }
}

impl SignalSink for JsonlAuditSink {
    fn name(&self) -> &str {
        "jsonl_audit"
    }

    fn deliver(&self, signal: &Signal) -> Result<(), SinkError> {
        let record = AuditRecord {
            fingerprint: signal.fingerprint(),
            signal: signal.clone(),
        };
        let json = serde_json::to_string(&record)?;
        let mut file = self.file.lock();
        writeln!(file, "{json}")?;
        file.flush()?;
        Ok(())
    }
}

/// Emits each signal as a structured `info` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl SignalSink for TracingSink {
    fn name(&self) -> &str {
        "tracing"
    }

    fn deliver(&self, signal: &Signal) -> Result<(), SinkError> {
        tracing::info!(
            key = %signal.key(),
            kind = ?signal.order_kind,
            quantity = signal.quantity,
            price = signal.reference_price,
            algorithm = %signal.algorithm,
            at = %signal.timestamp,
            "signal"
        );
        Ok(())
    }
}

/// Keeps delivered signals in memory, in delivery order.
#[derive(Debug, Default)]
pub struct CollectingSink {
    signals: Mutex<Vec<Signal>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signals(&self) -> Vec<Signal> {
        self.signals.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.signals.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.lock().is_empty()
    }

    /// Drain everything collected so far.
    pub fn take(&self) -> Vec<Signal> {
        std::mem::take(&mut *self.signals.lock())
    }
}

impl SignalSink for CollectingSink {
    fn name(&self) -> &str {
        "collect"
    }

    fn deliver(&self, signal: &Signal) -> Result<(), SinkError> {
        self.signals.lock().push(signal.clone());
        Ok(())
    }
}
