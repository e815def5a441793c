//! Bars, the fundamental market data unit, and the validated window of bars
//! an evaluation runs over.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One aggregated price bar for a symbol.
///
/// `timestamp` carries the exchange wall clock with its UTC offset. `high` and
/// `low` are the bar's price extremes; `volatility` is the precomputed ratio
/// supplied by the feed (NaN when the feed did not supply one).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<FixedOffset>,
    pub vwap: f64,
    #[serde(default = "missing_volatility")]
    pub volatility: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: u64,
}

fn missing_volatility() -> f64 {
    f64::NAN
}

impl Bar {
    /// Returns true if any price field is NaN.
    pub fn is_void(&self) -> bool {
        self.vwap.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }

    /// Basic sanity: prices positive, high >= low.
    pub fn is_sane(&self) -> bool {
        !self.is_void() && self.vwap > 0.0 && self.close > 0.0 && self.high >= self.low
    }

    /// True when the feed supplied a usable volatility ratio.
    pub fn has_volatility(&self) -> bool {
        self.volatility.is_finite() && self.volatility >= 0.0
    }
}

/// Errors raised when a bar window violates its ordering or value invariants.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BarError {
    #[error("bar window is empty")]
    Empty,
    #[error("timestamps not strictly increasing at index {index}")]
    OutOfOrder { index: usize },
    #[error("invalid vwap {vwap} at index {index}")]
    InvalidVwap { index: usize, vwap: f64 },
}

/// Time-ordered bars, oldest first, newest last.
///
/// Construction checks that timestamps strictly increase and that every vwap
/// is finite and positive, so algorithms can index freely.
#[derive(Debug, Clone)]
pub struct BarWindow {
    bars: Vec<Bar>,
}

impl BarWindow {
    pub fn new(bars: Vec<Bar>) -> Result<Self, BarError> {
        if bars.is_empty() {
            return Err(BarError::Empty);
        }
        for (index, bar) in bars.iter().enumerate() {
            if !bar.vwap.is_finite() || bar.vwap <= 0.0 {
                return Err(BarError::InvalidVwap {
                    index,
                    vwap: bar.vwap,
                });
            }
            if index > 0 && bars[index - 1].timestamp >= bar.timestamp {
                return Err(BarError::OutOfOrder { index });
            }
        }
        Ok(Self { bars })
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// The most recent bar. A window is never empty.
    pub fn latest(&self) -> &Bar {
        &self.bars[self.bars.len() - 1]
    }

    pub fn vwaps(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.vwap).collect()
    }

    pub fn highs(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.high).collect()
    }

    pub fn lows(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.low).collect()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }
}

/// Current top-of-book.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub bid: f64,
    pub ask: f64,
}

impl Quote {
    pub fn new(bid: f64, ask: f64) -> Self {
        Self { bid, ask }
    }

    /// Both sides positive and not crossed.
    pub fn is_valid(&self) -> bool {
        self.bid > 0.0 && self.ask > 0.0 && self.ask >= self.bid
    }
}
