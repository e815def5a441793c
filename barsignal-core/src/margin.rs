//! Margin calculator: position- and volatility-adjusted buy/sell thresholds.
//!
//! buyMargin  = (signalMargin + positionOffset * position) * multiplier
//! sellMargin = (signalMargin - positionOffset * position) * multiplier
//! buyThreshold  = benchmark * (1 - buyMargin)
//! sellThreshold = benchmark * (1 + sellMargin)
//!
//! A long position widens the buy margin and narrows the sell margin, so the
//! engine leans toward reducing exposure.

use serde::{Deserialize, Serialize};

use crate::domain::SecurityType;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarginParams {
    pub signal_margin: f64,
    pub position_offset: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Margins {
    pub buy: f64,
    pub sell: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub buy: f64,
    pub sell: f64,
}

/// Position in margin units: futures as-is, everything else in lots.
pub fn normalized_position(position: i64, security_type: SecurityType) -> f64 {
    position as f64 / security_type.lot_divisor()
}

impl MarginParams {
    pub fn new(signal_margin: f64, position_offset: f64) -> Self {
        Self {
            signal_margin,
            position_offset,
        }
    }

    /// Margins for a normalized position and a volatility multiplier.
    pub fn margins(&self, position: f64, multiplier: f64) -> Margins {
        let skew = self.position_offset * position;
        Margins {
            buy: (self.signal_margin + skew) * multiplier,
            sell: (self.signal_margin - skew) * multiplier,
        }
    }

    /// Convenience: margins for a raw position of the given security type.
    pub fn margins_for(
        &self,
        position: i64,
        security_type: SecurityType,
        multiplier: f64,
    ) -> Margins {
        self.margins(normalized_position(position, security_type), multiplier)
    }
}

impl Margins {
    pub fn thresholds(&self, benchmark: f64) -> Thresholds {
        Thresholds {
            buy: benchmark * (1.0 - self.buy),
            sell: benchmark * (1.0 + self.sell),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};

    #[test]
    fn flat_position_is_symmetric() {
        let m = MarginParams::new(0.01, 0.002).margins(0.0, 1.5);
        assert_approx(m.buy, 0.015, DEFAULT_EPSILON);
        assert_approx(m.sell, 0.015, DEFAULT_EPSILON);
    }

    #[test]
    fn long_position_widens_buy_and_narrows_sell() {
        let m = MarginParams::new(0.01, 0.002).margins(2.0, 1.0);
        assert_approx(m.buy, 0.014, DEFAULT_EPSILON);
        assert_approx(m.sell, 0.006, DEFAULT_EPSILON);
    }

    #[test]
    fn thresholds_from_benchmark() {
        let t = Margins {
            buy: 0.05,
            sell: 0.05,
        }
        .thresholds(100.0);
        assert_approx(t.buy, 95.0, DEFAULT_EPSILON);
        assert_approx(t.sell, 105.0, DEFAULT_EPSILON);
    }

    #[test]
    fn stock_position_is_lot_normalized() {
        assert_approx(
            normalized_position(250, SecurityType::Stock),
            2.5,
            DEFAULT_EPSILON,
        );
        assert_approx(
            normalized_position(-3, SecurityType::Future),
            -3.0,
            DEFAULT_EPSILON,
        );
    }

    #[test]
    fn margins_for_uses_security_type() {
        let params = MarginParams::new(0.01, 0.001);
        let stock = params.margins_for(100, SecurityType::Stock, 1.0);
        let future = params.margins_for(100, SecurityType::Future, 1.0);
        assert_approx(stock.buy, 0.011, DEFAULT_EPSILON);
        assert_approx(future.buy, 0.11, DEFAULT_EPSILON);
    }
}
