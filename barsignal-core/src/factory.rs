//! Algorithm registry: converts `AlgorithmConfig` into runtime trait objects.
//!
//! Names are resolved once, at start-up. An unknown name or an out-of-range
//! parameter is an error here, never a panic later in the evaluation path.

use crate::algorithms::{
    CloseAlgorithm, DmaCross, EmaBand, EntryRules, HardLimitReset, MacdClose, OpenAlgorithm,
    PortfolioFlatten, SmaBand, TrailingStop, WilliamsGate,
};
use crate::instance::{AlgorithmConfig, InstanceConfig, StrategyInstance};
use crate::margin::MarginParams;
use crate::volatility::VolatilityCurve;

/// Names accepted by `create_open_algorithm`.
pub const OPEN_ALGORITHMS: &[&str] = &["sma", "ema", "dma"];

/// Names accepted by `create_close_algorithm`.
pub const CLOSE_ALGORITHMS: &[&str] = &["portfolio", "reset", "trailing_stop", "macd"];

// ─── Error type ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FactoryError {
    #[error("Unknown open algorithm: {0}")]
    UnknownOpen(String),
    #[error("Unknown close algorithm: {0}")]
    UnknownClose(String),
    #[error("Invalid parameter `{param}` for {algorithm}: {reason}")]
    InvalidParam {
        algorithm: String,
        param: String,
        reason: String,
    },
}

// ─── Helpers ─────────────────────────────────────────────────────────

/// Extract a named f64 parameter, falling back to `default`.
fn param(config: &AlgorithmConfig, name: &str, default: f64) -> f64 {
    config.params.get(name).copied().unwrap_or(default)
}

/// Extract a named non-negative integer parameter, falling back to `default`.
fn param_usize(config: &AlgorithmConfig, name: &str, default: usize) -> Result<usize, FactoryError> {
    match config.params.get(name).copied() {
        None => Ok(default),
        Some(v) if v.is_finite() && v >= 0.0 && v.fract() == 0.0 => Ok(v as usize),
        Some(v) => Err(invalid(config, name, format!("expected a non-negative integer, got {v}"))),
    }
}

/// Extract a named signed integer parameter, falling back to `default`.
fn param_i64(config: &AlgorithmConfig, name: &str, default: i64) -> Result<i64, FactoryError> {
    match config.params.get(name).copied() {
        None => Ok(default),
        Some(v) if v.is_finite() && v.fract() == 0.0 => Ok(v as i64),
        Some(v) => Err(invalid(config, name, format!("expected an integer, got {v}"))),
    }
}

fn invalid(config: &AlgorithmConfig, name: &str, reason: impl Into<String>) -> FactoryError {
    FactoryError::InvalidParam {
        algorithm: config.algorithm.clone(),
        param: name.to_string(),
        reason: reason.into(),
    }
}

fn ensure(
    ok: bool,
    config: &AlgorithmConfig,
    name: &str,
    reason: &str,
) -> Result<(), FactoryError> {
    if ok {
        Ok(())
    } else {
        Err(invalid(config, name, reason))
    }
}

fn margin_params(config: &AlgorithmConfig) -> MarginParams {
    MarginParams::new(
        param(config, "signal_margin", 0.002),
        param(config, "position_offset", 0.0),
    )
}

fn volatility_curve(config: &AlgorithmConfig) -> VolatilityCurve {
    VolatilityCurve::new(
        param(config, "vol_a", 0.0),
        param(config, "vol_b", 0.0),
        param(config, "vol_c", 0.0),
    )
}

fn entry_rules(config: &AlgorithmConfig) -> Result<EntryRules, FactoryError> {
    let rules = EntryRules {
        order_size: param_i64(config, "order_size", 1)?,
        max_position: param_i64(config, "max_position", 1)?,
        hard_limit_fraction: param(config, "hard_limit_fraction", 1.0),
        min_interval_secs: param_i64(config, "min_interval_secs", 60)?,
    };
    ensure(rules.order_size >= 1, config, "order_size", "must be >= 1")?;
    ensure(
        rules.max_position >= rules.order_size,
        config,
        "max_position",
        "must be >= order_size",
    )?;
    ensure(
        rules.hard_limit_fraction > 0.0 && rules.hard_limit_fraction.is_finite(),
        config,
        "hard_limit_fraction",
        "must be positive",
    )?;
    ensure(
        rules.min_interval_secs >= 0,
        config,
        "min_interval_secs",
        "must be >= 0",
    )?;
    Ok(rules)
}

// ─── Open factory ────────────────────────────────────────────────────

/// Create an entry algorithm from an `AlgorithmConfig`.
pub fn create_open_algorithm(
    config: &AlgorithmConfig,
) -> Result<Box<dyn OpenAlgorithm>, FactoryError> {
    match config.algorithm.as_str() {
        "sma" => {
            let n = param_usize(config, "num_stats_bars", 20)?;
            ensure(n >= 1, config, "num_stats_bars", "must be >= 1")?;
            Ok(Box::new(SmaBand::new(
                n,
                margin_params(config),
                volatility_curve(config),
                entry_rules(config)?,
            )))
        }
        "ema" => {
            let span = param_usize(config, "span", 20)?;
            ensure(span >= 1, config, "span", "must be >= 1")?;
            let gtd = param_usize(config, "gtd_secs", 0)?;
            Ok(Box::new(EmaBand::new(
                span,
                margin_params(config),
                volatility_curve(config),
                entry_rules(config)?,
                (gtd > 0).then_some(gtd as u64),
            )))
        }
        "dma" => {
            let fast = param_usize(config, "fast_period", 5)?;
            let slow = param_usize(config, "slow_period", 20)?;
            ensure(fast >= 1, config, "fast_period", "must be >= 1")?;
            ensure(slow > fast, config, "slow_period", "must be > fast_period")?;
            let trend = param_usize(config, "trend_period", 0)?;
            let delay_secs = param_usize(config, "delay_secs", 0)?;
            let bar_secs = param_usize(config, "bar_secs", 60)?;
            let williams_period = param_usize(config, "williams_period", 0)?;
            let williams = (williams_period > 0).then(|| WilliamsGate {
                period: williams_period,
                long_min: param(config, "williams_long_min", -50.0),
                short_max: param(config, "williams_short_max", -50.0),
            });
            Ok(Box::new(DmaCross::new(
                fast,
                slow,
                trend,
                DmaCross::delay_bars_for(delay_secs as u64, bar_secs as u64),
                williams,
                entry_rules(config)?,
            )))
        }
        other => Err(FactoryError::UnknownOpen(other.to_string())),
    }
}

// ─── Close factory ───────────────────────────────────────────────────

/// Create an exit algorithm from an `AlgorithmConfig`.
pub fn create_close_algorithm(
    config: &AlgorithmConfig,
) -> Result<Box<dyn CloseAlgorithm>, FactoryError> {
    match config.algorithm.as_str() {
        "portfolio" => {
            let window = param_i64(config, "close_window_secs", 0)?;
            ensure(window >= 0, config, "close_window_secs", "must be >= 0")?;
            Ok(Box::new(PortfolioFlatten::new(window)))
        }
        "reset" => {
            let max_position = param_i64(config, "max_position", 1)?;
            let fraction = param(config, "hard_limit_fraction", 1.0);
            let delay = param_i64(config, "min_duration_secs", 60)?;
            ensure(max_position >= 1, config, "max_position", "must be >= 1")?;
            ensure(
                fraction > 0.0 && fraction.is_finite(),
                config,
                "hard_limit_fraction",
                "must be positive",
            )?;
            ensure(delay >= 0, config, "min_duration_secs", "must be >= 0")?;
            Ok(Box::new(HardLimitReset::new(max_position, fraction, delay)))
        }
        "trailing_stop" => {
            let threshold = param(config, "threshold", 0.01);
            let min = param_i64(config, "min_duration_secs", 0)?;
            let max = param_i64(config, "max_duration_secs", 86_400)?;
            ensure(
                threshold > 0.0 && threshold < 1.0,
                config,
                "threshold",
                "must be in (0, 1)",
            )?;
            ensure(min >= 0, config, "min_duration_secs", "must be >= 0")?;
            ensure(
                max >= min,
                config,
                "max_duration_secs",
                "must be >= min_duration_secs",
            )?;
            Ok(Box::new(TrailingStop::new(threshold, min, max)))
        }
        "macd" => {
            tracing::warn!("macd close algorithm has no benchmark model and never signals");
            Ok(Box::new(MacdClose))
        }
        other => Err(FactoryError::UnknownClose(other.to_string())),
    }
}

// ─── Instance factory ────────────────────────────────────────────────

/// Resolve both algorithms of an instance.
pub fn build_instance(config: &InstanceConfig) -> Result<StrategyInstance, FactoryError> {
    let open = create_open_algorithm(&config.open)?;
    let close = config
        .close
        .as_ref()
        .map(create_close_algorithm)
        .transpose()?;
    Ok(StrategyInstance::new(config.key(), open, close))
}
