//! Tracing subscriber setup for binaries.
//!
//! `BARSIGNAL_LOG`, when set, replaces the level passed on the command line
//! and accepts full `EnvFilter` directives (`barsignal_core=debug,info`).

use thiserror::Error;

pub const LOG_ENV_VAR: &str = "BARSIGNAL_LOG";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter '{filter}': {reason}")]
    InvalidFilter { filter: String, reason: String },

    #[error("unknown log format '{0}' (expected 'text' or 'json')")]
    UnknownFormat(String),

    #[error("a global tracing subscriber is already installed")]
    AlreadyInstalled,
}

/// Output format of the fmt subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    pub fn parse(raw: &str) -> Result<Self, LoggingError> {
        match raw.trim().to_lowercase().as_str() {
            "text" | "pretty" | "" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(LoggingError::UnknownFormat(other.to_string())),
        }
    }
}

fn env_filter(level: &str) -> Result<tracing_subscriber::EnvFilter, LoggingError> {
    let filter = std::env::var(LOG_ENV_VAR).unwrap_or_else(|_| level.to_string());
    tracing_subscriber::EnvFilter::try_new(&filter).map_err(|err| LoggingError::InvalidFilter {
        filter,
        reason: err.to_string(),
    })
}

/// Install the global subscriber, writing to stderr. Fails rather than
/// panics when one is already installed.
pub fn init_tracing(level: &str, format: &str) -> Result<(), LoggingError> {
    let format = LogFormat::parse(format)?;
    let filter = env_filter(level)?;

    let installed = match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .try_init(),
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init(),
    };
    installed.map_err(|_| LoggingError::AlreadyInstalled)
}
