//! barsignal CLI: validate engine configs and replay bar files.
//!
//! Commands:
//! - `validate`: resolve every strategy instance in a TOML config
//! - `replay`: stream a CSV bar file through the engine with simulated
//!   fills, printing each signal as one JSON line

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use barsignal_runner::{
    init_tracing, load_bar_events, EngineConfig, JsonlAuditSink, ReplaySession, TracingSink,
};

#[derive(Parser)]
#[command(name = "barsignal", about = "barsignal: bar-driven trading signal engine")]
struct Cli {
    /// Log level or filter directives (overridden by BARSIGNAL_LOG).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Log output format: text or json.
    #[arg(long, global = true, default_value = "text")]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build every configured strategy instance and report the count.
    Validate {
        /// Engine configuration (TOML).
        #[arg(long)]
        config: PathBuf,
    },

    /// Replay a CSV bar file through the configured instances.
    Replay {
        /// Engine configuration (TOML).
        #[arg(long)]
        config: PathBuf,

        /// Bar file: timestamp,symbol,security_type,vwap,high,low,close,volume,volatility,bid,ask
        #[arg(long)]
        bars: PathBuf,

        /// Append every signal to this JSONL audit file.
        #[arg(long)]
        audit: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, &cli.log_format)?;

    match cli.command {
        Commands::Validate { config } => run_validate(config),
        Commands::Replay {
            config,
            bars,
            audit,
        } => run_replay(config, bars, audit),
    }
}

fn load_config(path: &Path) -> Result<EngineConfig> {
    EngineConfig::from_file(path).with_context(|| format!("loading {}", path.display()))
}

fn run_validate(config_path: PathBuf) -> Result<()> {
    let config = load_config(&config_path)?;
    let instances = config.build_instances()?;
    for inst in &instances {
        println!(
            "{}  open={}  close={}",
            inst.key,
            inst.open.name(),
            inst.close.as_ref().map_or("-", |c| c.name())
        );
    }
    println!("{} strategy instance(s) OK", instances.len());
    Ok(())
}

fn run_replay(config_path: PathBuf, bars_path: PathBuf, audit: Option<PathBuf>) -> Result<()> {
    let config = load_config(&config_path)?;
    let events = load_bar_events(&bars_path)?;

    let mut session = ReplaySession::new(&config)?.with_sink(Arc::new(TracingSink));
    if let Some(path) = audit {
        let sink = JsonlAuditSink::open(&path)
            .with_context(|| format!("opening audit file {}", path.display()))?;
        session = session.with_sink(Arc::new(sink));
    }

    let report = session.run(&events)?;
    for signal in &report.signals {
        println!("{}", serde_json::to_string(signal)?);
    }
    eprintln!(
        "{} bar(s) replayed, {} skipped, {} signal(s)",
        report.bars,
        report.skipped,
        report.signals.len()
    );
    Ok(())
}
