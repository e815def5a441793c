//! Bar-update dispatch: fan one event out to every matching strategy
//! instance on a bounded worker pool, then hand the results to the sinks.

use std::collections::HashMap;
use std::sync::Arc;

use rayon::prelude::*;

use barsignal_core::domain::{SecurityType, Signal};
use barsignal_core::instance::StrategyInstance;
use barsignal_core::ports::{BarSource, SignalSink};
use barsignal_core::store::StateStore;
use barsignal_core::{BarUpdate, Evaluator};

use crate::config::{ConfigError, EngineConfig};

/// Routes bar updates to strategy instances.
pub struct Dispatcher {
    instances: Vec<StrategyInstance>,
    evaluator: Evaluator,
    sinks: Vec<Arc<dyn SignalSink>>,
    pool: Option<rayon::ThreadPool>,
}

/// Size of the largest group of instances sharing one contract.
fn largest_group(instances: &[StrategyInstance]) -> usize {
    let mut groups: HashMap<(&str, SecurityType), usize> = HashMap::new();
    for inst in instances {
        *groups
            .entry((inst.key.symbol.as_str(), inst.key.security_type))
            .or_default() += 1;
    }
    groups.into_values().max().unwrap_or(0)
}

impl Dispatcher {
    /// Build a dispatcher. The worker pool is built once and sized to the
    /// largest group of instances on one contract, capped by `max_workers`;
    /// with a single worker evaluations run on the calling thread.
    ///
    /// That size is an upper bound for every update: an update fans out over
    /// its own matches only, so it never occupies more workers than it has
    /// matching instances.
    pub fn new(instances: Vec<StrategyInstance>, evaluator: Evaluator, max_workers: usize) -> Self {
        let workers = largest_group(&instances).min(max_workers.max(1));
        let pool = if workers > 1 {
            match rayon::ThreadPoolBuilder::new()
                .num_threads(workers)
                .thread_name(|i| format!("barsignal-eval-{i}"))
                .build()
            {
                Ok(pool) => Some(pool),
                Err(err) => {
                    tracing::warn!(workers, error = %err, "worker pool unavailable; evaluating sequentially");
                    None
                }
            }
        } else {
            None
        };
        tracing::debug!(
            instances = instances.len(),
            workers = pool.as_ref().map_or(1, |p| p.current_num_threads()),
            "dispatcher ready"
        );
        Self {
            instances,
            evaluator,
            sinks: Vec::new(),
            pool,
        }
    }

    /// Resolve `config` into a dispatcher over the given bar source and state.
    pub fn from_config(
        config: &EngineConfig,
        bars: Arc<dyn BarSource>,
        state: StateStore,
    ) -> Result<Self, ConfigError> {
        let instances = config.build_instances()?;
        let evaluator = Evaluator::new(bars, state, Arc::new(config.calendar()));
        Ok(Self::new(instances, evaluator, config.engine.max_workers))
    }

    pub fn with_sink(mut self, sink: Arc<dyn SignalSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn instances(&self) -> &[StrategyInstance] {
        &self.instances
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    pub fn workers(&self) -> usize {
        self.pool.as_ref().map_or(1, |p| p.current_num_threads())
    }

    /// Evaluate every instance on the updated contract. Signals come back in
    /// instance order and have already been offered to every sink.
    pub fn on_bar_update(&self, update: &BarUpdate) -> Vec<Signal> {
        let matching: Vec<&StrategyInstance> = self
            .instances
            .iter()
            .filter(|inst| inst.key.matches(&update.symbol, update.security_type))
            .collect();
        if matching.is_empty() {
            tracing::debug!(symbol = %update.symbol, sec = %update.security_type, "no instances for update");
            return Vec::new();
        }

        let evaluate = |inst: &&StrategyInstance| self.evaluator.evaluate(inst, update);
        let signals: Vec<Signal> = match &self.pool {
            Some(pool) => pool.install(|| matching.par_iter().filter_map(evaluate).collect()),
            None => matching.iter().filter_map(evaluate).collect(),
        };

        for signal in &signals {
            self.deliver(signal);
        }
        signals
    }

    fn deliver(&self, signal: &Signal) {
        for sink in &self.sinks {
            if let Err(err) = sink.deliver(signal) {
                tracing::warn!(
                    sink = sink.name(),
                    key = %signal.key(),
                    error = %err,
                    "signal delivery failed; dropped"
                );
            }
        }
    }
}
