//! Batch execution — one simulation run per grid combination, fanned out
//! over a rayon worker pool.
//!
//! Runs never share mutable state: market data, fees, and signals are
//! borrowed immutably by every worker, and each run owns its parameters and
//! portfolio. A failing run is reported and isolated; it never aborts the
//! batch.

use rayon::prelude::*;
use tracing::{error, info};

use signalsim_core::domain::SignalStream;
use signalsim_core::engine::{run, RunOutput};
use signalsim_core::error::SimError;
use signalsim_core::fees::FeeSchedule;
use signalsim_core::params::SimulationParameters;
use signalsim_core::PriceStore;

use crate::analytics::{benchmark_series, net_worth_series, performance_stats, PerformanceStats};

/// One schedulable run: a parameter combination plus its identity.
#[derive(Debug, Clone)]
pub struct RunUnit {
    /// Deterministic content hash of the parameters. Two units with equal
    /// parameters get equal ids, so artifacts land in stable directories.
    pub run_id: String,
    pub params: SimulationParameters,
}

impl RunUnit {
    pub fn new(params: SimulationParameters) -> Self {
        let json = serde_json::to_string(&params).expect("parameter serialization failed");
        let run_id = blake3::hash(json.as_bytes()).to_hex().to_string();
        Self { run_id, params }
    }
}

/// A completed run with its output and optional benchmark statistics.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: String,
    pub params: SimulationParameters,
    pub output: RunOutput,
    pub stats: Option<PerformanceStats>,
}

/// A run that aborted, with enough identity to reproduce it.
#[derive(Debug, Clone)]
pub struct FailedRun {
    pub run_id: String,
    pub params: SimulationParameters,
    pub error: SimError,
}

/// Outcome of a whole batch.
#[derive(Debug, Clone, Default)]
pub struct BatchResults {
    pub completed: Vec<RunReport>,
    pub failed: Vec<FailedRun>,
}

impl BatchResults {
    /// The completed run with the highest final liquid capital.
    pub fn best(&self) -> Option<&RunReport> {
        self.completed.iter().max_by(|a, b| {
            a.output
                .final_capital()
                .total_cmp(&b.output.final_capital())
        })
    }
}

/// Executes every run unit against shared, read-only market inputs.
pub struct BatchRunner<'a> {
    store: &'a dyn PriceStore,
    fees: &'a FeeSchedule,
    signals: &'a SignalStream,
    benchmark_asset: Option<&'a str>,
    parallel: bool,
}

impl<'a> BatchRunner<'a> {
    pub fn new(
        store: &'a dyn PriceStore,
        fees: &'a FeeSchedule,
        signals: &'a SignalStream,
    ) -> Self {
        Self {
            store,
            fees,
            signals,
            benchmark_asset: None,
            parallel: true,
        }
    }

    /// Compute alpha/beta/sharpe statistics against this asset's buy-and-hold
    /// capital curve for every completed run.
    pub fn with_benchmark(mut self, asset: &'a str) -> Self {
        self.benchmark_asset = Some(asset);
        self
    }

    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Run the whole batch, collecting completions and failures separately.
    pub fn execute(&self, units: Vec<RunUnit>) -> BatchResults {
        info!(runs = units.len(), parallel = self.parallel, "starting batch");

        let outcomes: Vec<Result<RunReport, FailedRun>> = if self.parallel {
            units.par_iter().map(|unit| self.run_unit(unit)).collect()
        } else {
            units.iter().map(|unit| self.run_unit(unit)).collect()
        };

        let mut results = BatchResults::default();
        for outcome in outcomes {
            match outcome {
                Ok(report) => results.completed.push(report),
                Err(failed) => results.failed.push(failed),
            }
        }
        info!(
            completed = results.completed.len(),
            failed = results.failed.len(),
            "batch finished"
        );
        results
    }

    fn run_unit(&self, unit: &RunUnit) -> Result<RunReport, FailedRun> {
        match run(&unit.params, self.store, self.fees, self.signals) {
            Ok(output) => {
                let stats = self.benchmark_stats(unit, &output);
                Ok(RunReport {
                    run_id: unit.run_id.clone(),
                    params: unit.params.clone(),
                    output,
                    stats,
                })
            }
            Err(err) => {
                error!(run_id = %unit.run_id, %err, "run failed");
                Err(FailedRun {
                    run_id: unit.run_id.clone(),
                    params: unit.params.clone(),
                    error: err,
                })
            }
        }
    }

    fn benchmark_stats(&self, unit: &RunUnit, output: &RunOutput) -> Option<PerformanceStats> {
        let asset = self.benchmark_asset?;
        let benchmark = benchmark_series(
            self.store,
            asset,
            &output.capital_history,
            unit.params.initial_capital,
        )?;
        performance_stats(&net_worth_series(&output.capital_history), &benchmark)
    }
}
