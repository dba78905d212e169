//! SignalSim CLI — batch strategy simulation from CSV inputs.
//!
//! Commands:
//! - `run` — expand a parameter grid and simulate every combination
//! - `grid template` — print a grid TOML template to stdout

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use signalsim_core::domain::{Side, SignalStream};
use signalsim_core::FeeSchedule;
use signalsim_runner::sweep::{BatchRunner, RunUnit};
use signalsim_runner::{export_batch, load_fees, load_prices, load_signals_into, ParamGrid};

#[derive(Parser)]
#[command(
    name = "signalsim",
    about = "SignalSim CLI — tick-stepped strategy simulation over parameter grids"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Expand a parameter grid and simulate every combination.
    Run {
        /// Price CSV (asset,timestamp,open,high,low,close,volume).
        #[arg(long)]
        prices: PathBuf,

        /// Long-signal CSV.
        #[arg(long)]
        signals_long: Option<PathBuf>,

        /// Short-signal CSV.
        #[arg(long)]
        signals_short: Option<PathBuf>,

        /// Fee schedule CSV. Defaults to built-in rates.
        #[arg(long)]
        fees: Option<PathBuf>,

        /// Grid TOML. Defaults to the built-in grid.
        #[arg(long)]
        grid: Option<PathBuf>,

        /// Output directory for run artifacts.
        #[arg(long, default_value = "results")]
        output: PathBuf,

        /// Asset whose buy-and-hold curve benchmarks every run.
        #[arg(long)]
        benchmark: Option<String>,

        /// Run the batch on one thread instead of the worker pool.
        #[arg(long, default_value_t = false)]
        sequential: bool,
    },
    /// Grid utilities.
    Grid {
        #[command(subcommand)]
        action: GridAction,
    },
}

#[derive(Subcommand)]
enum GridAction {
    /// Print the default grid as TOML, ready to edit.
    Template,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            prices,
            signals_long,
            signals_short,
            fees,
            grid,
            output,
            benchmark,
            sequential,
        } => run_batch(
            prices,
            signals_long,
            signals_short,
            fees,
            grid,
            output,
            benchmark,
            sequential,
        ),
        Commands::Grid { action } => match action {
            GridAction::Template => {
                let toml = toml::to_string_pretty(&ParamGrid::default())
                    .context("failed to serialize default grid")?;
                println!("{toml}");
                Ok(())
            }
        },
    }
}

#[allow(clippy::too_many_arguments)]
fn run_batch(
    prices: PathBuf,
    signals_long: Option<PathBuf>,
    signals_short: Option<PathBuf>,
    fees: Option<PathBuf>,
    grid: Option<PathBuf>,
    output: PathBuf,
    benchmark: Option<String>,
    sequential: bool,
) -> Result<()> {
    if signals_long.is_none() && signals_short.is_none() {
        bail!("at least one of --signals-long / --signals-short is required");
    }

    let store = load_prices(&prices)?;
    let mut stream = SignalStream::default();
    if let Some(path) = &signals_long {
        load_signals_into(&mut stream, path, Side::Long)?;
    }
    if let Some(path) = &signals_short {
        load_signals_into(&mut stream, path, Side::Short)?;
    }
    if stream.is_empty() {
        bail!("signal files contained no signals");
    }

    let fee_schedule = match &fees {
        Some(path) => load_fees(path)?,
        None => FeeSchedule::default(),
    };

    let grid = match &grid {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read grid {}", path.display()))?;
            toml::from_str::<ParamGrid>(&text)
                .with_context(|| format!("invalid grid {}", path.display()))?
        }
        None => ParamGrid::default(),
    };

    let units: Vec<RunUnit> = grid
        .expand()
        .context("grid expansion failed")?
        .into_iter()
        .map(RunUnit::new)
        .collect();
    info!(combinations = units.len(), "grid expanded");

    let mut runner = BatchRunner::new(&store, &fee_schedule, &stream);
    if let Some(asset) = &benchmark {
        runner = runner.with_benchmark(asset);
    }
    let results = runner.with_parallelism(!sequential).execute(units);

    if results.completed.is_empty() {
        bail!("all {} runs failed", results.failed.len());
    }

    export_batch(&output, &results).context("artifact export failed")?;

    println!(
        "completed {} runs ({} failed), artifacts in {}",
        results.completed.len(),
        results.failed.len(),
        output.display()
    );
    if let Some(best) = results.best() {
        println!(
            "best run {}: final capital {:.2} over {} positions",
            best.run_id,
            best.output.final_capital(),
            best.output.positions.len()
        );
    }
    Ok(())
}
