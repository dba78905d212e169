//! SignalSim Runner — batch orchestration on top of the core engine.
//!
//! - Parameter grids expanded into their full cartesian product
//! - Parallel or sequential batch execution with per-run failure isolation
//! - Benchmark-relative performance statistics
//! - CSV loaders for prices, signals, and fee schedules
//! - CSV/JSON artifact export per run and per batch

pub mod analytics;
pub mod export;
pub mod grid;
pub mod loader;
pub mod sweep;

pub use analytics::{performance_stats, PerformanceStats};
pub use export::{export_batch, export_run};
pub use grid::ParamGrid;
pub use loader::{load_fees, load_prices, load_signals_into, LoadError};
pub use sweep::{BatchResults, BatchRunner, FailedRun, RunReport, RunUnit};
