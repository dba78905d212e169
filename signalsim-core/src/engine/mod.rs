//! Simulation engine: clock, position lifecycle, allocation, portfolio
//! accounting, and the per-run tick loop.

pub mod allocation;
pub mod clock;
pub mod portfolio;
pub mod position;
pub mod run;

pub use allocation::{allocate, confidence_fraction, AllocationInput};
pub use clock::Clock;
pub use portfolio::{OutcomeCounters, Portfolio, TickOp};
pub use position::{CloseReason, ModelStop, OpenOrder, Position, PositionState};
pub use run::{run, CapitalHistorySample, ClosedPositionRecord, RunOutput};
