//! Engine error types.
//!
//! `SimError` covers conditions that are fatal to a single run. Non-fatal
//! conditions (insufficient liquidity or capital, anomalous candles) are
//! handled inline and logged; they never surface as error values.

use thiserror::Error;

/// Errors that abort one simulation run.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SimError {
    /// The price store has no candle for this asset/time.
    #[error("no candle for {asset} at {timestamp}")]
    MissingPriceData { asset: String, timestamp: i64 },

    /// A terminal position was closed a second time. Indicates a bug in
    /// the lifecycle dispatch, never expected in normal operation.
    #[error("position for {asset} closed twice")]
    DoubleClose { asset: String },

    /// The signal stream is empty, so the run has no time interval.
    #[error("signal stream is empty")]
    EmptySignalStream,
}
