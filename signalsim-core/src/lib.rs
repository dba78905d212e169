//! SignalSim Core — tick-stepped trading-strategy simulation engine.
//!
//! This crate contains the heart of the backtester:
//! - Domain types (candles, signals, sides)
//! - Position lifecycle state machine with a single terminal close
//! - Portfolio capital accounting with a per-tick conservation identity
//! - Recursive fair-share capital allocation bounded by liquidity
//! - Per-asset fee schedule (taker, leverage borrow/repay, holding)
//! - The per-run tick loop

pub mod data;
pub mod domain;
pub mod engine;
pub mod error;
pub mod fees;
pub mod params;

pub use data::{MemoryPriceStore, PriceStore};
pub use domain::{Asset, Candle, Side, Signal, SignalStream};
pub use engine::{run, CapitalHistorySample, ClosedPositionRecord, RunOutput};
pub use error::SimError;
pub use fees::{FeeRates, FeeSchedule};
pub use params::{ConfigError, SimulationParameters};
