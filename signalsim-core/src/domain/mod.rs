//! Domain types for the simulation engine.

pub mod candle;
pub mod signal;

pub use candle::Candle;
pub use signal::{Side, Signal, SignalStream};

/// Asset symbol alias
pub type Asset = String;
