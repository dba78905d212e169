//! Candle — the fundamental market data unit.

use serde::{Deserialize, Serialize};

/// OHLCV candle for a single asset in a single time bucket.
///
/// `timestamp` is the bucket's epoch second. `volume` is quote-denominated
/// traded volume over the bucket, used for the 24h liquidity boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub asset: String,
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// High-to-low ratio, used by the bad-data anomaly guard.
    ///
    /// Returns infinity for a zero or negative low so the guard always
    /// trips on degenerate candles.
    pub fn high_low_ratio(&self) -> f64 {
        if self.low <= 0.0 {
            return f64::INFINITY;
        }
        self.high / self.low
    }
}
