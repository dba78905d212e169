//! Read-only market data access.
//!
//! The store is loaded once before a batch starts and shared immutably
//! across every run (`&dyn PriceStore`). No run ever writes to it, so
//! concurrent reads from the worker pool are race-free by construction.

use std::collections::HashMap;

use crate::domain::Candle;
use crate::error::SimError;

const SECONDS_PER_HOUR: i64 = 3_600;

/// Point lookup of historical candles and trailing volume.
pub trait PriceStore: Send + Sync {
    /// The candle for `asset` at exactly `timestamp`.
    fn candle(&self, asset: &str, timestamp: i64) -> Result<&Candle, SimError>;

    /// Sum of `hours` hourly volume samples strictly before `end_timestamp`
    /// (samples at `end - k*3600`, k = 1..=hours). Used for the 24h
    /// liquidity boundary.
    fn volume_over_window(&self, asset: &str, end_timestamp: i64, hours: u32)
        -> Result<f64, SimError>;
}

/// In-memory candle store keyed by asset and timestamp.
#[derive(Debug, Clone, Default)]
pub struct MemoryPriceStore {
    by_asset: HashMap<String, HashMap<i64, Candle>>,
}

impl MemoryPriceStore {
    pub fn new(candles: impl IntoIterator<Item = Candle>) -> Self {
        let mut store = Self::default();
        for candle in candles {
            store.insert(candle);
        }
        store
    }

    pub fn insert(&mut self, candle: Candle) {
        self.by_asset
            .entry(candle.asset.clone())
            .or_default()
            .insert(candle.timestamp, candle);
    }

    pub fn len(&self) -> usize {
        self.by_asset.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_asset.is_empty()
    }
}

impl PriceStore for MemoryPriceStore {
    fn candle(&self, asset: &str, timestamp: i64) -> Result<&Candle, SimError> {
        self.by_asset
            .get(asset)
            .and_then(|series| series.get(&timestamp))
            .ok_or_else(|| SimError::MissingPriceData {
                asset: asset.to_string(),
                timestamp,
            })
    }

    fn volume_over_window(
        &self,
        asset: &str,
        end_timestamp: i64,
        hours: u32,
    ) -> Result<f64, SimError> {
        let mut total = 0.0;
        for k in 1..=i64::from(hours) {
            total += self.candle(asset, end_timestamp - k * SECONDS_PER_HOUR)?.volume;
        }
        Ok(total)
    }
}
