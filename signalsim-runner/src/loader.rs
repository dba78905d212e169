//! CSV input loaders for prices, signals, and fee schedules.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use signalsim_core::domain::{Candle, Side, Signal, SignalStream};
use signalsim_core::fees::{FeeRates, FeeSchedule};
use signalsim_core::MemoryPriceStore;

/// Asset name that sets the schedule-wide default rates in a fee file.
const DEFAULT_FEE_ASSET: &str = "default";

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to load {path}: {source}")]
    Csv {
        path: PathBuf,
        source: csv::Error,
    },
}

fn csv_err(path: &Path) -> impl FnOnce(csv::Error) -> LoadError + '_ {
    move |source| LoadError::Csv {
        path: path.to_path_buf(),
        source,
    }
}

/// Load candles from a CSV with columns
/// `asset,timestamp,open,high,low,close,volume`.
pub fn load_prices(path: &Path) -> Result<MemoryPriceStore, LoadError> {
    let mut reader = csv::Reader::from_path(path).map_err(csv_err(path))?;
    let mut store = MemoryPriceStore::default();
    for row in reader.deserialize() {
        let candle: Candle = row.map_err(csv_err(path))?;
        store.insert(candle);
    }
    info!(path = %path.display(), candles = store.len(), "loaded prices");
    Ok(store)
}

#[derive(Debug, Deserialize)]
struct SignalRow {
    timestamp: i64,
    asset: String,
    prob_positive: f64,
    prob_negative: f64,
    high_boundary: f64,
    low_boundary: f64,
    life_time_hours: u32,
}

/// Load one side's signals from a CSV with columns
/// `timestamp,asset,prob_positive,prob_negative,high_boundary,low_boundary,life_time_hours`
/// into an existing stream. Long and short files share the format; the
/// side comes from the caller.
pub fn load_signals_into(
    stream: &mut SignalStream,
    path: &Path,
    side: Side,
) -> Result<(), LoadError> {
    let mut reader = csv::Reader::from_path(path).map_err(csv_err(path))?;
    let mut count = 0usize;
    for row in reader.deserialize() {
        let row: SignalRow = row.map_err(csv_err(path))?;
        stream.push(Signal {
            timestamp: row.timestamp,
            asset: row.asset,
            side,
            prob_positive: row.prob_positive,
            prob_negative: row.prob_negative,
            high_boundary: row.high_boundary,
            low_boundary: row.low_boundary,
            life_time_hours: row.life_time_hours,
        });
        count += 1;
    }
    info!(path = %path.display(), ?side, signals = count, "loaded signals");
    Ok(())
}

#[derive(Debug, Deserialize)]
struct FeeRow {
    asset: String,
    taker_fee: f64,
    leverage_buy_fee: f64,
    leverage_sell_fee: f64,
    leverage_interval_fee: f64,
    leverage_interval_hours: u32,
}

/// Load a fee schedule from a CSV with columns
/// `asset,taker_fee,leverage_buy_fee,leverage_sell_fee,leverage_interval_fee,leverage_interval_hours`.
/// A row for asset `default` replaces the schedule-wide defaults.
pub fn load_fees(path: &Path) -> Result<FeeSchedule, LoadError> {
    let mut reader = csv::Reader::from_path(path).map_err(csv_err(path))?;
    let mut default = FeeRates::default();
    let mut per_asset = std::collections::HashMap::new();
    for row in reader.deserialize() {
        let row: FeeRow = row.map_err(csv_err(path))?;
        let rates = FeeRates {
            taker_fee: row.taker_fee,
            leverage_buy_fee: row.leverage_buy_fee,
            leverage_sell_fee: row.leverage_sell_fee,
            leverage_interval_fee: row.leverage_interval_fee,
            leverage_interval_hours: row.leverage_interval_hours,
        };
        if row.asset == DEFAULT_FEE_ASSET {
            default = rates;
        } else {
            per_asset.insert(row.asset, rates);
        }
    }
    Ok(FeeSchedule::new(default, per_asset))
}
