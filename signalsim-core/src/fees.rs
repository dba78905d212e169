//! Fee schedule — per-asset rates with global defaults.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default rates applied when an asset has no individual entry.
pub const DEFAULT_TAKER_FEE: f64 = 0.009;
pub const DEFAULT_LEVERAGE_BUY_FEE: f64 = 0.000_75;
pub const DEFAULT_LEVERAGE_SELL_FEE: f64 = 0.000_75;
pub const DEFAULT_LEVERAGE_INTERVAL_FEE: f64 = 0.001_5;
pub const DEFAULT_LEVERAGE_INTERVAL_HOURS: u32 = 24;

/// Fee rates for one asset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeeRates {
    pub taker_fee: f64,
    pub leverage_buy_fee: f64,
    pub leverage_sell_fee: f64,
    /// Periodic fee charged every `leverage_interval_hours` a leveraged
    /// position stays open.
    pub leverage_interval_fee: f64,
    pub leverage_interval_hours: u32,
}

impl Default for FeeRates {
    fn default() -> Self {
        Self {
            taker_fee: DEFAULT_TAKER_FEE,
            leverage_buy_fee: DEFAULT_LEVERAGE_BUY_FEE,
            leverage_sell_fee: DEFAULT_LEVERAGE_SELL_FEE,
            leverage_interval_fee: DEFAULT_LEVERAGE_INTERVAL_FEE,
            leverage_interval_hours: DEFAULT_LEVERAGE_INTERVAL_HOURS,
        }
    }
}

/// Fee-rate lookup by asset. Loaded once, read-only during a batch.
#[derive(Debug, Clone, Default)]
pub struct FeeSchedule {
    default: FeeRates,
    per_asset: HashMap<String, FeeRates>,
}

impl FeeSchedule {
    pub fn new(default: FeeRates, per_asset: HashMap<String, FeeRates>) -> Self {
        Self { default, per_asset }
    }

    pub fn insert(&mut self, asset: impl Into<String>, rates: FeeRates) {
        self.per_asset.insert(asset.into(), rates);
    }

    fn rates(&self, asset: &str) -> &FeeRates {
        self.per_asset.get(asset).unwrap_or(&self.default)
    }

    /// Taker fee for an immediately-filled order on `capital`.
    pub fn taker_fee(&self, asset: &str, capital: f64) -> f64 {
        capital * self.rates(asset).taker_fee
    }

    /// Fee for borrowing `margin` on entry.
    pub fn leverage_buy_fee(&self, asset: &str, margin: f64) -> f64 {
        margin * self.rates(asset).leverage_buy_fee
    }

    /// Fee for repaying `margin` on close.
    pub fn leverage_sell_fee(&self, asset: &str, margin: f64) -> f64 {
        margin * self.rates(asset).leverage_sell_fee
    }

    /// Periodic holding fee on `capital` for one elapsed interval.
    pub fn leverage_time_fee(&self, asset: &str, capital: f64) -> f64 {
        capital * self.rates(asset).leverage_interval_fee
    }

    /// Whether a full leverage-fee interval has just elapsed.
    pub fn is_leverage_fee_due(&self, asset: &str, hours_open: u32) -> bool {
        let interval = self.rates(asset).leverage_interval_hours;
        interval > 0 && hours_open > 0 && hours_open % interval == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_rates_apply_to_unknown_assets() {
        let schedule = FeeSchedule::default();
        assert!((schedule.taker_fee("XRP", 1_000.0) - 9.0).abs() < 1e-12);
        assert!((schedule.leverage_buy_fee("XRP", 1_000.0) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn per_asset_rates_override_defaults() {
        let mut schedule = FeeSchedule::default();
        schedule.insert(
            "BTC",
            FeeRates {
                taker_fee: 0.001,
                ..FeeRates::default()
            },
        );
        assert!((schedule.taker_fee("BTC", 1_000.0) - 1.0).abs() < 1e-12);
        assert!((schedule.taker_fee("ETH", 1_000.0) - 9.0).abs() < 1e-12);
    }

    #[test]
    fn leverage_fee_due_on_interval_multiples() {
        let schedule = FeeSchedule::default();
        assert!(!schedule.is_leverage_fee_due("BTC", 0));
        assert!(!schedule.is_leverage_fee_due("BTC", 23));
        assert!(schedule.is_leverage_fee_due("BTC", 24));
        assert!(!schedule.is_leverage_fee_due("BTC", 25));
        assert!(schedule.is_leverage_fee_due("BTC", 48));
    }

    #[test]
    fn custom_interval_respected() {
        let mut schedule = FeeSchedule::default();
        schedule.insert(
            "BTC",
            FeeRates {
                leverage_interval_hours: 8,
                ..FeeRates::default()
            },
        );
        assert!(schedule.is_leverage_fee_due("BTC", 8));
        assert!(schedule.is_leverage_fee_due("BTC", 16));
        assert!(!schedule.is_leverage_fee_due("BTC", 12));
    }
}
