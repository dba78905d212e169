//! Simulation parameters — one concrete combination per run.
//!
//! A `SimulationParameters` value is immutable for its run's lifetime and
//! owned exclusively by that run. The batch layer produces one value per
//! point of the configured parameter grid.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::Asset;

/// Entry thresholds for opening a long position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LongEntryStrategy {
    pub min_prob_positive: f64,
    pub max_prob_negative: f64,
}

/// Entry thresholds for opening a short position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShortEntryStrategy {
    pub max_prob_positive: f64,
    pub min_prob_negative: f64,
}

/// Re-basing targets applied after a favorable breach instead of closing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrailingStrategy {
    pub high_boundary: f64,
    pub low_boundary: f64,
}

/// Model-driven early-exit thresholds for open long positions. Only the
/// adverse threshold (`max_prob_negative`) is enforced; the support-side
/// field is carried for configuration compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActiveLongStrategy {
    pub max_prob_negative: f64,
    pub min_prob_positive: f64,
}

/// Model-driven early-exit thresholds for open short positions. Only the
/// adverse threshold (`max_prob_positive`) is enforced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActiveShortStrategy {
    pub max_prob_positive: f64,
    pub min_prob_negative: f64,
}

/// Default threshold for the bad-data high/low jump guard.
pub const DEFAULT_ANOMALY_RATIO: f64 = 2.0;

/// Full parameter set for a single simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationParameters {
    pub initial_capital: f64,

    /// Fraction of liquid capital available per investment round.
    pub max_capital_fraction_per_round: f64,

    /// Cap on position size as a fraction of the asset's trailing 24h volume.
    pub max_volume_fraction: f64,

    /// Minimum capital per position; candidates below it are skipped.
    pub min_investment: f64,

    pub allow_shorts: bool,
    pub allow_longs: bool,

    /// Leverage multiplier, >= 1. At 1 no margin is borrowed.
    pub leverage: f64,

    /// Directional probability a candidate must clear for leverage to apply.
    pub min_prob_for_leverage: f64,

    /// Accept a long and a short signal for the same asset in the same tick.
    pub same_tick_same_asset_both_sides: bool,

    /// Charge the periodic leverage fee against full equity rather than
    /// against margin only.
    pub apply_leverage_fee_on_full_equity: bool,

    pub long_strategy: LongEntryStrategy,
    pub short_strategy: ShortEntryStrategy,

    pub long_trailing: Option<TrailingStrategy>,
    pub short_trailing: Option<TrailingStrategy>,

    pub active_long_strategy: Option<ActiveLongStrategy>,
    pub active_short_strategy: Option<ActiveShortStrategy>,

    /// Clock step in hours.
    pub tick_hours: u32,

    /// Restrict entries to these assets; `None` invests in every asset
    /// present in the signal stream.
    pub asset_allowlist: Option<Vec<Asset>>,

    /// High/low ratio above which a candle is treated as bad data and the
    /// position is force-closed at a loss.
    pub anomaly_ratio: f64,
}

/// Fatal configuration problems, detected at batch construction before any
/// run starts.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("initial capital must be positive, got {0}")]
    NonPositiveCapital(f64),

    #[error("minimum investment must be positive, got {0}")]
    NonPositiveMinInvestment(f64),

    #[error("{name} must be in (0, 1], got {value}")]
    FractionOutOfRange { name: &'static str, value: f64 },

    #[error("leverage must be >= 1, got {0}")]
    LeverageBelowOne(f64),

    #[error("tick size must be at least one hour")]
    ZeroTickHours,

    #[error("both long and short sides are disabled")]
    NoSidesEnabled,

    #[error("anomaly ratio must exceed 1, got {0}")]
    AnomalyRatioTooLow(f64),

    #[error("{name} must be a probability in [0, 1], got {value}")]
    ProbabilityOutOfRange { name: &'static str, value: f64 },

    #[error("parameter grid has an empty candidate list for '{0}'")]
    EmptyGridAxis(&'static str),
}

impl SimulationParameters {
    /// Check the parameter set for contradictions and out-of-range values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_capital <= 0.0 {
            return Err(ConfigError::NonPositiveCapital(self.initial_capital));
        }
        if self.min_investment <= 0.0 {
            return Err(ConfigError::NonPositiveMinInvestment(self.min_investment));
        }
        check_fraction(
            "max_capital_fraction_per_round",
            self.max_capital_fraction_per_round,
        )?;
        check_fraction("max_volume_fraction", self.max_volume_fraction)?;
        if self.leverage < 1.0 {
            return Err(ConfigError::LeverageBelowOne(self.leverage));
        }
        if self.tick_hours == 0 {
            return Err(ConfigError::ZeroTickHours);
        }
        if !self.allow_longs && !self.allow_shorts {
            return Err(ConfigError::NoSidesEnabled);
        }
        if self.anomaly_ratio <= 1.0 {
            return Err(ConfigError::AnomalyRatioTooLow(self.anomaly_ratio));
        }

        check_prob("min_prob_for_leverage", self.min_prob_for_leverage)?;
        check_prob("long.min_prob_positive", self.long_strategy.min_prob_positive)?;
        check_prob("long.max_prob_negative", self.long_strategy.max_prob_negative)?;
        check_prob("short.max_prob_positive", self.short_strategy.max_prob_positive)?;
        check_prob("short.min_prob_negative", self.short_strategy.min_prob_negative)?;
        if let Some(active) = &self.active_long_strategy {
            check_prob("active_long.max_prob_negative", active.max_prob_negative)?;
            check_prob("active_long.min_prob_positive", active.min_prob_positive)?;
        }
        if let Some(active) = &self.active_short_strategy {
            check_prob("active_short.max_prob_positive", active.max_prob_positive)?;
            check_prob("active_short.min_prob_negative", active.min_prob_negative)?;
        }
        Ok(())
    }
}

fn check_fraction(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value <= 0.0 || value > 1.0 {
        return Err(ConfigError::FractionOutOfRange { name, value });
    }
    Ok(())
}

fn check_prob(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::ProbabilityOutOfRange { name, value });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn sample_params() -> SimulationParameters {
        SimulationParameters {
            initial_capital: 1_000_000.0,
            max_capital_fraction_per_round: 0.2,
            max_volume_fraction: 0.01,
            min_investment: 10_000.0,
            allow_shorts: true,
            allow_longs: true,
            leverage: 1.0,
            min_prob_for_leverage: 0.8,
            same_tick_same_asset_both_sides: true,
            apply_leverage_fee_on_full_equity: false,
            long_strategy: LongEntryStrategy {
                min_prob_positive: 0.8,
                max_prob_negative: 0.2,
            },
            short_strategy: ShortEntryStrategy {
                max_prob_positive: 0.4,
                min_prob_negative: 0.8,
            },
            long_trailing: None,
            short_trailing: None,
            active_long_strategy: None,
            active_short_strategy: None,
            tick_hours: 1,
            asset_allowlist: None,
            anomaly_ratio: DEFAULT_ANOMALY_RATIO,
        }
    }

    #[test]
    fn valid_params_pass() {
        assert_eq!(sample_params().validate(), Ok(()));
    }

    #[test]
    fn rejects_non_positive_capital() {
        let mut p = sample_params();
        p.initial_capital = 0.0;
        assert!(matches!(
            p.validate(),
            Err(ConfigError::NonPositiveCapital(_))
        ));
    }

    #[test]
    fn rejects_fraction_above_one() {
        let mut p = sample_params();
        p.max_volume_fraction = 1.5;
        assert!(matches!(
            p.validate(),
            Err(ConfigError::FractionOutOfRange { .. })
        ));
    }

    #[test]
    fn rejects_leverage_below_one() {
        let mut p = sample_params();
        p.leverage = 0.5;
        assert!(matches!(p.validate(), Err(ConfigError::LeverageBelowOne(_))));
    }

    #[test]
    fn rejects_both_sides_disabled() {
        let mut p = sample_params();
        p.allow_longs = false;
        p.allow_shorts = false;
        assert_eq!(p.validate(), Err(ConfigError::NoSidesEnabled));
    }

    #[test]
    fn rejects_bad_active_strategy_probability() {
        let mut p = sample_params();
        p.active_long_strategy = Some(ActiveLongStrategy {
            max_prob_negative: 1.2,
            min_prob_positive: 0.6,
        });
        assert!(matches!(
            p.validate(),
            Err(ConfigError::ProbabilityOutOfRange { .. })
        ));
    }

    #[test]
    fn params_serialization_roundtrip() {
        let p = sample_params();
        let json = serde_json::to_string(&p).unwrap();
        let deser: SimulationParameters = serde_json::from_str(&json).unwrap();
        assert_eq!(p, deser);
    }
}
