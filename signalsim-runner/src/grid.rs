//! Parameter grid — candidate values per parameter, expanded into the full
//! cartesian product of concrete parameter sets.

use serde::{Deserialize, Serialize};

use signalsim_core::domain::Asset;
use signalsim_core::params::{
    ActiveLongStrategy, ActiveShortStrategy, ConfigError, LongEntryStrategy, ShortEntryStrategy,
    SimulationParameters, TrailingStrategy, DEFAULT_ANOMALY_RATIO,
};

/// Grid specification, usually loaded from TOML.
///
/// Every field lists the candidate values to test; the batch covers every
/// combination. Axes for optional strategies collapse to a single "off"
/// value when omitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParamGrid {
    pub initial_capital: Vec<f64>,
    pub max_capital_fraction_per_round: Vec<f64>,
    pub max_volume_fraction: Vec<f64>,
    pub min_investment: Vec<f64>,
    pub allow_shorts: Vec<bool>,
    pub allow_longs: Vec<bool>,
    pub leverage: Vec<f64>,
    pub min_prob_for_leverage: Vec<f64>,
    pub same_tick_same_asset_both_sides: Vec<bool>,
    pub apply_leverage_fee_on_full_equity: Vec<bool>,
    pub long_strategy: Vec<LongEntryStrategy>,
    pub short_strategy: Vec<ShortEntryStrategy>,
    /// `None` puts a single trailing-off value on the axis.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub long_trailing: Option<Vec<TrailingStrategy>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_trailing: Option<Vec<TrailingStrategy>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_long_strategy: Option<Vec<ActiveLongStrategy>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_short_strategy: Option<Vec<ActiveShortStrategy>>,
    pub tick_hours: Vec<u32>,
    /// `None` puts a single unrestricted value on the axis.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_allowlist: Option<Vec<Vec<Asset>>>,
    pub anomaly_ratio: Vec<f64>,
}

impl Default for ParamGrid {
    fn default() -> Self {
        Self {
            initial_capital: vec![1_000_000.0],
            max_capital_fraction_per_round: vec![0.2, 0.5],
            max_volume_fraction: vec![0.01],
            min_investment: vec![10_000.0],
            allow_shorts: vec![true],
            allow_longs: vec![true],
            leverage: vec![1.0, 2.0],
            min_prob_for_leverage: vec![0.8],
            same_tick_same_asset_both_sides: vec![true],
            apply_leverage_fee_on_full_equity: vec![false],
            long_strategy: vec![
                LongEntryStrategy {
                    min_prob_positive: 0.7,
                    max_prob_negative: 0.2,
                },
                LongEntryStrategy {
                    min_prob_positive: 0.8,
                    max_prob_negative: 0.2,
                },
            ],
            short_strategy: vec![ShortEntryStrategy {
                max_prob_positive: 0.3,
                min_prob_negative: 0.7,
            }],
            long_trailing: None,
            short_trailing: None,
            active_long_strategy: None,
            active_short_strategy: None,
            tick_hours: vec![1],
            asset_allowlist: None,
            anomaly_ratio: vec![DEFAULT_ANOMALY_RATIO],
        }
    }
}

impl ParamGrid {
    /// Total number of combinations the grid expands to.
    pub fn size(&self) -> usize {
        self.initial_capital.len()
            * self.max_capital_fraction_per_round.len()
            * self.max_volume_fraction.len()
            * self.min_investment.len()
            * self.allow_shorts.len()
            * self.allow_longs.len()
            * self.leverage.len()
            * self.min_prob_for_leverage.len()
            * self.same_tick_same_asset_both_sides.len()
            * self.apply_leverage_fee_on_full_equity.len()
            * self.long_strategy.len()
            * self.short_strategy.len()
            * option_axis_len(&self.long_trailing)
            * option_axis_len(&self.short_trailing)
            * option_axis_len(&self.active_long_strategy)
            * option_axis_len(&self.active_short_strategy)
            * self.tick_hours.len()
            * option_axis_len(&self.asset_allowlist)
            * self.anomaly_ratio.len()
    }

    /// Expand into every concrete parameter combination, validating each.
    ///
    /// Fails fast on an empty axis or an invalid combination so a broken
    /// grid never reaches the worker pool.
    pub fn expand(&self) -> Result<Vec<SimulationParameters>, ConfigError> {
        self.check_axes()?;

        let long_trailing = option_axis(&self.long_trailing);
        let short_trailing = option_axis(&self.short_trailing);
        let active_long = option_axis(&self.active_long_strategy);
        let active_short = option_axis(&self.active_short_strategy);
        let allowlists = option_axis(&self.asset_allowlist);

        let mut combinations = Vec::with_capacity(self.size());
        for &initial_capital in &self.initial_capital {
            for &max_capital_fraction_per_round in &self.max_capital_fraction_per_round {
                for &max_volume_fraction in &self.max_volume_fraction {
                    for &min_investment in &self.min_investment {
                        for &allow_shorts in &self.allow_shorts {
                            for &allow_longs in &self.allow_longs {
                                // A combination with both sides disabled is a
                                // grid artifact, not a configuration error.
                                if !allow_shorts && !allow_longs {
                                    continue;
                                }
                                self.expand_inner(
                                    &mut combinations,
                                    Base {
                                        initial_capital,
                                        max_capital_fraction_per_round,
                                        max_volume_fraction,
                                        min_investment,
                                        allow_shorts,
                                        allow_longs,
                                    },
                                    &long_trailing,
                                    &short_trailing,
                                    &active_long,
                                    &active_short,
                                    &allowlists,
                                )?;
                            }
                        }
                    }
                }
            }
        }
        Ok(combinations)
    }

    #[allow(clippy::too_many_arguments)]
    fn expand_inner(
        &self,
        out: &mut Vec<SimulationParameters>,
        base: Base,
        long_trailing: &[Option<TrailingStrategy>],
        short_trailing: &[Option<TrailingStrategy>],
        active_long: &[Option<ActiveLongStrategy>],
        active_short: &[Option<ActiveShortStrategy>],
        allowlists: &[Option<Vec<Asset>>],
    ) -> Result<(), ConfigError> {
        for &leverage in &self.leverage {
            for &min_prob_for_leverage in &self.min_prob_for_leverage {
                for &same_tick in &self.same_tick_same_asset_both_sides {
                    for &fee_on_full_equity in &self.apply_leverage_fee_on_full_equity {
                        for &long_strategy in &self.long_strategy {
                            for &short_strategy in &self.short_strategy {
                                for &lt in long_trailing {
                                    for &st in short_trailing {
                                        for &al in active_long {
                                            for &ash in active_short {
                                                for &tick_hours in &self.tick_hours {
                                                    for allowlist in allowlists {
                                                        for &anomaly_ratio in &self.anomaly_ratio {
                                                            let params = SimulationParameters {
                                                                initial_capital: base.initial_capital,
                                                                max_capital_fraction_per_round: base
                                                                    .max_capital_fraction_per_round,
                                                                max_volume_fraction: base
                                                                    .max_volume_fraction,
                                                                min_investment: base.min_investment,
                                                                allow_shorts: base.allow_shorts,
                                                                allow_longs: base.allow_longs,
                                                                leverage,
                                                                min_prob_for_leverage,
                                                                same_tick_same_asset_both_sides:
                                                                    same_tick,
                                                                apply_leverage_fee_on_full_equity:
                                                                    fee_on_full_equity,
                                                                long_strategy,
                                                                short_strategy,
                                                                long_trailing: lt,
                                                                short_trailing: st,
                                                                active_long_strategy: al,
                                                                active_short_strategy: ash,
                                                                tick_hours,
                                                                asset_allowlist: allowlist.clone(),
                                                                anomaly_ratio,
                                                            };
                                                            params.validate()?;
                                                            out.push(params);
                                                        }
                                                    }
                                                }
                                            }
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn check_axes(&self) -> Result<(), ConfigError> {
        let axes: [(&'static str, bool); 14] = [
            ("initial_capital", self.initial_capital.is_empty()),
            (
                "max_capital_fraction_per_round",
                self.max_capital_fraction_per_round.is_empty(),
            ),
            ("max_volume_fraction", self.max_volume_fraction.is_empty()),
            ("min_investment", self.min_investment.is_empty()),
            ("allow_shorts", self.allow_shorts.is_empty()),
            ("allow_longs", self.allow_longs.is_empty()),
            ("leverage", self.leverage.is_empty()),
            (
                "min_prob_for_leverage",
                self.min_prob_for_leverage.is_empty(),
            ),
            (
                "same_tick_same_asset_both_sides",
                self.same_tick_same_asset_both_sides.is_empty(),
            ),
            (
                "apply_leverage_fee_on_full_equity",
                self.apply_leverage_fee_on_full_equity.is_empty(),
            ),
            ("long_strategy", self.long_strategy.is_empty()),
            ("short_strategy", self.short_strategy.is_empty()),
            ("tick_hours", self.tick_hours.is_empty()),
            ("anomaly_ratio", self.anomaly_ratio.is_empty()),
        ];
        for (name, empty) in axes {
            if empty {
                return Err(ConfigError::EmptyGridAxis(name));
            }
        }
        Ok(())
    }
}

struct Base {
    initial_capital: f64,
    max_capital_fraction_per_round: f64,
    max_volume_fraction: f64,
    min_investment: f64,
    allow_shorts: bool,
    allow_longs: bool,
}

/// An omitted optional axis contributes a single "off" value.
fn option_axis<T: Clone>(values: &Option<Vec<T>>) -> Vec<Option<T>> {
    match values {
        None => vec![None],
        Some(values) => values.iter().cloned().map(Some).collect(),
    }
}

fn option_axis_len<T>(values: &Option<Vec<T>>) -> usize {
    values.as_ref().map_or(1, Vec::len).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_grid_expands_to_its_size() {
        let grid = ParamGrid::default();
        let combinations = grid.expand().unwrap();
        assert_eq!(combinations.len(), grid.size());
        assert!(combinations.len() > 1);
    }

    #[test]
    fn expansion_covers_the_cartesian_product() {
        let grid = ParamGrid {
            leverage: vec![1.0, 2.0, 3.0],
            max_capital_fraction_per_round: vec![0.2],
            long_strategy: vec![LongEntryStrategy {
                min_prob_positive: 0.7,
                max_prob_negative: 0.2,
            }],
            ..ParamGrid::default()
        };
        let combinations = grid.expand().unwrap();
        assert_eq!(combinations.len(), 3);
        let leverages: Vec<f64> = combinations.iter().map(|p| p.leverage).collect();
        assert_eq!(leverages, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn empty_axis_is_rejected() {
        let grid = ParamGrid {
            leverage: vec![],
            ..ParamGrid::default()
        };
        assert_eq!(grid.expand(), Err(ConfigError::EmptyGridAxis("leverage")));
    }

    #[test]
    fn invalid_combination_is_rejected() {
        let grid = ParamGrid {
            leverage: vec![0.5],
            ..ParamGrid::default()
        };
        assert!(matches!(
            grid.expand(),
            Err(ConfigError::LeverageBelowOne(_))
        ));
    }

    #[test]
    fn both_sides_disabled_combination_is_skipped() {
        let grid = ParamGrid {
            allow_longs: vec![true, false],
            allow_shorts: vec![true, false],
            leverage: vec![1.0],
            max_capital_fraction_per_round: vec![0.2],
            long_strategy: vec![LongEntryStrategy {
                min_prob_positive: 0.7,
                max_prob_negative: 0.2,
            }],
            ..ParamGrid::default()
        };
        let combinations = grid.expand().unwrap();
        // 2 x 2 side toggles minus the all-off combination.
        assert_eq!(combinations.len(), 3);
    }

    #[test]
    fn optional_axes_default_to_off() {
        let grid = ParamGrid::default();
        let combinations = grid.expand().unwrap();
        assert!(combinations.iter().all(|p| p.long_trailing.is_none()));
        assert!(combinations.iter().all(|p| p.asset_allowlist.is_none()));
    }

    #[test]
    fn grid_parses_from_toml() {
        let toml = r#"
            initial_capital = [500000.0]
            leverage = [1.0, 2.0]

            [[long_strategy]]
            min_prob_positive = 0.75
            max_prob_negative = 0.25

            [[long_trailing]]
            high_boundary = 0.04
            low_boundary = -0.02
        "#;
        let grid: ParamGrid = toml::from_str(toml).unwrap();
        assert_eq!(grid.initial_capital, vec![500_000.0]);
        assert_eq!(grid.leverage, vec![1.0, 2.0]);
        assert_eq!(grid.long_trailing.as_ref().unwrap().len(), 1);
        let combinations = grid.expand().unwrap();
        assert!(combinations.iter().all(|p| p.long_trailing.is_some()));
    }

    #[test]
    fn unknown_grid_field_is_rejected() {
        let toml = "initial_capitals = [1.0]";
        assert!(toml::from_str::<ParamGrid>(toml).is_err());
    }
}
