//! Portfolio — capital accounting and position bookkeeping for one run.
//!
//! All tick-time work on open positions goes through [`Portfolio::on_tick`]
//! with a [`TickOp`]: the op is applied to every active position, then any
//! position that became terminal is settled in the same call. Settlement is
//! the only place capital moves back to the liquid pool, so the conservation
//! identity can be checked after every tick.

use tracing::warn;

use crate::data::PriceStore;
use crate::domain::{Side, Signal};
use crate::engine::allocation::{allocate, AllocationInput};
use crate::engine::position::{CloseReason, ModelStop, OpenOrder, Position};
use crate::error::SimError;
use crate::fees::FeeSchedule;
use crate::params::SimulationParameters;

/// Hours of trailing volume backing the liquidity boundary.
const VOLUME_WINDOW_HOURS: u32 = 24;

/// One pass over the active positions.
#[derive(Debug, Clone, Copy)]
pub enum TickOp<'a> {
    /// Re-price every position against the tick's candle.
    MarkToMarket,
    /// Check candle extremes against profit/loss targets.
    CheckTargets,
    /// Close positions whose lifetime has elapsed.
    CheckExpiry,
    /// Close positions the fresh model readings turned against.
    CheckModelReversal(&'a [Signal]),
    /// End-of-run settlement of everything still open.
    ForceClose,
}

/// Close-outcome tallies, accumulated at settlement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeCounters {
    pub hit: u64,
    pub miss: u64,
    pub stopped: u64,
    pub expired: u64,
    pub trailed: u64,
}

/// Capital and positions for a single run.
#[derive(Debug, Clone)]
pub struct Portfolio {
    params: SimulationParameters,

    pub liquid_capital: f64,
    pub initial_capital: f64,
    /// Margin currently borrowed across active positions. Pure memo: the
    /// borrowed capital also sits inside position equity, so this bucket
    /// stays outside the conservation identity.
    pub leverage_capital_outstanding: f64,
    /// Fees paid by settled positions. Fees of still-active positions live
    /// on the positions themselves.
    pub fees_paid: f64,

    /// Net equity of active long positions, refreshed every tick.
    pub long_capital: f64,
    /// Net equity of active short positions, refreshed every tick.
    pub short_capital: f64,

    pub counters: OutcomeCounters,

    active: Vec<Position>,
    closed: Vec<Position>,
}

impl Portfolio {
    pub fn new(params: &SimulationParameters) -> Self {
        Self {
            liquid_capital: params.initial_capital,
            initial_capital: params.initial_capital,
            leverage_capital_outstanding: 0.0,
            fees_paid: 0.0,
            long_capital: 0.0,
            short_capital: 0.0,
            counters: OutcomeCounters::default(),
            active: Vec::new(),
            closed: Vec::new(),
            params: params.clone(),
        }
    }

    pub fn active_positions(&self) -> &[Position] {
        &self.active
    }

    pub fn closed_positions(&self) -> &[Position] {
        &self.closed
    }

    pub fn into_closed_positions(self) -> Vec<Position> {
        self.closed
    }

    pub fn has_active_positions(&self) -> bool {
        !self.active.is_empty()
    }

    /// Apply `op` to every active position, then settle whatever closed.
    pub fn on_tick(
        &mut self,
        op: TickOp<'_>,
        timestamp: i64,
        store: &dyn PriceStore,
        fees: &FeeSchedule,
    ) -> Result<(), SimError> {
        for position in &mut self.active {
            match op {
                TickOp::MarkToMarket => {
                    let candle = store.candle(&position.asset, timestamp)?;
                    position.mark_to_market(candle, self.params.tick_hours, fees)?;
                }
                TickOp::CheckTargets => {
                    let candle = store.candle(&position.asset, timestamp)?;
                    position.check_targets(candle, self.params.anomaly_ratio, fees)?;
                }
                TickOp::CheckExpiry => position.check_expiry(timestamp, fees)?,
                TickOp::CheckModelReversal(signals) => {
                    position.check_model_reversal(signals, timestamp, fees)?;
                }
                TickOp::ForceClose => position.force_close(timestamp, fees)?,
            }
        }
        self.settle_closed();
        self.refresh_side_buckets();
        Ok(())
    }

    /// Charge the periodic holding fee on every leveraged active position.
    pub fn apply_leverage_fees(&mut self, fees: &FeeSchedule) {
        if self.params.leverage <= 1.0 || self.active.is_empty() {
            return;
        }
        for position in &mut self.active {
            position.apply_leverage_fee(fees);
        }
        self.refresh_side_buckets();
    }

    fn settle_closed(&mut self) {
        let positions = std::mem::take(&mut self.active);
        for position in positions {
            match position.close_reason() {
                None => self.active.push(position),
                Some(reason) => {
                    match reason {
                        CloseReason::HitTarget => self.counters.hit += 1,
                        CloseReason::Expired => self.counters.expired += 1,
                        CloseReason::ModelStop => self.counters.stopped += 1,
                        CloseReason::HitLoss | CloseReason::Liquidated => {
                            self.counters.miss += 1
                        }
                    }
                    self.counters.trailed += u64::from(position.trailing_count);
                    self.fees_paid += position.fees_paid;
                    self.liquid_capital += position.net_equity();
                    self.leverage_capital_outstanding -= position.leverage_margin;
                    self.closed.push(position);
                }
            }
        }
    }

    fn refresh_side_buckets(&mut self) {
        self.long_capital = 0.0;
        self.short_capital = 0.0;
        for position in &self.active {
            match position.side {
                Side::Long => self.long_capital += position.net_equity(),
                Side::Short => self.short_capital += position.net_equity(),
            }
        }
    }

    /// Open positions for this tick's accepted signals.
    ///
    /// Filters (side switches, per-asset dedupe, entry thresholds, liquidity
    /// boundary) run first; the survivors compete in one fair-share
    /// allocation round over the tick's capital budget.
    pub fn enter_new_positions(
        &mut self,
        signals: &[Signal],
        timestamp: i64,
        store: &dyn PriceStore,
        fees: &FeeSchedule,
    ) -> Result<(), SimError> {
        let available = self.liquid_capital * self.params.max_capital_fraction_per_round;
        if available < self.params.min_investment {
            return Ok(());
        }

        let mut seen_assets: Vec<&str> = Vec::new();
        let mut candidates: Vec<(&Signal, f64)> = Vec::new();
        for signal in signals {
            // First signal per asset claims it for the tick, even if a later
            // filter drops it.
            if !self.params.same_tick_same_asset_both_sides {
                if seen_assets.iter().any(|a| *a == signal.asset) {
                    continue;
                }
                seen_assets.push(&signal.asset);
            }
            // Liquidity is checked before the strategy thresholds, so an
            // illiquid asset is warned about even when its signal would
            // not have entered.
            let window_volume =
                store.volume_over_window(&signal.asset, timestamp, VOLUME_WINDOW_HOURS)?;
            let boundary = self.params.max_volume_fraction * window_volume;
            if boundary < self.params.min_investment {
                warn!(
                    asset = %signal.asset,
                    boundary,
                    min_investment = self.params.min_investment,
                    "skipping illiquid candidate"
                );
                continue;
            }

            if !self.side_enabled(signal.side) {
                continue;
            }
            if !self.passes_entry_thresholds(signal) {
                continue;
            }
            candidates.push((signal, boundary));
        }
        if candidates.is_empty() {
            return Ok(());
        }

        let inputs: Vec<AllocationInput> = candidates
            .iter()
            .map(|(signal, boundary)| AllocationInput {
                prob: signal.directional_prob(),
                volume_boundary: *boundary,
            })
            .collect();
        let allocations = allocate(&inputs, available, self.params.min_investment);

        for ((signal, _), allocated) in candidates.into_iter().zip(allocations) {
            if allocated <= 0.0 {
                continue;
            }
            self.invest(signal, allocated, timestamp, store, fees)?;
        }
        self.refresh_side_buckets();
        Ok(())
    }

    fn invest(
        &mut self,
        signal: &Signal,
        allocated: f64,
        timestamp: i64,
        store: &dyn PriceStore,
        fees: &FeeSchedule,
    ) -> Result<(), SimError> {
        let leveraged = self.params.leverage > 1.0
            && signal.directional_prob() >= self.params.min_prob_for_leverage;
        let (leverage, margin) = if leveraged {
            (self.params.leverage, allocated * (self.params.leverage - 1.0))
        } else {
            (1.0, 0.0)
        };

        let entry_price = store.candle(&signal.asset, timestamp)?.open;
        let (trailing, model_stop) = match signal.side {
            Side::Long => (
                self.params.long_trailing,
                self.params.active_long_strategy.map(|s| ModelStop {
                    adverse_min: s.max_prob_negative,
                }),
            ),
            Side::Short => (
                self.params.short_trailing,
                self.params.active_short_strategy.map(|s| ModelStop {
                    adverse_min: s.max_prob_positive,
                }),
            ),
        };

        let position = Position::open(
            OpenOrder {
                signal,
                entry_price,
                entry_time: timestamp,
                allocated,
                leverage_margin: margin,
                leverage,
                apply_leverage_fee_on_full_equity: self.params.apply_leverage_fee_on_full_equity,
                trailing,
                model_stop,
            },
            fees,
        );

        self.liquid_capital -= allocated;
        self.leverage_capital_outstanding += margin;
        self.active.push(position);
        Ok(())
    }

    fn side_enabled(&self, side: Side) -> bool {
        match side {
            Side::Long => self.params.allow_longs,
            Side::Short => self.params.allow_shorts,
        }
    }

    fn passes_entry_thresholds(&self, signal: &Signal) -> bool {
        match signal.side {
            Side::Long => {
                signal.prob_positive >= self.params.long_strategy.min_prob_positive
                    && signal.prob_negative < self.params.long_strategy.max_prob_negative
            }
            Side::Short => {
                signal.prob_positive < self.params.short_strategy.max_prob_positive
                    && signal.prob_negative >= self.params.short_strategy.min_prob_negative
            }
        }
    }

    /// Deviation from the capital-conservation identity.
    ///
    /// Everything the portfolio currently holds (liquid, active net equity,
    /// fees collected) must equal the initial capital plus the market gains
    /// and losses of every position opened so far. Stays within float noise
    /// of zero after every tick.
    pub fn conservation_gap(&self) -> f64 {
        let active_net: f64 = self.active.iter().map(Position::net_equity).sum();
        let active_fees: f64 = self.active.iter().map(|p| p.fees_paid).sum();
        let market_pnl: f64 = self
            .active
            .iter()
            .chain(&self.closed)
            .map(|p| p.equity + p.fees_paid - p.entry_capital)
            .sum();

        let held = self.liquid_capital + active_net + self.fees_paid + active_fees;
        let expected = self.initial_capital + market_pnl;
        held - expected
    }
}
