//! Position lifecycle state machine.
//!
//! A position is opened from a signal, marked to market each tick, and
//! closed exactly once for exactly one reason. All closing paths funnel
//! through [`Position::close`], which charges exit fees, freezes the end
//! time, and flips the state to `Closed`. A second close is a lifecycle
//! bug and surfaces as [`SimError::DoubleClose`].

use serde::{Deserialize, Serialize};

use crate::domain::{Candle, Side, Signal};
use crate::error::SimError;
use crate::fees::FeeSchedule;
use crate::params::TrailingStrategy;

/// Why a position left the market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// The favorable price target was breached.
    HitTarget,
    /// The unfavorable target was breached, both targets were straddled in
    /// one candle, or the candle looked like bad data.
    HitLoss,
    /// The position outlived its signal's lifetime.
    Expired,
    /// Equity fell to or below the borrowed margin.
    Liquidated,
    /// A fresh model reading turned against the open position.
    ModelStop,
}

/// Lifecycle state. `Closed` carries its reason, so a position can never
/// be terminal without one or carry two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionState {
    Active,
    Closed(CloseReason),
}

/// Early-exit threshold checked against fresh model readings while the
/// position is open. `adverse_min` is compared to the probability of the
/// move against the position; the supporting probability is not consulted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelStop {
    pub adverse_min: f64,
}

/// Everything needed to open a position, assembled by the portfolio's
/// investment round.
#[derive(Debug, Clone)]
pub struct OpenOrder<'a> {
    pub signal: &'a Signal,
    pub entry_price: f64,
    pub entry_time: i64,
    /// The trader's own capital put into the position.
    pub allocated: f64,
    /// Borrowed capital on top of the allocation; 0 when unleveraged.
    pub leverage_margin: f64,
    pub leverage: f64,
    pub apply_leverage_fee_on_full_equity: bool,
    pub trailing: Option<TrailingStrategy>,
    pub model_stop: Option<ModelStop>,
}

/// One market position from entry to settlement.
#[derive(Debug, Clone, Serialize)]
pub struct Position {
    pub asset: String,
    pub side: Side,
    pub entry_time: i64,
    pub end_time: Option<i64>,

    /// Reference prices for target checks. The first entry is the fill
    /// price; each trailing re-base pushes the price it trailed at.
    pub entry_prices: Vec<f64>,
    /// Price the position was last marked at.
    pub last_price: f64,

    /// Current market value including borrowed margin.
    pub equity: f64,
    /// Total capital at entry: allocation plus margin.
    pub entry_capital: f64,
    pub leverage_margin: f64,
    pub leverage: f64,

    /// Fractional move of the candle high that counts as a breach.
    pub positive_target: f64,
    /// Fractional move of the candle low that counts as a breach.
    pub negative_target: f64,

    pub life_time_hours: u32,
    pub initial_life_time_hours: u32,
    pub hours_open: u32,

    pub fees_paid: f64,
    pub trailing_count: u32,
    pub state: PositionState,

    apply_leverage_fee_on_full_equity: bool,
    trailing: Option<TrailingStrategy>,
    model_stop: Option<ModelStop>,
}

impl Position {
    /// Fill the order at its entry price, charging the taker fee on the
    /// full entry capital and, when leveraged, the borrow fee on margin.
    pub fn open(order: OpenOrder<'_>, fees: &FeeSchedule) -> Self {
        let signal = order.signal;
        let entry_capital = order.allocated + order.leverage_margin;

        let mut entry_fees = fees.taker_fee(&signal.asset, entry_capital);
        if order.leverage > 1.0 {
            entry_fees += fees.leverage_buy_fee(&signal.asset, order.leverage_margin);
        }

        Self {
            asset: signal.asset.clone(),
            side: signal.side,
            entry_time: order.entry_time,
            end_time: None,
            entry_prices: vec![order.entry_price],
            last_price: order.entry_price,
            equity: entry_capital - entry_fees,
            entry_capital,
            leverage_margin: order.leverage_margin,
            leverage: order.leverage,
            positive_target: signal.high_boundary,
            negative_target: signal.low_boundary,
            life_time_hours: signal.life_time_hours,
            initial_life_time_hours: signal.life_time_hours,
            hours_open: 0,
            fees_paid: entry_fees,
            trailing_count: 0,
            state: PositionState::Active,
            apply_leverage_fee_on_full_equity: order.apply_leverage_fee_on_full_equity,
            trailing: order.trailing,
            model_stop: order.model_stop,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state == PositionState::Active
    }

    pub fn close_reason(&self) -> Option<CloseReason> {
        match self.state {
            PositionState::Active => None,
            PositionState::Closed(reason) => Some(reason),
        }
    }

    /// Equity net of borrowed margin; what settlement returns to liquid
    /// capital.
    pub fn net_equity(&self) -> f64 {
        self.equity - self.leverage_margin
    }

    /// Fractional return on the trader's own capital.
    pub fn roi(&self) -> f64 {
        let own_capital = self.entry_capital - self.leverage_margin;
        self.net_equity() / own_capital - 1.0
    }

    /// Re-price equity against the candle's open and advance the open-hours
    /// counter. A position whose equity falls to the margin line is
    /// liquidated here, before any target check can see the candle. The
    /// unleveraged margin line is zero, so liquidation then means total
    /// loss.
    pub fn mark_to_market(
        &mut self,
        candle: &Candle,
        tick_hours: u32,
        fees: &FeeSchedule,
    ) -> Result<(), SimError> {
        if !self.is_active() {
            return Ok(());
        }

        let mut change = candle.open / self.last_price - 1.0;
        if self.side == Side::Short {
            change = -change;
        }
        self.equity += self.equity * change;
        self.last_price = candle.open;
        self.hours_open += tick_hours;

        if self.equity <= self.leverage_margin {
            self.close(CloseReason::Liquidated, candle.timestamp, fees)?;
        }
        Ok(())
    }

    /// Charge the periodic holding fee when a full interval has elapsed.
    /// Unleveraged positions never owe it.
    pub fn apply_leverage_fee(&mut self, fees: &FeeSchedule) {
        if !self.is_active() || self.leverage <= 1.0 {
            return;
        }
        if !fees.is_leverage_fee_due(&self.asset, self.hours_open) {
            return;
        }
        let base = if self.apply_leverage_fee_on_full_equity {
            self.equity
        } else {
            self.leverage_margin
        };
        let fee = fees.leverage_time_fee(&self.asset, base);
        self.equity -= fee;
        self.fees_paid += fee;
    }

    /// Compare the candle's extremes against the current reference price.
    ///
    /// A candle whose high/low ratio exceeds `anomaly_ratio` is treated as
    /// bad data and forces a loss close. A candle breaching both targets
    /// is unresolvable intra-tick and also closes at a loss. A favorable
    /// breach trails (re-bases targets and doubles the lifetime) when a
    /// trailing strategy is set, otherwise closes at the target.
    pub fn check_targets(
        &mut self,
        candle: &Candle,
        anomaly_ratio: f64,
        fees: &FeeSchedule,
    ) -> Result<(), SimError> {
        if !self.is_active() {
            return Ok(());
        }

        if candle.high_low_ratio() > anomaly_ratio {
            return self.close(CloseReason::HitLoss, candle.timestamp, fees);
        }

        let reference = *self
            .entry_prices
            .last()
            .unwrap_or(&self.last_price);
        let high_change = candle.high / reference - 1.0;
        let low_change = candle.low / reference - 1.0;

        let high_breached = high_change >= self.positive_target;
        let low_breached = low_change <= self.negative_target;

        let (favorable, unfavorable) = match self.side {
            Side::Long => (high_breached, low_breached),
            Side::Short => (low_breached, high_breached),
        };

        if favorable && unfavorable {
            return self.close(CloseReason::HitLoss, candle.timestamp, fees);
        }
        if favorable {
            match self.trailing {
                Some(trailing) => self.trail(trailing),
                None => return self.close(CloseReason::HitTarget, candle.timestamp, fees),
            }
        } else if unfavorable {
            return self.close(CloseReason::HitLoss, candle.timestamp, fees);
        }
        Ok(())
    }

    fn trail(&mut self, trailing: TrailingStrategy) {
        self.entry_prices.push(self.last_price);
        self.positive_target = trailing.high_boundary;
        self.negative_target = trailing.low_boundary;
        self.life_time_hours *= 2;
        self.trailing_count += 1;
    }

    /// Close when the open hours match the (possibly trailed) lifetime
    /// exactly.
    pub fn check_expiry(&mut self, timestamp: i64, fees: &FeeSchedule) -> Result<(), SimError> {
        if self.is_active() && self.hours_open == self.life_time_hours {
            return self.close(CloseReason::Expired, timestamp, fees);
        }
        Ok(())
    }

    /// Close early when a fresh reading for this asset turns against the
    /// position: the adverse probability clears `adverse_min`.
    pub fn check_model_reversal(
        &mut self,
        signals: &[Signal],
        timestamp: i64,
        fees: &FeeSchedule,
    ) -> Result<(), SimError> {
        let Some(stop) = self.model_stop else {
            return Ok(());
        };
        if !self.is_active() {
            return Ok(());
        }
        let Some(signal) = signals.iter().find(|s| s.asset == self.asset) else {
            return Ok(());
        };

        let adverse = match self.side {
            Side::Long => signal.prob_negative,
            Side::Short => signal.prob_positive,
        };
        if adverse >= stop.adverse_min {
            return self.close(CloseReason::ModelStop, timestamp, fees);
        }
        Ok(())
    }

    /// End-of-run settlement for positions still open after the last tick.
    pub fn force_close(&mut self, timestamp: i64, fees: &FeeSchedule) -> Result<(), SimError> {
        if self.is_active() {
            return self.close(CloseReason::Expired, timestamp, fees);
        }
        Ok(())
    }

    /// Charge exit fees, freeze the end time, and enter the terminal state.
    pub fn close(
        &mut self,
        reason: CloseReason,
        timestamp: i64,
        fees: &FeeSchedule,
    ) -> Result<(), SimError> {
        if !self.is_active() {
            return Err(SimError::DoubleClose {
                asset: self.asset.clone(),
            });
        }

        let mut exit_fees = fees.taker_fee(&self.asset, self.equity);
        if self.leverage > 1.0 {
            exit_fees += fees.leverage_sell_fee(&self.asset, self.leverage_margin);
        }
        self.equity -= exit_fees;
        self.fees_paid += exit_fees;
        self.end_time = Some(timestamp);
        self.state = PositionState::Closed(reason);
        Ok(())
    }
}
