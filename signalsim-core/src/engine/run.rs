//! Single-run tick loop.
//!
//! A run walks the clock from the first to the last signal timestamp. Each
//! tick re-prices open positions, charges holding fees, checks exits, and
//! invests in the tick's accepted signals, then records one capital-history
//! sample. Whatever is still open after the last tick is force-closed so
//! every run ends fully liquid.

use serde::Serialize;
use std::borrow::Cow;
use tracing::{debug, info};

use crate::data::PriceStore;
use crate::domain::{Side, Signal, SignalStream};
use crate::engine::clock::Clock;
use crate::engine::portfolio::{Portfolio, TickOp};
use crate::engine::position::{CloseReason, Position};
use crate::error::SimError;
use crate::fees::FeeSchedule;
use crate::params::SimulationParameters;

/// Portfolio state captured once per tick.
#[derive(Debug, Clone, Serialize)]
pub struct CapitalHistorySample {
    pub timestamp: i64,
    pub liquid_capital: f64,
    pub long_capital: f64,
    pub short_capital: f64,
    pub leverage_capital: f64,
    pub fees_paid: f64,
    pub hit: u64,
    pub miss: u64,
    pub stopped: u64,
    pub expired: u64,
    pub trailed: u64,
    pub active_positions: usize,
    pub ticks_with_no_signal: u64,
}

/// Settled position, flattened for export.
#[derive(Debug, Clone, Serialize)]
pub struct ClosedPositionRecord {
    pub asset: String,
    pub side: Side,
    pub entry_time: i64,
    pub end_time: Option<i64>,
    pub entry_price: f64,
    pub last_price: f64,
    pub entry_capital: f64,
    pub leverage_margin: f64,
    pub leverage: f64,
    pub equity: f64,
    pub net_equity: f64,
    pub fees_paid: f64,
    pub hours_open: u32,
    pub life_time_hours: u32,
    pub trailing_count: u32,
    pub close_reason: Option<CloseReason>,
    pub roi: f64,
}

impl From<&Position> for ClosedPositionRecord {
    fn from(position: &Position) -> Self {
        Self {
            asset: position.asset.clone(),
            side: position.side,
            entry_time: position.entry_time,
            end_time: position.end_time,
            entry_price: position.entry_prices[0],
            last_price: position.last_price,
            entry_capital: position.entry_capital,
            leverage_margin: position.leverage_margin,
            leverage: position.leverage,
            equity: position.equity,
            net_equity: position.net_equity(),
            fees_paid: position.fees_paid,
            hours_open: position.hours_open,
            life_time_hours: position.life_time_hours,
            trailing_count: position.trailing_count,
            close_reason: position.close_reason(),
            roi: position.roi(),
        }
    }
}

/// Everything a run produces.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub capital_history: Vec<CapitalHistorySample>,
    pub positions: Vec<ClosedPositionRecord>,
}

impl RunOutput {
    /// Liquid capital after the forced end-of-run settlement.
    pub fn final_capital(&self) -> f64 {
        self.capital_history
            .last()
            .map_or(0.0, |sample| sample.liquid_capital)
    }
}

/// Execute one simulation run over `[stream.start(), stream.end())`.
pub fn run(
    params: &SimulationParameters,
    store: &dyn PriceStore,
    fees: &FeeSchedule,
    stream: &SignalStream,
) -> Result<RunOutput, SimError> {
    let start = stream.start().ok_or(SimError::EmptySignalStream)?;
    let end = stream.end().ok_or(SimError::EmptySignalStream)?;
    info!(start, end, tick_hours = params.tick_hours, "starting run");

    let mut clock = Clock::new(start, params.tick_hours);
    let mut portfolio = Portfolio::new(params);
    let mut capital_history = Vec::new();
    let mut ticks_with_no_signal: u64 = 0;

    while clock.current_time() < end {
        let now = clock.current_time();

        portfolio.on_tick(TickOp::MarkToMarket, now, store, fees)?;
        portfolio.apply_leverage_fees(fees);
        if portfolio.has_active_positions() {
            portfolio.on_tick(TickOp::CheckTargets, now, store, fees)?;
            portfolio.on_tick(TickOp::CheckExpiry, now, store, fees)?;
        }

        let tick_signals = stream.at(now);
        if tick_signals.is_empty() {
            ticks_with_no_signal += 1;
        }
        let accepted = filter_allowlist(tick_signals, params);
        if !accepted.is_empty() {
            portfolio.on_tick(TickOp::CheckModelReversal(&accepted), now, store, fees)?;
            portfolio.enter_new_positions(&accepted, now, store, fees)?;
        }

        debug_assert!(
            portfolio.conservation_gap().abs() < 1e-6 * params.initial_capital,
            "capital conservation violated at {now}: gap {}",
            portfolio.conservation_gap()
        );
        capital_history.push(sample(&portfolio, now, ticks_with_no_signal));
        clock.advance();
    }

    portfolio.on_tick(TickOp::ForceClose, clock.current_time(), store, fees)?;
    capital_history.push(sample(
        &portfolio,
        clock.current_time(),
        ticks_with_no_signal,
    ));

    debug!(
        final_capital = portfolio.liquid_capital,
        positions = portfolio.closed_positions().len(),
        "run finished"
    );

    let positions = portfolio
        .into_closed_positions()
        .iter()
        .map(ClosedPositionRecord::from)
        .collect();
    Ok(RunOutput {
        capital_history,
        positions,
    })
}

fn filter_allowlist<'a>(
    signals: &'a [Signal],
    params: &SimulationParameters,
) -> Cow<'a, [Signal]> {
    match &params.asset_allowlist {
        None => Cow::Borrowed(signals),
        Some(allowed) => Cow::Owned(
            signals
                .iter()
                .filter(|s| allowed.contains(&s.asset))
                .cloned()
                .collect(),
        ),
    }
}

fn sample(portfolio: &Portfolio, timestamp: i64, ticks_with_no_signal: u64) -> CapitalHistorySample {
    CapitalHistorySample {
        timestamp,
        liquid_capital: portfolio.liquid_capital,
        long_capital: portfolio.long_capital,
        short_capital: portfolio.short_capital,
        leverage_capital: portfolio.leverage_capital_outstanding,
        fees_paid: portfolio.fees_paid,
        hit: portfolio.counters.hit,
        miss: portfolio.counters.miss,
        stopped: portfolio.counters.stopped,
        expired: portfolio.counters.expired,
        trailed: portfolio.counters.trailed,
        active_positions: portfolio.active_positions().len(),
        ticks_with_no_signal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MemoryPriceStore;
    use crate::domain::Candle;
    use crate::params::{LongEntryStrategy, ShortEntryStrategy, DEFAULT_ANOMALY_RATIO};

    const HOUR: i64 = 3_600;

    fn test_params() -> SimulationParameters {
        SimulationParameters {
            initial_capital: 100_000.0,
            max_capital_fraction_per_round: 1.0,
            max_volume_fraction: 1.0,
            min_investment: 10.0,
            allow_shorts: true,
            allow_longs: true,
            leverage: 1.0,
            min_prob_for_leverage: 0.8,
            same_tick_same_asset_both_sides: false,
            apply_leverage_fee_on_full_equity: false,
            long_strategy: LongEntryStrategy {
                min_prob_positive: 0.6,
                max_prob_negative: 0.3,
            },
            short_strategy: ShortEntryStrategy {
                max_prob_positive: 0.3,
                min_prob_negative: 0.6,
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

    fn flat_store(assets: &[&str], from: i64, until: i64, price: f64) -> MemoryPriceStore {
        let mut store = MemoryPriceStore::default();
        for asset in assets {
            let mut t = from - 25 * HOUR;
            while t <= until {
                store.insert(Candle {
                    asset: (*asset).into(),
                    timestamp: t,
                    open: price,
                    high: price * 1.001,
                    low: price * 0.999,
                    close: price,
                    volume: 10_000.0,
                });
                t += HOUR;
            }
        }
        store
    }

    fn long_signal(timestamp: i64, asset: &str) -> Signal {
        Signal {
            timestamp,
            asset: asset.into(),
            side: Side::Long,
            prob_positive: 0.9,
            prob_negative: 0.05,
            high_boundary: 0.5,
            low_boundary: -0.5,
            life_time_hours: 48,
        }
    }

    #[test]
    fn empty_stream_is_an_error() {
        let params = test_params();
        let store = MemoryPriceStore::default();
        let fees = FeeSchedule::default();
        let result = run(&params, &store, &fees, &SignalStream::default());
        assert_eq!(result.unwrap_err(), SimError::EmptySignalStream);
    }

    #[test]
    fn run_ends_fully_liquid() {
        let params = test_params();
        let fees = FeeSchedule::default();
        let store = flat_store(&["BTC"], 0, 5 * HOUR, 100.0);
        let stream = SignalStream::new(vec![long_signal(0, "BTC"), long_signal(5 * HOUR, "BTC")]);

        let output = run(&params, &store, &fees, &stream).unwrap();

        // Ticks at 0..4h plus the settlement sample.
        assert_eq!(output.capital_history.len(), 6);
        let last = output.capital_history.last().unwrap();
        assert_eq!(last.active_positions, 0);
        assert_eq!(output.positions.len(), 1);
        assert_eq!(
            output.positions[0].close_reason,
            Some(CloseReason::Expired)
        );
        // Flat prices: final capital is initial minus fees.
        assert!((output.final_capital() + last.fees_paid - 100_000.0).abs() < 1e-6);
    }

    #[test]
    fn signal_at_end_timestamp_never_opens() {
        let params = test_params();
        let fees = FeeSchedule::default();
        let store = flat_store(&["BTC"], 0, 2 * HOUR, 100.0);
        let stream = SignalStream::new(vec![
            long_signal(2 * HOUR, "BTC"),
            // Lone earlier signal pins the interval start without entering.
            {
                let mut s = long_signal(0, "BTC");
                s.prob_positive = 0.1;
                s
            },
        ]);

        let output = run(&params, &store, &fees, &stream).unwrap();
        assert!(output.positions.is_empty());
    }

    #[test]
    fn allowlist_restricts_entries() {
        let mut params = test_params();
        params.asset_allowlist = Some(vec!["ETH".into()]);
        let fees = FeeSchedule::default();
        let store = flat_store(&["BTC", "ETH"], 0, 3 * HOUR, 100.0);
        let stream = SignalStream::new(vec![
            long_signal(0, "BTC"),
            long_signal(0, "ETH"),
            long_signal(3 * HOUR, "BTC"),
        ]);

        let output = run(&params, &store, &fees, &stream).unwrap();
        assert_eq!(output.positions.len(), 1);
        assert_eq!(output.positions[0].asset, "ETH");
    }

    #[test]
    fn quiet_ticks_are_counted_before_allowlist_filtering() {
        let mut params = test_params();
        params.asset_allowlist = Some(vec!["ETH".into()]);
        let fees = FeeSchedule::default();
        let store = flat_store(&["BTC", "ETH"], 0, 4 * HOUR, 100.0);
        // Signals at 0 and 4h; ticks 1h..3h are quiet. The BTC signal at 0
        // is filtered out but the tick still had signals.
        let stream = SignalStream::new(vec![long_signal(0, "BTC"), long_signal(4 * HOUR, "ETH")]);

        let output = run(&params, &store, &fees, &stream).unwrap();
        let last = output.capital_history.last().unwrap();
        assert_eq!(last.ticks_with_no_signal, 3);
    }

    #[test]
    fn capital_conserved_on_every_sample() {
        let params = test_params();
        let fees = FeeSchedule::default();
        let store = flat_store(&["BTC", "ETH"], 0, 10 * HOUR, 100.0);
        let mut signals = Vec::new();
        for tick in 0..10 {
            signals.push(long_signal(tick * HOUR, "BTC"));
            signals.push(long_signal(tick * HOUR, "ETH"));
        }
        let stream = SignalStream::new(signals);

        let output = run(&params, &store, &fees, &stream).unwrap();
        // On a flat market liquid + deployed + fees can never exceed the
        // initial capital. The per-sample total undershoots it by exactly
        // the fees still carried inside active positions, which is bounded
        // by the default taker rate on the deployed capital.
        for sample in &output.capital_history {
            let total = sample.liquid_capital
                + sample.long_capital
                + sample.short_capital
                + sample.fees_paid;
            assert!(total <= 100_000.0 + 1e-6, "capital created at {}", sample.timestamp);
            assert!(total >= 98_000.0, "capital lost at {}: {total}", sample.timestamp);
        }
        // After settlement every fee is in fees_paid and the identity is
        // exact.
        let last = output.capital_history.last().unwrap();
        assert!((last.liquid_capital + last.fees_paid - 100_000.0).abs() < 1e-6);
    }
}
