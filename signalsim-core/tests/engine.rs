//! End-to-end engine tests: full runs over generated price paths, checking
//! the accounting identities that must hold regardless of what the market
//! does.

use proptest::prelude::*;

use signalsim_core::domain::{Candle, Side, Signal, SignalStream};
use signalsim_core::engine::run;
use signalsim_core::params::{
    LongEntryStrategy, ShortEntryStrategy, SimulationParameters, TrailingStrategy,
    DEFAULT_ANOMALY_RATIO,
};
use signalsim_core::{FeeSchedule, MemoryPriceStore};

const HOUR: i64 = 3_600;

fn base_params() -> SimulationParameters {
    SimulationParameters {
        initial_capital: 1_000_000.0,
        max_capital_fraction_per_round: 0.5,
        max_volume_fraction: 1.0,
        min_investment: 100.0,
        allow_shorts: true,
        allow_longs: true,
        leverage: 1.0,
        min_prob_for_leverage: 0.8,
        same_tick_same_asset_both_sides: false,
        apply_leverage_fee_on_full_equity: false,
        long_strategy: LongEntryStrategy {
            min_prob_positive: 0.55,
            max_prob_negative: 0.4,
        },
        short_strategy: ShortEntryStrategy {
            max_prob_positive: 0.4,
            min_prob_negative: 0.55,
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

/// Hourly candles for one asset following the given per-tick price factors.
fn walk_store(store: &mut MemoryPriceStore, asset: &str, factors: &[f64]) {
    let mut price = 100.0;
    // Cover the volume window before tick zero.
    for k in 1..=25 {
        store.insert(candle(asset, -k * HOUR, 100.0));
    }
    for (tick, factor) in factors.iter().enumerate() {
        price *= factor;
        store.insert(candle(asset, tick as i64 * HOUR, price));
    }
}

fn candle(asset: &str, timestamp: i64, price: f64) -> Candle {
    Candle {
        asset: asset.into(),
        timestamp,
        open: price,
        high: price * 1.01,
        low: price * 0.99,
        close: price,
        volume: 500_000.0,
    }
}

fn signal(timestamp: i64, asset: &str, side: Side, prob: f64) -> Signal {
    let (prob_positive, prob_negative) = match side {
        Side::Long => (prob, 1.0 - prob),
        Side::Short => (1.0 - prob, prob),
    };
    Signal {
        timestamp,
        asset: asset.into(),
        side,
        prob_positive,
        prob_negative,
        high_boundary: 0.04,
        low_boundary: -0.03,
        life_time_hours: 6,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Whatever the price path, the run ends with
    /// `liquid == initial + sum(own-capital pnl)` and every fee accounted
    /// for. This is the settlement-side view of the per-tick conservation
    /// identity the engine asserts internally.
    #[test]
    fn settled_capital_matches_position_ledger(
        factors_a in proptest::collection::vec(0.93f64..1.07, 30..60),
        factors_b in proptest::collection::vec(0.93f64..1.07, 30..60),
        signal_probs in proptest::collection::vec(proptest::option::of(0.55f64..0.95), 30),
        leverage in prop_oneof![Just(1.0f64), Just(2.0), Just(3.0)],
    ) {
        let ticks = factors_a.len().min(factors_b.len());
        let mut store = MemoryPriceStore::default();
        walk_store(&mut store, "AAA", &factors_a[..ticks]);
        walk_store(&mut store, "BBB", &factors_b[..ticks]);

        let mut signals = Vec::new();
        for (tick, prob) in signal_probs.iter().enumerate() {
            if let Some(p) = prob {
                let side = if tick % 2 == 0 { Side::Long } else { Side::Short };
                signals.push(signal(tick as i64 * HOUR, "AAA", side, *p));
                signals.push(signal(tick as i64 * HOUR, "BBB", side.flip(), *p));
            }
        }
        // Pin the interval end inside the stored price range.
        signals.push(signal((ticks as i64 - 1) * HOUR, "AAA", Side::Long, 0.1));
        prop_assume!(signals.len() > 1);

        let mut params = base_params();
        params.leverage = leverage;
        let fees = FeeSchedule::default();
        let stream = SignalStream::new(signals);

        let output = run(&params, &store, &fees, &stream).unwrap();

        let own_pnl: f64 = output
            .positions
            .iter()
            .map(|p| p.net_equity - (p.entry_capital - p.leverage_margin))
            .sum();
        let expected = params.initial_capital + own_pnl;
        prop_assert!(
            (output.final_capital() - expected).abs() < 1e-4,
            "final {} vs ledger {}",
            output.final_capital(),
            expected
        );

        let last = output.capital_history.last().unwrap();
        let position_fees: f64 = output.positions.iter().map(|p| p.fees_paid).sum();
        prop_assert!((last.fees_paid - position_fees).abs() < 1e-6);
        prop_assert_eq!(last.active_positions, 0);
        prop_assert_eq!(
            last.hit + last.miss + last.stopped + last.expired,
            output.positions.len() as u64
        );
    }
}

trait Flip {
    fn flip(self) -> Self;
}

impl Flip for Side {
    fn flip(self) -> Self {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }
}

#[test]
fn rising_market_profits_a_long_after_fees() {
    let mut store = MemoryPriceStore::default();
    // Steady 1% hourly climb.
    walk_store(&mut store, "AAA", &[1.01; 12]);

    let mut params = base_params();
    params.max_capital_fraction_per_round = 1.0;
    let fees = FeeSchedule::default();
    let mut entry = signal(0, "AAA", Side::Long, 0.9);
    entry.high_boundary = 0.5;
    entry.low_boundary = -0.5;
    entry.life_time_hours = 48;
    let stream = SignalStream::new(vec![entry, signal(11 * HOUR, "AAA", Side::Long, 0.1)]);

    let output = run(&params, &store, &fees, &stream).unwrap();
    assert_eq!(output.positions.len(), 1);
    assert!(output.positions[0].roi > 0.0);
    assert!(output.final_capital() > params.initial_capital);
}

#[test]
fn trailing_position_outlives_its_original_lifetime() {
    let mut store = MemoryPriceStore::default();
    walk_store(&mut store, "AAA", &[1.03; 20]);

    let mut params = base_params();
    params.long_trailing = Some(TrailingStrategy {
        high_boundary: 0.04,
        low_boundary: -0.03,
    });
    let fees = FeeSchedule::default();
    let mut entry = signal(0, "AAA", Side::Long, 0.9);
    entry.life_time_hours = 3;
    let stream = SignalStream::new(vec![entry, signal(19 * HOUR, "AAA", Side::Long, 0.1)]);

    let output = run(&params, &store, &fees, &stream).unwrap();
    assert_eq!(output.positions.len(), 1);
    let position = &output.positions[0];
    assert!(position.trailing_count >= 1);
    assert!(position.hours_open > 3);
    assert_eq!(
        output.capital_history.last().unwrap().trailed,
        u64::from(position.trailing_count)
    );
}
