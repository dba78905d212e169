//! Benchmark-relative performance statistics for completed runs.
//!
//! The account curve is the per-tick net worth (liquid plus deployed
//! capital); the benchmark curve is a buy-and-hold of one asset scaled to
//! the run's initial capital. Statistics are computed on per-tick
//! fractional changes, with a spike guard that carries the previous change
//! over obviously broken data points.

use serde::Serialize;

use signalsim_core::engine::CapitalHistorySample;
use signalsim_core::PriceStore;

/// Flat per-period risk-free rate used by alpha and sharpe.
pub const RISK_FREE_RATE: f64 = 0.005;

/// A fractional change this large in one tick is treated as bad data.
const CHANGE_SPIKE_LIMIT: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PerformanceStats {
    pub alpha: f64,
    pub beta: f64,
    pub r_squared: f64,
    pub std_dev: f64,
    pub sharpe: f64,
}

/// Net worth per sample: liquid plus the net equity deployed on each side.
/// Fees held inside active positions are spent capital and excluded.
pub fn net_worth_series(history: &[CapitalHistorySample]) -> Vec<f64> {
    history
        .iter()
        .map(|s| s.liquid_capital + s.long_capital + s.short_capital)
        .collect()
}

/// Buy-and-hold capital curve for `asset` over the run's sample times,
/// scaled to start at `initial_capital`.
///
/// Gaps in the price series carry the previous price forward; a missing
/// first candle makes the whole benchmark unusable.
pub fn benchmark_series(
    store: &dyn PriceStore,
    asset: &str,
    history: &[CapitalHistorySample],
    initial_capital: f64,
) -> Option<Vec<f64>> {
    let first = history.first()?;
    let first_price = store.candle(asset, first.timestamp).ok()?.open;
    if first_price <= 0.0 {
        return None;
    }

    let mut series = Vec::with_capacity(history.len());
    let mut price = first_price;
    for sample in history {
        if let Ok(candle) = store.candle(asset, sample.timestamp) {
            price = candle.open;
        }
        series.push(price / first_price * initial_capital);
    }
    Some(series)
}

/// Regression of the account curve on the benchmark curve.
///
/// Returns `None` for series too short to regress. Degenerate variance
/// (a flat curve) zeroes the affected statistic instead of failing.
pub fn performance_stats(account: &[f64], benchmark: &[f64]) -> Option<PerformanceStats> {
    if account.len() < 3 || account.len() != benchmark.len() {
        return None;
    }

    let account_changes = pct_changes(account);
    let benchmark_changes = pct_changes(benchmark);

    let benchmark_var = variance(&benchmark_changes);
    let account_var = variance(&account_changes);
    let cov = covariance(&account_changes, &benchmark_changes);

    let beta = if benchmark_var > 0.0 {
        cov / benchmark_var
    } else {
        0.0
    };
    let r_squared = if benchmark_var > 0.0 && account_var > 0.0 {
        let corr = cov / (benchmark_var.sqrt() * account_var.sqrt());
        corr * corr
    } else {
        0.0
    };

    let account_return = account[account.len() - 1] / account[0] - 1.0;
    let benchmark_return = benchmark[benchmark.len() - 1] / benchmark[0] - 1.0;
    let alpha = account_return - RISK_FREE_RATE - beta * (benchmark_return - RISK_FREE_RATE);

    let std_dev = account_var.sqrt();
    let sharpe = if std_dev > 0.0 {
        (mean(&account_changes) - RISK_FREE_RATE) / std_dev
    } else {
        0.0
    };

    Some(PerformanceStats {
        alpha,
        beta,
        r_squared,
        std_dev,
        sharpe,
    })
}

/// Per-step fractional changes. A non-finite or spiking change repeats the
/// previous accepted change (zero at the start).
fn pct_changes(series: &[f64]) -> Vec<f64> {
    let mut changes = Vec::with_capacity(series.len().saturating_sub(1));
    let mut last_accepted = 0.0;
    for window in series.windows(2) {
        let change = window[1] / window[0] - 1.0;
        let accepted = if change.is_finite() && change.abs() <= CHANGE_SPIKE_LIMIT {
            change
        } else {
            last_accepted
        };
        changes.push(accepted);
        last_accepted = accepted;
    }
    changes
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample variance (n - 1 denominator).
fn variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64
}

/// Sample covariance (n - 1 denominator).
fn covariance(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n < 2 {
        return 0.0;
    }
    let mean_a = mean(&a[..n]);
    let mean_b = mean(&b[..n]);
    a[..n]
        .iter()
        .zip(&b[..n])
        .map(|(x, y)| (x - mean_a) * (y - mean_b))
        .sum::<f64>()
        / (n - 1) as f64
}
