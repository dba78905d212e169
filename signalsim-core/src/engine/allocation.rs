//! Capital allocation — recursive fair-share bounded by per-asset liquidity.
//!
//! Pure functions: candidates and available capital in, one allocation per
//! candidate out. Each round splits the remaining capital equally across
//! unsaturated candidates, caps each candidate at its volume boundary, and
//! scales the grant by a confidence fraction derived from the signal's
//! directional probability. Rounds repeat on the leftover capital until no
//! candidate saturates, all are saturated, or the equal share falls below
//! the minimum investment — so the round count is bounded by the candidate
//! count.

/// One allocation candidate: directional probability and liquidity ceiling.
#[derive(Debug, Clone, Copy)]
pub struct AllocationInput {
    /// Side-relevant probability (positive for longs, negative for shorts).
    pub prob: f64,
    /// `max_volume_fraction * trailing 24h volume` for the asset.
    pub volume_boundary: f64,
}

/// Allocate `available_capital` across `candidates`.
///
/// Returns one allocated amount per candidate, in input order. Every
/// allocation is non-negative and the total never exceeds
/// `available_capital`.
pub fn allocate(
    candidates: &[AllocationInput],
    available_capital: f64,
    min_investment: f64,
) -> Vec<f64> {
    let allocations = vec![0.0; candidates.len()];
    let saturated = vec![false; candidates.len()];
    allocate_round(
        candidates,
        allocations,
        saturated,
        available_capital,
        min_investment,
    )
}

fn allocate_round(
    candidates: &[AllocationInput],
    mut allocations: Vec<f64>,
    mut saturated: Vec<bool>,
    available_capital: f64,
    min_investment: f64,
) -> Vec<f64> {
    let open: Vec<usize> = (0..candidates.len()).filter(|&i| !saturated[i]).collect();
    if open.is_empty() {
        return allocations;
    }

    let share = available_capital / open.len() as f64;
    if share < min_investment {
        return allocations;
    }

    let mut consumed = 0.0;
    let mut newly_saturated = 0;
    for &i in &open {
        let candidate = &candidates[i];
        if candidate.volume_boundary <= 0.0 {
            // No liquidity at all; the candidate ends the round fully
            // invested at zero.
            saturated[i] = true;
            newly_saturated += 1;
            continue;
        }

        let ceiling = if candidate.volume_boundary < share {
            saturated[i] = true;
            newly_saturated += 1;
            candidate.volume_boundary
        } else {
            share
        };

        // Sub-prior probabilities have a negative fraction; the grant is
        // floored at zero so a weak candidate never refunds capital.
        let granted = (confidence_fraction(candidate.prob) * ceiling).max(0.0);
        allocations[i] += granted;
        consumed += granted;
    }

    if newly_saturated == 0 {
        return allocations;
    }

    allocate_round(
        candidates,
        allocations,
        saturated,
        available_capital - consumed,
        min_investment,
    )
}

/// Number of outcome classes behind the model probabilities; 1/3 is the
/// neutral prior an informative signal must beat.
const NUM_CLASSES: f64 = 3.0;

/// Risk-scaling fraction of the allocation ceiling actually invested.
///
/// `signal = (p - 1/3) / sqrt(p(1-p))`, `f = 2*Phi(signal) - 1`. Zero at
/// the neutral prior, negative below it, strictly increasing in `p`,
/// approaching 1 as `p` approaches 1. Probabilities are clamped to
/// [0.001, 0.999] to keep the standardization finite; callers floor the
/// resulting grant at zero.
pub fn confidence_fraction(prob: f64) -> f64 {
    let p = prob.clamp(0.001, 0.999);
    let signal = (p - 1.0 / NUM_CLASSES) / (p * (1.0 - p)).sqrt();
    2.0 * normal_cdf(signal) - 1.0
}

/// Standard normal CDF via the Abramowitz–Stegun 7.1.26 erf approximation
/// (absolute error < 1.5e-7).
pub fn normal_cdf(x: f64) -> f64 {
    0.5 * (1.0 + erf(x / std::f64::consts::SQRT_2))
}

fn erf(x: f64) -> f64 {
    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();

    const A1: f64 = 0.254829592;
    const A2: f64 = -0.284496736;
    const A3: f64 = 1.421413741;
    const A4: f64 = -1.453152027;
    const A5: f64 = 1.061405429;
    const P: f64 = 0.3275911;

    let t = 1.0 / (1.0 + P * x);
    let poly = ((((A5 * t + A4) * t + A3) * t + A2) * t + A1) * t;
    sign * (1.0 - poly * (-x * x).exp())
}
