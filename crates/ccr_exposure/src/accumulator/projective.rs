//! Semi-analytic quantile inversion for projected exposures.
//!
//! Engines that project exposure semi-analytically supply per-path normal
//! components `(mean, std_dev, weight)` instead of realized values. The
//! quantile of the resulting normal mixture is found by root-finding on the
//! monotone tail-probability objective, bracketed by doubling a trial
//! bandwidth.

use ccr_core::math::{expand_bracket, norm_cdf, BrentSolver};

/// Iteration budget for the doubling bracket search.
const MAX_DOUBLINGS: usize = 64;

/// Mixture cumulative probability at `x`.
///
/// Degenerate components (non-positive standard deviation) contribute a unit
/// step at their mean.
fn mixture_cdf(components: &[(f64, f64, f64)], x: f64) -> f64 {
    let total: f64 = components.iter().map(|&(_, _, w)| w).sum();
    if total <= 0.0 {
        return 0.0;
    }
    let mass: f64 = components
        .iter()
        .map(|&(mean, std_dev, w)| {
            if std_dev > 0.0 {
                w * norm_cdf((x - mean) / std_dev)
            } else if x >= mean {
                w
            } else {
                0.0
            }
        })
        .sum();
    mass / total
}

/// Inverts the normal-mixture CDF at the given confidence level.
///
/// Exposure quantiles are floored at zero: when the mixture already carries
/// at least `confidence` mass at or below zero, or when no bracket is found
/// within the doubling budget, the result is 0.0.
pub fn mixture_quantile(components: &[(f64, f64, f64)], confidence: f64) -> f64 {
    if components.is_empty() {
        return 0.0;
    }
    let ci = confidence.clamp(0.0, 1.0);
    let objective = |x: f64| mixture_cdf(components, x) - ci;

    if objective(0.0) >= 0.0 {
        return 0.0;
    }
    let Some((lo, hi)) = expand_bracket(&objective, 0.0, 1.0, MAX_DOUBLINGS) else {
        return 0.0;
    };
    BrentSolver::default()
        .find_root(objective, lo, hi)
        .unwrap_or(0.0)
}
