//! Property-based tests for the numerical foundation.

use proptest::prelude::*;

use ccr_core::math::{interpolate_on_grid, EmpiricalCdf, BrentSolver};
use ccr_core::types::ExposureDateGrid;

fn arb_samples() -> impl Strategy<Value = Vec<(f64, f64)>> {
    prop::collection::vec((-1_000.0f64..1_000.0, 0.01f64..10.0), 1..50)
}

proptest! {
    // Quantiles are non-decreasing in the confidence level and bounded by
    // the sample support.
    #[test]
    fn quantile_monotone_and_bounded(samples in arb_samples()) {
        let cdf = EmpiricalCdf::from_weighted_samples(&samples);
        let lo = samples.iter().map(|&(v, _)| v).fold(f64::INFINITY, f64::min);
        let hi = samples.iter().map(|&(v, _)| v).fold(f64::NEG_INFINITY, f64::max);

        let mut previous = f64::NEG_INFINITY;
        for k in 0..=20 {
            let q = cdf.quantile(k as f64 / 20.0);
            prop_assert!(q >= previous);
            prop_assert!(q >= lo - 1e-9 && q <= hi + 1e-9);
            previous = q;
        }
    }

    // Interior interpolation stays within the envelope of its profile;
    // outside the grid the endpoints apply exactly.
    #[test]
    fn interpolation_bounded_and_flat_outside(
        values in prop::collection::vec(-1_000.0f64..1_000.0, 2..20),
        t in -5.0f64..25.0,
    ) {
        let dates: Vec<f64> = (0..values.len()).map(|i| i as f64 + 0.5).collect();
        let grid = ExposureDateGrid::new(dates).unwrap();

        let v = interpolate_on_grid(&grid, &values, t).unwrap();
        let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        prop_assert!(v >= lo - 1e-9 && v <= hi + 1e-9);

        if t < grid.first() {
            prop_assert_eq!(v, values[0]);
        }
        if t > grid.last() {
            prop_assert_eq!(v, values[values.len() - 1]);
        }
    }

    // Brent finds the root of a shifted cubic to solver tolerance whenever
    // the bracket is valid.
    #[test]
    fn brent_solves_shifted_cubic(shift in -100.0f64..100.0) {
        let f = |x: f64| x * x * x - shift;
        let root = BrentSolver::default()
            .find_root(f, -10.0, 10.0)
            .unwrap();
        prop_assert!(f(root).abs() < 1e-8);
    }
}
