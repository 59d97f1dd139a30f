//! Property-based tests for the exposure engine invariants.

use std::collections::HashMap;
use std::sync::Arc;

use proptest::prelude::*;

use ccr_core::types::{ExposureDateGrid, NettingGroupId, TradeId};
use ccr_exposure::accumulator::{ExposureObservation, MeasureAccumulator, RwaParams};
use ccr_exposure::collateral::{CollateralEngine, CollateralTerms, CsaTerms};
use ccr_exposure::kernel::KernelSet;
use ccr_exposure::measure::CcrMeasure;
use ccr_exposure::netting::{NettingTopology, NettingTopologyBuilder};
use ccr_exposure::path::{PathChannels, PathRecord};

fn single_group_topology(n_trades: usize) -> NettingTopology {
    let mut builder = NettingTopologyBuilder::new().add_group(NettingGroupId::new("NG1"));
    for i in 0..n_trades {
        builder = builder.add_trade(TradeId::new(format!("T{i}")), NettingGroupId::new("NG1"));
    }
    builder.build().unwrap()
}

fn single_date_grid() -> Arc<ExposureDateGrid> {
    Arc::new(ExposureDateGrid::new(vec![1.0]).unwrap())
}

fn engine(terms: Option<CsaTerms>, n_trades: usize) -> CollateralEngine {
    let mut agreements: HashMap<NettingGroupId, Arc<dyn CollateralTerms>> = HashMap::new();
    if let Some(t) = terms {
        agreements.insert(NettingGroupId::new("NG1"), Arc::new(t));
    }
    CollateralEngine::new(
        single_date_grid(),
        Arc::new(single_group_topology(n_trades)),
        agreements,
        false,
    )
    .unwrap()
}

fn path_with_group_value(value: f64) -> PathRecord {
    let mut p = PathRecord::new(0, 1.0);
    p.push_date(PathChannels::riskless(vec![value]));
    p
}

/// Trade mark-to-markets with mixed signs and a bounded magnitude.
fn arb_trade_mtms() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-1_000_000.0f64..1_000_000.0, 1..12)
}

proptest! {
    // =====================================================================
    // Netting reduces exposure: the netted exposure never exceeds the sum
    // of standalone per-trade exposures, nor the exposure of the absolute
    // gross position.
    // =====================================================================
    #[test]
    fn netting_reduces_exposure(mtms in arb_trade_mtms()) {
        let netted_value: f64 = mtms.iter().sum();
        let eng = engine(None, mtms.len());
        let path = path_with_group_value(netted_value);
        let exposure = eng.collateralize(&path, 0, None);

        let standalone_sum: f64 = mtms.iter().map(|v| v.max(0.0)).sum();
        let gross: f64 = mtms.iter().map(|v| v.abs()).sum();

        prop_assert!(exposure.positive <= standalone_sum + 1e-9);
        prop_assert!(exposure.positive <= gross + 1e-9);
    }

    // =====================================================================
    // Collateral never overshoots (overcollateralization modelling off):
    // collateralized exposure magnitude is bounded by the uncollateralized
    // one, and its sign never flips.
    // =====================================================================
    #[test]
    fn collateral_never_overshoots(
        mtm in -1_000_000.0f64..1_000_000.0,
        threshold in 0.0f64..100_000.0,
        mta in 0.0f64..50_000.0,
        ia in 0.0f64..50_000.0,
    ) {
        let terms = CsaTerms::new(threshold, mta, ia, 0.0).unwrap();
        let eng = engine(Some(terms), 1);
        let path = path_with_group_value(mtm);
        let exposure = eng.collateralize(&path, 0, None);

        prop_assert!(exposure.positive <= exposure.uncollateralized_positive + 1e-9);
        prop_assert!(exposure.negative <= exposure.uncollateralized_negative + 1e-9);
        // No sign flip: a long position never turns into a short one.
        if mtm > 0.0 {
            prop_assert!(exposure.negative <= 1e-9);
        }
        if mtm < 0.0 {
            prop_assert!(exposure.positive <= 1e-9);
        }
        // The benefit of collateral is never negative.
        prop_assert!(exposure.collateral_benefit() >= -1e-9);
    }

    // =====================================================================
    // Merge associativity: accumulating N paths in one batch equals
    // splitting them at an arbitrary point, accumulating independently,
    // and merging — for expectation and quantile measures alike.
    // =====================================================================
    #[test]
    fn merge_matches_single_batch(
        exposures in prop::collection::vec(0.0f64..10_000.0, 2..40),
        split in 1usize..39,
    ) {
        prop_assume!(split < exposures.len());

        let grid = single_date_grid();
        let kernels = Arc::new(KernelSet::flat_hazard(&grid, 0.02, 0.6, 0.01, 0.4));
        let fresh = || {
            let mut acc = MeasureAccumulator::new(
                Arc::clone(&grid),
                Arc::clone(&kernels),
                RwaParams::default(),
            );
            acc.add_measure_accumulator(CcrMeasure::Ee0, 0.0).unwrap();
            acc.add_measure_accumulator(CcrMeasure::Pfe, 0.9).unwrap();
            acc
        };
        let accumulate = |acc: &mut MeasureAccumulator, values: &[f64], offset: usize| {
            for (i, &v) in values.iter().enumerate() {
                let path = {
                    let mut p = PathRecord::new(offset + i, 1.0);
                    p.push_date(PathChannels::riskless(vec![]));
                    p
                };
                acc.accumulate_exposures(&path, 0, &ExposureObservation {
                    positive: v,
                    negative: 0.0,
                    funding_positive: v,
                    funding_negative: 0.0,
                });
            }
        };

        let mut single = fresh();
        accumulate(&mut single, &exposures, 0);
        single.reduce_cumulative_values();

        let mut left = fresh();
        accumulate(&mut left, &exposures[..split], 0);
        let mut right = fresh();
        accumulate(&mut right, &exposures[split..], split);
        left.merge_cumulative_values(right).unwrap();
        left.reduce_cumulative_values();

        let ee_single = single.get_measure(CcrMeasure::Ee0, Some(1.0), 0.0, None).unwrap();
        let ee_merged = left.get_measure(CcrMeasure::Ee0, Some(1.0), 0.0, None).unwrap();
        prop_assert!((ee_single - ee_merged).abs() <= 1e-9 * (1.0 + ee_single.abs()));

        let pfe_single = single.get_measure(CcrMeasure::Pfe, Some(1.0), 0.9, None).unwrap();
        let pfe_merged = left.get_measure(CcrMeasure::Pfe, Some(1.0), 0.9, None).unwrap();
        prop_assert!((pfe_single - pfe_merged).abs() <= 1e-9 * (1.0 + pfe_single.abs()));
    }

    // =====================================================================
    // PFE is monotone non-decreasing in the confidence level.
    // =====================================================================
    #[test]
    fn pfe_monotone_in_confidence(
        exposures in prop::collection::vec(0.0f64..10_000.0, 3..50),
    ) {
        let grid = single_date_grid();
        let kernels = Arc::new(KernelSet::flat_hazard(&grid, 0.02, 0.6, 0.01, 0.4));
        let mut acc = MeasureAccumulator::new(grid, kernels, RwaParams::default());
        let levels = [0.1, 0.5, 0.9, 0.95, 0.99];
        for &ci in &levels {
            acc.add_measure_accumulator(CcrMeasure::Pfe, ci).unwrap();
        }
        for (i, &v) in exposures.iter().enumerate() {
            let mut p = PathRecord::new(i, 1.0);
            p.push_date(PathChannels::riskless(vec![]));
            acc.accumulate_exposures(&p, 0, &ExposureObservation {
                positive: v,
                negative: 0.0,
                funding_positive: v,
                funding_negative: 0.0,
            });
        }
        acc.reduce_cumulative_values();

        let mut previous = f64::NEG_INFINITY;
        for &ci in &levels {
            let q = acc.get_measure(CcrMeasure::Pfe, Some(1.0), ci, None).unwrap();
            prop_assert!(q >= previous - 1e-12);
            previous = q;
        }
    }

    // =====================================================================
    // Clamped collateral keeps the exposure bounded for arbitrary MPoR lag
    // states (stale mtm vs current mtm).
    // =====================================================================
    #[test]
    fn stale_collateral_clamped_to_current_mtm(
        stale in -500_000.0f64..500_000.0,
        current in -500_000.0f64..500_000.0,
    ) {
        let grid = Arc::new(ExposureDateGrid::new(vec![0.5, 1.0]).unwrap());
        let topology = Arc::new(single_group_topology(1));
        let mut agreements: HashMap<NettingGroupId, Arc<dyn CollateralTerms>> = HashMap::new();
        agreements.insert(
            NettingGroupId::new("NG1"),
            Arc::new(CsaTerms::zero_threshold(0.5).unwrap()),
        );
        let eng = CollateralEngine::new(grid, topology, agreements, false).unwrap();

        let mut path = PathRecord::new(0, 1.0);
        path.push_date(PathChannels::riskless(vec![stale]));
        path.push_date(PathChannels::riskless(vec![current]));

        // Posting date of the second exposure date is the first grid date.
        let exposure = eng.collateralize(&path, 1, None);
        prop_assert!(exposure.positive <= exposure.uncollateralized_positive + 1e-9);
        prop_assert!(exposure.negative <= exposure.uncollateralized_negative + 1e-9);
        if current > 0.0 {
            prop_assert!(exposure.negative <= 1e-9);
        }
        if current < 0.0 {
            prop_assert!(exposure.positive <= 1e-9);
        }
    }
}
