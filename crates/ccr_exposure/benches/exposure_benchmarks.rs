//! Criterion benchmarks for the exposure engine.
//!
//! Covers the pathwise collateral engine and the end-to-end aggregation
//! reduction at a few path-count scales.

use std::collections::HashMap;
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use ccr_core::types::{ExposureDateGrid, NettingGroupId, SuperGroupId, TradeId};
use ccr_exposure::aggregator::{AggregationConfig, ExposureAggregator, NettingAggregator};
use ccr_exposure::collateral::{CollateralTerms, CsaTerms};
use ccr_exposure::kernel::KernelSet;
use ccr_exposure::measure::CcrMeasure;
use ccr_exposure::netting::{NettingTopology, NettingTopologyBuilder};
use ccr_exposure::parallel::ParallelConfig;
use ccr_exposure::path::{InMemoryPathSource, PathChannels, PathRecord};

const N_DATES: usize = 24;
const N_GROUPS: usize = 8;

fn grid() -> ExposureDateGrid {
    ExposureDateGrid::new((1..=N_DATES).map(|i| i as f64 / 4.0).collect()).unwrap()
}

fn topology() -> NettingTopology {
    let mut builder = NettingTopologyBuilder::new();
    for g in 0..N_GROUPS {
        builder = builder.add_group_in_super(
            NettingGroupId::new(format!("NG{g}")),
            SuperGroupId::new(format!("SG{}", g / 2)),
        );
        builder = builder.add_trade(
            TradeId::new(format!("T{g}")),
            NettingGroupId::new(format!("NG{g}")),
        );
    }
    builder.build().unwrap()
}

fn agreements() -> HashMap<NettingGroupId, Arc<dyn CollateralTerms>> {
    let mut out: HashMap<NettingGroupId, Arc<dyn CollateralTerms>> = HashMap::new();
    for g in 0..N_GROUPS / 2 {
        out.insert(
            NettingGroupId::new(format!("NG{g}")),
            Arc::new(
                CsaTerms::new(50_000.0, 10_000.0, 0.0, CsaTerms::bilateral_mpor()).unwrap(),
            ),
        );
    }
    out
}

fn synthetic_paths(n_paths: usize) -> Vec<PathRecord> {
    let normal = Normal::new(0.0, 100_000.0).unwrap();
    let mut rng = StdRng::seed_from_u64(7);
    (0..n_paths)
        .map(|i| {
            let mut p = PathRecord::new(i, 1.0);
            for d in 0..N_DATES {
                let t = (d + 1) as f64 / 4.0;
                p.push_date(PathChannels {
                    net_group_values: (0..N_GROUPS).map(|_| normal.sample(&mut rng)).collect(),
                    discount_factor: (-0.03 * t).exp(),
                    ..PathChannels::default()
                });
            }
            p
        })
        .collect()
}

fn bench_collateralize(c: &mut Criterion) {
    let g = Arc::new(grid());
    let engine = ccr_exposure::collateral::CollateralEngine::new(
        Arc::clone(&g),
        Arc::new(topology()),
        agreements(),
        false,
    )
    .unwrap();
    let path = synthetic_paths(1).remove(0);

    c.bench_function("collateralize_one_date", |b| {
        b.iter(|| {
            for d in 0..N_DATES {
                black_box(engine.collateralize(black_box(&path), d, None));
            }
        })
    });
}

fn bench_reduction(c: &mut Criterion) {
    let mut group = c.benchmark_group("exposure_reduction");
    for &n_paths in &[256usize, 1024] {
        group.bench_with_input(
            BenchmarkId::from_parameter(n_paths),
            &n_paths,
            |b, &n_paths| {
                b.iter(|| {
                    let g = grid();
                    let kernels = KernelSet::flat_hazard(&g, 0.02, 0.6, 0.01, 0.4);
                    let mut agg = NettingAggregator::new(
                        g,
                        topology(),
                        agreements(),
                        Arc::new(InMemoryPathSource::new(synthetic_paths(n_paths))),
                        kernels,
                        AggregationConfig::default()
                            .with_parallel(ParallelConfig::sequential()),
                    )
                    .unwrap();
                    agg.add_measure_accumulator(CcrMeasure::Cva, 0.0).unwrap();
                    agg.add_measure_accumulator(CcrMeasure::Pfe, 0.95).unwrap();
                    black_box(agg.get_measure(CcrMeasure::Cva, None, 0.0).unwrap())
                })
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_collateralize, bench_reduction);
criterion_main!(benches);
