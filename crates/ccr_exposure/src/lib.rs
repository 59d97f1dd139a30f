//! # CCR Exposure (L4: Application)
//!
//! Counterparty-credit-risk exposure engine: pathwise netting and
//! collateral, measure accumulation under multiple change-of-measure
//! densities, and parallel aggregation with per-trade marginal allocation.
//!
//! This crate provides:
//! - Per-path market-channel storage and the `PathSource` contract
//! - Netting topology (trades → netting groups → super-groups)
//! - The collateral engine (variation margin, independent amount,
//!   margin-period-of-risk lag, segregation/re-hypothecation rules)
//! - Measure accumulation (CVA/DVA/FVA integrals, EE/PFE/EEPE families)
//!   with parallel-safe merge
//! - Aggregation orchestrators: full netting, no netting, incremental
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────┐
//! │                ccr_exposure (L4)                   │
//! ├────────────────────────────────────────────────────┤
//! │  path/        - PathRecord, PathSource             │
//! │  netting/     - NettingTopology                    │
//! │  collateral/  - CollateralTerms, CollateralEngine  │
//! │  accumulator/ - MeasureAccumulator                 │
//! │  aggregator/  - Netting / NoNetting / Incremental  │
//! │  kernel/      - IntegrationKernel, KernelSet       │
//! │  diagnostics/ - per-path exposure capture          │
//! └────────────────────────────────────────────────────┘
//!          ↓
//! ┌────────────────────────────────────────────────────┐
//! │                  ccr_core (L1)                     │
//! │  grids, interpolation, quantiles, root finding     │
//! └────────────────────────────────────────────────────┘
//! ```
//!
//! Data flows: simulated paths and trade valuations (external) →
//! [`path::PathRecord`] → [`collateral::CollateralEngine`] per date →
//! [`accumulator::MeasureAccumulator`] → orchestrator reduction →
//! `get_measure` / `get_measure_marginal`.
//!
//! ## Example
//!
//! ```
//! use std::collections::HashMap;
//! use std::sync::Arc;
//! use ccr_core::types::{ExposureDateGrid, NettingGroupId, TradeId};
//! use ccr_exposure::aggregator::{AggregationConfig, ExposureAggregator, NettingAggregator};
//! use ccr_exposure::collateral::{CollateralTerms, CsaTerms};
//! use ccr_exposure::kernel::KernelSet;
//! use ccr_exposure::measure::CcrMeasure;
//! use ccr_exposure::netting::NettingTopologyBuilder;
//! use ccr_exposure::path::{InMemoryPathSource, PathChannels, PathRecord};
//!
//! let grid = ExposureDateGrid::new(vec![0.5, 1.0, 2.0]).unwrap();
//! let kernels = KernelSet::flat_hazard(&grid, 0.02, 0.6, 0.01, 0.4);
//!
//! let topology = NettingTopologyBuilder::new()
//!     .add_group(NettingGroupId::new("NG1"))
//!     .add_trade(TradeId::new("T1"), NettingGroupId::new("NG1"))
//!     .build()
//!     .unwrap();
//!
//! let mut agreements: HashMap<NettingGroupId, Arc<dyn CollateralTerms>> = HashMap::new();
//! agreements.insert(
//!     NettingGroupId::new("NG1"),
//!     Arc::new(CsaTerms::new(25.0, 0.0, 0.0, CsaTerms::bilateral_mpor()).unwrap()),
//! );
//!
//! let mut path = PathRecord::new(0, 1.0);
//! for value in [60.0, 30.0, -20.0] {
//!     path.push_date(PathChannels::riskless(vec![value]));
//! }
//! let paths = Arc::new(InMemoryPathSource::new(vec![path]));
//!
//! let mut aggregator = NettingAggregator::new(
//!     grid,
//!     topology,
//!     agreements,
//!     paths,
//!     kernels,
//!     AggregationConfig::default(),
//! )
//! .unwrap();
//!
//! aggregator.add_measure_accumulator(CcrMeasure::Cva, 0.0).unwrap();
//! aggregator.add_measure_accumulator(CcrMeasure::Pfe, 0.95).unwrap();
//!
//! let cva = aggregator.get_measure(CcrMeasure::Cva, None, 0.0).unwrap();
//! let pfe = aggregator.get_measure(CcrMeasure::Pfe, Some(1.0), 0.95).unwrap();
//! assert!(cva >= 0.0 && pfe >= 0.0);
//! ```

#![warn(missing_docs)]

pub mod accumulator;
pub mod aggregator;
pub mod collateral;
pub mod diagnostics;
pub mod error;
pub mod kernel;
pub mod measure;
pub mod netting;
pub mod parallel;
pub mod path;
pub mod valuation;

// Re-export commonly used types
pub use accumulator::{ExposureObservation, MeasureAccumulator, RwaParams};
pub use aggregator::{
    AggregationConfig, ExposureAggregator, IncrementalAggregator, NettingAggregator,
    NoNettingAggregator,
};
pub use collateral::{CollateralEngine, CollateralTerms, CsaTerms, DateExposure};
pub use diagnostics::{DiagnosticRecord, DiagnosticRow, ExposureDiagnostics};
pub use error::ExposureError;
pub use kernel::{IntegrationKernel, KernelSet};
pub use measure::{effective_measure, CcrMeasure, MeasureTraits, SpreadChannel, WeightChannel};
pub use netting::{NettingTopology, NettingTopologyBuilder};
pub use parallel::{ParallelConfig, DEFAULT_BATCH_SIZE};
pub use path::{InMemoryPathSource, PathChannels, PathRecord, PathSource};
pub use valuation::{InMemoryValuations, TradeValuationSource};
