//! The full-netting exposure aggregation orchestrator.

use std::collections::HashMap;
use std::sync::Arc;

use ccr_core::math::interpolate_on_grid;
use ccr_core::types::{ExposureDateGrid, NettingGroupId};
use tracing::{debug, info, info_span};

use crate::accumulator::{ExposureObservation, MeasureAccumulator};
use crate::collateral::{CollateralEngine, CollateralTerms};
use crate::diagnostics::ExposureDiagnostics;
use crate::error::ExposureError;
use crate::kernel::KernelSet;
use crate::measure::{CcrMeasure, MeasureFamily, WeightChannel};
use crate::netting::NettingTopology;
use crate::parallel::fold_items;
use crate::path::PathSource;
use crate::valuation::TradeValuationSource;

use super::{AggregationConfig, AllocationTensors, ExposureAggregator, TensorKind};

/// Tolerance below which an allocation total is treated as zero.
const TOTAL_EPS: f64 = 1e-12;

/// Thread-local state of one reduction worker.
struct WorkerState {
    acc: MeasureAccumulator,
    tensors: Option<AllocationTensors>,
    diagnostics: Option<ExposureDiagnostics>,
    paths_done: usize,
    paths_skipped: usize,
}

/// Full-netting exposure aggregation orchestrator.
///
/// Drives every path through the [`CollateralEngine`] at every exposure
/// date, accumulates registered measures, tracks per-trade allocation
/// tensors when enabled, and serves the measure-query API. Reduction fans
/// out over the path dimension and is auto-triggered by the first query.
///
/// # Examples
///
/// ```
/// use std::collections::HashMap;
/// use std::sync::Arc;
/// use ccr_core::types::{ExposureDateGrid, NettingGroupId, TradeId};
/// use ccr_exposure::aggregator::{AggregationConfig, ExposureAggregator, NettingAggregator};
/// use ccr_exposure::kernel::KernelSet;
/// use ccr_exposure::measure::CcrMeasure;
/// use ccr_exposure::netting::NettingTopologyBuilder;
/// use ccr_exposure::path::{InMemoryPathSource, PathChannels, PathRecord};
///
/// let grid = ExposureDateGrid::new(vec![0.5, 1.0]).unwrap();
/// let kernels = KernelSet::flat_hazard(&grid, 0.02, 0.6, 0.01, 0.4);
/// let topology = NettingTopologyBuilder::new()
///     .add_group(NettingGroupId::new("NG1"))
///     .add_trade(TradeId::new("T1"), NettingGroupId::new("NG1"))
///     .build()
///     .unwrap();
///
/// let mut path = PathRecord::new(0, 1.0);
/// path.push_date(PathChannels::riskless(vec![60.0]));
/// path.push_date(PathChannels::riskless(vec![40.0]));
/// let paths = Arc::new(InMemoryPathSource::new(vec![path]));
///
/// let mut aggregator = NettingAggregator::new(
///     grid,
///     topology,
///     HashMap::new(),
///     paths,
///     kernels,
///     AggregationConfig::default(),
/// )
/// .unwrap();
///
/// aggregator.add_measure_accumulator(CcrMeasure::Ee, 0.0).unwrap();
/// let ee = aggregator.get_measure(CcrMeasure::Ee, Some(0.5), 0.0).unwrap();
/// assert_eq!(ee, 60.0);
/// ```
pub struct NettingAggregator {
    grid: Arc<ExposureDateGrid>,
    topology: Arc<NettingTopology>,
    engine: CollateralEngine,
    paths: Arc<dyn PathSource>,
    valuations: Option<Arc<dyn TradeValuationSource>>,
    kernels: Arc<KernelSet>,
    config: AggregationConfig,
    accumulator: MeasureAccumulator,
    tensors: Option<AllocationTensors>,
    diagnostics: Option<ExposureDiagnostics>,
    reduced: bool,
}

impl NettingAggregator {
    /// Creates an orchestrator.
    ///
    /// # Errors
    ///
    /// Configuration errors: kernels not matching the grid, or a collateral
    /// agreement referencing an unknown netting group.
    pub fn new(
        grid: ExposureDateGrid,
        topology: NettingTopology,
        agreements: HashMap<NettingGroupId, Arc<dyn CollateralTerms>>,
        paths: Arc<dyn PathSource>,
        kernels: KernelSet,
        config: AggregationConfig,
    ) -> Result<Self, ExposureError> {
        kernels.validate(&grid)?;
        let grid = Arc::new(grid);
        let topology = Arc::new(topology);
        let kernels = Arc::new(kernels);
        let engine = CollateralEngine::new(
            Arc::clone(&grid),
            Arc::clone(&topology),
            agreements,
            config.model_overcollateralization,
        )?;
        let accumulator =
            MeasureAccumulator::new(Arc::clone(&grid), Arc::clone(&kernels), config.rwa);
        Ok(Self {
            grid,
            topology,
            engine,
            paths,
            valuations: None,
            kernels,
            config,
            accumulator,
            tensors: None,
            diagnostics: None,
            reduced: false,
        })
    }

    /// Attaches a trade valuation source (required for trade allocation).
    pub fn with_valuations(mut self, valuations: Arc<dyn TradeValuationSource>) -> Self {
        self.valuations = Some(valuations);
        self
    }

    /// Returns the exposure-date grid.
    #[inline]
    pub fn grid(&self) -> &ExposureDateGrid {
        &self.grid
    }

    /// Returns the netting topology.
    #[inline]
    pub fn topology(&self) -> &NettingTopology {
        &self.topology
    }

    /// Returns the configuration.
    #[inline]
    pub fn config(&self) -> &AggregationConfig {
        &self.config
    }

    /// Returns the integration kernels currently in force.
    #[inline]
    pub fn kernels(&self) -> &KernelSet {
        &self.kernels
    }

    /// Returns the captured diagnostics, if enabled and reduced.
    #[inline]
    pub fn diagnostics(&self) -> Option<&ExposureDiagnostics> {
        self.diagnostics.as_ref()
    }

    /// Whether an accumulator exists for the effective measure of this pair.
    pub fn has_measure_accumulator(&self, measure: CcrMeasure, confidence: f64) -> bool {
        self.accumulator
            .has_measure_accumulator(self.config.effective_measure(measure), confidence)
    }

    fn ensure_reduced(&mut self) -> Result<(), ExposureError> {
        if self.reduced {
            return Ok(());
        }
        self.run_reduction()
    }

    fn run_reduction(&mut self) -> Result<(), ExposureError> {
        if self.config.allocate_trades && self.valuations.is_none() {
            return Err(ExposureError::MissingValuations(
                "trade-level allocation is enabled",
            ));
        }

        let n_paths = self.paths.n_paths();
        let n_trades = self.topology.n_trades();
        let n_dates = self.grid.len();
        let span = info_span!("exposure_reduction", paths = n_paths, dates = n_dates);
        let _guard = span.enter();

        let engine = &self.engine;
        let paths = &*self.paths;
        let valuations = self.valuations.as_deref();
        let config = &self.config;
        let template = &self.accumulator;

        let init = || WorkerState {
            acc: MeasureAccumulator::seeded_like(template),
            tensors: config
                .allocate_trades
                .then(|| AllocationTensors::new(n_dates, n_trades)),
            diagnostics: config
                .capture_diagnostics
                .then(|| ExposureDiagnostics::new(n_dates)),
            paths_done: 0,
            paths_skipped: 0,
        };

        let body = |state: &mut WorkerState, path_idx: usize| {
            let Some(path) = paths.path(path_idx) else {
                state.paths_skipped += 1;
                return;
            };
            let mut trade_values = vec![0.0; if config.allocate_trades { n_trades } else { 0 }];
            for d in 0..n_dates.min(path.n_dates()) {
                let values = if config.allocate_trades {
                    let source = valuations.expect("validated before reduction");
                    for (tr, slot) in trade_values.iter_mut().enumerate() {
                        *slot = source.value(tr, path.path_id(), d);
                    }
                    Some(trade_values.as_slice())
                } else {
                    None
                };
                let exposure = engine.collateralize(&path, d, values);
                state
                    .acc
                    .accumulate_exposures(&path, d, &ExposureObservation::from(&exposure));
                if let Some(tensors) = state.tensors.as_mut() {
                    let pw = path.path_weight();
                    let df = path.discount_factor(d);
                    let w_cpty = pw * path.weight_for(WeightChannel::CptyDefault, d) * df;
                    let w_own = pw * path.weight_for(WeightChannel::OwnDefault, d) * df;
                    let w_epv = pw * path.weight_for(WeightChannel::Survival, d) * df;
                    tensors.accumulate(d, &exposure.trade_values, w_cpty, w_own, w_epv);
                }
                if let Some(diag) = state.diagnostics.as_mut() {
                    diag.observe(path.path_id(), d, &exposure);
                }
            }
            state.paths_done += 1;
        };

        let merge = |mut a: WorkerState, b: WorkerState| {
            a.acc
                .merge_cumulative_values(b.acc)
                .expect("workers share one registration template");
            if let (Some(x), Some(y)) = (a.tensors.as_mut(), b.tensors) {
                x.merge(y);
            }
            if let (Some(x), Some(y)) = (a.diagnostics.as_mut(), b.diagnostics) {
                x.merge(y);
            }
            a.paths_done += b.paths_done;
            a.paths_skipped += b.paths_skipped;
            a
        };

        let result = fold_items(&self.config.parallel, n_paths, init, body, merge);

        debug!(
            paths = result.paths_done,
            skipped = result.paths_skipped,
            "merging worker accumulators complete"
        );

        self.accumulator = result.acc;
        self.accumulator.reduce_cumulative_values();
        if let Some(mut tensors) = result.tensors {
            tensors.normalize();
            self.tensors = Some(tensors);
        }
        if let Some(mut diagnostics) = result.diagnostics {
            diagnostics.finalize();
            self.diagnostics = Some(diagnostics);
        }
        self.reduced = true;
        info!(
            paths = result.paths_done,
            skipped = result.paths_skipped,
            "exposure reduction complete"
        );
        Ok(())
    }

    /// Marginal allocation for the regulatory-capital proxy: CVA-based
    /// allocations renormalized to the separately computed RWA total.
    fn rwa_marginal(
        &self,
        eff: CcrMeasure,
        confidence: f64,
    ) -> Result<Vec<f64>, ExposureError> {
        let tensors = self
            .tensors
            .as_ref()
            .ok_or(ExposureError::AllocationDisabled)?;
        let rwa_total = self.accumulator.get_measure(eff, None, confidence, None)?;
        let cva_eff = self.config.effective_measure(CcrMeasure::Cva);
        let n_trades = self.topology.n_trades();

        let mut alloc = Vec::with_capacity(n_trades);
        for trade_idx in 0..n_trades {
            let column = tensors.column(TensorKind::Cpty, trade_idx);
            alloc.push(
                self.accumulator
                    .get_measure(cva_eff, None, confidence, Some(&column))?,
            );
        }
        let total: f64 = alloc.iter().sum();
        if total.abs() <= TOTAL_EPS {
            return Ok(vec![0.0; n_trades]);
        }
        let scale = rwa_total / total;
        Ok(alloc.into_iter().map(|v| v * scale).collect())
    }
}

impl ExposureAggregator for NettingAggregator {
    fn add_measure_accumulator(
        &mut self,
        measure: CcrMeasure,
        confidence: f64,
    ) -> Result<(), ExposureError> {
        let eff = self.config.effective_measure(measure);
        self.accumulator.add_measure_accumulator(eff, confidence)
    }

    fn reduce(&mut self) -> Result<(), ExposureError> {
        self.ensure_reduced()
    }

    fn get_measure(
        &mut self,
        measure: CcrMeasure,
        date: Option<f64>,
        confidence: f64,
    ) -> Result<f64, ExposureError> {
        self.ensure_reduced()?;
        let eff = self.config.effective_measure(measure);
        self.accumulator.get_measure(eff, date, confidence, None)
    }

    fn get_measure_marginal(
        &mut self,
        measure: CcrMeasure,
        date: Option<f64>,
        confidence: f64,
    ) -> Result<Vec<f64>, ExposureError> {
        if !self.config.allocate_trades {
            return Err(ExposureError::AllocationDisabled);
        }
        self.ensure_reduced()?;

        let eff = self.config.effective_measure(measure);
        let traits = eff.traits();

        // A maturity has no meaningful per-trade decomposition.
        if traits.family == MeasureFamily::EffectiveMaturity {
            return Err(ExposureError::UnsupportedMeasure {
                measure: eff,
                variant: "netting",
            });
        }
        if traits.family == MeasureFamily::RegulatoryCapital {
            return self.rwa_marginal(eff, confidence);
        }

        let tensors = self
            .tensors
            .as_ref()
            .ok_or(ExposureError::AllocationDisabled)?;
        let kind = TensorKind::from_input(traits.input);
        let n_trades = self.topology.n_trades();

        if eff.is_time_indexed() {
            // Point measure: the aggregate scalar at the date times the
            // date-specific trade weight.
            let t = date.ok_or(ExposureError::DateRequired(eff))?;
            let total = self.accumulator.get_measure(eff, Some(t), confidence, None)?;
            let mut out = Vec::with_capacity(n_trades);
            for trade_idx in 0..n_trades {
                let column = tensors.column(kind, trade_idx);
                let weight = interpolate_on_grid(&self.grid, &column, t)?;
                out.push(total * weight);
            }
            Ok(out)
        } else {
            // Integral measure: the accumulator consumes the full per-date
            // weight vector of each trade.
            let mut out = Vec::with_capacity(n_trades);
            for trade_idx in 0..n_trades {
                let column = tensors.column(kind, trade_idx);
                out.push(
                    self.accumulator
                        .get_measure(eff, None, confidence, Some(&column))?,
                );
            }
            Ok(out)
        }
    }

    fn with_integration_kernels(&self, kernels: KernelSet) -> Result<Self, ExposureError> {
        kernels.validate(&self.grid)?;
        let kernels = Arc::new(kernels);
        let mut accumulator = MeasureAccumulator::new(
            Arc::clone(&self.grid),
            Arc::clone(&kernels),
            self.config.rwa,
        );
        for (measure, confidence) in self.accumulator.registered() {
            accumulator.add_measure_accumulator(measure, confidence)?;
        }
        Ok(Self {
            grid: Arc::clone(&self.grid),
            topology: Arc::clone(&self.topology),
            engine: self.engine.clone(),
            paths: Arc::clone(&self.paths),
            valuations: self.valuations.clone(),
            kernels,
            config: self.config.clone(),
            accumulator,
            tensors: None,
            diagnostics: None,
            reduced: false,
        })
    }
}
