//! The no-netting exposure aggregation orchestrator.
//!
//! Every trade stands alone: no cross-trade netting, no collateral. Additive
//! measures keep one accumulator per trade; non-additive measures (the
//! PFE/running-max/standard-error/capital families) are computed on the
//! summed per-path exposures and allocated marginally by each trade's
//! standalone EE/NEE share. That allocation is a documented approximation —
//! quantiles are not linear in exposure.

use std::sync::Arc;

use ccr_core::types::{ExposureDateGrid, TradeId};
use tracing::{info, info_span};

use crate::accumulator::{ExposureObservation, MeasureAccumulator};
use crate::error::ExposureError;
use crate::kernel::KernelSet;
use crate::measure::{CcrMeasure, ExposureInput, MeasureFamily};
use crate::parallel::fold_items;
use crate::path::PathSource;
use crate::valuation::TradeValuationSource;

use super::{AggregationConfig, ExposureAggregator};

/// Tolerance below which a share denominator counts as zero.
const SHARE_EPS: f64 = 1e-12;

struct WorkerState {
    per_trade: Vec<MeasureAccumulator>,
    combined: MeasureAccumulator,
    paths_skipped: usize,
}

/// No-netting exposure aggregation orchestrator.
///
/// Per-trade exposure is `max(±v, 0)` of the trade's own value; the summed
/// exposure feeding non-additive measures is the sum of per-trade exposures
/// (trades never offset each other).
pub struct NoNettingAggregator {
    grid: Arc<ExposureDateGrid>,
    trade_ids: Vec<TradeId>,
    paths: Arc<dyn PathSource>,
    valuations: Arc<dyn TradeValuationSource>,
    kernels: Arc<KernelSet>,
    config: AggregationConfig,
    per_trade: Vec<MeasureAccumulator>,
    combined: MeasureAccumulator,
    reduced: bool,
}

impl NoNettingAggregator {
    /// Creates an orchestrator over standalone trades.
    ///
    /// # Errors
    ///
    /// Configuration errors: kernels not matching the grid, or the trade
    /// list disagreeing with the valuation source.
    pub fn new(
        grid: ExposureDateGrid,
        trade_ids: Vec<TradeId>,
        paths: Arc<dyn PathSource>,
        valuations: Arc<dyn TradeValuationSource>,
        kernels: KernelSet,
        config: AggregationConfig,
    ) -> Result<Self, ExposureError> {
        kernels.validate(&grid)?;
        if trade_ids.len() != valuations.n_trades() {
            return Err(ExposureError::LengthMismatch {
                what: "trade list vs valuation source",
                expected: valuations.n_trades(),
                actual: trade_ids.len(),
            });
        }
        let grid = Arc::new(grid);
        let kernels = Arc::new(kernels);
        let per_trade = (0..trade_ids.len())
            .map(|_| MeasureAccumulator::new(Arc::clone(&grid), Arc::clone(&kernels), config.rwa))
            .collect();
        let combined =
            MeasureAccumulator::new(Arc::clone(&grid), Arc::clone(&kernels), config.rwa);
        Ok(Self {
            grid,
            trade_ids,
            paths,
            valuations,
            kernels,
            config,
            per_trade,
            combined,
            reduced: false,
        })
    }

    /// Returns the trade identifiers in portfolio order.
    #[inline]
    pub fn trade_ids(&self) -> &[TradeId] {
        &self.trade_ids
    }

    /// Returns the integration kernels currently in force.
    #[inline]
    pub fn kernels(&self) -> &KernelSet {
        &self.kernels
    }

    /// The standalone measure whose per-trade share allocates a
    /// non-additive measure marginally.
    fn marginal_basis(eff: CcrMeasure) -> CcrMeasure {
        match eff.traits().input {
            ExposureInput::Negative | ExposureInput::FundingNegative => CcrMeasure::Nee0,
            _ => CcrMeasure::Ee0,
        }
    }

    fn ensure_reduced(&mut self) -> Result<(), ExposureError> {
        if self.reduced {
            return Ok(());
        }
        self.run_reduction()
    }

    fn run_reduction(&mut self) -> Result<(), ExposureError> {
        let n_paths = self.paths.n_paths();
        let n_trades = self.trade_ids.len();
        let n_dates = self.grid.len();
        let span = info_span!("no_netting_reduction", paths = n_paths, trades = n_trades);
        let _guard = span.enter();

        let paths = &*self.paths;
        let valuations = &*self.valuations;
        let trade_templates = &self.per_trade;
        let combined_template = &self.combined;

        let init = || WorkerState {
            per_trade: trade_templates
                .iter()
                .map(MeasureAccumulator::seeded_like)
                .collect(),
            combined: MeasureAccumulator::seeded_like(combined_template),
            paths_skipped: 0,
        };

        let body = |state: &mut WorkerState, path_idx: usize| {
            let Some(path) = paths.path(path_idx) else {
                state.paths_skipped += 1;
                return;
            };
            for d in 0..n_dates.min(path.n_dates()) {
                let mut sum_positive = 0.0;
                let mut sum_negative = 0.0;
                for (tr, acc) in state.per_trade.iter_mut().enumerate() {
                    let v = valuations.value(tr, path.path_id(), d);
                    let positive = v.max(0.0);
                    let negative = (-v).max(0.0);
                    sum_positive += positive;
                    sum_negative += negative;
                    acc.accumulate_exposures(
                        &path,
                        d,
                        &ExposureObservation {
                            positive,
                            negative,
                            funding_positive: positive,
                            funding_negative: negative,
                        },
                    );
                }
                state.combined.accumulate_exposures(
                    &path,
                    d,
                    &ExposureObservation {
                        positive: sum_positive,
                        negative: sum_negative,
                        funding_positive: sum_positive,
                        funding_negative: sum_negative,
                    },
                );
            }
        };

        let merge = |mut a: WorkerState, b: WorkerState| {
            for (mine, theirs) in a.per_trade.iter_mut().zip(b.per_trade) {
                mine.merge_cumulative_values(theirs)
                    .expect("workers share one registration template");
            }
            a.combined
                .merge_cumulative_values(b.combined)
                .expect("workers share one registration template");
            a.paths_skipped += b.paths_skipped;
            a
        };

        let mut result = fold_items(&self.config.parallel, n_paths, init, body, merge);

        for acc in &mut result.per_trade {
            acc.reduce_cumulative_values();
        }
        result.combined.reduce_cumulative_values();
        self.per_trade = result.per_trade;
        self.combined = result.combined;
        self.reduced = true;
        info!(
            paths = n_paths,
            skipped = result.paths_skipped,
            "no-netting reduction complete"
        );
        Ok(())
    }

    /// Per-trade share of the marginal basis at a date (or time-averaged
    /// over the grid for scalar measures).
    fn basis_shares(
        &self,
        basis: CcrMeasure,
        date: Option<f64>,
        confidence: f64,
    ) -> Result<Vec<f64>, ExposureError> {
        let mut values = Vec::with_capacity(self.per_trade.len());
        for acc in &self.per_trade {
            let v = match date {
                Some(t) => acc.get_measure(basis, Some(t), confidence, None)?,
                None => {
                    // Time-averaged basis across the grid dates.
                    let mut total = 0.0;
                    for i in 0..self.grid.len() {
                        total += acc.get_measure(
                            basis,
                            Some(self.grid.date(i)),
                            confidence,
                            None,
                        )? * self.grid.dt(i);
                    }
                    total
                }
            };
            values.push(v);
        }
        let total: f64 = values.iter().sum();
        if total.abs() <= SHARE_EPS {
            return Ok(vec![0.0; values.len()]);
        }
        Ok(values.into_iter().map(|v| v / total).collect())
    }
}

impl ExposureAggregator for NoNettingAggregator {
    fn add_measure_accumulator(
        &mut self,
        measure: CcrMeasure,
        confidence: f64,
    ) -> Result<(), ExposureError> {
        let eff = self.config.effective_measure(measure);
        if eff.is_additive() {
            for acc in &mut self.per_trade {
                acc.add_measure_accumulator(eff, confidence)?;
            }
        } else {
            self.combined.add_measure_accumulator(eff, confidence)?;
            // The marginal basis rides along in every trade accumulator.
            let basis = Self::marginal_basis(eff);
            for acc in &mut self.per_trade {
                acc.add_measure_accumulator(basis, confidence)?;
            }
        }
        Ok(())
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
        if eff.is_additive() {
            let mut total = 0.0;
            for acc in &self.per_trade {
                total += acc.get_measure(eff, date, confidence, None)?;
            }
            Ok(total)
        } else {
            self.combined.get_measure(eff, date, confidence, None)
        }
    }

    fn get_measure_marginal(
        &mut self,
        measure: CcrMeasure,
        date: Option<f64>,
        confidence: f64,
    ) -> Result<Vec<f64>, ExposureError> {
        self.ensure_reduced()?;
        let eff = self.config.effective_measure(measure);
        // A maturity has no meaningful per-trade decomposition.
        if eff.traits().family == MeasureFamily::EffectiveMaturity {
            return Err(ExposureError::UnsupportedMeasure {
                measure: eff,
                variant: "no-netting",
            });
        }
        if eff.is_additive() {
            // Standalone accumulation: the per-trade value is the marginal.
            let mut out = Vec::with_capacity(self.per_trade.len());
            for acc in &self.per_trade {
                out.push(acc.get_measure(eff, date, confidence, None)?);
            }
            Ok(out)
        } else {
            // Approximation: the non-additive total allocated by standalone
            // EE/NEE shares.
            let total = self.combined.get_measure(eff, date, confidence, None)?;
            let basis = Self::marginal_basis(eff);
            let share_date = if eff.is_time_indexed() { date } else { None };
            let shares = self.basis_shares(basis, share_date, confidence)?;
            Ok(shares.into_iter().map(|s| s * total).collect())
        }
    }

    fn with_integration_kernels(&self, kernels: KernelSet) -> Result<Self, ExposureError> {
        kernels.validate(&self.grid)?;
        let kernels = Arc::new(kernels);
        let mut per_trade: Vec<MeasureAccumulator> = (0..self.trade_ids.len())
            .map(|_| {
                MeasureAccumulator::new(Arc::clone(&self.grid), Arc::clone(&kernels), self.config.rwa)
            })
            .collect();
        for (fresh, old) in per_trade.iter_mut().zip(self.per_trade.iter()) {
            for (measure, confidence) in old.registered() {
                fresh.add_measure_accumulator(measure, confidence)?;
            }
        }
        let mut combined =
            MeasureAccumulator::new(Arc::clone(&self.grid), Arc::clone(&kernels), self.config.rwa);
        for (measure, confidence) in self.combined.registered() {
            combined.add_measure_accumulator(measure, confidence)?;
        }
        Ok(Self {
            grid: Arc::clone(&self.grid),
            trade_ids: self.trade_ids.clone(),
            paths: Arc::clone(&self.paths),
            valuations: Arc::clone(&self.valuations),
            kernels,
            config: self.config.clone(),
            per_trade,
            combined,
            reduced: false,
        })
    }
}
