//! Exposure aggregation orchestrators.
//!
//! The [`ExposureAggregator`] contract is shared by three policy variants:
//!
//! - [`NettingAggregator`] — full netting and collateral (the default).
//! - [`NoNettingAggregator`] — one standalone accumulator per trade, with
//!   non-additive measures computed on summed per-path exposures.
//! - [`IncrementalAggregator`] — the difference between a prior portfolio
//!   and the prior portfolio plus an incremental trade set.
//!
//! Each orchestrator moves through `Constructed → Accumulating → Reduced`;
//! queries auto-trigger the reduction exactly once.

mod incremental;
mod netting;
mod no_netting;

pub use incremental::IncrementalAggregator;
pub use netting::NettingAggregator;
pub use no_netting::NoNettingAggregator;

use crate::accumulator::RwaParams;
use crate::error::ExposureError;
use crate::kernel::KernelSet;
use crate::measure::{effective_measure, CcrMeasure, ExposureInput};
use crate::parallel::ParallelConfig;

/// Tolerance below which a renormalization denominator counts as zero.
const NORM_EPS: f64 = 1e-12;

/// Configuration flags shared by the orchestrator variants.
#[derive(Clone, Debug)]
pub struct AggregationConfig {
    /// Condition exposures on default/survival via the Radon-Nikodym
    /// channels. When off, requested measures map to their unconditional
    /// variants.
    pub wrong_way_risk: bool,
    /// Report EE/NEE/EPV families discounted.
    pub discount_exposures: bool,
    /// Compute funding adjustments ignoring default (FCA/FBA map to their
    /// no-default variants).
    pub funding_no_default: bool,
    /// Accumulate per-trade allocation tensors for marginal queries.
    pub allocate_trades: bool,
    /// Capture per-path exposure/collateral diagnostics.
    pub capture_diagnostics: bool,
    /// Model overcollateralization instead of clamping it.
    pub model_overcollateralization: bool,
    /// Parallel execution settings.
    pub parallel: ParallelConfig,
    /// Regulatory-capital proxy parameters.
    pub rwa: RwaParams,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            wrong_way_risk: true,
            discount_exposures: false,
            funding_no_default: false,
            allocate_trades: false,
            capture_diagnostics: false,
            model_overcollateralization: false,
            parallel: ParallelConfig::default(),
            rwa: RwaParams::default(),
        }
    }
}

impl AggregationConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the wrong-way-risk switch.
    pub fn with_wrong_way_risk(mut self, enabled: bool) -> Self {
        self.wrong_way_risk = enabled;
        self
    }

    /// Requests discounted exposure reporting.
    pub fn with_discounted_exposures(mut self) -> Self {
        self.discount_exposures = true;
        self
    }

    /// Requests funding adjustments that ignore default.
    pub fn with_funding_no_default(mut self) -> Self {
        self.funding_no_default = true;
        self
    }

    /// Enables per-trade allocation tensors.
    pub fn with_trade_allocation(mut self) -> Self {
        self.allocate_trades = true;
        self
    }

    /// Enables per-path diagnostics capture.
    pub fn with_diagnostics(mut self) -> Self {
        self.capture_diagnostics = true;
        self
    }

    /// Models overcollateralization instead of clamping it.
    pub fn with_overcollateralization(mut self) -> Self {
        self.model_overcollateralization = true;
        self
    }

    /// Sets the parallel execution settings.
    pub fn with_parallel(mut self, parallel: ParallelConfig) -> Self {
        self.parallel = parallel;
        self
    }

    /// Sets the regulatory-capital proxy parameters.
    pub fn with_rwa(mut self, rwa: RwaParams) -> Self {
        self.rwa = rwa;
        self
    }

    /// Maps a requested measure to its effective measure under these flags.
    pub fn effective_measure(&self, measure: CcrMeasure) -> CcrMeasure {
        effective_measure(
            measure,
            self.wrong_way_risk,
            self.discount_exposures,
            self.funding_no_default,
        )
    }
}

/// Common contract of the aggregation orchestrators.
///
/// Queries taking `&mut self` auto-trigger [`reduce`](Self::reduce) on
/// first use; reduction is idempotent and memoized.
pub trait ExposureAggregator {
    /// Registers interest in a `(measure, confidence)` pair, translating
    /// the requested measure to its effective measure first.
    fn add_measure_accumulator(
        &mut self,
        measure: CcrMeasure,
        confidence: f64,
    ) -> Result<(), ExposureError>;

    /// Runs the pathwise reduction. Idempotent.
    fn reduce(&mut self) -> Result<(), ExposureError>;

    /// Returns a measure value; `date` is `None` for portfolio scalars.
    fn get_measure(
        &mut self,
        measure: CcrMeasure,
        date: Option<f64>,
        confidence: f64,
    ) -> Result<f64, ExposureError>;

    /// Returns the per-trade marginal allocation of a measure, one entry per
    /// trade in portfolio order.
    fn get_measure_marginal(
        &mut self,
        measure: CcrMeasure,
        date: Option<f64>,
        confidence: f64,
    ) -> Result<Vec<f64>, ExposureError>;

    /// Clone-with-substitution: a fresh, un-reduced orchestrator sharing
    /// paths and configuration but integrating against new kernels.
    fn with_integration_kernels(&self, kernels: KernelSet) -> Result<Self, ExposureError>
    where
        Self: Sized;
}

/// Which allocation tensor a measure draws marginal weights from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum TensorKind {
    /// Counterparty-risk (positive exposure) weights.
    Cpty,
    /// Booking-entity-risk (negative exposure) weights.
    Own,
    /// Signed expected-value weights.
    Epv,
}

impl TensorKind {
    pub(crate) fn from_input(input: ExposureInput) -> Self {
        match input {
            ExposureInput::Positive | ExposureInput::FundingPositive => Self::Cpty,
            ExposureInput::Negative | ExposureInput::FundingNegative => Self::Own,
            ExposureInput::Net => Self::Epv,
        }
    }
}

/// Flat `(date, trade)` arenas of marginal allocation weights.
///
/// Accumulated per worker during reduction, merged by elementwise addition,
/// then normalized twice: by the per-date weight mass, and then so each
/// date's weights sum to one within their sign bucket.
#[derive(Clone, Debug)]
pub(crate) struct AllocationTensors {
    n_dates: usize,
    n_trades: usize,
    cpty: Vec<f64>,
    own: Vec<f64>,
    epv: Vec<f64>,
    cpty_mass: Vec<f64>,
    own_mass: Vec<f64>,
    epv_mass: Vec<f64>,
}

impl AllocationTensors {
    pub(crate) fn new(n_dates: usize, n_trades: usize) -> Self {
        Self {
            n_dates,
            n_trades,
            cpty: vec![0.0; n_dates * n_trades],
            own: vec![0.0; n_dates * n_trades],
            epv: vec![0.0; n_dates * n_trades],
            cpty_mass: vec![0.0; n_dates],
            own_mass: vec![0.0; n_dates],
            epv_mass: vec![0.0; n_dates],
        }
    }

    #[inline]
    fn idx(&self, date_idx: usize, trade_idx: usize) -> usize {
        date_idx * self.n_trades + trade_idx
    }

    /// Folds one path/date's allocated trade values into the tensors.
    pub(crate) fn accumulate(
        &mut self,
        date_idx: usize,
        trade_values: &[f64],
        w_cpty: f64,
        w_own: f64,
        w_epv: f64,
    ) {
        for (trade_idx, &v) in trade_values.iter().enumerate() {
            let i = self.idx(date_idx, trade_idx);
            self.cpty[i] += w_cpty * v.max(0.0);
            self.own[i] += w_own * (-v).max(0.0);
            self.epv[i] += w_epv * v;
        }
        self.cpty_mass[date_idx] += w_cpty;
        self.own_mass[date_idx] += w_own;
        self.epv_mass[date_idx] += w_epv;
    }

    /// Merges a worker-local tensor set.
    pub(crate) fn merge(&mut self, other: AllocationTensors) {
        for (a, b) in self.cpty.iter_mut().zip(other.cpty) {
            *a += b;
        }
        for (a, b) in self.own.iter_mut().zip(other.own) {
            *a += b;
        }
        for (a, b) in self.epv.iter_mut().zip(other.epv) {
            *a += b;
        }
        for (a, b) in self.cpty_mass.iter_mut().zip(other.cpty_mass) {
            *a += b;
        }
        for (a, b) in self.own_mass.iter_mut().zip(other.own_mass) {
            *a += b;
        }
        for (a, b) in self.epv_mass.iter_mut().zip(other.epv_mass) {
            *a += b;
        }
    }

    /// Two-step normalization: per-date mass, then unit sum per sign bucket.
    pub(crate) fn normalize(&mut self) {
        for d in 0..self.n_dates {
            let start = d * self.n_trades;
            let end = start + self.n_trades;
            Self::normalize_date(&mut self.cpty[start..end], self.cpty_mass[d]);
            Self::normalize_date(&mut self.own[start..end], self.own_mass[d]);
            Self::normalize_date(&mut self.epv[start..end], self.epv_mass[d]);
        }
    }

    fn normalize_date(row: &mut [f64], mass: f64) {
        if mass.abs() > NORM_EPS {
            for v in row.iter_mut() {
                *v /= mass;
            }
        }
        let total: f64 = row.iter().sum();
        if total.abs() > NORM_EPS {
            for v in row.iter_mut() {
                *v /= total;
            }
        } else {
            for v in row.iter_mut() {
                *v = 0.0;
            }
        }
    }

    /// Per-date weight column of one trade.
    pub(crate) fn column(&self, kind: TensorKind, trade_idx: usize) -> Vec<f64> {
        let tensor = match kind {
            TensorKind::Cpty => &self.cpty,
            TensorKind::Own => &self.own,
            TensorKind::Epv => &self.epv,
        };
        (0..self.n_dates)
            .map(|d| tensor[d * self.n_trades + trade_idx])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_config_builders() {
        let config = AggregationConfig::new()
            .with_wrong_way_risk(false)
            .with_discounted_exposures()
            .with_trade_allocation()
            .with_diagnostics();

        assert!(!config.wrong_way_risk);
        assert!(config.discount_exposures);
        assert!(config.allocate_trades);
        assert!(config.capture_diagnostics);
        assert_eq!(config.effective_measure(CcrMeasure::Cva), CcrMeasure::Cva0);
        assert_eq!(
            config.effective_measure(CcrMeasure::Ee),
            CcrMeasure::DiscountedEe
        );
    }

    #[test]
    fn test_tensor_kind_from_input() {
        assert_eq!(
            TensorKind::from_input(ExposureInput::Positive),
            TensorKind::Cpty
        );
        assert_eq!(
            TensorKind::from_input(ExposureInput::FundingNegative),
            TensorKind::Own
        );
        assert_eq!(TensorKind::from_input(ExposureInput::Net), TensorKind::Epv);
    }

    #[test]
    fn test_tensor_normalization_sums_to_one() {
        let mut t = AllocationTensors::new(1, 3);
        t.accumulate(0, &[30.0, 10.0, -20.0], 1.0, 1.0, 1.0);
        t.accumulate(0, &[10.0, 30.0, -20.0], 1.0, 1.0, 1.0);
        t.normalize();

        let cpty_sum: f64 = (0..3).map(|tr| t.column(TensorKind::Cpty, tr)[0]).sum();
        let own_sum: f64 = (0..3).map(|tr| t.column(TensorKind::Own, tr)[0]).sum();
        assert_relative_eq!(cpty_sum, 1.0, epsilon = 1e-12);
        assert_relative_eq!(own_sum, 1.0, epsilon = 1e-12);

        // Equal positive contributions from trades 0 and 1.
        assert_relative_eq!(
            t.column(TensorKind::Cpty, 0)[0],
            t.column(TensorKind::Cpty, 1)[0],
            epsilon = 1e-12
        );
        // The only negative contributor carries the whole bucket.
        assert_relative_eq!(t.column(TensorKind::Own, 2)[0], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_tensor_merge_matches_single_pass() {
        let mut a = AllocationTensors::new(2, 2);
        a.accumulate(0, &[5.0, 15.0], 1.0, 1.0, 1.0);
        let mut b = AllocationTensors::new(2, 2);
        b.accumulate(0, &[15.0, 5.0], 1.0, 1.0, 1.0);
        a.merge(b);
        a.normalize();

        let mut single = AllocationTensors::new(2, 2);
        single.accumulate(0, &[5.0, 15.0], 1.0, 1.0, 1.0);
        single.accumulate(0, &[15.0, 5.0], 1.0, 1.0, 1.0);
        single.normalize();

        for tr in 0..2 {
            assert_relative_eq!(
                a.column(TensorKind::Cpty, tr)[0],
                single.column(TensorKind::Cpty, tr)[0],
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn test_empty_date_normalizes_to_zero() {
        let mut t = AllocationTensors::new(2, 2);
        t.accumulate(0, &[10.0, 10.0], 1.0, 1.0, 1.0);
        t.normalize();
        // Date 1 saw no observations.
        assert_eq!(t.column(TensorKind::Cpty, 0)[1], 0.0);
        assert_eq!(t.column(TensorKind::Epv, 1)[1], 0.0);
    }
}
