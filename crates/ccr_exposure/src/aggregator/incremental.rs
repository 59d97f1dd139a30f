//! The incremental exposure aggregation orchestrator.
//!
//! Holds two full-netting orchestrators — the prior portfolio and the prior
//! portfolio plus an incremental trade set — and reports the difference as
//! the incremental measure. The post-portfolio value is available as the
//! grand total.

use crate::error::ExposureError;
use crate::kernel::KernelSet;
use crate::measure::CcrMeasure;

use super::{ExposureAggregator, NettingAggregator};

/// Incremental exposure aggregation orchestrator.
///
/// Measures answer "what does the incremental trade set add on top of the
/// prior portfolio": `incremental = post − prior`.
pub struct IncrementalAggregator {
    prior: NettingAggregator,
    total: NettingAggregator,
}

impl IncrementalAggregator {
    /// Pairs the prior-portfolio orchestrator with the post-portfolio one.
    ///
    /// # Errors
    ///
    /// [`ExposureError::IncompatiblePortfolios`] when the two orchestrators
    /// disagree on the exposure-date grid.
    pub fn new(
        prior: NettingAggregator,
        total: NettingAggregator,
    ) -> Result<Self, ExposureError> {
        if prior.grid() != total.grid() {
            return Err(ExposureError::IncompatiblePortfolios(
                "prior and post portfolios must share the exposure-date grid".to_string(),
            ));
        }
        Ok(Self { prior, total })
    }

    /// Returns the prior-portfolio orchestrator.
    #[inline]
    pub fn prior(&self) -> &NettingAggregator {
        &self.prior
    }

    /// Returns the post-portfolio orchestrator.
    #[inline]
    pub fn post(&self) -> &NettingAggregator {
        &self.total
    }

    /// The post-portfolio (grand-total) value of a measure.
    pub fn get_grand_total(
        &mut self,
        measure: CcrMeasure,
        date: Option<f64>,
        confidence: f64,
    ) -> Result<f64, ExposureError> {
        self.total.get_measure(measure, date, confidence)
    }
}

impl ExposureAggregator for IncrementalAggregator {
    fn add_measure_accumulator(
        &mut self,
        measure: CcrMeasure,
        confidence: f64,
    ) -> Result<(), ExposureError> {
        self.prior.add_measure_accumulator(measure, confidence)?;
        self.total.add_measure_accumulator(measure, confidence)
    }

    fn reduce(&mut self) -> Result<(), ExposureError> {
        self.prior.reduce()?;
        self.total.reduce()
    }

    fn get_measure(
        &mut self,
        measure: CcrMeasure,
        date: Option<f64>,
        confidence: f64,
    ) -> Result<f64, ExposureError> {
        let post = self.total.get_measure(measure, date, confidence)?;
        let prior = self.prior.get_measure(measure, date, confidence)?;
        Ok(post - prior)
    }

    /// Marginal allocation of the post portfolio (the prior portfolio has no
    /// entries for incremental trades, so allocation differences degenerate).
    fn get_measure_marginal(
        &mut self,
        measure: CcrMeasure,
        date: Option<f64>,
        confidence: f64,
    ) -> Result<Vec<f64>, ExposureError> {
        self.total.get_measure_marginal(measure, date, confidence)
    }

    fn with_integration_kernels(&self, kernels: KernelSet) -> Result<Self, ExposureError> {
        Ok(Self {
            prior: self.prior.with_integration_kernels(kernels.clone())?,
            total: self.total.with_integration_kernels(kernels)?,
        })
    }
}
