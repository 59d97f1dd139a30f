//! Per-measure accumulation of path observations.
//!
//! A [`MeasureAccumulator`] owns one slot per registered
//! `(measure, confidence)` pair. During the accumulate phase each slot folds
//! weighted path observations into per-date buffers; merging two partial
//! accumulators is associative and commutative, so parallel workers can
//! reduce in any completion order. After
//! [`MeasureAccumulator::reduce_cumulative_values`] the accumulator is
//! read-only and serves [`MeasureAccumulator::get_measure`] queries.

mod projective;

pub use projective::mixture_quantile;

use std::sync::Arc;

use ccr_core::math::{interpolate_on_grid, EmpiricalCdf};
use ccr_core::types::{ExposureDateGrid, GridPosition};

use crate::collateral::DateExposure;
use crate::error::ExposureError;
use crate::kernel::KernelSet;
use crate::measure::{CcrMeasure, ExposureInput, MeasureFamily};
use crate::path::PathRecord;

/// Tolerance for treating a weight mass as zero.
const MASS_EPS: f64 = 1e-300;

/// Tolerance for matching confidence levels between registration and query.
const CONFIDENCE_EPS: f64 = 1e-9;

/// Regulatory horizon (in years) for the EEPE time average.
const EEPE_HORIZON: f64 = 1.0;

/// Maturity cap (in years) for the Basel effective-maturity ratio.
const EFFECTIVE_MATURITY_CAP: f64 = 5.0;

/// Parameters of the regulatory-capital proxy.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RwaParams {
    /// IMM alpha multiplier applied to EEPE to obtain EAD.
    pub alpha: f64,
    /// Risk weight applied to EAD.
    pub risk_weight: f64,
}

impl Default for RwaParams {
    fn default() -> Self {
        Self {
            alpha: 1.4,
            risk_weight: 1.0,
        }
    }
}

/// One path/date observation handed to the accumulator.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ExposureObservation {
    /// Collateralized counterparty-risk exposure.
    pub positive: f64,
    /// Collateralized booking-entity-risk exposure.
    pub negative: f64,
    /// Counterparty-risk funding exposure (net of reusable collateral only).
    pub funding_positive: f64,
    /// Booking-entity-risk funding exposure.
    pub funding_negative: f64,
}

impl From<&DateExposure> for ExposureObservation {
    fn from(e: &DateExposure) -> Self {
        Self {
            positive: e.positive,
            negative: e.negative,
            funding_positive: e.funding_positive,
            funding_negative: e.funding_negative,
        }
    }
}

impl ExposureObservation {
    /// Selects the exposure input a measure consumes.
    #[inline]
    fn input(&self, input: ExposureInput) -> f64 {
        match input {
            ExposureInput::Positive => self.positive,
            ExposureInput::Negative => self.negative,
            ExposureInput::Net => self.positive - self.negative,
            ExposureInput::FundingPositive => self.funding_positive,
            ExposureInput::FundingNegative => self.funding_negative,
        }
    }
}

/// Per-date weighted-sum buffers for expectation-family measures.
#[derive(Clone, Debug)]
struct ExpectationState {
    weighted: Vec<f64>,
    weighted_sq: Vec<f64>,
    mass: Vec<f64>,
    count: Vec<u64>,
    profile: Option<Vec<f64>>,
}

impl ExpectationState {
    fn new(n_dates: usize) -> Self {
        Self {
            weighted: vec![0.0; n_dates],
            weighted_sq: vec![0.0; n_dates],
            mass: vec![0.0; n_dates],
            count: vec![0; n_dates],
            profile: None,
        }
    }

    fn merge(&mut self, other: &ExpectationState) {
        for i in 0..self.weighted.len() {
            self.weighted[i] += other.weighted[i];
            self.weighted_sq[i] += other.weighted_sq[i];
            self.mass[i] += other.mass[i];
            self.count[i] += other.count[i];
        }
    }

    fn reduce(&mut self) {
        let profile = self
            .weighted
            .iter()
            .zip(self.mass.iter())
            .map(|(&s, &m)| if m.abs() > MASS_EPS { s / m } else { 0.0 })
            .collect();
        self.profile = Some(profile);
    }

    fn profile(&self) -> &[f64] {
        self.profile.as_deref().expect("reduced expectation state")
    }

    /// Standard error of the per-date estimator.
    fn std_error(&self, date_idx: usize) -> f64 {
        let m = self.mass[date_idx];
        let n = self.count[date_idx];
        if m.abs() <= MASS_EPS || n == 0 {
            return 0.0;
        }
        let mean = self.weighted[date_idx] / m;
        let var = (self.weighted_sq[date_idx] / m - mean * mean).max(0.0);
        (var / n as f64).sqrt()
    }
}

/// Per-date sample sets for quantile-family measures.
#[derive(Clone, Debug)]
struct QuantileState {
    samples: Vec<Vec<(f64, f64)>>,
    projected: Vec<Vec<(f64, f64, f64)>>,
    cdfs: Option<Vec<EmpiricalCdf>>,
}

impl QuantileState {
    fn new(n_dates: usize) -> Self {
        Self {
            samples: vec![Vec::new(); n_dates],
            projected: vec![Vec::new(); n_dates],
            cdfs: None,
        }
    }

    fn merge(&mut self, other: &mut QuantileState) {
        for i in 0..self.samples.len() {
            self.samples[i].append(&mut other.samples[i]);
            self.projected[i].append(&mut other.projected[i]);
        }
    }

    fn reduce(&mut self) {
        let cdfs = self
            .samples
            .iter()
            .map(|s| EmpiricalCdf::from_weighted_samples(s))
            .collect();
        self.cdfs = Some(cdfs);
    }

    /// Quantile at one grid date, preferring projected components when
    /// present.
    fn quantile_at(&self, date_idx: usize, confidence: f64) -> f64 {
        if !self.projected[date_idx].is_empty() {
            return mixture_quantile(&self.projected[date_idx], confidence);
        }
        self.cdfs
            .as_ref()
            .expect("reduced quantile state")[date_idx]
            .quantile(confidence)
    }
}

#[derive(Clone, Debug)]
enum SlotState {
    Expectation(ExpectationState),
    Quantile(QuantileState),
}

#[derive(Clone, Debug)]
struct Slot {
    measure: CcrMeasure,
    confidence: f64,
    state: SlotState,
}

impl Slot {
    fn new(measure: CcrMeasure, confidence: f64, n_dates: usize) -> Self {
        let state = match measure.traits().family {
            MeasureFamily::Quantile => SlotState::Quantile(QuantileState::new(n_dates)),
            _ => SlotState::Expectation(ExpectationState::new(n_dates)),
        };
        Self {
            measure,
            confidence,
            state,
        }
    }
}

/// Accumulates the statistics needed to answer measure queries.
pub struct MeasureAccumulator {
    grid: Arc<ExposureDateGrid>,
    kernels: Arc<KernelSet>,
    rwa: RwaParams,
    slots: Vec<Slot>,
    reduced: bool,
}

impl MeasureAccumulator {
    /// Creates an empty accumulator.
    pub fn new(grid: Arc<ExposureDateGrid>, kernels: Arc<KernelSet>, rwa: RwaParams) -> Self {
        Self {
            grid,
            kernels,
            rwa,
            slots: Vec::new(),
            reduced: false,
        }
    }

    /// Creates a fresh, un-reduced accumulator with the same registrations.
    ///
    /// Parallel workers seed their thread-local accumulator from the shared
    /// template this way; no state is cloned, only configuration.
    pub fn seeded_like(template: &MeasureAccumulator) -> Self {
        let mut acc = Self::new(
            Arc::clone(&template.grid),
            Arc::clone(&template.kernels),
            template.rwa,
        );
        for slot in &template.slots {
            acc.slots
                .push(Slot::new(slot.measure, slot.confidence, template.grid.len()));
        }
        acc
    }

    /// Returns the exposure-date grid.
    #[inline]
    pub fn grid(&self) -> &ExposureDateGrid {
        &self.grid
    }

    /// Whether [`reduce_cumulative_values`](Self::reduce_cumulative_values)
    /// has run.
    #[inline]
    pub fn is_reduced(&self) -> bool {
        self.reduced
    }

    /// Registered `(measure, confidence)` pairs, in registration order.
    pub fn registered(&self) -> Vec<(CcrMeasure, f64)> {
        self.slots.iter().map(|s| (s.measure, s.confidence)).collect()
    }

    fn find_slot(&self, measure: CcrMeasure, confidence: f64) -> Option<&Slot> {
        self.slots.iter().find(|s| {
            s.measure == measure && (s.confidence - confidence).abs() < CONFIDENCE_EPS
        })
    }

    /// Whether an accumulator exists for the pair.
    pub fn has_measure_accumulator(&self, measure: CcrMeasure, confidence: f64) -> bool {
        self.find_slot(measure, confidence).is_some()
    }

    /// Idempotently registers interest in a measure.
    ///
    /// # Errors
    ///
    /// [`ExposureError::AlreadyReduced`] after reduction.
    pub fn add_measure_accumulator(
        &mut self,
        measure: CcrMeasure,
        confidence: f64,
    ) -> Result<(), ExposureError> {
        if self.reduced {
            return Err(ExposureError::AlreadyReduced);
        }
        if self.has_measure_accumulator(measure, confidence) {
            return Ok(());
        }
        self.slots
            .push(Slot::new(measure, confidence, self.grid.len()));
        Ok(())
    }

    /// Folds one path/date observation into every registered slot.
    ///
    /// The observation weight is `path_weight × rn_density(channel, date)`,
    /// with the discount factor multiplying the observation value for
    /// discounted measures and the spread channel multiplying funding
    /// observations. No-ops after reduction.
    pub fn accumulate_exposures(
        &mut self,
        path: &PathRecord,
        date_idx: usize,
        obs: &ExposureObservation,
    ) {
        debug_assert!(!self.reduced, "accumulation after reduction");
        if self.reduced {
            return;
        }
        for slot in &mut self.slots {
            let traits = slot.measure.traits();
            let rn = path.weight_for(traits.channel, date_idx);
            let w = path.path_weight() * rn;

            let mut x = obs.input(traits.input);
            if let Some(spread) = traits.spread {
                x *= path.spread_for(spread, date_idx);
            }
            if traits.discounted {
                x *= path.discount_factor(date_idx);
            }

            match &mut slot.state {
                SlotState::Expectation(st) => {
                    st.weighted[date_idx] += w * x;
                    st.weighted_sq[date_idx] += w * x * x;
                    st.mass[date_idx] += w;
                    st.count[date_idx] += 1;
                }
                SlotState::Quantile(st) => {
                    st.samples[date_idx].push((x, w));
                }
            }
        }
    }

    /// Feeds a semi-analytically projected exposure component into every
    /// quantile slot.
    ///
    /// `mean` follows the positive-exposure sign convention; negative-side
    /// quantile measures receive the mirrored component.
    pub fn accumulate_projected_exposure(
        &mut self,
        date_idx: usize,
        mean: f64,
        std_dev: f64,
        weight: f64,
    ) {
        debug_assert!(!self.reduced, "accumulation after reduction");
        if self.reduced {
            return;
        }
        for slot in &mut self.slots {
            let traits = slot.measure.traits();
            if let SlotState::Quantile(st) = &mut slot.state {
                let m = match traits.input {
                    ExposureInput::Negative | ExposureInput::FundingNegative => -mean,
                    _ => mean,
                };
                st.projected[date_idx].push((m, std_dev, weight));
            }
        }
    }

    /// Merges a partial accumulator produced by another worker.
    ///
    /// Associative and commutative; both sides must be un-reduced and share
    /// the same registrations.
    pub fn merge_cumulative_values(
        &mut self,
        mut other: MeasureAccumulator,
    ) -> Result<(), ExposureError> {
        if self.reduced || other.reduced {
            return Err(ExposureError::AlreadyReduced);
        }
        if self.slots.len() != other.slots.len() {
            return Err(ExposureError::LengthMismatch {
                what: "accumulator slots",
                expected: self.slots.len(),
                actual: other.slots.len(),
            });
        }
        for (mine, theirs) in self.slots.iter_mut().zip(other.slots.iter_mut()) {
            debug_assert_eq!(mine.measure, theirs.measure);
            match (&mut mine.state, &mut theirs.state) {
                (SlotState::Expectation(a), SlotState::Expectation(b)) => a.merge(b),
                (SlotState::Quantile(a), SlotState::Quantile(b)) => a.merge(b),
                _ => {
                    return Err(ExposureError::LengthMismatch {
                        what: "accumulator slot states",
                        expected: self.slots.len(),
                        actual: other.slots.len(),
                    })
                }
            }
        }
        Ok(())
    }

    /// Normalizes weighted sums into expectations and builds empirical CDFs.
    ///
    /// Idempotent; the accumulator is read-only afterwards.
    pub fn reduce_cumulative_values(&mut self) {
        if self.reduced {
            return;
        }
        for slot in &mut self.slots {
            match &mut slot.state {
                SlotState::Expectation(st) => st.reduce(),
                SlotState::Quantile(st) => st.reduce(),
            }
        }
        self.reduced = true;
    }

    /// Answers a measure query.
    ///
    /// Time-indexed measures interpolate over the grid (flat extrapolation
    /// outside, year-fraction weights inside); quantile measures invert the
    /// empirical CDF at the confidence level; integral measures sum the
    /// profile against their kernel. `weights` (one entry per date) scales
    /// per-date contributions for marginal attribution.
    ///
    /// # Errors
    ///
    /// [`ExposureError::NotReduced`] before reduction,
    /// [`ExposureError::MeasureNotRegistered`] for an unknown pair,
    /// [`ExposureError::DateRequired`] when a time-indexed measure is
    /// queried without a date.
    pub fn get_measure(
        &self,
        measure: CcrMeasure,
        date: Option<f64>,
        confidence: f64,
        weights: Option<&[f64]>,
    ) -> Result<f64, ExposureError> {
        if !self.reduced {
            return Err(ExposureError::NotReduced);
        }
        if let Some(w) = weights {
            if w.len() != self.grid.len() {
                return Err(ExposureError::LengthMismatch {
                    what: "per-date weights",
                    expected: self.grid.len(),
                    actual: w.len(),
                });
            }
        }
        let slot = self
            .find_slot(measure, confidence)
            .ok_or(ExposureError::MeasureNotRegistered {
                measure,
                confidence,
            })?;
        let traits = measure.traits();

        match &slot.state {
            SlotState::Quantile(st) => {
                let t = date.ok_or(ExposureError::DateRequired(measure))?;
                Ok(self.quantile_at_date(st, t, confidence))
            }
            SlotState::Expectation(st) => match traits.family {
                MeasureFamily::Expectation => {
                    let t = date.ok_or(ExposureError::DateRequired(measure))?;
                    let profile = self.scaled_profile(st.profile(), weights);
                    Ok(interpolate_on_grid(&self.grid, &profile, t)?)
                }
                MeasureFamily::StdError => {
                    let t = date.ok_or(ExposureError::DateRequired(measure))?;
                    let se: Vec<f64> = (0..self.grid.len())
                        .map(|i| {
                            let scale = weights.map_or(1.0, |w| w[i]);
                            st.std_error(i) * scale
                        })
                        .collect();
                    Ok(interpolate_on_grid(&self.grid, &se, t)?)
                }
                MeasureFamily::RunningMax => {
                    let t = date.ok_or(ExposureError::DateRequired(measure))?;
                    let profile = self.scaled_profile(st.profile(), weights);
                    let rm = running_max(&profile);
                    Ok(interpolate_on_grid(&self.grid, &rm, t)?)
                }
                MeasureFamily::TimeAverage => {
                    let profile = self.scaled_profile(st.profile(), weights);
                    Ok(time_average(&self.grid, &profile, f64::INFINITY))
                }
                MeasureFamily::TimeAverageRunningMax => {
                    let profile = self.scaled_profile(st.profile(), weights);
                    let rm = running_max(&profile);
                    Ok(time_average(&self.grid, &rm, EEPE_HORIZON))
                }
                MeasureFamily::KernelIntegral => {
                    let kernel = self
                        .kernels
                        .kernel(traits.kernel.expect("integral measure names a kernel"));
                    let profile = self.scaled_profile(st.profile(), weights);
                    Ok(kernel.integrate(&profile))
                }
                MeasureFamily::RegulatoryCapital => {
                    let profile = self.scaled_profile(st.profile(), weights);
                    let rm = running_max(&profile);
                    let eepe = time_average(&self.grid, &rm, EEPE_HORIZON);
                    Ok(self.rwa.alpha * eepe * self.rwa.risk_weight)
                }
                MeasureFamily::EffectiveMaturity => {
                    let profile = self.scaled_profile(st.profile(), weights);
                    Ok(effective_maturity(&self.grid, &profile))
                }
                MeasureFamily::Quantile => unreachable!("quantile measures use quantile slots"),
            },
        }
    }

    fn scaled_profile(&self, profile: &[f64], weights: Option<&[f64]>) -> Vec<f64> {
        match weights {
            None => profile.to_vec(),
            Some(w) => profile.iter().zip(w.iter()).map(|(&p, &s)| p * s).collect(),
        }
    }

    fn quantile_at_date(&self, st: &QuantileState, t: f64, confidence: f64) -> f64 {
        match self.grid.locate(t) {
            GridPosition::Before => st.quantile_at(0, confidence),
            GridPosition::After => st.quantile_at(self.grid.len() - 1, confidence),
            GridPosition::At(i) => st.quantile_at(i, confidence),
            GridPosition::Between { lo, hi, weight } => {
                let q_lo = st.quantile_at(lo, confidence);
                let q_hi = st.quantile_at(hi, confidence);
                q_lo * (1.0 - weight) + q_hi * weight
            }
        }
    }
}

/// Running maximum of a profile.
fn running_max(profile: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(profile.len());
    let mut max = f64::NEG_INFINITY;
    for &v in profile {
        max = max.max(v);
        out.push(max);
    }
    out
}

/// Trapezoidal time average of a profile up to `horizon`.
///
/// A single-date grid (or a grid entirely beyond the horizon) degenerates to
/// the first profile value.
fn time_average(grid: &ExposureDateGrid, profile: &[f64], horizon: f64) -> f64 {
    if grid.len() < 2 {
        return profile.first().copied().unwrap_or(0.0);
    }
    let mut integral = 0.0;
    let mut span = 0.0;
    for i in 0..grid.len() - 1 {
        let t0 = grid.date(i);
        if t0 >= horizon {
            break;
        }
        let t1 = grid.date(i + 1).min(horizon);
        let dt = t1 - t0;
        if dt > 0.0 {
            integral += 0.5 * (profile[i] + profile[i + 1]) * dt;
            span += dt;
        }
    }
    if span > 0.0 {
        integral / span
    } else {
        profile.first().copied().unwrap_or(0.0)
    }
}

/// Basel effective maturity: one plus the ratio of discounted exposure mass
/// beyond one year to effective-exposure mass within one year, clamped to
/// `[1, EFFECTIVE_MATURITY_CAP]`.
fn effective_maturity(grid: &ExposureDateGrid, profile: &[f64]) -> f64 {
    let rm = running_max(profile);
    let mut num = 0.0;
    let mut den = 0.0;
    for i in 0..grid.len() {
        let t = grid.date(i);
        let dt = grid.dt(i);
        if t <= 1.0 {
            den += rm[i] * dt;
        } else {
            num += profile[i] * dt;
        }
    }
    if den.abs() <= MASS_EPS {
        return 1.0;
    }
    (1.0 + num / den).clamp(1.0, EFFECTIVE_MATURITY_CAP)
}
