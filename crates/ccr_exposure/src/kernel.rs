//! Integration kernels: named weighting series over the exposure-date grid.
//!
//! A kernel holds per-interval probability masses (density times interval
//! width), so integrating a profile against a kernel is a plain weighted sum.
//! The engine keeps one kernel per weighting channel in a [`KernelSet`].

use ccr_core::types::ExposureDateGrid;

use crate::error::ExposureError;
use crate::measure::WeightChannel;

/// A named weighting series aligned to the exposure-date grid.
///
/// Weights are per-interval masses: for a hazard-type density `h` the weight
/// at index `i` is the probability mass accrued over the interval ending at
/// date `i`.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IntegrationKernel {
    name: String,
    weights: Vec<f64>,
}

impl IntegrationKernel {
    /// Creates a kernel from explicit weights.
    pub fn new(name: impl Into<String>, weights: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            weights,
        }
    }

    /// Default-probability masses for a flat hazard rate, scaled by LGD.
    ///
    /// Weight at index `i` is `lgd × (S(t_{i-1}) − S(t_i))` with survival
    /// `S(t) = exp(−h t)` and `t_{-1} = 0`.
    pub fn default_mass(
        grid: &ExposureDateGrid,
        hazard_rate: f64,
        lgd: f64,
        name: impl Into<String>,
    ) -> Self {
        let survival = |t: f64| (-hazard_rate * t).exp();
        let mut prev = survival(0.0);
        let weights = grid
            .dates()
            .iter()
            .map(|&t| {
                let s = survival(t);
                let mass = lgd * (prev - s);
                prev = s;
                mass
            })
            .collect();
        Self::new(name, weights)
    }

    /// Survival masses for a flat hazard rate: `S(t_i) × Δt_i`.
    pub fn survival_mass(grid: &ExposureDateGrid, hazard_rate: f64, name: impl Into<String>) -> Self {
        let weights = (0..grid.len())
            .map(|i| (-hazard_rate * grid.date(i)).exp() * grid.dt(i))
            .collect();
        Self::new(name, weights)
    }

    /// Uniform kernel ignoring default: weight is the interval width.
    pub fn uniform(grid: &ExposureDateGrid, name: impl Into<String>) -> Self {
        let weights = (0..grid.len()).map(|i| grid.dt(i)).collect();
        Self::new(name, weights)
    }

    /// Returns the kernel name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the weight series.
    #[inline]
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Returns the weight at a date index.
    #[inline]
    pub fn weight(&self, index: usize) -> f64 {
        self.weights[index]
    }

    /// Returns the number of weights.
    #[inline]
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    /// Returns whether the kernel is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Integrates a per-date profile against this kernel.
    ///
    /// Sums over the common prefix when lengths differ; validation against
    /// the grid happens once in [`KernelSet::validate`].
    pub fn integrate(&self, profile: &[f64]) -> f64 {
        self.weights
            .iter()
            .zip(profile.iter())
            .map(|(w, p)| w * p)
            .sum()
    }
}

/// The four kernels used by the engine, one per weighting channel.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KernelSet {
    /// Counterparty-default density (CVA-family integrals).
    pub cpty_default: IntegrationKernel,
    /// Own-default density (DVA-family integrals).
    pub own_default: IntegrationKernel,
    /// Joint-survival density (funding integrals).
    pub survival: IntegrationKernel,
    /// Uniform no-default density.
    pub no_default: IntegrationKernel,
}

impl KernelSet {
    /// Builds a kernel set from flat hazard rates.
    ///
    /// # Arguments
    ///
    /// * `grid` - Exposure-date grid
    /// * `cpty_hazard` / `cpty_lgd` - Counterparty hazard rate and LGD
    /// * `own_hazard` / `own_lgd` - Own hazard rate and LGD
    pub fn flat_hazard(
        grid: &ExposureDateGrid,
        cpty_hazard: f64,
        cpty_lgd: f64,
        own_hazard: f64,
        own_lgd: f64,
    ) -> Self {
        Self {
            cpty_default: IntegrationKernel::default_mass(grid, cpty_hazard, cpty_lgd, "cpty_default"),
            own_default: IntegrationKernel::default_mass(grid, own_hazard, own_lgd, "own_default"),
            survival: IntegrationKernel::survival_mass(grid, cpty_hazard + own_hazard, "survival"),
            no_default: IntegrationKernel::uniform(grid, "no_default"),
        }
    }

    /// Returns the kernel for a weighting channel.
    #[inline]
    pub fn kernel(&self, channel: WeightChannel) -> &IntegrationKernel {
        match channel {
            WeightChannel::CptyDefault => &self.cpty_default,
            WeightChannel::OwnDefault => &self.own_default,
            WeightChannel::Survival => &self.survival,
            WeightChannel::NoDefault => &self.no_default,
        }
    }

    /// Validates that every kernel has one weight per grid date.
    pub fn validate(&self, grid: &ExposureDateGrid) -> Result<(), ExposureError> {
        for k in [
            &self.cpty_default,
            &self.own_default,
            &self.survival,
            &self.no_default,
        ] {
            if k.len() != grid.len() {
                return Err(ExposureError::LengthMismatch {
                    what: "integration kernel",
                    expected: grid.len(),
                    actual: k.len(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn grid() -> ExposureDateGrid {
        ExposureDateGrid::new(vec![0.25, 0.5, 1.0, 2.0]).unwrap()
    }

    #[test]
    fn test_default_mass_sums_to_total_default_probability() {
        let g = grid();
        let h = 0.02;
        let lgd = 0.6;
        let k = IntegrationKernel::default_mass(&g, h, lgd, "cpty");

        let total: f64 = k.weights().iter().sum();
        let expected = lgd * (1.0 - (-h * 2.0_f64).exp());
        assert_relative_eq!(total, expected, epsilon = 1e-12);
    }

    #[test]
    fn test_default_mass_weights_non_negative() {
        let k = IntegrationKernel::default_mass(&grid(), 0.05, 0.4, "cpty");
        assert!(k.weights().iter().all(|&w| w >= 0.0));
    }

    #[test]
    fn test_uniform_kernel_integrates_constant() {
        let g = grid();
        let k = IntegrationKernel::uniform(&g, "no_default");
        let profile = vec![1.0; g.len()];
        // Σ Δt: 0.25 + 0.5 + 1.0 + (reused last interval) 1.0
        assert_relative_eq!(k.integrate(&profile), 2.75, epsilon = 1e-12);
    }

    #[test]
    fn test_survival_mass_decreasing_density() {
        let g = ExposureDateGrid::new(vec![1.0, 2.0, 3.0]).unwrap();
        let k = IntegrationKernel::survival_mass(&g, 0.1, "survival");
        assert!(k.weight(0) > k.weight(1));
        assert!(k.weight(1) > k.weight(2));
    }

    #[test]
    fn test_kernel_set_lookup_and_validate() {
        let g = grid();
        let ks = KernelSet::flat_hazard(&g, 0.02, 0.4, 0.01, 0.6);
        assert_eq!(ks.kernel(WeightChannel::CptyDefault).name(), "cpty_default");
        assert_eq!(ks.kernel(WeightChannel::Survival).name(), "survival");
        assert!(ks.validate(&g).is_ok());

        let other = ExposureDateGrid::new(vec![0.5, 1.0]).unwrap();
        assert!(ks.validate(&other).is_err());
    }

    #[test]
    fn test_integrate_weighted_sum() {
        let k = IntegrationKernel::new("k", vec![0.5, 0.25, 0.25]);
        assert_relative_eq!(k.integrate(&[2.0, 4.0, 8.0]), 4.0, epsilon = 1e-12);
    }
}
