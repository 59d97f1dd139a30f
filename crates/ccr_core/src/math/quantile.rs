//! Weighted empirical distributions for quantile estimation.
//!
//! PFE-family measures invert a step CDF built from path-level
//! (value, weight) observations. Samples are aggregated to distinct values
//! (duplicates merge their mass) and the inverse CDF interpolates linearly
//! between bracketing points.

/// Weighted empirical cumulative distribution function.
///
/// Built once from raw samples, queried repeatedly for quantiles. Two
/// partial sample sets accumulated on different workers merge by simple
/// concatenation before the CDF is built, so parallel reduction stays
/// associative.
///
/// # Examples
///
/// ```
/// use ccr_core::math::EmpiricalCdf;
///
/// let cdf = EmpiricalCdf::from_weighted_samples(&[
///     (10.0, 1.0),
///     (20.0, 1.0),
///     (30.0, 1.0),
///     (40.0, 1.0),
/// ]);
///
/// assert!(cdf.quantile(0.99) <= 40.0);
/// assert!(cdf.quantile(0.99) > cdf.quantile(0.5));
/// ```
#[derive(Clone, Debug, Default)]
pub struct EmpiricalCdf {
    /// Distinct sample values, ascending.
    values: Vec<f64>,
    /// Cumulative mass at each value, normalized to end at 1.
    cumulative: Vec<f64>,
    /// Total (unnormalized) mass.
    total_mass: f64,
}

/// Tolerance used to merge duplicate sample values.
const VALUE_EPS: f64 = 1e-14;

impl EmpiricalCdf {
    /// Builds a CDF from weighted samples.
    ///
    /// Samples with non-positive weight are discarded; duplicate values merge
    /// their mass. An empty (or fully discarded) sample set yields a
    /// degenerate CDF whose every quantile is 0.0.
    pub fn from_weighted_samples(samples: &[(f64, f64)]) -> Self {
        Self::build(samples, None)
    }

    /// Builds a CDF padded to a target total mass.
    ///
    /// When the sample mass falls short of `target_mass` (paths that never
    /// contributed an observation), the missing mass is attributed to a
    /// zero-valued point so that the distribution normalizes fully.
    pub fn with_target_mass(samples: &[(f64, f64)], target_mass: f64) -> Self {
        Self::build(samples, Some(target_mass))
    }

    fn build(samples: &[(f64, f64)], target_mass: Option<f64>) -> Self {
        let mut points: Vec<(f64, f64)> = samples
            .iter()
            .copied()
            .filter(|&(v, w)| w > 0.0 && v.is_finite())
            .collect();

        if let Some(target) = target_mass {
            let present: f64 = points.iter().map(|&(_, w)| w).sum();
            if target > present {
                points.push((0.0, target - present));
            }
        }

        if points.is_empty() {
            return Self::default();
        }

        points.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

        let mut values: Vec<f64> = Vec::with_capacity(points.len());
        let mut masses: Vec<f64> = Vec::with_capacity(points.len());
        for (v, w) in points {
            match values.last() {
                Some(&last) if (v - last).abs() <= VALUE_EPS => {
                    *masses.last_mut().expect("non-empty masses") += w;
                }
                _ => {
                    values.push(v);
                    masses.push(w);
                }
            }
        }

        let total_mass: f64 = masses.iter().sum();
        let mut cumulative = Vec::with_capacity(masses.len());
        let mut running = 0.0;
        for m in &masses {
            running += m;
            cumulative.push(running / total_mass);
        }
        // Guard against round-off on the final point.
        if let Some(last) = cumulative.last_mut() {
            *last = 1.0;
        }

        Self {
            values,
            cumulative,
            total_mass,
        }
    }

    /// Returns the number of distinct support points.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns whether the distribution has no support points.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the total (unnormalized) sample mass.
    #[inline]
    pub fn total_mass(&self) -> f64 {
        self.total_mass
    }

    /// Inverts the CDF at the given confidence level.
    ///
    /// Linear interpolation between bracketing CDF points; confidence levels
    /// at or below the first point's mass return the first value, at or
    /// above 1 return the last. An empty distribution returns 0.0.
    pub fn quantile(&self, confidence: f64) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let ci = confidence.clamp(0.0, 1.0);
        if ci <= self.cumulative[0] {
            return self.values[0];
        }
        let n = self.values.len();
        if ci >= self.cumulative[n - 1] {
            return self.values[n - 1];
        }
        let hi = self.cumulative.partition_point(|&c| c < ci);
        let lo = hi - 1;
        let span = self.cumulative[hi] - self.cumulative[lo];
        if span <= f64::EPSILON {
            return self.values[hi];
        }
        let w = (ci - self.cumulative[lo]) / span;
        self.values[lo] * (1.0 - w) + self.values[hi] * w
    }
}
