//! The exposure-date grid.
//!
//! All time-indexed quantities in the engine are addressed by index into a
//! single shared grid of year fractions. The grid is validated once at
//! construction and immutable thereafter.

use super::error::GridError;

/// Position of an arbitrary time point relative to the grid.
///
/// Produced by [`ExposureDateGrid::locate`] and consumed by every
/// time-indexed query: flat extrapolation outside the grid, linear
/// interpolation by year-fraction weight inside.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GridPosition {
    /// The point precedes the first exposure date.
    Before,
    /// The point coincides with the grid date at this index.
    At(usize),
    /// The point falls strictly between two adjacent grid dates.
    Between {
        /// Index of the earlier bracketing date.
        lo: usize,
        /// Index of the later bracketing date.
        hi: usize,
        /// Year-fraction weight of the later date, in (0, 1).
        weight: f64,
    },
    /// The point follows the last exposure date.
    After,
}

/// Ordered, strictly increasing grid of exposure dates (year fractions).
///
/// The grid index is the primary addressing key throughout the exposure
/// engine: path channels, accumulation buffers, and integration kernels are
/// all laid out against it.
///
/// # Examples
///
/// ```
/// use ccr_core::types::{ExposureDateGrid, GridPosition};
///
/// let grid = ExposureDateGrid::new(vec![0.0, 0.25, 0.5, 1.0]).unwrap();
///
/// assert_eq!(grid.len(), 4);
/// assert_eq!(grid.locate(0.25), GridPosition::At(1));
/// ```
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExposureDateGrid {
    dates: Vec<f64>,
}

/// Tolerance for treating a time point as coinciding with a grid date.
const DATE_EPS: f64 = 1e-12;

impl ExposureDateGrid {
    /// Creates a grid from year fractions.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::Empty`] for an empty vector,
    /// [`GridError::NonFinite`] if any date is NaN or infinite, and
    /// [`GridError::NotIncreasing`] if dates are not strictly increasing.
    pub fn new(dates: Vec<f64>) -> Result<Self, GridError> {
        if dates.is_empty() {
            return Err(GridError::Empty);
        }
        for (i, &d) in dates.iter().enumerate() {
            if !d.is_finite() {
                return Err(GridError::NonFinite { index: i });
            }
        }
        for i in 1..dates.len() {
            if dates[i] <= dates[i - 1] {
                return Err(GridError::NotIncreasing { index: i });
            }
        }
        Ok(Self { dates })
    }

    /// Returns the number of exposure dates.
    #[inline]
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    /// Returns whether the grid is empty. Always `false` for a constructed grid.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Returns the date at the given index.
    #[inline]
    pub fn date(&self, index: usize) -> f64 {
        self.dates[index]
    }

    /// Returns the full date vector.
    #[inline]
    pub fn dates(&self) -> &[f64] {
        &self.dates
    }

    /// Returns the first exposure date.
    #[inline]
    pub fn first(&self) -> f64 {
        self.dates[0]
    }

    /// Returns the last exposure date.
    #[inline]
    pub fn last(&self) -> f64 {
        self.dates[self.dates.len() - 1]
    }

    /// Returns the interval width `date(i + 1) - date(i)`.
    ///
    /// For the final index the preceding interval width is returned, so that
    /// every date carries a usable integration step.
    #[inline]
    pub fn dt(&self, index: usize) -> f64 {
        if index + 1 < self.dates.len() {
            self.dates[index + 1] - self.dates[index]
        } else if self.dates.len() > 1 {
            self.dates[index] - self.dates[index - 1]
        } else {
            0.0
        }
    }

    /// Locates a time point relative to the grid.
    ///
    /// Exact matches (within a fixed tolerance) report [`GridPosition::At`];
    /// interior points report the bracketing indices with the year-fraction
    /// weight of the later date.
    pub fn locate(&self, t: f64) -> GridPosition {
        let n = self.dates.len();
        if t < self.dates[0] - DATE_EPS {
            return GridPosition::Before;
        }
        if t > self.dates[n - 1] + DATE_EPS {
            return GridPosition::After;
        }
        // Binary search for the insertion point.
        let idx = self
            .dates
            .partition_point(|&d| d < t - DATE_EPS)
            .min(n - 1);
        if (self.dates[idx] - t).abs() <= DATE_EPS {
            return GridPosition::At(idx);
        }
        let lo = idx - 1;
        let weight = (t - self.dates[lo]) / (self.dates[idx] - self.dates[lo]);
        GridPosition::Between {
            lo,
            hi: idx,
            weight,
        }
    }
}
