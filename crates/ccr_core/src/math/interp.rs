//! Linear interpolation over the exposure-date grid.
//!
//! The engine's time-indexed queries share one convention: flat
//! extrapolation beyond the grid, linear interpolation by year-fraction
//! weight inside it.

use crate::types::{ExposureDateGrid, GridPosition, InterpolationError};

/// Interpolates a per-date profile at an arbitrary time point.
///
/// # Arguments
///
/// * `grid` - Exposure-date grid the profile is laid out against
/// * `values` - One value per grid date
/// * `t` - Query time in year fractions
///
/// # Errors
///
/// Returns [`InterpolationError::LengthMismatch`] when the profile does not
/// have one entry per grid date.
///
/// # Examples
///
/// ```
/// use ccr_core::types::ExposureDateGrid;
/// use ccr_core::math::interpolate_on_grid;
///
/// let grid = ExposureDateGrid::new(vec![0.0, 1.0, 2.0]).unwrap();
/// let ee = vec![0.0, 10.0, 4.0];
///
/// assert_eq!(interpolate_on_grid(&grid, &ee, 0.5).unwrap(), 5.0);
/// // Flat extrapolation beyond the last date.
/// assert_eq!(interpolate_on_grid(&grid, &ee, 5.0).unwrap(), 4.0);
/// ```
pub fn interpolate_on_grid(
    grid: &ExposureDateGrid,
    values: &[f64],
    t: f64,
) -> Result<f64, InterpolationError> {
    if values.len() != grid.len() {
        return Err(InterpolationError::LengthMismatch {
            expected: grid.len(),
            actual: values.len(),
        });
    }
    let v = match grid.locate(t) {
        GridPosition::Before => values[0],
        GridPosition::After => values[values.len() - 1],
        GridPosition::At(i) => values[i],
        GridPosition::Between { lo, hi, weight } => {
            values[lo] * (1.0 - weight) + values[hi] * weight
        }
    };
    Ok(v)
}
