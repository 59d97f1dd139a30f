//! Error types for the foundation layer.

use thiserror::Error;

/// Errors raised while constructing or addressing an exposure-date grid.
#[derive(Debug, Error, PartialEq)]
pub enum GridError {
    /// The grid contains no dates.
    #[error("Exposure-date grid is empty")]
    Empty,

    /// Dates are not strictly increasing at the given index.
    #[error("Exposure dates must be strictly increasing (violation at index {index})")]
    NotIncreasing {
        /// Index of the first offending date.
        index: usize,
    },

    /// A date is NaN or infinite.
    #[error("Exposure date at index {index} is not finite")]
    NonFinite {
        /// Index of the offending date.
        index: usize,
    },
}

/// Errors raised by interpolation routines.
#[derive(Debug, Error, PartialEq)]
pub enum InterpolationError {
    /// Profile length does not match the grid length.
    #[error("Profile length {actual} does not match grid length {expected}")]
    LengthMismatch {
        /// Expected number of points (grid length).
        expected: usize,
        /// Actual number of points supplied.
        actual: usize,
    },
}

/// Errors raised by root-finding solvers.
#[derive(Debug, Error, PartialEq)]
pub enum SolverError {
    /// The supplied endpoints do not bracket a root.
    #[error("No root bracket: f({a}) and f({b}) have the same sign")]
    NoBracket {
        /// Left bracket endpoint.
        a: f64,
        /// Right bracket endpoint.
        b: f64,
    },

    /// The solver failed to converge within the iteration budget.
    #[error("Root finding did not converge within {iterations} iterations")]
    MaxIterationsExceeded {
        /// Iteration budget that was exhausted.
        iterations: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_error_display() {
        let err = GridError::NotIncreasing { index: 3 };
        assert_eq!(
            format!("{}", err),
            "Exposure dates must be strictly increasing (violation at index 3)"
        );
    }

    #[test]
    fn test_solver_error_display() {
        let err = SolverError::NoBracket { a: 0.0, b: 2.0 };
        assert!(format!("{}", err).contains("same sign"));
    }
}
