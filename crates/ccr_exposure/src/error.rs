//! Error types for the exposure engine.
//!
//! Configuration errors (unknown identifiers, mismatched lengths, variant
//! misuse) are fatal and surface at construction or call time. Numerical
//! edge cases are never errors: weighted averages guard their denominators
//! and return a defined zero instead.

use ccr_core::types::{GridError, InterpolationError};
use thiserror::Error;

use crate::measure::CcrMeasure;

/// Errors raised by the exposure engine.
#[derive(Debug, Error)]
pub enum ExposureError {
    /// A trade or collateral agreement references a netting group that was
    /// never registered.
    #[error("Unknown netting group '{group}' referenced by '{referrer}'")]
    UnknownNettingGroup {
        /// The unknown group identifier.
        group: String,
        /// The trade or agreement that referenced it.
        referrer: String,
    },

    /// The same netting group was registered twice.
    #[error("Duplicate netting group '{0}'")]
    DuplicateNettingGroup(String),

    /// The same trade was registered twice.
    #[error("Duplicate trade '{0}'")]
    DuplicateTrade(String),

    /// The measure is not supported by this aggregation variant.
    #[error("Measure {measure} is not supported by the {variant} aggregation variant")]
    UnsupportedMeasure {
        /// The unsupported measure.
        measure: CcrMeasure,
        /// Name of the aggregation variant that rejected it.
        variant: &'static str,
    },

    /// No accumulator was registered for this measure/confidence pair.
    #[error("Measure {measure} at confidence {confidence} has no registered accumulator")]
    MeasureNotRegistered {
        /// The queried measure.
        measure: CcrMeasure,
        /// The queried confidence level.
        confidence: f64,
    },

    /// A time-indexed measure was queried without an exposure date.
    #[error("Measure {0} is time-indexed and requires an exposure date")]
    DateRequired(CcrMeasure),

    /// Two arrays that must share a length do not.
    #[error("{what} length {actual} does not match expected {expected}")]
    LengthMismatch {
        /// What was being checked.
        what: &'static str,
        /// Expected length.
        expected: usize,
        /// Actual length.
        actual: usize,
    },

    /// Collateral terms failed validation.
    #[error("Invalid collateral terms: {0}")]
    InvalidCollateralTerms(String),

    /// Accumulation was attempted after reduction.
    #[error("Accumulator already reduced; no further accumulation is allowed")]
    AlreadyReduced,

    /// A query was made before reduction.
    #[error("Accumulator has not been reduced yet")]
    NotReduced,

    /// Marginal allocation was queried but not enabled at construction.
    #[error("Trade-level allocation was not enabled for this aggregator")]
    AllocationDisabled,

    /// An operation requires a trade valuation source.
    #[error("Trade valuations are required when {0}")]
    MissingValuations(&'static str),

    /// Prior and total portfolios disagree on shared configuration.
    #[error("Incompatible portfolios for incremental aggregation: {0}")]
    IncompatiblePortfolios(String),

    /// Exposure-date grid construction failed.
    #[error(transparent)]
    Grid(#[from] GridError),

    /// Interpolation over the grid failed.
    #[error(transparent)]
    Interpolation(#[from] InterpolationError),
}
