//! # CCR Core (L1: Foundation)
//!
//! Shared foundation for the counterparty-credit-risk exposure engine.
//!
//! This crate provides:
//! - Strongly-typed identifiers for trades, netting groups, and counterparties
//! - The exposure-date grid with year-fraction addressing
//! - Linear interpolation with flat extrapolation over the grid
//! - Weighted empirical distributions for quantile (PFE) queries
//! - Brent root finding and normal-distribution helpers
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │           ccr_exposure (L4)             │
//! │  Netting, collateral, accumulation      │
//! └─────────────────────────────────────────┘
//!          ↓
//! ┌─────────────────────────────────────────┐
//! │            ccr_core (L1)                │
//! ├─────────────────────────────────────────┤
//! │  types/  - ids, ExposureDateGrid        │
//! │  math/   - interp, quantile, brent,     │
//! │            distributions                │
//! └─────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]

pub mod math;
pub mod types;

pub use math::{
    interpolate_on_grid, norm_cdf, norm_pdf, BrentSolver, EmpiricalCdf, SolverConfig,
};
pub use types::{
    CounterpartyId, ExposureDateGrid, GridError, GridPosition, InterpolationError,
    NettingGroupId, SolverError, SuperGroupId, TradeId,
};
