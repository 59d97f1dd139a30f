//! Numerical building blocks: interpolation, weighted quantiles, root
//! finding, and normal-distribution helpers.

mod brent;
mod distributions;
mod interp;
mod quantile;

pub use brent::{expand_bracket, BrentSolver, SolverConfig};
pub use distributions::{norm_cdf, norm_pdf};
pub use interp::interpolate_on_grid;
pub use quantile::EmpiricalCdf;
