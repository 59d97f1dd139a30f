//! Core types: identifiers, the exposure-date grid, and error taxonomy.

mod error;
mod ids;
mod time;

pub use error::{GridError, InterpolationError, SolverError};
pub use ids::{CounterpartyId, NettingGroupId, SuperGroupId, TradeId};
pub use time::{ExposureDateGrid, GridPosition};
