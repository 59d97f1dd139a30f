//! Per-path storage of simulated market channels.
//!
//! A [`PathRecord`] holds, per exposure date, the netted valuation per
//! netting group plus the discount, numeraire, Radon-Nikodym, and spread
//! channels produced by the market simulator. Records are built
//! incrementally date-by-date during simulation and are read-only once
//! handed to the engine.

use std::sync::Arc;

use crate::measure::{SpreadChannel, WeightChannel};

/// Channels recorded for one path at one exposure date.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PathChannels {
    /// Netted mark-to-market per netting group, indexed by group.
    pub net_group_values: Vec<f64>,
    /// Risk-free discount factor to this date.
    pub discount_factor: f64,
    /// Numeraire value on this path at this date.
    pub numeraire: f64,
    /// Radon-Nikodym density conditioning on counterparty default.
    pub cpty_default_weight: f64,
    /// Radon-Nikodym density conditioning on own default.
    pub own_default_weight: f64,
    /// Radon-Nikodym density conditioning on joint survival.
    pub survival_weight: f64,
    /// Counterparty credit spread.
    pub cpty_spread: f64,
    /// Own credit spread.
    pub own_spread: f64,
    /// Funding lend spread.
    pub lend_spread: f64,
    /// Funding borrow spread.
    pub borrow_spread: f64,
}

impl Default for PathChannels {
    fn default() -> Self {
        Self {
            net_group_values: Vec::new(),
            discount_factor: 1.0,
            numeraire: 1.0,
            cpty_default_weight: 1.0,
            own_default_weight: 1.0,
            survival_weight: 1.0,
            cpty_spread: 0.0,
            own_spread: 0.0,
            lend_spread: 0.0,
            borrow_spread: 0.0,
        }
    }
}

impl PathChannels {
    /// Channels with unit discount/densities and the given group values.
    ///
    /// Convenient for deterministic replays and tests.
    pub fn riskless(net_group_values: Vec<f64>) -> Self {
        Self {
            net_group_values,
            ..Self::default()
        }
    }
}

/// One simulated path across all exposure dates.
///
/// # Examples
///
/// ```
/// use ccr_exposure::path::{PathChannels, PathRecord};
///
/// let mut path = PathRecord::new(0, 1.0);
/// path.push_date(PathChannels::riskless(vec![60.0]));
/// path.push_date(PathChannels::riskless(vec![45.0]));
///
/// assert_eq!(path.n_dates(), 2);
/// assert_eq!(path.net_group_value(1, 0), 45.0);
/// // Groups beyond the recorded vector contribute zero.
/// assert_eq!(path.net_group_value(1, 7), 0.0);
/// ```
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PathRecord {
    path_id: usize,
    path_weight: f64,
    channels: Vec<PathChannels>,
}

impl PathRecord {
    /// Creates an empty record for the given path.
    pub fn new(path_id: usize, path_weight: f64) -> Self {
        Self {
            path_id,
            path_weight,
            channels: Vec::new(),
        }
    }

    /// Appends the channels for the next exposure date.
    pub fn push_date(&mut self, channels: PathChannels) {
        self.channels.push(channels);
    }

    /// Returns the path identifier.
    #[inline]
    pub fn path_id(&self) -> usize {
        self.path_id
    }

    /// Returns the path weight.
    #[inline]
    pub fn path_weight(&self) -> f64 {
        self.path_weight
    }

    /// Returns the number of populated dates.
    #[inline]
    pub fn n_dates(&self) -> usize {
        self.channels.len()
    }

    /// Returns the channels at a date index.
    #[inline]
    pub fn channels(&self, date_idx: usize) -> &PathChannels {
        &self.channels[date_idx]
    }

    /// Returns the netted value of a group at a date.
    ///
    /// Group indices beyond the recorded vector contribute zero.
    #[inline]
    pub fn net_group_value(&self, date_idx: usize, group_idx: usize) -> f64 {
        self.channels[date_idx]
            .net_group_values
            .get(group_idx)
            .copied()
            .unwrap_or(0.0)
    }

    /// Returns the discount factor at a date.
    #[inline]
    pub fn discount_factor(&self, date_idx: usize) -> f64 {
        self.channels[date_idx].discount_factor
    }

    /// Returns the Radon-Nikodym density for a weighting channel at a date.
    ///
    /// The no-default channel is identically one.
    #[inline]
    pub fn weight_for(&self, channel: WeightChannel, date_idx: usize) -> f64 {
        let c = &self.channels[date_idx];
        match channel {
            WeightChannel::CptyDefault => c.cpty_default_weight,
            WeightChannel::OwnDefault => c.own_default_weight,
            WeightChannel::Survival => c.survival_weight,
            WeightChannel::NoDefault => 1.0,
        }
    }

    /// Returns a spread channel at a date.
    #[inline]
    pub fn spread_for(&self, spread: SpreadChannel, date_idx: usize) -> f64 {
        let c = &self.channels[date_idx];
        match spread {
            SpreadChannel::Cpty => c.cpty_spread,
            SpreadChannel::Own => c.own_spread,
            SpreadChannel::Borrow => c.borrow_spread,
            SpreadChannel::Lend => c.lend_spread,
        }
    }
}

/// Supplier of simulated paths.
///
/// Implementations may replay precomputed arrays or drive a live simulator.
/// Returning `None` means the simulation failed for that path; the engine
/// skips that unit of work only.
pub trait PathSource: Send + Sync {
    /// Number of paths available.
    fn n_paths(&self) -> usize;

    /// Fetches the record for a path, or `None` when the simulator produced
    /// no path for this index.
    fn path(&self, path_id: usize) -> Option<Arc<PathRecord>>;
}

/// Path source over precomputed records.
#[derive(Clone, Debug, Default)]
pub struct InMemoryPathSource {
    paths: Vec<Arc<PathRecord>>,
}

impl InMemoryPathSource {
    /// Wraps precomputed records.
    pub fn new(records: Vec<PathRecord>) -> Self {
        Self {
            paths: records.into_iter().map(Arc::new).collect(),
        }
    }
}

impl PathSource for InMemoryPathSource {
    fn n_paths(&self) -> usize {
        self.paths.len()
    }

    fn path(&self, path_id: usize) -> Option<Arc<PathRecord>> {
        self.paths.get(path_id).cloned()
    }
}
