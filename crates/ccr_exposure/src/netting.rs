//! Netting topology: trades, netting groups, and super-groups.
//!
//! The topology is built once from static configuration and immutable
//! thereafter. All engine hot paths address it through dense indices; the
//! string identifiers exist only at the configuration boundary.

use std::collections::HashMap;

use ccr_core::types::{NettingGroupId, SuperGroupId, TradeId};

use crate::error::ExposureError;

/// Builder for [`NettingTopology`].
///
/// # Examples
///
/// ```
/// use ccr_core::types::{NettingGroupId, SuperGroupId, TradeId};
/// use ccr_exposure::netting::NettingTopologyBuilder;
///
/// let topology = NettingTopologyBuilder::new()
///     .add_group_in_super(NettingGroupId::new("NG1"), SuperGroupId::new("MASTER"))
///     .add_group_in_super(NettingGroupId::new("NG2"), SuperGroupId::new("MASTER"))
///     .add_group(NettingGroupId::new("NG3"))
///     .add_trade(TradeId::new("T1"), NettingGroupId::new("NG1"))
///     .add_trade(TradeId::new("T2"), NettingGroupId::new("NG2"))
///     .build()
///     .unwrap();
///
/// assert_eq!(topology.n_groups(), 3);
/// // NG1 and NG2 share a super-group; NG3 stands alone.
/// assert_eq!(topology.n_super_groups(), 2);
/// assert_eq!(topology.super_of(0), topology.super_of(1));
/// ```
#[derive(Debug, Default)]
pub struct NettingTopologyBuilder {
    groups: Vec<(NettingGroupId, Option<SuperGroupId>)>,
    trades: Vec<(TradeId, NettingGroupId)>,
}

impl NettingTopologyBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a netting group without an explicit super-group.
    ///
    /// The group forms its own singleton super-group.
    pub fn add_group(mut self, group: NettingGroupId) -> Self {
        self.groups.push((group, None));
        self
    }

    /// Registers a netting group belonging to a super-group.
    pub fn add_group_in_super(mut self, group: NettingGroupId, super_group: SuperGroupId) -> Self {
        self.groups.push((group, Some(super_group)));
        self
    }

    /// Registers a trade in a netting group.
    ///
    /// Trade order defines the portfolio order used by marginal queries.
    pub fn add_trade(mut self, trade: TradeId, group: NettingGroupId) -> Self {
        self.trades.push((trade, group));
        self
    }

    /// Builds and validates the topology.
    ///
    /// # Errors
    ///
    /// - [`ExposureError::DuplicateNettingGroup`] / [`ExposureError::DuplicateTrade`]
    ///   for repeated registrations.
    /// - [`ExposureError::UnknownNettingGroup`] when a trade references a
    ///   group that was never registered.
    pub fn build(self) -> Result<NettingTopology, ExposureError> {
        let mut group_index: HashMap<NettingGroupId, usize> = HashMap::new();
        let mut group_ids = Vec::with_capacity(self.groups.len());
        let mut group_to_super = Vec::with_capacity(self.groups.len());
        let mut super_group_ids: Vec<SuperGroupId> = Vec::new();
        let mut super_index: HashMap<SuperGroupId, usize> = HashMap::new();

        for (group, super_group) in self.groups {
            if group_index.contains_key(&group) {
                return Err(ExposureError::DuplicateNettingGroup(
                    group.as_str().to_string(),
                ));
            }
            // Groups without an explicit super-group net only with themselves.
            let super_id =
                super_group.unwrap_or_else(|| SuperGroupId::new(group.as_str()));
            let sidx = *super_index.entry(super_id.clone()).or_insert_with(|| {
                super_group_ids.push(super_id.clone());
                super_group_ids.len() - 1
            });
            group_index.insert(group.clone(), group_ids.len());
            group_ids.push(group);
            group_to_super.push(sidx);
        }

        let mut trade_ids = Vec::with_capacity(self.trades.len());
        let mut trade_to_group = Vec::with_capacity(self.trades.len());
        let mut trades_by_group: Vec<Vec<usize>> = vec![Vec::new(); group_ids.len()];
        let mut seen_trades: HashMap<TradeId, ()> = HashMap::new();

        for (trade, group) in self.trades {
            if seen_trades.insert(trade.clone(), ()).is_some() {
                return Err(ExposureError::DuplicateTrade(trade.as_str().to_string()));
            }
            let gidx = *group_index.get(&group).ok_or_else(|| {
                ExposureError::UnknownNettingGroup {
                    group: group.as_str().to_string(),
                    referrer: trade.as_str().to_string(),
                }
            })?;
            trades_by_group[gidx].push(trade_ids.len());
            trade_ids.push(trade);
            trade_to_group.push(gidx);
        }

        Ok(NettingTopology {
            group_ids,
            group_index,
            super_group_ids,
            group_to_super,
            trade_ids,
            trade_to_group,
            trades_by_group,
        })
    }
}

/// Immutable netting topology with dense index addressing.
#[derive(Clone, Debug)]
pub struct NettingTopology {
    group_ids: Vec<NettingGroupId>,
    group_index: HashMap<NettingGroupId, usize>,
    super_group_ids: Vec<SuperGroupId>,
    group_to_super: Vec<usize>,
    trade_ids: Vec<TradeId>,
    trade_to_group: Vec<usize>,
    trades_by_group: Vec<Vec<usize>>,
}

impl NettingTopology {
    /// Number of netting groups.
    #[inline]
    pub fn n_groups(&self) -> usize {
        self.group_ids.len()
    }

    /// Number of super-groups.
    #[inline]
    pub fn n_super_groups(&self) -> usize {
        self.super_group_ids.len()
    }

    /// Number of trades, in portfolio order.
    #[inline]
    pub fn n_trades(&self) -> usize {
        self.trade_ids.len()
    }

    /// Resolves a group identifier to its dense index.
    #[inline]
    pub fn group_index(&self, id: &NettingGroupId) -> Option<usize> {
        self.group_index.get(id).copied()
    }

    /// Returns the super-group index of a group.
    #[inline]
    pub fn super_of(&self, group_idx: usize) -> usize {
        self.group_to_super[group_idx]
    }

    /// Returns the group index of a trade.
    #[inline]
    pub fn trade_group(&self, trade_idx: usize) -> usize {
        self.trade_to_group[trade_idx]
    }

    /// Returns the trades (by index) in a group.
    #[inline]
    pub fn trades_in_group(&self, group_idx: usize) -> &[usize] {
        &self.trades_by_group[group_idx]
    }

    /// Returns the group identifier at an index.
    #[inline]
    pub fn group_id(&self, group_idx: usize) -> &NettingGroupId {
        &self.group_ids[group_idx]
    }

    /// Returns the super-group identifier at an index.
    #[inline]
    pub fn super_group_id(&self, super_idx: usize) -> &SuperGroupId {
        &self.super_group_ids[super_idx]
    }

    /// Returns the trade identifiers in portfolio order.
    #[inline]
    pub fn trade_ids(&self) -> &[TradeId] {
        &self.trade_ids
    }

    /// Returns the trade identifier at an index.
    #[inline]
    pub fn trade_id(&self, trade_idx: usize) -> &TradeId {
        &self.trade_ids[trade_idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> NettingTopologyBuilder {
        NettingTopologyBuilder::new()
            .add_group_in_super(NettingGroupId::new("NG1"), SuperGroupId::new("SG"))
            .add_group_in_super(NettingGroupId::new("NG2"), SuperGroupId::new("SG"))
            .add_group(NettingGroupId::new("NG3"))
            .add_trade(TradeId::new("T1"), NettingGroupId::new("NG1"))
            .add_trade(TradeId::new("T2"), NettingGroupId::new("NG1"))
            .add_trade(TradeId::new("T3"), NettingGroupId::new("NG3"))
    }

    #[test]
    fn test_build_counts() {
        let t = builder().build().unwrap();
        assert_eq!(t.n_groups(), 3);
        assert_eq!(t.n_super_groups(), 2);
        assert_eq!(t.n_trades(), 3);
    }

    #[test]
    fn test_super_group_resolution() {
        let t = builder().build().unwrap();
        assert_eq!(t.super_of(0), t.super_of(1));
        assert_ne!(t.super_of(0), t.super_of(2));
        // Implicit singleton super-group carries the group's name.
        assert_eq!(t.super_group_id(t.super_of(2)).as_str(), "NG3");
    }

    #[test]
    fn test_trade_assignment() {
        let t = builder().build().unwrap();
        assert_eq!(t.trade_group(0), 0);
        assert_eq!(t.trade_group(2), 2);
        assert_eq!(t.trades_in_group(0), &[0, 1]);
        assert!(t.trades_in_group(1).is_empty());
    }

    #[test]
    fn test_unknown_group_is_fatal() {
        let result = NettingTopologyBuilder::new()
            .add_trade(TradeId::new("T1"), NettingGroupId::new("MISSING"))
            .build();
        assert!(matches!(
            result,
            Err(ExposureError::UnknownNettingGroup { .. })
        ));
    }

    #[test]
    fn test_duplicate_group_is_fatal() {
        let result = NettingTopologyBuilder::new()
            .add_group(NettingGroupId::new("NG1"))
            .add_group(NettingGroupId::new("NG1"))
            .build();
        assert!(matches!(
            result,
            Err(ExposureError::DuplicateNettingGroup(_))
        ));
    }

    #[test]
    fn test_duplicate_trade_is_fatal() {
        let result = NettingTopologyBuilder::new()
            .add_group(NettingGroupId::new("NG1"))
            .add_trade(TradeId::new("T1"), NettingGroupId::new("NG1"))
            .add_trade(TradeId::new("T1"), NettingGroupId::new("NG1"))
            .build();
        assert!(matches!(result, Err(ExposureError::DuplicateTrade(_))));
    }

    #[test]
    fn test_group_lookup() {
        let t = builder().build().unwrap();
        assert_eq!(t.group_index(&NettingGroupId::new("NG2")), Some(1));
        assert_eq!(t.group_index(&NettingGroupId::new("NGX")), None);
    }
}
