//! Collateral terms and the pathwise collateral engine.
//!
//! The engine turns per-group netted values at one (path, date) into
//! collateralized risky-party exposure: it evaluates each group's collateral
//! strategy at the margin-period-of-risk-lagged posting date, clamps
//! overcollateralization, nets groups into super-groups, and applies the
//! sign-dependent exposure functions.

use std::collections::HashMap;
use std::sync::Arc;

use ccr_core::types::{ExposureDateGrid, GridPosition, NettingGroupId};
use tracing::trace;

use crate::error::ExposureError;
use crate::netting::NettingTopology;
use crate::path::PathRecord;

/// Tolerance below which a netted value is treated as zero for allocation.
const ALLOC_EPS: f64 = 1e-12;

/// Pluggable per-group collateral strategy.
///
/// Sign convention: positive values mean the booking entity is owed / holds
/// collateral; negative values mean the booking entity has posted.
pub trait CollateralTerms: Send + Sync {
    /// Variation margin given the (possibly lagged) group mark-to-market,
    /// the relevant credit spread, and the posting date.
    fn variation_margin(&self, mtm: f64, spread: f64, posting_date: f64) -> f64;

    /// Independent amount given the group mark-to-market and the variation
    /// margin already computed for the same call.
    fn independent_amount(&self, mtm: f64, variation_margin: f64) -> f64;

    /// Margin period of risk in year fractions. Zero means collateral is
    /// evaluated at the exposure date itself.
    fn margin_period_of_risk(&self) -> f64;

    /// Whether received variation margin may be re-hypothecated and so
    /// offsets funding exposure.
    fn reuse_permitted(&self) -> bool {
        true
    }

    /// Whether the independent amount is held in a segregated account and
    /// so cannot offset funding exposure.
    fn independent_amount_segregated(&self) -> bool {
        false
    }
}

/// Standard Credit Support Annex terms.
///
/// Threshold and minimum-transfer-amount variation margin plus a static
/// independent amount posted by whichever party is out of the money.
///
/// # Examples
///
/// ```
/// use ccr_exposure::collateral::{CollateralTerms, CsaTerms};
///
/// let csa = CsaTerms::new(50.0, 10.0, 0.0, CsaTerms::bilateral_mpor()).unwrap();
///
/// // Exposure below the threshold: nothing moves.
/// assert_eq!(csa.variation_margin(40.0, 0.0, 1.0), 0.0);
/// // Above the threshold the excess is collateralised.
/// assert_eq!(csa.variation_margin(80.0, 0.0, 1.0), 30.0);
/// ```
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CsaTerms {
    threshold: f64,
    mta: f64,
    independent_amount: f64,
    mpor: f64,
    reuse_permitted: bool,
    ia_segregated: bool,
}

impl CsaTerms {
    /// Standard bilateral margin period of risk (10 business days).
    #[inline]
    pub fn bilateral_mpor() -> f64 {
        10.0 / 252.0
    }

    /// Standard cleared margin period of risk (5 business days).
    #[inline]
    pub fn cleared_mpor() -> f64 {
        5.0 / 252.0
    }

    /// Creates CSA terms.
    ///
    /// # Errors
    ///
    /// Returns [`ExposureError::InvalidCollateralTerms`] when the threshold,
    /// minimum transfer amount, or independent amount is negative, or the
    /// margin period of risk is negative.
    pub fn new(
        threshold: f64,
        mta: f64,
        independent_amount: f64,
        mpor: f64,
    ) -> Result<Self, ExposureError> {
        if threshold < 0.0 {
            return Err(ExposureError::InvalidCollateralTerms(
                "threshold must be non-negative".to_string(),
            ));
        }
        if mta < 0.0 {
            return Err(ExposureError::InvalidCollateralTerms(
                "minimum transfer amount must be non-negative".to_string(),
            ));
        }
        if independent_amount < 0.0 {
            return Err(ExposureError::InvalidCollateralTerms(
                "independent amount must be non-negative".to_string(),
            ));
        }
        if mpor < 0.0 {
            return Err(ExposureError::InvalidCollateralTerms(
                "margin period of risk must be non-negative".to_string(),
            ));
        }
        Ok(Self {
            threshold,
            mta,
            independent_amount,
            mpor,
            reuse_permitted: true,
            ia_segregated: false,
        })
    }

    /// Fully collateralised terms: zero threshold, zero MTA, zero IA.
    pub fn zero_threshold(mpor: f64) -> Result<Self, ExposureError> {
        Self::new(0.0, 0.0, 0.0, mpor)
    }

    /// Sets whether received variation margin may be re-hypothecated.
    pub fn with_reuse_permitted(mut self, permitted: bool) -> Self {
        self.reuse_permitted = permitted;
        self
    }

    /// Sets whether the independent amount is segregated.
    pub fn with_segregated_ia(mut self, segregated: bool) -> Self {
        self.ia_segregated = segregated;
        self
    }

    /// Returns the threshold.
    #[inline]
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Returns the minimum transfer amount.
    #[inline]
    pub fn mta(&self) -> f64 {
        self.mta
    }

    /// Returns the static independent amount.
    #[inline]
    pub fn independent_amount_value(&self) -> f64 {
        self.independent_amount
    }
}

impl CollateralTerms for CsaTerms {
    fn variation_margin(&self, mtm: f64, _spread: f64, _posting_date: f64) -> f64 {
        let target = if mtm > self.threshold {
            mtm - self.threshold
        } else if mtm < -self.threshold {
            mtm + self.threshold
        } else {
            0.0
        };
        if target.abs() < self.mta {
            0.0
        } else {
            target
        }
    }

    fn independent_amount(&self, mtm: f64, _variation_margin: f64) -> f64 {
        if mtm == 0.0 {
            0.0
        } else {
            self.independent_amount.copysign(mtm)
        }
    }

    fn margin_period_of_risk(&self) -> f64 {
        self.mpor
    }

    fn reuse_permitted(&self) -> bool {
        self.reuse_permitted
    }

    fn independent_amount_segregated(&self) -> bool {
        self.ia_segregated
    }
}

/// Collateralized exposure at one (path, date).
///
/// All exposure fields are sums over super-groups of the risky-party
/// exposure function applied to the netted value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DateExposure {
    /// Collateralized counterparty-risk exposure.
    pub positive: f64,
    /// Collateralized booking-entity-risk exposure.
    pub negative: f64,
    /// Uncollateralized counterparty-risk exposure.
    pub uncollateralized_positive: f64,
    /// Uncollateralized booking-entity-risk exposure.
    pub uncollateralized_negative: f64,
    /// Counterparty-risk exposure net of reusable collateral only.
    pub funding_positive: f64,
    /// Booking-entity-risk exposure net of reusable collateral only.
    pub funding_negative: f64,
    /// Total collateral held by the booking entity.
    pub received_collateral: f64,
    /// Total collateral posted by the booking entity.
    pub posted_collateral: f64,
    /// Collateralized value allocated to each trade (portfolio order).
    /// Empty when allocation was not requested.
    pub trade_values: Vec<f64>,
}

impl DateExposure {
    /// Exposure reduction achieved by collateral across both sign
    /// conventions.
    pub fn collateral_benefit(&self) -> f64 {
        (self.uncollateralized_positive - self.positive)
            + (self.uncollateralized_negative - self.negative)
    }

    /// Funding exposure in excess of the collateralized positive exposure.
    #[inline]
    pub fn funding_positive_delta(&self) -> f64 {
        self.funding_positive - self.positive
    }

    /// Funding exposure in excess of the collateralized negative exposure.
    #[inline]
    pub fn funding_negative_delta(&self) -> f64 {
        self.funding_negative - self.negative
    }
}

/// Pathwise collateral engine.
///
/// Holds the immutable topology, the per-group collateral strategies, and
/// the exposure-date grid; [`CollateralEngine::collateralize`] is pure and
/// safe to call from parallel workers.
#[derive(Clone)]
pub struct CollateralEngine {
    grid: Arc<ExposureDateGrid>,
    topology: Arc<NettingTopology>,
    agreements: Vec<Option<Arc<dyn CollateralTerms>>>,
    model_overcollateralization: bool,
}

impl CollateralEngine {
    /// Creates an engine.
    ///
    /// # Errors
    ///
    /// Returns [`ExposureError::UnknownNettingGroup`] when an agreement
    /// references a group missing from the topology.
    pub fn new(
        grid: Arc<ExposureDateGrid>,
        topology: Arc<NettingTopology>,
        agreements: HashMap<NettingGroupId, Arc<dyn CollateralTerms>>,
        model_overcollateralization: bool,
    ) -> Result<Self, ExposureError> {
        let mut by_group: Vec<Option<Arc<dyn CollateralTerms>>> =
            vec![None; topology.n_groups()];
        for (group_id, terms) in agreements {
            let gidx = topology.group_index(&group_id).ok_or_else(|| {
                ExposureError::UnknownNettingGroup {
                    group: group_id.as_str().to_string(),
                    referrer: "collateral agreement".to_string(),
                }
            })?;
            by_group[gidx] = Some(terms);
        }
        Ok(Self {
            grid,
            topology,
            agreements: by_group,
            model_overcollateralization,
        })
    }

    /// Returns the netting topology.
    #[inline]
    pub fn topology(&self) -> &NettingTopology {
        &self.topology
    }

    /// Returns whether any group carries a collateral agreement.
    pub fn is_collateralised(&self) -> bool {
        self.agreements.iter().any(|a| a.is_some())
    }

    /// Group mark-to-market and spread at the MPoR-lagged posting date.
    ///
    /// Before the first grid date the first date's channels apply; on-grid
    /// dates are used directly; interior dates interpolate mtm and spread by
    /// year-fraction weight. The spread is the counterparty spread when the
    /// counterparty posts and the own spread otherwise.
    fn lagged_state(
        &self,
        path: &PathRecord,
        date_idx: usize,
        group_idx: usize,
        cpty_posts: bool,
        mpor: f64,
    ) -> (f64, f64, f64) {
        let spread_at = |idx: usize| {
            let c = path.channels(idx);
            if cpty_posts {
                c.cpty_spread
            } else {
                c.own_spread
            }
        };
        let t = self.grid.date(date_idx);
        if mpor <= 0.0 {
            return (
                path.net_group_value(date_idx, group_idx),
                spread_at(date_idx),
                t,
            );
        }
        let posting_date = t - mpor;
        match self.grid.locate(posting_date) {
            GridPosition::Before => (
                path.net_group_value(0, group_idx),
                spread_at(0),
                posting_date,
            ),
            GridPosition::At(i) => (
                path.net_group_value(i, group_idx),
                spread_at(i),
                posting_date,
            ),
            GridPosition::Between { lo, hi, weight } => {
                let mtm = path.net_group_value(lo, group_idx) * (1.0 - weight)
                    + path.net_group_value(hi, group_idx) * weight;
                let spread = spread_at(lo) * (1.0 - weight) + spread_at(hi) * weight;
                (mtm, spread, posting_date)
            }
            // Unreachable for a positive MPoR; fall back to the current date.
            GridPosition::After => (
                path.net_group_value(date_idx, group_idx),
                spread_at(date_idx),
                posting_date,
            ),
        }
    }

    /// Collateral held against one group at one (path, date).
    ///
    /// Returns `(total, reusable)` collateral under the engine's sign
    /// convention.
    fn group_collateral(
        &self,
        path: &PathRecord,
        date_idx: usize,
        group_idx: usize,
        mtm: f64,
    ) -> (f64, f64) {
        let Some(terms) = &self.agreements[group_idx] else {
            return (0.0, 0.0);
        };
        // Whoever is out of the money posts; flat positions post nothing
        // unless overcollateralization is being modelled.
        if mtm == 0.0 && !self.model_overcollateralization {
            return (0.0, 0.0);
        }

        let (post_mtm, post_spread, post_date) = self.lagged_state(
            path,
            date_idx,
            group_idx,
            mtm > 0.0,
            terms.margin_period_of_risk(),
        );
        let mut vm = terms.variation_margin(post_mtm, post_spread, post_date);
        let ia = terms.independent_amount(post_mtm, vm);
        let mut total = ia + vm;

        // Zero total collateral is "no posting"; skip the sign checks.
        if total != 0.0 && !self.model_overcollateralization {
            let sign_flip = total.signum() != mtm.signum();
            let overshoot = total.abs() > mtm.abs();
            if sign_flip || overshoot {
                trace!(
                    group = self.topology.group_id(group_idx).as_str(),
                    mtm,
                    collateral = total,
                    "clamping overcollateralized variation margin"
                );
                vm = mtm - ia;
                total = ia + vm;
            }
        }

        let reusable = if terms.reuse_permitted() { vm } else { 0.0 }
            + if terms.independent_amount_segregated() {
                0.0
            } else {
                ia
            };
        (total, reusable)
    }

    /// Computes collateralized exposure at one (path, date).
    ///
    /// `trade_values` — undiscounted per-trade mark-to-markets in portfolio
    /// order — enables per-trade allocation of the collateralized value;
    /// pass `None` when allocation is not needed.
    pub fn collateralize(
        &self,
        path: &PathRecord,
        date_idx: usize,
        trade_values: Option<&[f64]>,
    ) -> DateExposure {
        let n_groups = self.topology.n_groups();
        let n_supers = self.topology.n_super_groups();

        let mut group_mtm = vec![0.0; n_groups];
        let mut group_coll = vec![0.0; n_groups];
        let mut sup_mtm = vec![0.0; n_supers];
        let mut sup_coll = vec![0.0; n_supers];
        let mut sup_reusable = vec![0.0; n_supers];

        let mut out = DateExposure::default();

        for g in 0..n_groups {
            let mtm = path.net_group_value(date_idx, g);
            let (total, reusable) = self.group_collateral(path, date_idx, g, mtm);
            group_mtm[g] = mtm;
            group_coll[g] = total;
            if total > 0.0 {
                out.received_collateral += total;
            } else {
                out.posted_collateral += -total;
            }
            let s = self.topology.super_of(g);
            sup_mtm[s] += mtm;
            sup_coll[s] += total;
            sup_reusable[s] += reusable;
        }

        for s in 0..n_supers {
            let net = sup_mtm[s] - sup_coll[s];
            out.positive += net.max(0.0);
            out.negative += (-net).max(0.0);
            out.uncollateralized_positive += sup_mtm[s].max(0.0);
            out.uncollateralized_negative += (-sup_mtm[s]).max(0.0);
            let funding_net = sup_mtm[s] - sup_reusable[s];
            out.funding_positive += funding_net.max(0.0);
            out.funding_negative += (-funding_net).max(0.0);
        }

        if let Some(values) = trade_values {
            let mut alloc = vec![0.0; self.topology.n_trades()];
            for g in 0..n_groups {
                let s = self.topology.super_of(g);
                let sup_net = sup_mtm[s] - sup_coll[s];
                // A flat super-group allocates nothing to any of its trades.
                if sup_net.abs() <= ALLOC_EPS {
                    continue;
                }
                if group_mtm[g].abs() <= ALLOC_EPS {
                    continue;
                }
                let net_group = group_mtm[g] - group_coll[g];
                for &tr in self.topology.trades_in_group(g) {
                    alloc[tr] = net_group * values[tr] / group_mtm[g];
                }
            }
            out.trade_values = alloc;
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netting::NettingTopologyBuilder;
    use crate::path::{PathChannels, PathRecord};
    use approx::assert_relative_eq;
    use ccr_core::types::{SuperGroupId, TradeId};

    fn grid() -> Arc<ExposureDateGrid> {
        Arc::new(ExposureDateGrid::new(vec![0.1, 0.5, 1.0]).unwrap())
    }

    fn one_group_topology() -> Arc<NettingTopology> {
        Arc::new(
            NettingTopologyBuilder::new()
                .add_group(NettingGroupId::new("NG1"))
                .add_trade(TradeId::new("T1"), NettingGroupId::new("NG1"))
                .add_trade(TradeId::new("T2"), NettingGroupId::new("NG1"))
                .build()
                .unwrap(),
        )
    }

    fn engine_with(
        terms: Option<CsaTerms>,
        model_overcollateralization: bool,
    ) -> CollateralEngine {
        let mut agreements: HashMap<NettingGroupId, Arc<dyn CollateralTerms>> = HashMap::new();
        if let Some(t) = terms {
            agreements.insert(NettingGroupId::new("NG1"), Arc::new(t));
        }
        CollateralEngine::new(
            grid(),
            one_group_topology(),
            agreements,
            model_overcollateralization,
        )
        .unwrap()
    }

    fn path_with_values(values: Vec<Vec<f64>>) -> PathRecord {
        let mut p = PathRecord::new(0, 1.0);
        for v in values {
            p.push_date(PathChannels::riskless(v));
        }
        p
    }

    #[test]
    fn test_uncollateralized_exposure() {
        let engine = engine_with(None, false);
        let path = path_with_values(vec![vec![60.0], vec![-25.0], vec![0.0]]);

        let e0 = engine.collateralize(&path, 0, None);
        assert_relative_eq!(e0.positive, 60.0, epsilon = 1e-12);
        assert_relative_eq!(e0.negative, 0.0, epsilon = 1e-12);

        let e1 = engine.collateralize(&path, 1, None);
        assert_relative_eq!(e1.positive, 0.0, epsilon = 1e-12);
        assert_relative_eq!(e1.negative, 25.0, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_threshold_csa_removes_exposure() {
        let engine = engine_with(Some(CsaTerms::zero_threshold(0.0).unwrap()), false);
        let path = path_with_values(vec![vec![60.0], vec![-25.0], vec![10.0]]);

        let e = engine.collateralize(&path, 0, None);
        assert_relative_eq!(e.positive, 0.0, epsilon = 1e-12);
        assert_relative_eq!(e.uncollateralized_positive, 60.0, epsilon = 1e-12);
        assert_relative_eq!(e.received_collateral, 60.0, epsilon = 1e-12);
        assert_relative_eq!(e.collateral_benefit(), 60.0, epsilon = 1e-12);
    }

    #[test]
    fn test_threshold_leaves_residual_exposure() {
        let csa = CsaTerms::new(40.0, 0.0, 0.0, 0.0).unwrap();
        let engine = engine_with(Some(csa), false);
        let path = path_with_values(vec![vec![100.0]]);

        let e = engine.collateralize(&path, 0, None);
        // VM = 100 - 40 = 60, residual exposure 40.
        assert_relative_eq!(e.positive, 40.0, epsilon = 1e-12);
        assert_relative_eq!(e.received_collateral, 60.0, epsilon = 1e-12);
    }

    #[test]
    fn test_mta_suppresses_small_transfers() {
        let csa = CsaTerms::new(0.0, 20.0, 0.0, 0.0).unwrap();
        let engine = engine_with(Some(csa), false);
        let path = path_with_values(vec![vec![15.0]]);

        let e = engine.collateralize(&path, 0, None);
        assert_relative_eq!(e.positive, 15.0, epsilon = 1e-12);
        assert_relative_eq!(e.received_collateral, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_booking_entity_posts_when_out_of_the_money() {
        let engine = engine_with(Some(CsaTerms::zero_threshold(0.0).unwrap()), false);
        let path = path_with_values(vec![vec![-80.0]]);

        let e = engine.collateralize(&path, 0, None);
        assert_relative_eq!(e.negative, 0.0, epsilon = 1e-12);
        assert_relative_eq!(e.uncollateralized_negative, 80.0, epsilon = 1e-12);
        assert_relative_eq!(e.posted_collateral, 80.0, epsilon = 1e-12);
    }

    #[test]
    fn test_mpor_lag_uses_earlier_mtm() {
        // Posting date 1.0 - 0.5 = 0.5 is exactly on the grid: VM posts
        // against the date-1 value 40 while the exposure date carries 100.
        let csa = CsaTerms::new(0.0, 0.0, 0.0, 0.5).unwrap();
        let engine = engine_with(Some(csa), false);
        let path = path_with_values(vec![vec![10.0], vec![40.0], vec![100.0]]);

        let e = engine.collateralize(&path, 2, None);
        assert_relative_eq!(e.received_collateral, 40.0, epsilon = 1e-12);
        assert_relative_eq!(e.positive, 60.0, epsilon = 1e-12);
    }

    #[test]
    fn test_mpor_lag_interpolates_between_dates() {
        // Posting date 1.0 - 0.25 = 0.75, midway between 0.5 and 1.0:
        // interpolated mtm = (40 + 100) / 2 = 70.
        let csa = CsaTerms::new(0.0, 0.0, 0.0, 0.25).unwrap();
        let engine = engine_with(Some(csa), false);
        let path = path_with_values(vec![vec![10.0], vec![40.0], vec![100.0]]);

        let e = engine.collateralize(&path, 2, None);
        assert_relative_eq!(e.received_collateral, 70.0, epsilon = 1e-12);
        assert_relative_eq!(e.positive, 30.0, epsilon = 1e-12);
    }

    #[test]
    fn test_mpor_before_first_date_uses_first_values() {
        // Posting date 0.1 - 0.5 < first grid date: the first date's mtm
        // applies.
        let csa = CsaTerms::new(0.0, 0.0, 0.0, 0.5).unwrap();
        let engine = engine_with(Some(csa), false);
        let path = path_with_values(vec![vec![30.0], vec![40.0], vec![100.0]]);

        let e = engine.collateralize(&path, 0, None);
        assert_relative_eq!(e.received_collateral, 30.0, epsilon = 1e-12);
        assert_relative_eq!(e.positive, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_overcollateralization_clamped() {
        // Lagged mtm 100 exceeds the current 20: posting the full 100 would
        // overshoot, so VM clamps to the current mtm.
        let csa = CsaTerms::new(0.0, 0.0, 0.0, 0.5).unwrap();
        let engine = engine_with(Some(csa), false);
        let path = path_with_values(vec![vec![0.0], vec![100.0], vec![20.0]]);

        let e = engine.collateralize(&path, 2, None);
        assert_relative_eq!(e.positive, 0.0, epsilon = 1e-12);
        assert_relative_eq!(e.received_collateral, 20.0, epsilon = 1e-12);
        // Sign never flips relative to the uncollateralized exposure.
        assert_relative_eq!(e.negative, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_overcollateralization_modelled_when_enabled() {
        let csa = CsaTerms::new(0.0, 0.0, 0.0, 0.5).unwrap();
        let engine = engine_with(Some(csa), true);
        let path = path_with_values(vec![vec![0.0], vec![100.0], vec![20.0]]);

        let e = engine.collateralize(&path, 2, None);
        // Stale VM of 100 against an mtm of 20: the booking entity is now
        // overcollateralized by 80.
        assert_relative_eq!(e.positive, 0.0, epsilon = 1e-12);
        assert_relative_eq!(e.negative, 80.0, epsilon = 1e-12);
    }

    #[test]
    fn test_segregated_ia_excluded_from_funding() {
        let csa = CsaTerms::new(0.0, 0.0, 10.0, 0.0)
            .unwrap()
            .with_segregated_ia(true);
        let engine = engine_with(Some(csa), false);
        let path = path_with_values(vec![vec![100.0]]);

        let e = engine.collateralize(&path, 0, None);
        // VM clamps to mtm - IA = 90; total collateral equals mtm.
        assert_relative_eq!(e.positive, 0.0, epsilon = 1e-12);
        // Only the reusable VM of 90 offsets funding exposure.
        assert_relative_eq!(e.funding_positive, 10.0, epsilon = 1e-12);
    }

    #[test]
    fn test_no_reuse_vm_excluded_from_funding() {
        let csa = CsaTerms::zero_threshold(0.0)
            .unwrap()
            .with_reuse_permitted(false);
        let engine = engine_with(Some(csa), false);
        let path = path_with_values(vec![vec![100.0]]);

        let e = engine.collateralize(&path, 0, None);
        assert_relative_eq!(e.positive, 0.0, epsilon = 1e-12);
        assert_relative_eq!(e.funding_positive, 100.0, epsilon = 1e-12);
        assert_relative_eq!(e.funding_positive_delta(), 100.0, epsilon = 1e-12);
    }

    #[test]
    fn test_trade_allocation_proportional_to_mtm_share() {
        let engine = engine_with(None, false);
        let path = path_with_values(vec![vec![60.0]]);
        let trade_values = vec![100.0, -40.0];

        let e = engine.collateralize(&path, 0, Some(&trade_values));
        assert_relative_eq!(e.trade_values[0], 100.0, epsilon = 1e-12);
        assert_relative_eq!(e.trade_values[1], -40.0, epsilon = 1e-12);
        let total: f64 = e.trade_values.iter().sum();
        assert_relative_eq!(total, 60.0, epsilon = 1e-12);
    }

    #[test]
    fn test_trade_allocation_zeroed_for_flat_super_group() {
        let engine = engine_with(Some(CsaTerms::zero_threshold(0.0).unwrap()), false);
        let path = path_with_values(vec![vec![60.0]]);
        let trade_values = vec![100.0, -40.0];

        // Full collateralization nets the super-group to zero.
        let e = engine.collateralize(&path, 0, Some(&trade_values));
        assert!(e.trade_values.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_super_group_netting_offsets_groups() {
        let topology = Arc::new(
            NettingTopologyBuilder::new()
                .add_group_in_super(NettingGroupId::new("NG1"), SuperGroupId::new("SG"))
                .add_group_in_super(NettingGroupId::new("NG2"), SuperGroupId::new("SG"))
                .add_group(NettingGroupId::new("NG3"))
                .build()
                .unwrap(),
        );
        let engine =
            CollateralEngine::new(grid(), topology, HashMap::new(), false).unwrap();
        let path = path_with_values(vec![vec![50.0, -30.0, -10.0]]);

        let e = engine.collateralize(&path, 0, None);
        // SG nets to 20; NG3 stands alone at -10.
        assert_relative_eq!(e.positive, 20.0, epsilon = 1e-12);
        assert_relative_eq!(e.negative, 10.0, epsilon = 1e-12);
    }

    #[test]
    fn test_agreement_for_unknown_group_is_fatal() {
        let mut agreements: HashMap<NettingGroupId, Arc<dyn CollateralTerms>> = HashMap::new();
        agreements.insert(
            NettingGroupId::new("MISSING"),
            Arc::new(CsaTerms::zero_threshold(0.0).unwrap()),
        );
        let result =
            CollateralEngine::new(grid(), one_group_topology(), agreements, false);
        assert!(matches!(
            result,
            Err(ExposureError::UnknownNettingGroup { .. })
        ));
    }

    #[test]
    fn test_csa_validation() {
        assert!(CsaTerms::new(-1.0, 0.0, 0.0, 0.0).is_err());
        assert!(CsaTerms::new(0.0, -1.0, 0.0, 0.0).is_err());
        assert!(CsaTerms::new(0.0, 0.0, -1.0, 0.0).is_err());
        assert!(CsaTerms::new(0.0, 0.0, 0.0, -0.1).is_err());
        assert!(CsaTerms::new(0.0, 0.0, 0.0, 0.0).is_ok());
    }
}
