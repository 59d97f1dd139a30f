//! The closed set of CCR measures and their static classification.
//!
//! Every measure carries a [`MeasureTraits`] record describing how it is
//! accumulated and queried: the weighting channel, the exposure input, the
//! accumulation family, discounting, and addressing. The traits table is
//! configuration data consulted by the accumulator and orchestrators; no
//! other component branches on individual measures.

use std::fmt;

/// Radon-Nikodym weighting channel conditioning a path observation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WeightChannel {
    /// Conditioned on counterparty default.
    CptyDefault,
    /// Conditioned on own default.
    OwnDefault,
    /// Conditioned on joint survival.
    Survival,
    /// Unconditional (density identically one).
    NoDefault,
}

/// Credit/funding spread channel recorded on each path date.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SpreadChannel {
    /// Counterparty credit spread.
    Cpty,
    /// Own credit spread.
    Own,
    /// Funding borrow spread.
    Borrow,
    /// Funding lend spread.
    Lend,
}

/// Which collateralized exposure feeds a measure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExposureInput {
    /// Counterparty-risk exposure `max(V - C, 0)` summed over super-groups.
    Positive,
    /// Booking-entity-risk exposure `max(-(V - C), 0)` summed over super-groups.
    Negative,
    /// Signed netted value (positive minus negative exposure).
    Net,
    /// Positive exposure net of reusable collateral only.
    FundingPositive,
    /// Negative exposure net of reusable collateral only.
    FundingNegative,
}

/// Accumulation / reduction family of a measure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MeasureFamily {
    /// Per-date weighted expectation profile.
    Expectation,
    /// Per-date empirical quantile of the weighted exposure distribution.
    Quantile,
    /// Running maximum of the expectation profile (EEE).
    RunningMax,
    /// Trapezoidal time average of the expectation profile (EPE/ENE).
    TimeAverage,
    /// Time average of the running-max profile over the regulatory horizon (EEPE).
    TimeAverageRunningMax,
    /// Profile integrated against an integration kernel (CVA, DVA, FCA, FBA).
    KernelIntegral,
    /// Per-date standard error of the expectation estimator.
    StdError,
    /// Regulatory capital proxy derived from EEPE.
    RegulatoryCapital,
    /// Basel effective maturity derived from the discounted profile.
    EffectiveMaturity,
}

/// Static classification of a measure.
#[derive(Clone, Copy, Debug)]
pub struct MeasureTraits {
    /// Accumulation / reduction family.
    pub family: MeasureFamily,
    /// Radon-Nikodym channel weighting each observation.
    pub channel: WeightChannel,
    /// Exposure input fed to the accumulator.
    pub input: ExposureInput,
    /// Spread channel multiplied into the observation, if any.
    pub spread: Option<SpreadChannel>,
    /// Whether the discount factor multiplies each observation.
    pub discounted: bool,
    /// Integration kernel for integral measures.
    pub kernel: Option<WeightChannel>,
    /// Whether queries require an exposure date.
    pub time_indexed: bool,
    /// Whether queries require a confidence level.
    pub quantile_indexed: bool,
}

/// Closed enumeration of supported CCR measures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[allow(missing_docs)]
pub enum CcrMeasure {
    Cva,
    Cva0,
    Dva,
    Dva0,
    Fca,
    Fca0,
    FcaNoDefault,
    Fba,
    Fba0,
    FbaNoDefault,
    Ee,
    Ee0,
    DiscountedEe,
    Nee,
    Nee0,
    DiscountedNee,
    Epv,
    Epv0,
    DiscountedEpv,
    Pfe,
    Pfne,
    Eee,
    Epe,
    Ene,
    Eepe,
    EeStdError,
    Rwa,
    EffectiveMaturity,
}

impl fmt::Display for CcrMeasure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Cva => "CVA",
            Self::Cva0 => "CVA0",
            Self::Dva => "DVA",
            Self::Dva0 => "DVA0",
            Self::Fca => "FCA",
            Self::Fca0 => "FCA0",
            Self::FcaNoDefault => "FCA_NO_DEFAULT",
            Self::Fba => "FBA",
            Self::Fba0 => "FBA0",
            Self::FbaNoDefault => "FBA_NO_DEFAULT",
            Self::Ee => "EE",
            Self::Ee0 => "EE0",
            Self::DiscountedEe => "DISCOUNTED_EE",
            Self::Nee => "NEE",
            Self::Nee0 => "NEE0",
            Self::DiscountedNee => "DISCOUNTED_NEE",
            Self::Epv => "EPV",
            Self::Epv0 => "EPV0",
            Self::DiscountedEpv => "DISCOUNTED_EPV",
            Self::Pfe => "PFE",
            Self::Pfne => "PFNE",
            Self::Eee => "EEE",
            Self::Epe => "EPE",
            Self::Ene => "ENE",
            Self::Eepe => "EEPE",
            Self::EeStdError => "EE_STD_ERROR",
            Self::Rwa => "RWA",
            Self::EffectiveMaturity => "EFFECTIVE_MATURITY",
        };
        write!(f, "{}", name)
    }
}

impl CcrMeasure {
    /// All measures, in declaration order.
    pub const ALL: [CcrMeasure; 28] = [
        Self::Cva,
        Self::Cva0,
        Self::Dva,
        Self::Dva0,
        Self::Fca,
        Self::Fca0,
        Self::FcaNoDefault,
        Self::Fba,
        Self::Fba0,
        Self::FbaNoDefault,
        Self::Ee,
        Self::Ee0,
        Self::DiscountedEe,
        Self::Nee,
        Self::Nee0,
        Self::DiscountedNee,
        Self::Epv,
        Self::Epv0,
        Self::DiscountedEpv,
        Self::Pfe,
        Self::Pfne,
        Self::Eee,
        Self::Epe,
        Self::Ene,
        Self::Eepe,
        Self::EeStdError,
        Self::Rwa,
        Self::EffectiveMaturity,
    ];

    /// Returns the static classification record for this measure.
    pub fn traits(self) -> MeasureTraits {
        use ExposureInput::*;
        use MeasureFamily::*;
        use WeightChannel::*;

        let t = |family,
                 channel,
                 input,
                 spread,
                 discounted,
                 kernel,
                 time_indexed,
                 quantile_indexed| MeasureTraits {
            family,
            channel,
            input,
            spread,
            discounted,
            kernel,
            time_indexed,
            quantile_indexed,
        };

        match self {
            // Credit valuation adjustments: discounted positive exposure
            // integrated against the counterparty default kernel.
            Self::Cva => t(KernelIntegral, CptyDefault, Positive, None, true, Some(CptyDefault), false, false),
            Self::Cva0 => t(KernelIntegral, NoDefault, Positive, None, true, Some(CptyDefault), false, false),
            Self::Dva => t(KernelIntegral, OwnDefault, Negative, None, true, Some(OwnDefault), false, false),
            Self::Dva0 => t(KernelIntegral, NoDefault, Negative, None, true, Some(OwnDefault), false, false),

            // Funding adjustments: survival-weighted funding exposure times
            // the borrow/lend spread, integrated against the survival kernel.
            Self::Fca => t(KernelIntegral, Survival, FundingPositive, Some(SpreadChannel::Borrow), true, Some(Survival), false, false),
            Self::Fca0 => t(KernelIntegral, NoDefault, FundingPositive, Some(SpreadChannel::Borrow), true, Some(Survival), false, false),
            Self::FcaNoDefault => t(KernelIntegral, NoDefault, FundingPositive, Some(SpreadChannel::Borrow), true, Some(NoDefault), false, false),
            Self::Fba => t(KernelIntegral, Survival, FundingNegative, Some(SpreadChannel::Lend), true, Some(Survival), false, false),
            Self::Fba0 => t(KernelIntegral, NoDefault, FundingNegative, Some(SpreadChannel::Lend), true, Some(Survival), false, false),
            Self::FbaNoDefault => t(KernelIntegral, NoDefault, FundingNegative, Some(SpreadChannel::Lend), true, Some(NoDefault), false, false),

            // Expected exposure families. The wrong-way variants condition on
            // the relevant default event; the `0` variants are unconditional.
            Self::Ee => t(Expectation, CptyDefault, Positive, None, false, None, true, false),
            Self::Ee0 => t(Expectation, NoDefault, Positive, None, false, None, true, false),
            Self::DiscountedEe => t(Expectation, NoDefault, Positive, None, true, None, true, false),
            Self::Nee => t(Expectation, OwnDefault, Negative, None, false, None, true, false),
            Self::Nee0 => t(Expectation, NoDefault, Negative, None, false, None, true, false),
            Self::DiscountedNee => t(Expectation, NoDefault, Negative, None, true, None, true, false),
            Self::Epv => t(Expectation, Survival, Net, None, false, None, true, false),
            Self::Epv0 => t(Expectation, NoDefault, Net, None, false, None, true, false),
            Self::DiscountedEpv => t(Expectation, NoDefault, Net, None, true, None, true, false),

            // Quantile families.
            Self::Pfe => t(Quantile, NoDefault, Positive, None, false, None, true, true),
            Self::Pfne => t(Quantile, NoDefault, Negative, None, false, None, true, true),

            // Regulatory profile families.
            Self::Eee => t(RunningMax, NoDefault, Positive, None, false, None, true, false),
            Self::Epe => t(TimeAverage, NoDefault, Positive, None, false, None, false, false),
            Self::Ene => t(TimeAverage, NoDefault, Negative, None, false, None, false, false),
            Self::Eepe => t(TimeAverageRunningMax, NoDefault, Positive, None, false, None, false, false),
            Self::EeStdError => t(StdError, NoDefault, Positive, None, false, None, true, false),
            Self::Rwa => t(RegulatoryCapital, NoDefault, Positive, None, false, None, false, false),
            Self::EffectiveMaturity => t(EffectiveMaturity, NoDefault, Positive, None, true, None, false, false),
        }
    }

    /// Whether queries require an exposure date.
    #[inline]
    pub fn is_time_indexed(self) -> bool {
        self.traits().time_indexed
    }

    /// Whether queries require a confidence level.
    #[inline]
    pub fn is_quantile_indexed(self) -> bool {
        self.traits().quantile_indexed
    }

    /// Whether the measure is linear in per-trade exposure.
    ///
    /// Additive measures decompose exactly across trades; non-additive ones
    /// (quantiles, running maxima, standard errors, capital proxies) do not.
    pub fn is_additive(self) -> bool {
        !matches!(
            self.traits().family,
            MeasureFamily::Quantile
                | MeasureFamily::RunningMax
                | MeasureFamily::TimeAverageRunningMax
                | MeasureFamily::StdError
                | MeasureFamily::RegulatoryCapital
                | MeasureFamily::EffectiveMaturity
        )
    }
}

/// Maps a requested measure to its effective measure under the given
/// configuration flags.
///
/// Funding-no-default takes precedence for funding measures, then the
/// wrong-way-risk switch replaces default-conditioned measures with their
/// unconditional variants, then the discounting switch replaces the EE/NEE/
/// EPV families with their discounted variants.
pub fn effective_measure(
    measure: CcrMeasure,
    wrong_way_risk: bool,
    discount_exposures: bool,
    funding_no_default: bool,
) -> CcrMeasure {
    use CcrMeasure::*;

    let mut m = measure;

    if funding_no_default {
        m = match m {
            Fca | Fca0 => FcaNoDefault,
            Fba | Fba0 => FbaNoDefault,
            other => other,
        };
    }

    if !wrong_way_risk {
        m = match m {
            Cva => Cva0,
            Dva => Dva0,
            Fca => Fca0,
            Fba => Fba0,
            Ee => Ee0,
            Nee => Nee0,
            Epv => Epv0,
            other => other,
        };
    }

    if discount_exposures {
        m = match m {
            Ee | Ee0 => DiscountedEe,
            Nee | Nee0 => DiscountedNee,
            Epv | Epv0 => DiscountedEpv,
            other => other,
        };
    }

    m
}
