//! Identifier types for portfolio entities.
//!
//! Strongly-typed identifiers for trades, netting groups, netting
//! super-groups, and counterparties. Newtypes prevent accidental misuse of
//! one identifier kind where another is expected.

use std::fmt;

macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier.
            #[inline]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            #[inline]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id! {
    /// Unique identifier for a trade.
    ///
    /// # Examples
    ///
    /// ```
    /// use ccr_core::types::TradeId;
    ///
    /// let id = TradeId::new("TRADE001");
    /// assert_eq!(id.as_str(), "TRADE001");
    /// ```
    TradeId
}

string_id! {
    /// Unique identifier for a netting group.
    ///
    /// Trades in the same netting group are netted against each other when
    /// computing exposure.
    NettingGroupId
}

string_id! {
    /// Unique identifier for a netting super-group.
    ///
    /// Netting groups sharing a super-group are netted together under a
    /// broader master-agreement rule.
    SuperGroupId
}

string_id! {
    /// Unique identifier for a counterparty.
    CounterpartyId
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_construction_and_display() {
        let id = NettingGroupId::new("NG-EU-01");
        assert_eq!(id.as_str(), "NG-EU-01");
        assert_eq!(format!("{}", id), "NG-EU-01");
    }

    #[test]
    fn test_id_from_conversions() {
        let a: TradeId = "T001".into();
        let b = TradeId::from("T001".to_string());
        assert_eq!(a, b);
    }

    #[test]
    fn test_id_types_are_distinct() {
        // The newtypes hash/compare independently; same text, different kinds.
        let g = SuperGroupId::new("X");
        let c = CounterpartyId::new("X");
        assert_eq!(g.as_str(), c.as_str());
    }
}
