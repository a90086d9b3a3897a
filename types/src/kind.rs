//! Token kinds and ledger reason codes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kinds of tokens an account can hold.
///
/// Kinds are never implicitly converted into one another; each has its own
/// mint/burn rules expressed through the reason codes accepted for it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TokenKind {
    /// Non-transferable credits granted for verified contribution events.
    /// Spent to unlock capability tiers.
    EarnedCredit,
    /// Transferable coins earned through metered labor events.
    /// Spent on provider calls and feature activation.
    SpendableCoin,
    /// Non-fungible fragments from rare discrete events, combinable into
    /// higher-tier unlocks.
    Fragment,
}

impl TokenKind {
    pub const ALL: [TokenKind; 3] = [
        TokenKind::EarnedCredit,
        TokenKind::SpendableCoin,
        TokenKind::Fragment,
    ];

    /// Stable single-byte tag used in storage keys and correlation derivation.
    pub fn as_u8(&self) -> u8 {
        match self {
            TokenKind::EarnedCredit => 0,
            TokenKind::SpendableCoin => 1,
            TokenKind::Fragment => 2,
        }
    }

    pub fn from_u8(b: u8) -> Option<Self> {
        match b {
            0 => Some(TokenKind::EarnedCredit),
            1 => Some(TokenKind::SpendableCoin),
            2 => Some(TokenKind::Fragment),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::EarnedCredit => "earned_credit",
            TokenKind::SpendableCoin => "spendable_coin",
            TokenKind::Fragment => "fragment",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "earned_credit" => Some(TokenKind::EarnedCredit),
            "spendable_coin" => Some(TokenKind::SpendableCoin),
            "fragment" => Some(TokenKind::Fragment),
            _ => None,
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a ledger entry was written.
///
/// Reason codes feed the trust formula: positive contribution codes raise the
/// score, `Penalty` lowers it, and the rest are neutral accounting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ReasonCode {
    /// Verified contribution event (grants `EarnedCredit`).
    Contribution,
    /// Metered labor payout (grants `SpendableCoin`).
    LaborPayout,
    /// Charge for a dispatched provider call.
    ProviderCharge,
    /// Charge for activating a gated feature.
    FeatureActivation,
    /// A rare-event fragment drop (grants `Fragment`).
    FragmentDrop,
    /// Explicit penalty applied by an abuse flag.
    Penalty,
    /// Manual balance adjustment by an operator.
    Adjustment,
    /// Asynchronous repair of a failed post-dispatch write.
    Reconciliation,
}

impl ReasonCode {
    /// Whether this code counts as a positive trust signal when the entry's
    /// delta is positive.
    pub fn is_positive_signal(&self) -> bool {
        matches!(
            self,
            ReasonCode::Contribution | ReasonCode::LaborPayout | ReasonCode::FragmentDrop
        )
    }

    /// Whether this code counts toward the contribution-diversity bonus.
    pub fn is_contribution(&self) -> bool {
        self.is_positive_signal()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::Contribution => "contribution",
            ReasonCode::LaborPayout => "labor_payout",
            ReasonCode::ProviderCharge => "provider_charge",
            ReasonCode::FeatureActivation => "feature_activation",
            ReasonCode::FragmentDrop => "fragment_drop",
            ReasonCode::Penalty => "penalty",
            ReasonCode::Adjustment => "adjustment",
            ReasonCode::Reconciliation => "reconciliation",
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_tag_roundtrip() {
        for kind in TokenKind::ALL {
            assert_eq!(TokenKind::from_u8(kind.as_u8()), Some(kind));
            assert_eq!(TokenKind::parse(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn unknown_kind_tag_rejected() {
        assert_eq!(TokenKind::from_u8(9), None);
        assert_eq!(TokenKind::parse("doubloon"), None);
    }

    #[test]
    fn penalty_is_not_a_positive_signal() {
        assert!(!ReasonCode::Penalty.is_positive_signal());
        assert!(!ReasonCode::ProviderCharge.is_positive_signal());
        assert!(ReasonCode::Contribution.is_positive_signal());
    }
}
