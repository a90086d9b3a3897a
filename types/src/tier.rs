//! Trust tiers — discrete admission-control levels.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A trust tier in `0..=MAX`. Higher tiers unlock more expensive providers.
///
/// Tiers are derived from ledger history by the trust engine and are
/// monotonically non-decreasing except for explicit decay or penalty events.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct TrustTier(u8);

impl TrustTier {
    pub const MIN: Self = Self(0);
    pub const MAX: Self = Self(10);

    /// Construct a tier, clamped to the valid range.
    pub fn new(level: u8) -> Self {
        Self(level.min(Self::MAX.0))
    }

    pub fn level(&self) -> u8 {
        self.0
    }

    /// The tier one step down (saturating at the floor).
    pub fn demoted(&self) -> Self {
        Self(self.0.saturating_sub(1))
    }
}

impl fmt::Display for TrustTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tier {}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_clamps_to_max() {
        assert_eq!(TrustTier::new(200), TrustTier::MAX);
        assert_eq!(TrustTier::new(3).level(), 3);
    }

    #[test]
    fn demotion_saturates_at_floor() {
        assert_eq!(TrustTier::new(0).demoted(), TrustTier::MIN);
        assert_eq!(TrustTier::new(5).demoted(), TrustTier::new(4));
    }

    #[test]
    fn tiers_are_ordered() {
        assert!(TrustTier::new(2) < TrustTier::new(7));
    }
}
