//! Point-in-time account snapshots for the HTTP layer.
//!
//! A snapshot is a read-side convenience; the ledger entries remain the
//! source of truth. Error responses attach a snapshot so clients can decide
//! whether to retry, top up, or abandon.

use serde::{Deserialize, Serialize};

use soulfra_types::{AccountId, TokenKind, TrustTier};

/// Balance for one token kind.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KindBalance {
    pub kind: TokenKind,
    pub balance: u128,
}

/// Balances for all kinds plus the cached trust assessment.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub account_id: AccountId,
    pub active: bool,
    pub balances: Vec<KindBalance>,
    pub trust_score: i64,
    pub tier: TrustTier,
}

impl AccountSnapshot {
    pub fn balance_of(&self, kind: TokenKind) -> u128 {
        self.balances
            .iter()
            .find(|b| b.kind == kind)
            .map(|b| b.balance)
            .unwrap_or(0)
    }
}
