//! The immutable ledger entry record.

use serde::{Deserialize, Serialize};

use crate::id::{AccountId, CorrelationId};
use crate::kind::{ReasonCode, TokenKind};
use crate::time::Timestamp;

/// One immutable signed delta against an account's balance for one token kind.
///
/// Invariant: for a given account+kind, the sequence of `resulting_balance`
/// values is exactly the running sum of `delta`s in append order. Entries are
/// never rewritten or removed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    pub account_id: AccountId,
    pub kind: TokenKind,
    /// Signed amount. Negative deltas may never drive the balance below zero.
    pub delta: i128,
    pub reason_code: ReasonCode,
    /// Links this entry to the external request that caused it. The
    /// (account, kind, correlation) triple is unique — retried writes are
    /// absorbed by the idempotency check.
    pub correlation_id: CorrelationId,
    pub timestamp: Timestamp,
    /// Balance for this account+kind after applying `delta`.
    pub resulting_balance: u128,
}

impl LedgerEntry {
    /// Whether this entry is a positive trust signal (positive delta with a
    /// contribution-class reason code).
    pub fn is_positive_event(&self) -> bool {
        self.delta > 0 && self.reason_code.is_positive_signal()
    }

    /// Whether this entry is an explicit penalty.
    pub fn is_penalty(&self) -> bool {
        self.reason_code == crate::kind::ReasonCode::Penalty
    }
}
