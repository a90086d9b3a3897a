//! Account storage trait.

use crate::StoreError;
use serde::{Deserialize, Serialize};
use soulfra_types::{AccountId, Timestamp, TrustTier};

/// Per-account information persisted by the gateway.
///
/// Accounts are created on first authenticated contact and never hard-deleted;
/// deactivation flips `active` only. The cached trust assessment is refreshed
/// by the trust engine and persisted here so tiers survive a restart.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccountInfo {
    pub id: AccountId,
    pub created_at: Timestamp,
    /// Soft-delete flag. Inactive accounts keep their ledger history.
    pub active: bool,
    /// Opaque presentation metadata (persona/skin). The gateway stores it
    /// verbatim for UI collaborators and never interprets it.
    pub persona: Option<String>,
    /// Cached trust score from the last recompute.
    pub trust_score: i64,
    /// Cached trust tier from the last recompute.
    pub tier: TrustTier,
    /// When the cached tier last changed (drives demotion cooldown).
    pub tier_changed_at: Timestamp,
    /// Timestamp of the most recent positive ledger event, if any.
    pub last_positive_at: Option<Timestamp>,
    /// Count of explicit penalty entries ever applied.
    pub penalty_count: u64,
}

impl AccountInfo {
    /// A fresh account at first contact: tier 0, no history.
    pub fn new(id: AccountId, now: Timestamp) -> Self {
        Self {
            id,
            created_at: now,
            active: true,
            persona: None,
            trust_score: 0,
            tier: TrustTier::MIN,
            tier_changed_at: now,
            last_positive_at: None,
            penalty_count: 0,
        }
    }
}

/// Trait for account storage operations.
pub trait AccountStore {
    fn get_account(&self, id: &AccountId) -> Result<AccountInfo, StoreError>;
    fn put_account(&self, info: &AccountInfo) -> Result<(), StoreError>;

    /// Atomic read-modify-write of one account record.
    ///
    /// The closure runs against the current record under the backend's write
    /// lock (or write transaction), so two writers touching different fields
    /// cannot clobber each other's update. Returns the record as written.
    /// Fails with `NotFound` when the account does not exist.
    fn update_account(
        &self,
        id: &AccountId,
        apply: &mut dyn FnMut(&mut AccountInfo),
    ) -> Result<AccountInfo, StoreError>;

    fn exists(&self, id: &AccountId) -> Result<bool, StoreError>;
    fn account_count(&self) -> Result<u64, StoreError>;

    /// Iterate accounts in id order with pagination support.
    /// Returns up to `limit` accounts starting strictly after `cursor`
    /// (or from the beginning if `None`).
    fn iter_accounts_paged(
        &self,
        cursor: Option<&AccountId>,
        limit: usize,
    ) -> Result<Vec<AccountInfo>, StoreError>;
}
