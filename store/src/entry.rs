//! Ledger entry storage trait.

use crate::StoreError;
use soulfra_types::{AccountId, CorrelationId, LedgerEntry, TokenKind};

/// Trait for append-only ledger entry storage.
///
/// Backends persist entries exactly as written — there is no update or delete
/// operation by design. Sequencing (assigning `seq`) is owned by the ledger
/// engine; backends must reject a `seq` that already exists.
pub trait EntryStore {
    /// Persist a new entry. Fails with [`StoreError::Duplicate`] if the seq
    /// is already present.
    fn put_entry(&self, entry: &LedgerEntry) -> Result<(), StoreError>;

    fn get_entry(&self, seq: u64) -> Result<LedgerEntry, StoreError>;

    /// Entries for one account+kind with `seq > since_seq`, oldest first,
    /// up to `limit`. Restartable: pass the last seq seen to resume.
    fn entries_for(
        &self,
        account: &AccountId,
        kind: TokenKind,
        since_seq: u64,
        limit: usize,
    ) -> Result<Vec<LedgerEntry>, StoreError>;

    /// The most recent entry for one account+kind, if any.
    fn latest_entry(
        &self,
        account: &AccountId,
        kind: TokenKind,
    ) -> Result<Option<LedgerEntry>, StoreError>;

    /// Look up the seq previously applied for this correlation id, if any.
    fn correlation_seq(
        &self,
        account: &AccountId,
        kind: TokenKind,
        correlation: &CorrelationId,
    ) -> Result<Option<u64>, StoreError>;

    /// Highest seq ever written (0 when the store is empty).
    fn last_seq(&self) -> Result<u64, StoreError>;

    fn entry_count(&self) -> Result<u64, StoreError>;
}
