//! In-memory storage backend for tests and dev mode.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::RwLock;

use crate::account::{AccountInfo, AccountStore};
use crate::entry::EntryStore;
use crate::meta::{MetaStore, SCHEMA_VERSION};
use crate::StoreError;
use soulfra_types::{AccountId, CorrelationId, LedgerEntry, TokenKind};

type AccountKindKey = (AccountId, u8);

#[derive(Default)]
struct Inner {
    accounts: BTreeMap<AccountId, AccountInfo>,
    entries: BTreeMap<u64, LedgerEntry>,
    /// (account, kind tag) → ordered seqs for that account+kind.
    account_index: HashMap<AccountKindKey, Vec<u64>>,
    /// (account, kind tag, correlation) → seq of the first applied entry.
    correlations: HashMap<(AccountId, u8, CorrelationId), u64>,
    meta: HashMap<String, Vec<u8>>,
}

/// Non-durable backend holding everything in process memory.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().expect("memory store lock poisoned")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner.write().expect("memory store lock poisoned")
    }
}

impl AccountStore for MemoryStore {
    fn get_account(&self, id: &AccountId) -> Result<AccountInfo, StoreError> {
        self.read()
            .accounts
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("account {id}")))
    }

    fn put_account(&self, info: &AccountInfo) -> Result<(), StoreError> {
        self.write().accounts.insert(info.id, info.clone());
        Ok(())
    }

    fn update_account(
        &self,
        id: &AccountId,
        apply: &mut dyn FnMut(&mut AccountInfo),
    ) -> Result<AccountInfo, StoreError> {
        let mut inner = self.write();
        let info = inner
            .accounts
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("account {id}")))?;
        apply(info);
        Ok(info.clone())
    }

    fn exists(&self, id: &AccountId) -> Result<bool, StoreError> {
        Ok(self.read().accounts.contains_key(id))
    }

    fn account_count(&self) -> Result<u64, StoreError> {
        Ok(self.read().accounts.len() as u64)
    }

    fn iter_accounts_paged(
        &self,
        cursor: Option<&AccountId>,
        limit: usize,
    ) -> Result<Vec<AccountInfo>, StoreError> {
        let inner = self.read();
        let lower = match cursor {
            Some(c) => Bound::Excluded(*c),
            None => Bound::Unbounded,
        };
        Ok(inner
            .accounts
            .range((lower, Bound::Unbounded))
            .take(limit)
            .map(|(_, info)| info.clone())
            .collect())
    }
}

impl EntryStore for MemoryStore {
    fn put_entry(&self, entry: &LedgerEntry) -> Result<(), StoreError> {
        let mut inner = self.write();
        if inner.entries.contains_key(&entry.seq) {
            return Err(StoreError::Duplicate(format!("entry seq {}", entry.seq)));
        }
        inner
            .account_index
            .entry((entry.account_id, entry.kind.as_u8()))
            .or_default()
            .push(entry.seq);
        inner.correlations.insert(
            (entry.account_id, entry.kind.as_u8(), entry.correlation_id),
            entry.seq,
        );
        inner.entries.insert(entry.seq, entry.clone());
        Ok(())
    }

    fn get_entry(&self, seq: u64) -> Result<LedgerEntry, StoreError> {
        self.read()
            .entries
            .get(&seq)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("entry seq {seq}")))
    }

    fn entries_for(
        &self,
        account: &AccountId,
        kind: TokenKind,
        since_seq: u64,
        limit: usize,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        let inner = self.read();
        let Some(seqs) = inner.account_index.get(&(*account, kind.as_u8())) else {
            return Ok(Vec::new());
        };
        // Seqs are appended in increasing order, so the slice after the
        // partition point is already sorted oldest-first.
        let start = seqs.partition_point(|&s| s <= since_seq);
        seqs[start..]
            .iter()
            .take(limit)
            .map(|seq| {
                inner
                    .entries
                    .get(seq)
                    .cloned()
                    .ok_or_else(|| StoreError::Corruption(format!("dangling index seq {seq}")))
            })
            .collect()
    }

    fn latest_entry(
        &self,
        account: &AccountId,
        kind: TokenKind,
    ) -> Result<Option<LedgerEntry>, StoreError> {
        let inner = self.read();
        let Some(seqs) = inner.account_index.get(&(*account, kind.as_u8())) else {
            return Ok(None);
        };
        match seqs.last() {
            Some(seq) => inner
                .entries
                .get(seq)
                .cloned()
                .map(Some)
                .ok_or_else(|| StoreError::Corruption(format!("dangling index seq {seq}"))),
            None => Ok(None),
        }
    }

    fn correlation_seq(
        &self,
        account: &AccountId,
        kind: TokenKind,
        correlation: &CorrelationId,
    ) -> Result<Option<u64>, StoreError> {
        Ok(self
            .read()
            .correlations
            .get(&(*account, kind.as_u8(), *correlation))
            .copied())
    }

    fn last_seq(&self) -> Result<u64, StoreError> {
        Ok(self
            .read()
            .entries
            .last_key_value()
            .map(|(seq, _)| *seq)
            .unwrap_or(0))
    }

    fn entry_count(&self) -> Result<u64, StoreError> {
        Ok(self.read().entries.len() as u64)
    }
}

impl MetaStore for MemoryStore {
    fn get_blob(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.read().meta.get(key).cloned())
    }

    fn put_blob(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.write().meta.insert(key.to_owned(), value.to_vec());
        Ok(())
    }

    fn schema_version(&self) -> Result<u32, StoreError> {
        Ok(SCHEMA_VERSION)
    }
}
