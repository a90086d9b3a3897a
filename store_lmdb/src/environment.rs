//! LMDB environment setup and trait implementations.

use std::ops::Bound;
use std::path::Path;

use heed::byteorder::BigEndian;
use heed::types::{Bytes, SerdeBincode, Str, U64};
use heed::{Database, Env, EnvOpenOptions};

use soulfra_store::account::{AccountInfo, AccountStore};
use soulfra_store::entry::EntryStore;
use soulfra_store::meta::{MetaStore, SCHEMA_VERSION};
use soulfra_store::StoreError;
use soulfra_types::{AccountId, CorrelationId, LedgerEntry, TokenKind};

use crate::LmdbError;

type BEU64 = U64<BigEndian>;

const META_SCHEMA_KEY: &str = "schema_version";

/// Wraps the LMDB environment and all database handles.
pub struct LmdbStore {
    env: Env,
    accounts: Database<Bytes, SerdeBincode<AccountInfo>>,
    entries: Database<BEU64, SerdeBincode<LedgerEntry>>,
    /// account(32) + kind(1) + seq(8, big-endian) → seq.
    /// Big-endian seq keeps per-account entries in append order under
    /// LMDB's lexicographic key ordering.
    account_index: Database<Bytes, BEU64>,
    /// account(32) + kind(1) + correlation(32) → seq of first application.
    correlations: Database<Bytes, BEU64>,
    meta: Database<Str, Bytes>,
}

impl LmdbStore {
    /// Open or create an LMDB environment at the given path.
    pub fn open(path: &Path, map_size: usize) -> Result<Self, LmdbError> {
        std::fs::create_dir_all(path).map_err(|e| LmdbError::Open(e.to_string()))?;
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(8)
                .open(path)
                .map_err(|e| LmdbError::Open(e.to_string()))?
        };

        let mut wtxn = env.write_txn()?;
        let accounts = env.create_database(&mut wtxn, Some("accounts"))?;
        let entries = env.create_database(&mut wtxn, Some("entries"))?;
        let account_index = env.create_database(&mut wtxn, Some("account_index"))?;
        let correlations = env.create_database(&mut wtxn, Some("correlations"))?;
        let meta: Database<Str, Bytes> = env.create_database(&mut wtxn, Some("meta"))?;
        if meta.get(&wtxn, META_SCHEMA_KEY)?.is_none() {
            meta.put(&mut wtxn, META_SCHEMA_KEY, &SCHEMA_VERSION.to_be_bytes())?;
        }
        wtxn.commit()?;

        tracing::debug!(path = %path.display(), "opened LMDB environment");
        Ok(Self {
            env,
            accounts,
            entries,
            account_index,
            correlations,
            meta,
        })
    }

    fn index_key(account: &AccountId, kind: TokenKind, seq: u64) -> [u8; 41] {
        let mut key = [0u8; 41];
        key[..32].copy_from_slice(account.as_bytes());
        key[32] = kind.as_u8();
        key[33..].copy_from_slice(&seq.to_be_bytes());
        key
    }

    fn correlation_key(
        account: &AccountId,
        kind: TokenKind,
        correlation: &CorrelationId,
    ) -> [u8; 65] {
        let mut key = [0u8; 65];
        key[..32].copy_from_slice(account.as_bytes());
        key[32] = kind.as_u8();
        key[33..].copy_from_slice(correlation.as_bytes());
        key
    }

    fn prefix(account: &AccountId, kind: TokenKind) -> [u8; 33] {
        let mut p = [0u8; 33];
        p[..32].copy_from_slice(account.as_bytes());
        p[32] = kind.as_u8();
        p
    }
}

fn backend(e: heed::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

impl AccountStore for LmdbStore {
    fn get_account(&self, id: &AccountId) -> Result<AccountInfo, StoreError> {
        let rtxn = self.env.read_txn().map_err(backend)?;
        self.accounts
            .get(&rtxn, id.as_bytes())
            .map_err(backend)?
            .ok_or_else(|| StoreError::NotFound(format!("account {id}")))
    }

    fn put_account(&self, info: &AccountInfo) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(backend)?;
        self.accounts
            .put(&mut wtxn, info.id.as_bytes(), info)
            .map_err(backend)?;
        wtxn.commit().map_err(backend)
    }

    fn update_account(
        &self,
        id: &AccountId,
        apply: &mut dyn FnMut(&mut AccountInfo),
    ) -> Result<AccountInfo, StoreError> {
        // Read and rewrite inside one write transaction: LMDB serializes
        // writers, so the record cannot change underneath the closure.
        let mut wtxn = self.env.write_txn().map_err(backend)?;
        let mut info = self
            .accounts
            .get(&wtxn, id.as_bytes())
            .map_err(backend)?
            .ok_or_else(|| StoreError::NotFound(format!("account {id}")))?;
        apply(&mut info);
        self.accounts
            .put(&mut wtxn, id.as_bytes(), &info)
            .map_err(backend)?;
        wtxn.commit().map_err(backend)?;
        Ok(info)
    }

    fn exists(&self, id: &AccountId) -> Result<bool, StoreError> {
        let rtxn = self.env.read_txn().map_err(backend)?;
        Ok(self
            .accounts
            .get(&rtxn, id.as_bytes())
            .map_err(backend)?
            .is_some())
    }

    fn account_count(&self) -> Result<u64, StoreError> {
        let rtxn = self.env.read_txn().map_err(backend)?;
        self.accounts.len(&rtxn).map_err(backend)
    }

    fn iter_accounts_paged(
        &self,
        cursor: Option<&AccountId>,
        limit: usize,
    ) -> Result<Vec<AccountInfo>, StoreError> {
        let rtxn = self.env.read_txn().map_err(backend)?;
        let lower: Bound<&[u8]> = match cursor {
            Some(c) => Bound::Excluded(c.as_bytes().as_slice()),
            None => Bound::Unbounded,
        };
        let range = (lower, Bound::Unbounded);
        let mut out = Vec::new();
        for item in self.accounts.range(&rtxn, &range).map_err(backend)? {
            let (_, info) = item.map_err(backend)?;
            out.push(info);
            if out.len() >= limit {
                break;
            }
        }
        Ok(out)
    }
}

impl EntryStore for LmdbStore {
    fn put_entry(&self, entry: &LedgerEntry) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(backend)?;
        if self.entries.get(&wtxn, &entry.seq).map_err(backend)?.is_some() {
            return Err(StoreError::Duplicate(format!("entry seq {}", entry.seq)));
        }
        self.entries
            .put(&mut wtxn, &entry.seq, entry)
            .map_err(backend)?;
        let ikey = Self::index_key(&entry.account_id, entry.kind, entry.seq);
        self.account_index
            .put(&mut wtxn, &ikey, &entry.seq)
            .map_err(backend)?;
        let ckey = Self::correlation_key(&entry.account_id, entry.kind, &entry.correlation_id);
        self.correlations
            .put(&mut wtxn, &ckey, &entry.seq)
            .map_err(backend)?;
        wtxn.commit().map_err(backend)
    }

    fn get_entry(&self, seq: u64) -> Result<LedgerEntry, StoreError> {
        let rtxn = self.env.read_txn().map_err(backend)?;
        self.entries
            .get(&rtxn, &seq)
            .map_err(backend)?
            .ok_or_else(|| StoreError::NotFound(format!("entry seq {seq}")))
    }

    fn entries_for(
        &self,
        account: &AccountId,
        kind: TokenKind,
        since_seq: u64,
        limit: usize,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        let rtxn = self.env.read_txn().map_err(backend)?;
        let prefix = Self::prefix(account, kind);
        // Resume strictly after since_seq.
        let start = Self::index_key(account, kind, since_seq.saturating_add(1));
        let range = (
            Bound::Included(start.as_slice()),
            Bound::<&[u8]>::Unbounded,
        );
        let mut out = Vec::new();
        for item in self.account_index.range(&rtxn, &range).map_err(backend)? {
            let (key, seq) = item.map_err(backend)?;
            if !key.starts_with(&prefix) {
                break;
            }
            let entry = self
                .entries
                .get(&rtxn, &seq)
                .map_err(backend)?
                .ok_or_else(|| StoreError::Corruption(format!("dangling index seq {seq}")))?;
            out.push(entry);
            if out.len() >= limit {
                break;
            }
        }
        Ok(out)
    }

    fn latest_entry(
        &self,
        account: &AccountId,
        kind: TokenKind,
    ) -> Result<Option<LedgerEntry>, StoreError> {
        let rtxn = self.env.read_txn().map_err(backend)?;
        let prefix = Self::prefix(account, kind);
        let end = Self::index_key(account, kind, u64::MAX);
        let range = (
            Bound::Included(prefix.as_slice()),
            Bound::Included(end.as_slice()),
        );
        let mut iter = self.account_index.rev_range(&rtxn, &range).map_err(backend)?;
        match iter.next() {
            Some(item) => {
                let (_, seq) = item.map_err(backend)?;
                let entry = self
                    .entries
                    .get(&rtxn, &seq)
                    .map_err(backend)?
                    .ok_or_else(|| StoreError::Corruption(format!("dangling index seq {seq}")))?;
                Ok(Some(entry))
            }
            None => Ok(None),
        }
    }

    fn correlation_seq(
        &self,
        account: &AccountId,
        kind: TokenKind,
        correlation: &CorrelationId,
    ) -> Result<Option<u64>, StoreError> {
        let rtxn = self.env.read_txn().map_err(backend)?;
        let ckey = Self::correlation_key(account, kind, correlation);
        self.correlations.get(&rtxn, &ckey).map_err(backend)
    }

    fn last_seq(&self) -> Result<u64, StoreError> {
        let rtxn = self.env.read_txn().map_err(backend)?;
        Ok(self
            .entries
            .last(&rtxn)
            .map_err(backend)?
            .map(|(seq, _)| seq)
            .unwrap_or(0))
    }

    fn entry_count(&self) -> Result<u64, StoreError> {
        let rtxn = self.env.read_txn().map_err(backend)?;
        self.entries.len(&rtxn).map_err(backend)
    }
}

impl MetaStore for LmdbStore {
    fn get_blob(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let rtxn = self.env.read_txn().map_err(backend)?;
        Ok(self
            .meta
            .get(&rtxn, key)
            .map_err(backend)?
            .map(|v| v.to_vec()))
    }

    fn put_blob(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(backend)?;
        self.meta.put(&mut wtxn, key, value).map_err(backend)?;
        wtxn.commit().map_err(backend)
    }

    fn schema_version(&self) -> Result<u32, StoreError> {
        let raw = self
            .get_blob(META_SCHEMA_KEY)?
            .ok_or_else(|| StoreError::Corruption("missing schema version".into()))?;
        let bytes: [u8; 4] = raw
            .as_slice()
            .try_into()
            .map_err(|_| StoreError::Corruption("malformed schema version".into()))?;
        Ok(u32::from_be_bytes(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use soulfra_types::{ReasonCode, Timestamp};

    fn temp_store() -> (tempfile::TempDir, LmdbStore) {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = LmdbStore::open(dir.path(), 32 * 1024 * 1024).expect("open env");
        (dir, store)
    }

    fn test_entry(seq: u64, account: AccountId, kind: TokenKind, delta: i128) -> LedgerEntry {
        LedgerEntry {
            seq,
            account_id: account,
            kind,
            delta,
            reason_code: ReasonCode::LaborPayout,
            correlation_id: CorrelationId::new([seq as u8; 32]),
            timestamp: Timestamp::new(1000 + seq),
            resulting_balance: delta.unsigned_abs(),
        }
    }

    #[test]
    fn account_write_read_roundtrip() {
        let (_dir, store) = temp_store();
        let info = AccountInfo::new(AccountId::new([1; 32]), Timestamp::new(42));
        store.put_account(&info).unwrap();
        let read = store.get_account(&info.id).unwrap();
        assert_eq!(read.id, info.id);
        assert_eq!(read.created_at, info.created_at);
        assert!(read.active);
    }

    #[test]
    fn update_account_rewrites_in_place() {
        let (_dir, store) = temp_store();
        let info = AccountInfo::new(AccountId::new([3; 32]), Timestamp::new(42));
        store.put_account(&info).unwrap();

        let updated = store
            .update_account(&info.id, &mut |rec| {
                rec.trust_score = 77;
                rec.active = false;
            })
            .unwrap();
        assert_eq!(updated.trust_score, 77);

        let read = store.get_account(&info.id).unwrap();
        assert_eq!(read.trust_score, 77);
        assert!(!read.active);
        assert_eq!(read.created_at, info.created_at);

        let err = store
            .update_account(&AccountId::new([4; 32]), &mut |_| {})
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn entries_keep_per_account_order() {
        let (_dir, store) = temp_store();
        let a = AccountId::new([1; 32]);
        let b = AccountId::new([2; 32]);
        store
            .put_entry(&test_entry(1, a, TokenKind::SpendableCoin, 10))
            .unwrap();
        store
            .put_entry(&test_entry(2, b, TokenKind::SpendableCoin, 20))
            .unwrap();
        store
            .put_entry(&test_entry(3, a, TokenKind::SpendableCoin, 30))
            .unwrap();

        let got = store
            .entries_for(&a, TokenKind::SpendableCoin, 0, 10)
            .unwrap();
        assert_eq!(got.iter().map(|e| e.seq).collect::<Vec<_>>(), vec![1, 3]);
        let latest = store
            .latest_entry(&a, TokenKind::SpendableCoin)
            .unwrap()
            .unwrap();
        assert_eq!(latest.seq, 3);
    }

    #[test]
    fn kinds_are_isolated() {
        let (_dir, store) = temp_store();
        let a = AccountId::new([1; 32]);
        store
            .put_entry(&test_entry(1, a, TokenKind::SpendableCoin, 10))
            .unwrap();
        store
            .put_entry(&test_entry(2, a, TokenKind::EarnedCredit, 5))
            .unwrap();
        let coins = store
            .entries_for(&a, TokenKind::SpendableCoin, 0, 10)
            .unwrap();
        assert_eq!(coins.len(), 1);
        assert_eq!(coins[0].kind, TokenKind::SpendableCoin);
    }

    #[test]
    fn duplicate_seq_is_rejected() {
        let (_dir, store) = temp_store();
        let a = AccountId::new([1; 32]);
        store
            .put_entry(&test_entry(1, a, TokenKind::SpendableCoin, 10))
            .unwrap();
        let err = store
            .put_entry(&test_entry(1, a, TokenKind::SpendableCoin, 10))
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempfile::tempdir().expect("temp dir");
        let a = AccountId::new([9; 32]);
        {
            let store = LmdbStore::open(dir.path(), 32 * 1024 * 1024).unwrap();
            store
                .put_entry(&test_entry(1, a, TokenKind::SpendableCoin, 10))
                .unwrap();
        }
        let store = LmdbStore::open(dir.path(), 32 * 1024 * 1024).unwrap();
        assert_eq!(store.last_seq().unwrap(), 1);
        let latest = store
            .latest_entry(&a, TokenKind::SpendableCoin)
            .unwrap()
            .unwrap();
        assert_eq!(latest.seq, 1);
        assert_eq!(store.schema_version().unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn correlation_index_survives_commit() {
        let (_dir, store) = temp_store();
        let a = AccountId::new([1; 32]);
        let entry = test_entry(5, a, TokenKind::SpendableCoin, 10);
        store.put_entry(&entry).unwrap();
        assert_eq!(
            store
                .correlation_seq(&a, TokenKind::SpendableCoin, &entry.correlation_id)
                .unwrap(),
            Some(5)
        );
        assert_eq!(
            store
                .correlation_seq(&a, TokenKind::EarnedCredit, &entry.correlation_id)
                .unwrap(),
            None
        );
    }
}
