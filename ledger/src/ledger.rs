//! The ledger engine — serialized appends, balances, restartable history.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use soulfra_store::{AccountInfo, Store, StoreError};
use soulfra_types::{AccountId, CorrelationId, LedgerEntry, ReasonCode, Timestamp, TokenKind};

use crate::error::LedgerError;
use crate::event::{EventBus, LedgerEvent};
use crate::snapshot::{AccountSnapshot, KindBalance};

/// The append-only token ledger.
///
/// Owns sequencing and the per-account write locks. Exactly one `Ledger`
/// instance runs per store — the single-writer guarantee is per process,
/// not cross-region (see the gateway docs).
pub struct Ledger {
    store: Arc<dyn Store>,
    /// Last assigned seq. Initialised from the store on open.
    next_seq: AtomicU64,
    /// One mutex per (account, kind) that has seen a write this process.
    account_locks: Mutex<HashMap<(AccountId, u8), Arc<Mutex<()>>>>,
    bus: EventBus,
}

impl Ledger {
    /// Open the ledger over a store, resuming sequence numbers.
    pub fn open(store: Arc<dyn Store>, bus: EventBus) -> Result<Self, LedgerError> {
        let last = store.last_seq()?;
        Ok(Self {
            store,
            next_seq: AtomicU64::new(last),
            account_locks: Mutex::new(HashMap::new()),
            bus,
        })
    }

    fn lock_for(&self, account: &AccountId, kind: TokenKind) -> Arc<Mutex<()>> {
        let mut locks = self.account_locks.lock().expect("lock map poisoned");
        Arc::clone(
            locks
                .entry((*account, kind.as_u8()))
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }

    /// Append a signed delta for one account+kind.
    ///
    /// Serialized per account+kind. Fails with `InsufficientBalance` when a
    /// negative delta would drive the balance below zero, and with
    /// `DuplicateCorrelation` when this correlation id was already applied
    /// for the same account+kind — a retried network-failed write must not
    /// double-charge.
    pub fn append(
        &self,
        account_id: &AccountId,
        kind: TokenKind,
        delta: i128,
        reason_code: ReasonCode,
        correlation_id: CorrelationId,
        now: Timestamp,
    ) -> Result<LedgerEntry, LedgerError> {
        if delta == 0 {
            return Err(LedgerError::ZeroDelta);
        }

        let lock = self.lock_for(account_id, kind);
        let _guard = lock.lock().expect("account lock poisoned");

        if let Some(applied_seq) = self.store.correlation_seq(account_id, kind, &correlation_id)? {
            return Err(LedgerError::DuplicateCorrelation { applied_seq });
        }

        let available = self
            .store
            .latest_entry(account_id, kind)?
            .map(|e| e.resulting_balance)
            .unwrap_or(0);

        let resulting_balance = if delta >= 0 {
            available
                .checked_add(delta as u128)
                .ok_or(LedgerError::Overflow)?
        } else {
            let needed = delta.unsigned_abs();
            if needed > available {
                return Err(LedgerError::InsufficientBalance {
                    kind,
                    needed,
                    available,
                });
            }
            available - needed
        };

        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let entry = LedgerEntry {
            seq,
            account_id: *account_id,
            kind,
            delta,
            reason_code,
            correlation_id,
            timestamp: now,
            resulting_balance,
        };
        self.store.put_entry(&entry)?;

        tracing::debug!(
            account = %account_id,
            kind = %kind,
            delta,
            seq,
            balance = resulting_balance,
            reason = %reason_code,
            "ledger append"
        );
        self.bus.emit(&LedgerEvent::EntryAppended(entry.clone()));
        Ok(entry)
    }

    /// Current balance for one account+kind (0 for untouched kinds).
    pub fn balance(&self, account_id: &AccountId, kind: TokenKind) -> Result<u128, LedgerError> {
        Ok(self
            .store
            .latest_entry(account_id, kind)?
            .map(|e| e.resulting_balance)
            .unwrap_or(0))
    }

    /// Ordered, restartable history slice for one account+kind.
    pub fn history(
        &self,
        account_id: &AccountId,
        kind: TokenKind,
        since_seq: u64,
        limit: usize,
    ) -> Result<Vec<LedgerEntry>, LedgerError> {
        Ok(self.store.entries_for(account_id, kind, since_seq, limit)?)
    }

    /// Fetch the account record, creating it on first contact.
    pub fn ensure_account(
        &self,
        account_id: &AccountId,
        now: Timestamp,
    ) -> Result<AccountInfo, LedgerError> {
        match self.store.get_account(account_id) {
            Ok(info) => Ok(info),
            Err(StoreError::NotFound(_)) => {
                let info = AccountInfo::new(*account_id, now);
                self.store.put_account(&info)?;
                tracing::info!(account = %account_id, "account created on first contact");
                self.bus.emit(&LedgerEvent::AccountCreated {
                    account_id: *account_id,
                });
                Ok(info)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Soft-delete: accounts are never removed, only marked inactive.
    ///
    /// Goes through the store's atomic update so a concurrent trust
    /// recompute rewriting its own fields cannot resurrect the flag.
    pub fn deactivate_account(&self, account_id: &AccountId) -> Result<(), LedgerError> {
        let mut was_active = false;
        self.store.update_account(account_id, &mut |info| {
            was_active = info.active;
            info.active = false;
        })?;
        if was_active {
            self.bus.emit(&LedgerEvent::AccountDeactivated {
                account_id: *account_id,
            });
        }
        Ok(())
    }

    /// Balances across all kinds plus the cached trust assessment.
    pub fn snapshot(&self, account_id: &AccountId) -> Result<AccountSnapshot, LedgerError> {
        let info = self.store.get_account(account_id)?;
        let mut balances = Vec::with_capacity(TokenKind::ALL.len());
        for kind in TokenKind::ALL {
            balances.push(KindBalance {
                kind,
                balance: self.balance(account_id, kind)?,
            });
        }
        Ok(AccountSnapshot {
            account_id: *account_id,
            active: info.active,
            balances,
            trust_score: info.trust_score,
            tier: info.tier,
        })
    }

    /// The backing store (read access for the trust engine and HTTP layer).
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use soulfra_store::MemoryStore;

    fn test_ledger() -> Ledger {
        Ledger::open(Arc::new(MemoryStore::new()), EventBus::new()).unwrap()
    }

    fn account(n: u8) -> AccountId {
        AccountId::new([n; 32])
    }

    fn corr(n: u8) -> CorrelationId {
        CorrelationId::new([n; 32])
    }

    #[test]
    fn append_tracks_running_balance() {
        let ledger = test_ledger();
        let a = account(1);
        let now = Timestamp::new(1000);

        let e1 = ledger
            .append(&a, TokenKind::SpendableCoin, 100, ReasonCode::LaborPayout, corr(1), now)
            .unwrap();
        assert_eq!(e1.resulting_balance, 100);

        let e2 = ledger
            .append(&a, TokenKind::SpendableCoin, -30, ReasonCode::ProviderCharge, corr(2), now)
            .unwrap();
        assert_eq!(e2.resulting_balance, 70);
        assert_eq!(ledger.balance(&a, TokenKind::SpendableCoin).unwrap(), 70);
    }

    #[test]
    fn balance_never_goes_negative() {
        let ledger = test_ledger();
        let a = account(1);
        let now = Timestamp::new(1000);

        ledger
            .append(&a, TokenKind::SpendableCoin, 10, ReasonCode::LaborPayout, corr(1), now)
            .unwrap();
        let err = ledger
            .append(&a, TokenKind::SpendableCoin, -11, ReasonCode::ProviderCharge, corr(2), now)
            .unwrap_err();
        match err {
            LedgerError::InsufficientBalance { needed, available, .. } => {
                assert_eq!(needed, 11);
                assert_eq!(available, 10);
            }
            other => panic!("expected InsufficientBalance, got {other:?}"),
        }
        // The failed append leaves no trace.
        assert_eq!(ledger.balance(&a, TokenKind::SpendableCoin).unwrap(), 10);
        assert_eq!(ledger.history(&a, TokenKind::SpendableCoin, 0, 10).unwrap().len(), 1);
    }

    #[test]
    fn duplicate_correlation_applies_once() {
        let ledger = test_ledger();
        let a = account(1);
        let now = Timestamp::new(1000);
        let c = corr(7);

        let first = ledger
            .append(&a, TokenKind::SpendableCoin, 50, ReasonCode::LaborPayout, c, now)
            .unwrap();
        let err = ledger
            .append(&a, TokenKind::SpendableCoin, 50, ReasonCode::LaborPayout, c, now)
            .unwrap_err();
        match err {
            LedgerError::DuplicateCorrelation { applied_seq } => {
                assert_eq!(applied_seq, first.seq);
            }
            other => panic!("expected DuplicateCorrelation, got {other:?}"),
        }
        assert_eq!(ledger.balance(&a, TokenKind::SpendableCoin).unwrap(), 50);
    }

    #[test]
    fn same_correlation_different_kind_is_distinct() {
        let ledger = test_ledger();
        let a = account(1);
        let now = Timestamp::new(1000);
        let c = corr(7);

        ledger
            .append(&a, TokenKind::SpendableCoin, 50, ReasonCode::LaborPayout, c, now)
            .unwrap();
        ledger
            .append(&a, TokenKind::EarnedCredit, 1, ReasonCode::Contribution, c, now)
            .unwrap();
        assert_eq!(ledger.balance(&a, TokenKind::EarnedCredit).unwrap(), 1);
    }

    #[test]
    fn zero_delta_rejected() {
        let ledger = test_ledger();
        let err = ledger
            .append(
                &account(1),
                TokenKind::SpendableCoin,
                0,
                ReasonCode::Adjustment,
                corr(1),
                Timestamp::new(1000),
            )
            .unwrap_err();
        assert!(matches!(err, LedgerError::ZeroDelta));
    }

    #[test]
    fn ensure_account_is_idempotent() {
        let ledger = test_ledger();
        let a = account(4);
        let now = Timestamp::new(500);
        let first = ledger.ensure_account(&a, now).unwrap();
        let second = ledger.ensure_account(&a, Timestamp::new(900)).unwrap();
        assert_eq!(first.created_at, second.created_at);
    }

    #[test]
    fn deactivate_keeps_history() {
        let ledger = test_ledger();
        let a = account(5);
        let now = Timestamp::new(500);
        ledger.ensure_account(&a, now).unwrap();
        ledger
            .append(&a, TokenKind::SpendableCoin, 10, ReasonCode::LaborPayout, corr(1), now)
            .unwrap();
        ledger.deactivate_account(&a).unwrap();

        let snap = ledger.snapshot(&a).unwrap();
        assert!(!snap.active);
        assert_eq!(ledger.history(&a, TokenKind::SpendableCoin, 0, 10).unwrap().len(), 1);
    }

    #[test]
    fn sequences_resume_after_reopen() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let a = account(6);
        let now = Timestamp::new(1000);
        {
            let ledger = Ledger::open(Arc::clone(&store), EventBus::new()).unwrap();
            ledger
                .append(&a, TokenKind::SpendableCoin, 10, ReasonCode::LaborPayout, corr(1), now)
                .unwrap();
        }
        let ledger = Ledger::open(store, EventBus::new()).unwrap();
        let e = ledger
            .append(&a, TokenKind::SpendableCoin, 5, ReasonCode::LaborPayout, corr(2), now)
            .unwrap();
        assert_eq!(e.seq, 2);
        assert_eq!(e.resulting_balance, 15);
    }

    #[test]
    fn append_emits_event() {
        use std::sync::atomic::{AtomicU64, Ordering};

        let seen = Arc::new(AtomicU64::new(0));
        let seen2 = Arc::clone(&seen);
        let mut bus = EventBus::new();
        bus.subscribe(Box::new(move |event| {
            if let LedgerEvent::EntryAppended(entry) = event {
                seen2.store(entry.seq, Ordering::SeqCst);
            }
        }));
        let ledger = Ledger::open(Arc::new(MemoryStore::new()), bus).unwrap();
        let e = ledger
            .append(
                &account(1),
                TokenKind::SpendableCoin,
                10,
                ReasonCode::LaborPayout,
                corr(1),
                Timestamp::new(1000),
            )
            .unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), e.seq);
    }
}
