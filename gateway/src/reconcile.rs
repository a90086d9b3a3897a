//! Reconciliation of "paid but not billed" dispatches.
//!
//! When a provider has already answered but the post-dispatch ledger write
//! fails, the caller still gets their result — the gateway must not burn a
//! provider call over its own bookkeeping. The failed charge is queued here
//! and an async worker retries the append with the *same* correlation id,
//! so a charge that actually landed (or lands twice) collapses via the
//! ledger's idempotency check.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use soulfra_ledger::{Ledger, LedgerError};
use soulfra_types::id::{AccountId, CorrelationId};
use soulfra_types::kind::{ReasonCode, TokenKind};
use soulfra_types::time::Timestamp;

/// One charge that was served but not yet written to the ledger.
#[derive(Clone, Debug)]
pub struct ReconciliationRecord {
    pub account_id: AccountId,
    pub correlation_id: CorrelationId,
    pub kind: TokenKind,
    /// Positive amount to deduct.
    pub cost: u128,
    pub provider: String,
    pub enqueued_at: Timestamp,
}

/// Producer half: bounded, non-blocking. A full queue is an operational
/// emergency, not a reason to stall request handling.
#[derive(Clone)]
pub struct ReconcileQueue {
    tx: mpsc::Sender<ReconciliationRecord>,
}

impl ReconcileQueue {
    pub fn bounded(depth: usize) -> (Self, mpsc::Receiver<ReconciliationRecord>) {
        let (tx, rx) = mpsc::channel(depth.max(1));
        (Self { tx }, rx)
    }

    /// Enqueue a record for retry. Returns false (and logs at error, with
    /// full correlation detail for manual repair) when the queue is full.
    pub fn enqueue(&self, record: ReconciliationRecord) -> bool {
        match self.tx.try_send(record) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(record))
            | Err(mpsc::error::TrySendError::Closed(record)) => {
                error!(
                    account = %record.account_id,
                    correlation = %record.correlation_id,
                    cost = record.cost,
                    provider = %record.provider,
                    "reconciliation queue unavailable, charge not recorded"
                );
                false
            }
        }
    }
}

/// Consumer half: drains the queue and retries each charge until it lands.
pub struct ReconcileWorker {
    ledger: Arc<Ledger>,
    rx: mpsc::Receiver<ReconciliationRecord>,
    retry_delay: std::time::Duration,
}

impl ReconcileWorker {
    pub fn new(
        ledger: Arc<Ledger>,
        rx: mpsc::Receiver<ReconciliationRecord>,
        retry_delay: std::time::Duration,
    ) -> Self {
        Self {
            ledger,
            rx,
            retry_delay,
        }
    }

    pub async fn run(mut self, mut shutdown: tokio::sync::broadcast::Receiver<()>) {
        let mut pending: VecDeque<ReconciliationRecord> = VecDeque::new();
        loop {
            if pending.is_empty() {
                tokio::select! {
                    record = self.rx.recv() => match record {
                        Some(record) => pending.push_back(record),
                        None => return,
                    },
                    _ = shutdown.recv() => {
                        info!("reconciliation worker stopping");
                        return;
                    }
                }
            }
            // Pick up everything already queued before the pass.
            while let Ok(record) = self.rx.try_recv() {
                pending.push_back(record);
            }

            // One attempt per record per pass. A record that cannot settle
            // yet (account not topped up, storage down) goes to the back so
            // it never starves the records behind it.
            for _ in 0..pending.len() {
                let record = pending.pop_front().expect("pending is non-empty");
                if !self.settle(&record) {
                    pending.push_back(record);
                }
            }

            if !pending.is_empty() {
                tokio::select! {
                    _ = tokio::time::sleep(self.retry_delay) => {}
                    _ = shutdown.recv() => {
                        for record in &pending {
                            error!(
                                account = %record.account_id,
                                correlation = %record.correlation_id,
                                cost = record.cost,
                                "shutdown with unreconciled charge"
                            );
                        }
                        return;
                    }
                }
            }
        }
    }

    /// One settlement attempt. Returns true when the record is done with
    /// (charge landed, already applied, or dropped), false when it should
    /// be retried on a later pass.
    fn settle(&self, record: &ReconciliationRecord) -> bool {
        match self.ledger.append(
            &record.account_id,
            record.kind,
            -(record.cost as i128),
            ReasonCode::Reconciliation,
            record.correlation_id,
            Timestamp::now(),
        ) {
            Ok(entry) => {
                info!(
                    account = %record.account_id,
                    correlation = %record.correlation_id,
                    seq = entry.seq,
                    cost = record.cost,
                    "reconciled charge"
                );
                true
            }
            // The original write landed after all; nothing owed.
            Err(LedgerError::DuplicateCorrelation { applied_seq }) => {
                info!(
                    account = %record.account_id,
                    correlation = %record.correlation_id,
                    applied_seq,
                    "charge was already applied"
                );
                true
            }
            Err(LedgerError::ZeroDelta) => {
                warn!(correlation = %record.correlation_id, "zero-cost record dropped");
                true
            }
            // Balance may be topped up later; storage may come back.
            Err(e) => {
                warn!(
                    account = %record.account_id,
                    correlation = %record.correlation_id,
                    error = %e,
                    "reconciliation attempt failed, will retry"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use soulfra_ledger::EventBus;
    use soulfra_store::memory::MemoryStore;
    use soulfra_types::id::RequestId;

    fn ledger() -> Arc<Ledger> {
        Arc::new(Ledger::open(Arc::new(MemoryStore::new()), EventBus::new()).unwrap())
    }

    fn record(account: AccountId, correlation: CorrelationId, cost: u128) -> ReconciliationRecord {
        ReconciliationRecord {
            account_id: account,
            correlation_id: correlation,
            kind: TokenKind::SpendableCoin,
            cost,
            provider: "mock".into(),
            enqueued_at: Timestamp::now(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn charge_lands_once_balance_allows() {
        let ledger = ledger();
        let account = AccountId::new([1u8; 32]);
        let correlation =
            CorrelationId::derive(&RequestId::new([2u8; 32]), TokenKind::SpendableCoin);

        let (queue, rx) = ReconcileQueue::bounded(8);
        let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);
        let worker = ReconcileWorker::new(ledger.clone(), rx, Duration::from_secs(1));
        let handle = tokio::spawn(worker.run(shutdown_rx));

        // Account has no coin yet: the first attempts fail and retry.
        assert!(queue.enqueue(record(account, correlation, 5)));
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(
            ledger.balance(&account, TokenKind::SpendableCoin).unwrap(),
            0
        );

        // Fund the account; the next retry settles the charge.
        ledger
            .append(
                &account,
                TokenKind::SpendableCoin,
                20,
                ReasonCode::Adjustment,
                CorrelationId::derive(&RequestId::new([3u8; 32]), TokenKind::SpendableCoin),
                Timestamp::now(),
            )
            .unwrap();
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(
            ledger.balance(&account, TokenKind::SpendableCoin).unwrap(),
            15
        );

        shutdown_tx.send(()).unwrap();
        let _ = handle.await;
    }

    #[tokio::test(start_paused = true)]
    async fn already_applied_charge_is_not_doubled() {
        let ledger = ledger();
        let account = AccountId::new([4u8; 32]);
        let correlation =
            CorrelationId::derive(&RequestId::new([5u8; 32]), TokenKind::SpendableCoin);

        ledger
            .append(
                &account,
                TokenKind::SpendableCoin,
                20,
                ReasonCode::Adjustment,
                CorrelationId::derive(&RequestId::new([6u8; 32]), TokenKind::SpendableCoin),
                Timestamp::now(),
            )
            .unwrap();
        // The "failed" write actually landed.
        ledger
            .append(
                &account,
                TokenKind::SpendableCoin,
                -5,
                ReasonCode::ProviderCharge,
                correlation,
                Timestamp::now(),
            )
            .unwrap();

        let (queue, rx) = ReconcileQueue::bounded(8);
        let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);
        let worker = ReconcileWorker::new(ledger.clone(), rx, Duration::from_secs(1));
        let handle = tokio::spawn(worker.run(shutdown_rx));

        assert!(queue.enqueue(record(account, correlation, 5)));
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(
            ledger.balance(&account, TokenKind::SpendableCoin).unwrap(),
            15
        );

        shutdown_tx.send(()).unwrap();
        let _ = handle.await;
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_charge_does_not_starve_the_queue() {
        let ledger = ledger();
        let broke = AccountId::new([9u8; 32]);
        let funded = AccountId::new([10u8; 32]);
        let broke_corr =
            CorrelationId::derive(&RequestId::new([11u8; 32]), TokenKind::SpendableCoin);
        let funded_corr =
            CorrelationId::derive(&RequestId::new([12u8; 32]), TokenKind::SpendableCoin);

        ledger
            .append(
                &funded,
                TokenKind::SpendableCoin,
                100,
                ReasonCode::Adjustment,
                CorrelationId::derive(&RequestId::new([13u8; 32]), TokenKind::SpendableCoin),
                Timestamp::now(),
            )
            .unwrap();

        let (queue, rx) = ReconcileQueue::bounded(8);
        let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);
        let worker = ReconcileWorker::new(ledger.clone(), rx, Duration::from_secs(1));
        let handle = tokio::spawn(worker.run(shutdown_rx));

        // The broke account's charge cannot settle; the funded one behind
        // it must still go through.
        assert!(queue.enqueue(record(broke, broke_corr, 5)));
        assert!(queue.enqueue(record(funded, funded_corr, 5)));
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(
            ledger.balance(&funded, TokenKind::SpendableCoin).unwrap(),
            95
        );
        assert_eq!(
            ledger.balance(&broke, TokenKind::SpendableCoin).unwrap(),
            0
        );

        // Once the broke account is topped up, its charge settles too.
        ledger
            .append(
                &broke,
                TokenKind::SpendableCoin,
                20,
                ReasonCode::Adjustment,
                CorrelationId::derive(&RequestId::new([14u8; 32]), TokenKind::SpendableCoin),
                Timestamp::now(),
            )
            .unwrap();
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(
            ledger.balance(&broke, TokenKind::SpendableCoin).unwrap(),
            15
        );

        shutdown_tx.send(()).unwrap();
        let _ = handle.await;
    }

    #[tokio::test]
    async fn full_queue_reports_failure() {
        let (queue, _rx) = ReconcileQueue::bounded(1);
        let account = AccountId::new([7u8; 32]);
        let correlation =
            CorrelationId::derive(&RequestId::new([8u8; 32]), TokenKind::SpendableCoin);
        assert!(queue.enqueue(record(account, correlation, 1)));
        assert!(!queue.enqueue(record(account, correlation, 1)));
    }
}
