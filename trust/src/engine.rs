//! Core trust scoring and tier assignment.
//!
//! `recompute` is idempotent and side-effect-free aside from refreshing the
//! cached assessment on the account record, when one exists — assessing an
//! unknown account never creates one. It is deterministic given the
//! same ledger history *and* wall-clock time: the decay term depends on time
//! since the last positive event, so trust is intentionally not a pure
//! function of history alone. Callers pass `now` explicitly so tests and
//! replays stay reproducible.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use soulfra_store::Store;
use soulfra_types::{
    AccountId, GatewayParams, LedgerEntry, ReasonCode, Timestamp, TokenKind, TrustTier,
};

use crate::error::TrustError;

const HISTORY_PAGE: usize = 512;

/// The components that produced a score, returned for the trust endpoint.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// Positive `EarnedCredit` events inside the trailing window.
    pub window_credit_events: u64,
    /// Distinct contribution reason codes inside the window (pre-cap).
    pub distinct_contribution_codes: u64,
    /// Whole decay steps of inactivity.
    pub idle_steps: u64,
    /// Explicit penalty entries over all history.
    pub penalty_events: u64,
}

/// Result of a recompute: the score, the tier it maps to, and how it was built.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TierAssessment {
    pub score: i64,
    pub tier: TrustTier,
    pub breakdown: ScoreBreakdown,
}

/// Whether a demotion may bypass the flap-damping cooldown.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Demotion {
    /// Honor the cooldown: a downward crossing inside the window is deferred.
    Debounced,
    /// Apply immediately (explicit penalty — abuse must be demotable
    /// independent of historical score).
    Immediate,
}

/// Computes and caches per-account trust assessments.
///
/// Reads the ledger through the store traits only; never writes entries.
pub struct TrustEngine {
    store: Arc<dyn Store>,
    params: GatewayParams,
}

impl TrustEngine {
    pub fn new(store: Arc<dyn Store>, params: GatewayParams) -> Self {
        Self { store, params }
    }

    /// The cached tier from the last recompute (tier 0 for unknown accounts).
    pub fn current_tier(&self, account_id: &AccountId) -> Result<TrustTier, TrustError> {
        match self.store.get_account(account_id) {
            Ok(info) => Ok(info.tier),
            Err(soulfra_store::StoreError::NotFound(_)) => Ok(TrustTier::MIN),
            Err(e) => Err(e.into()),
        }
    }

    /// Recompute the assessment from ledger history and refresh the cache.
    pub fn recompute(
        &self,
        account_id: &AccountId,
        now: Timestamp,
    ) -> Result<TierAssessment, TrustError> {
        self.recompute_inner(account_id, now, Demotion::Debounced)
    }

    /// Incremental update hook wired to the ledger event bus.
    ///
    /// Penalties demote immediately; every other entry goes through the
    /// normal debounced path. Failures are logged, not propagated — the
    /// append that triggered the event has already committed.
    pub fn on_ledger_event(&self, entry: &LedgerEntry, now: Timestamp) {
        let demotion = if entry.is_penalty() {
            Demotion::Immediate
        } else {
            Demotion::Debounced
        };
        if let Err(e) = self.recompute_inner(&entry.account_id, now, demotion) {
            tracing::warn!(account = %entry.account_id, error = %e, "trust recompute failed");
        }
    }

    fn recompute_inner(
        &self,
        account_id: &AccountId,
        now: Timestamp,
        demotion: Demotion,
    ) -> Result<TierAssessment, TrustError> {
        let known = match self.store.get_account(account_id) {
            Ok(info) => Some(info),
            // No account record yet: assess over an empty cache, but do not
            // persist — accounts are created on first authenticated contact,
            // never by an anonymous read.
            Err(soulfra_store::StoreError::NotFound(_)) => None,
            Err(e) => return Err(e.into()),
        };

        let scan = self.scan_history(account_id)?;
        let created_at = known.as_ref().map_or(now, |info| info.created_at);
        let breakdown = self.breakdown(&scan, created_at, now);
        let score = self.score(&breakdown);
        let computed = self.tier_for_score(score);

        if known.is_none() {
            return Ok(TierAssessment {
                score,
                tier: computed,
                breakdown,
            });
        }

        // The tier decision runs inside the store's atomic update, against
        // whatever the record holds right now, and touches only the trust
        // fields — a concurrent deactivation keeps its `active` flag.
        let cooldown = self.params.tier_cooldown_secs;
        let mut applied = computed;
        self.store.update_account(account_id, &mut |info| {
            let tier = if computed >= info.tier {
                computed
            } else {
                // Downward crossings are debounced to stop transient
                // activity dips from flapping the tier.
                let cooled_down = info.tier_changed_at.has_expired(cooldown, now);
                if demotion == Demotion::Immediate || cooled_down {
                    computed
                } else {
                    info.tier
                }
            };
            if tier != info.tier {
                tracing::info!(
                    account = %info.id,
                    from = %info.tier,
                    to = %tier,
                    score,
                    "trust tier changed"
                );
                info.tier = tier;
                info.tier_changed_at = now;
            }
            info.trust_score = score;
            info.last_positive_at = scan.last_positive_at.or(info.last_positive_at);
            info.penalty_count = scan.penalty_events;
            applied = tier;
        })?;

        Ok(TierAssessment {
            score,
            tier: applied,
            breakdown,
        })
    }

    fn scan_history(&self, account_id: &AccountId) -> Result<HistoryScan, TrustError> {
        let mut scan = HistoryScan::default();
        for kind in TokenKind::ALL {
            let mut since = 0u64;
            loop {
                let page = self
                    .store
                    .entries_for(account_id, kind, since, HISTORY_PAGE)?;
                let Some(last) = page.last() else { break };
                since = last.seq;
                let full = page.len() == HISTORY_PAGE;
                for entry in page {
                    if entry.is_positive_event() {
                        scan.positives.push((entry.timestamp, entry.reason_code, entry.kind));
                        scan.last_positive_at = Some(
                            scan.last_positive_at
                                .map_or(entry.timestamp, |t: Timestamp| t.max(entry.timestamp)),
                        );
                    }
                    if entry.is_penalty() {
                        scan.penalty_events += 1;
                    }
                }
                if !full {
                    break;
                }
            }
        }
        Ok(scan)
    }

    fn breakdown(&self, scan: &HistoryScan, created_at: Timestamp, now: Timestamp) -> ScoreBreakdown {
        let window_secs = self.params.trust_window_days * 86_400;
        let in_window =
            |ts: &Timestamp| -> bool { ts.elapsed_since(now) <= window_secs };

        let window_credit_events = scan
            .positives
            .iter()
            .filter(|(ts, _, kind)| *kind == TokenKind::EarnedCredit && in_window(ts))
            .count() as u64;

        let distinct: HashSet<ReasonCode> = scan
            .positives
            .iter()
            .filter(|(ts, _, _)| in_window(ts))
            .map(|(_, reason, _)| *reason)
            .collect();

        // Inactivity is measured from the last positive event, or account
        // creation when there has never been one.
        let idle_anchor = scan.last_positive_at.unwrap_or(created_at);
        let idle_steps = if self.params.trust_decay_step_days == 0 {
            0
        } else {
            idle_anchor.days_since(now) / self.params.trust_decay_step_days
        };

        ScoreBreakdown {
            window_credit_events,
            distinct_contribution_codes: distinct.len() as u64,
            idle_steps,
            penalty_events: scan.penalty_events,
        }
    }

    fn score(&self, b: &ScoreBreakdown) -> i64 {
        let p = &self.params;
        let diversity = b
            .distinct_contribution_codes
            .min(u64::from(p.trust_diversity_cap)) as i64;
        p.trust_credit_weight.saturating_mul(b.window_credit_events as i64)
            + p.trust_diversity_weight.saturating_mul(diversity)
            - p.trust_decay_weight.saturating_mul(b.idle_steps as i64)
            - p.trust_penalty_weight.saturating_mul(b.penalty_events as i64)
    }

    /// Monotone step function from score to tier.
    fn tier_for_score(&self, score: i64) -> TrustTier {
        let level = self
            .params
            .tier_thresholds
            .partition_point(|threshold| score >= *threshold);
        TrustTier::new(level as u8)
    }
}

#[derive(Default)]
struct HistoryScan {
    positives: Vec<(Timestamp, ReasonCode, TokenKind)>,
    last_positive_at: Option<Timestamp>,
    penalty_events: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use soulfra_store::{AccountInfo, MemoryStore};
    use soulfra_types::{CorrelationId, LedgerEntry};

    const DAY: u64 = 86_400;

    fn account(n: u8) -> AccountId {
        AccountId::new([n; 32])
    }

    struct Fixture {
        store: Arc<MemoryStore>,
        engine: TrustEngine,
        next_seq: u64,
    }

    impl Fixture {
        fn new() -> Self {
            Self::with_params(GatewayParams::default())
        }

        fn with_params(params: GatewayParams) -> Self {
            let store = Arc::new(MemoryStore::new());
            let engine = TrustEngine::new(Arc::clone(&store) as Arc<dyn Store>, params);
            Self {
                store,
                engine,
                next_seq: 0,
            }
        }

        fn put(
            &mut self,
            account: AccountId,
            kind: TokenKind,
            delta: i128,
            reason: ReasonCode,
            ts: u64,
        ) -> LedgerEntry {
            use soulfra_store::EntryStore;
            self.next_seq += 1;
            let entry = LedgerEntry {
                seq: self.next_seq,
                account_id: account,
                kind,
                delta,
                reason_code: reason,
                correlation_id: CorrelationId::new([self.next_seq as u8; 32]),
                timestamp: Timestamp::new(ts),
                resulting_balance: delta.max(0) as u128,
            };
            self.store.put_entry(&entry).unwrap();
            entry
        }

        fn seed_account(&self, account: AccountId, created: u64) {
            use soulfra_store::AccountStore;
            self.store
                .put_account(&AccountInfo::new(account, Timestamp::new(created)))
                .unwrap();
        }
    }

    #[test]
    fn contribution_events_advance_tier_on_next_recompute() {
        let mut fx = Fixture::new();
        let a = account(1);
        fx.seed_account(a, 0);
        for i in 0..10 {
            fx.put(a, TokenKind::EarnedCredit, 1, ReasonCode::Contribution, i * 100);
        }
        let assessment = fx.engine.recompute(&a, Timestamp::new(2000)).unwrap();
        // 10 credit events * 10 + diversity 5 = 105 → several tiers up from 0.
        assert!(assessment.tier > TrustTier::MIN, "tier should advance");
        assert_eq!(assessment.breakdown.window_credit_events, 10);
        assert_eq!(fx.engine.current_tier(&a).unwrap(), assessment.tier);
    }

    #[test]
    fn recompute_is_stable_without_new_events() {
        let mut fx = Fixture::new();
        let a = account(1);
        fx.seed_account(a, 0);
        for i in 0..5 {
            fx.put(a, TokenKind::EarnedCredit, 1, ReasonCode::Contribution, i * 100);
        }
        let now = Timestamp::new(5000);
        let first = fx.engine.recompute(&a, now).unwrap();
        let second = fx.engine.recompute(&a, now).unwrap();
        assert_eq!(first.tier, second.tier);
        assert_eq!(first.score, second.score);
    }

    #[test]
    fn idle_account_decays_at_least_one_step() {
        let mut fx = Fixture::new();
        let a = account(1);
        fx.seed_account(a, 0);
        for i in 0..10 {
            fx.put(a, TokenKind::EarnedCredit, 1, ReasonCode::Contribution, i * 100);
        }
        let early = fx.engine.recompute(&a, Timestamp::new(2000)).unwrap();
        assert!(early.tier > TrustTier::MIN);

        // 90 idle days after the last event at t=900: window empties and
        // three decay steps land.
        let late = fx.engine.recompute(&a, Timestamp::new(90 * DAY + 900)).unwrap();
        assert!(late.tier < early.tier, "tier should decay after inactivity");
        assert_eq!(late.breakdown.idle_steps, 3);
        assert_eq!(late.breakdown.window_credit_events, 0);
    }

    #[test]
    fn demotion_is_debounced_within_cooldown() {
        let mut fx = Fixture::with_params(GatewayParams {
            tier_cooldown_secs: 100 * DAY,
            ..GatewayParams::default()
        });
        let a = account(1);
        fx.seed_account(a, 0);
        for i in 0..10 {
            fx.put(a, TokenKind::EarnedCredit, 1, ReasonCode::Contribution, i);
        }
        let up = fx.engine.recompute(&a, Timestamp::new(DAY)).unwrap();
        assert!(up.tier > TrustTier::MIN);

        // 60 days later the window is empty and decay has landed, but the
        // cooldown since the last tier change has not elapsed — held.
        let held = fx.engine.recompute(&a, Timestamp::new(60 * DAY)).unwrap();
        assert_eq!(held.tier, up.tier);
        assert!(held.score < up.score, "score still reflects reality");

        // Once the cooldown has run out the demotion goes through.
        let down = fx.engine.recompute(&a, Timestamp::new(150 * DAY)).unwrap();
        assert!(down.tier < up.tier);
    }

    #[test]
    fn penalty_demotes_immediately_despite_cooldown() {
        let mut fx = Fixture::new();
        let a = account(1);
        fx.seed_account(a, 0);
        for i in 0..10 {
            fx.put(a, TokenKind::EarnedCredit, 1, ReasonCode::Contribution, i);
        }
        let up = fx.engine.recompute(&a, Timestamp::new(1000)).unwrap();
        assert!(up.tier > TrustTier::MIN);

        // Three penalties moments later — inside the cooldown window.
        let penalty =
            fx.put(a, TokenKind::EarnedCredit, -1, ReasonCode::Penalty, 1100);
        fx.put(a, TokenKind::EarnedCredit, -1, ReasonCode::Penalty, 1200);
        fx.put(a, TokenKind::EarnedCredit, -1, ReasonCode::Penalty, 1300);
        fx.engine.on_ledger_event(&penalty, Timestamp::new(1400));

        let now_tier = fx.engine.current_tier(&a).unwrap();
        assert!(now_tier < up.tier, "penalty must demote without waiting out the cooldown");
    }

    #[test]
    fn unknown_account_sits_at_tier_zero() {
        let fx = Fixture::new();
        assert_eq!(fx.engine.current_tier(&account(9)).unwrap(), TrustTier::MIN);
    }

    #[test]
    fn recompute_of_unknown_account_persists_nothing() {
        use soulfra_store::AccountStore;
        let fx = Fixture::new();
        let a = account(9);
        let assessment = fx.engine.recompute(&a, Timestamp::new(1000)).unwrap();
        assert_eq!(assessment.tier, TrustTier::MIN);
        // A read must not create an account record.
        assert!(!fx.store.exists(&a).unwrap());
        assert_eq!(fx.store.account_count().unwrap(), 0);
    }

    #[test]
    fn recompute_only_touches_trust_fields() {
        use soulfra_store::AccountStore;
        let mut fx = Fixture::new();
        let a = account(1);
        fx.seed_account(a, 0);
        fx.store
            .update_account(&a, &mut |info| info.active = false)
            .unwrap();
        for i in 0..5 {
            fx.put(a, TokenKind::EarnedCredit, 1, ReasonCode::Contribution, i * 100);
        }
        fx.engine.recompute(&a, Timestamp::new(1000)).unwrap();
        let info = fx.store.get_account(&a).unwrap();
        assert!(!info.active, "recompute must not resurrect a deactivated account");
        assert!(info.trust_score > 0);
    }

    #[test]
    fn diversity_bonus_is_capped() {
        let mut fx = Fixture::new();
        let a = account(1);
        fx.seed_account(a, 0);
        fx.put(a, TokenKind::EarnedCredit, 1, ReasonCode::Contribution, 100);
        fx.put(a, TokenKind::SpendableCoin, 1, ReasonCode::LaborPayout, 200);
        fx.put(a, TokenKind::Fragment, 1, ReasonCode::FragmentDrop, 300);
        let assessment = fx.engine.recompute(&a, Timestamp::new(1000)).unwrap();
        assert_eq!(assessment.breakdown.distinct_contribution_codes, 3);
        // credit 10 + diversity capped at 3 * 5 = 25.
        assert_eq!(assessment.score, 25);
    }
}
