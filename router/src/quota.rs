use std::collections::HashMap;
use std::sync::Mutex;

use tokio::time::Instant;
use tracing::debug;

use soulfra_types::id::AccountId;
use soulfra_types::params::GatewayParams;
use soulfra_types::tier::TrustTier;

struct Bucket {
    tokens: f64,
    rate_per_min: u32,
    last_refill: Instant,
}

/// Per-account token buckets sized by trust tier.
///
/// Each account refills at `quota_for_tier(tier)` requests per minute and
/// can burst up to `quota_burst_factor` times that rate. Buckets resize in
/// place when an account's tier changes between calls.
pub struct QuotaLedger {
    buckets: Mutex<HashMap<AccountId, Bucket>>,
    params: GatewayParams,
}

impl QuotaLedger {
    pub fn new(params: GatewayParams) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            params,
        }
    }

    /// Take one request token for this account, refilling first. Returns
    /// false when the bucket is empty.
    pub fn try_acquire(&self, account: &AccountId, tier: TrustTier) -> bool {
        let now = Instant::now();
        let rate = self.params.quota_for_tier(tier.level());
        let capacity = f64::from(rate.saturating_mul(self.params.quota_burst_factor));

        let mut buckets = self.buckets.lock().expect("quota lock poisoned");
        let bucket = buckets.entry(*account).or_insert_with(|| Bucket {
            tokens: capacity,
            rate_per_min: rate,
            last_refill: now,
        });

        if bucket.rate_per_min != rate {
            bucket.rate_per_min = rate;
        }

        let elapsed = now.saturating_duration_since(bucket.last_refill);
        bucket.last_refill = now;
        bucket.tokens =
            (bucket.tokens + elapsed.as_secs_f64() * f64::from(rate) / 60.0).min(capacity);

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            debug!(account = %account, %tier, "quota exhausted");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn account(byte: u8) -> AccountId {
        AccountId::new([byte; 32])
    }

    #[tokio::test(start_paused = true)]
    async fn burst_capacity_then_empty() {
        let params = GatewayParams::default();
        let quota = QuotaLedger::new(params.clone());
        let acct = account(1);
        let tier = TrustTier::MIN;

        // Tier 0: 6/min, burst factor 2 → 12 tokens up front.
        let capacity = params.quota_for_tier(0) * params.quota_burst_factor;
        for _ in 0..capacity {
            assert!(quota.try_acquire(&acct, tier));
        }
        assert!(!quota.try_acquire(&acct, tier));
    }

    #[tokio::test(start_paused = true)]
    async fn tokens_refill_over_time() {
        let quota = QuotaLedger::new(GatewayParams::default());
        let acct = account(2);
        let tier = TrustTier::MIN;

        while quota.try_acquire(&acct, tier) {}
        // 6/min at tier 0 → one token every 10 seconds.
        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(quota.try_acquire(&acct, tier));
        assert!(!quota.try_acquire(&acct, tier));
    }

    #[tokio::test(start_paused = true)]
    async fn higher_tier_gets_more_burst() {
        let params = GatewayParams::default();
        let quota = QuotaLedger::new(params.clone());
        let low = account(3);
        let high = account(4);

        let mut low_taken = 0;
        while quota.try_acquire(&low, TrustTier::new(0)) {
            low_taken += 1;
        }
        let mut high_taken = 0;
        while quota.try_acquire(&high, TrustTier::new(5)) {
            high_taken += 1;
        }
        assert!(high_taken > low_taken);
        assert_eq!(
            high_taken,
            (params.quota_for_tier(5) * params.quota_burst_factor) as usize
        );
    }

    #[tokio::test(start_paused = true)]
    async fn accounts_do_not_share_buckets() {
        let quota = QuotaLedger::new(GatewayParams::default());
        while quota.try_acquire(&account(5), TrustTier::MIN) {}
        assert!(quota.try_acquire(&account(6), TrustTier::MIN));
    }
}
