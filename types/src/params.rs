//! Gateway parameters — every tunable knob in one place.
//!
//! Weights and thresholds here are a configuration surface, not a contract:
//! operators tune them per deployment. The shape of the trust formula (decay
//! and penalty terms are mandatory) and the quota/fallback mechanisms are
//! fixed by the engines that consume these values.

use serde::{Deserialize, Serialize};

/// All tunable parameters for the gateway and its engines.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GatewayParams {
    // ── Trust formula ────────────────────────────────────────────────────
    /// Trailing window (days) over which positive events count toward score.
    pub trust_window_days: u64,

    /// Score per positive `EarnedCredit` event inside the window.
    pub trust_credit_weight: i64,

    /// Score per distinct contribution reason code (diversity bonus).
    pub trust_diversity_weight: i64,

    /// Cap on the number of distinct reason codes counted for diversity.
    pub trust_diversity_cap: u32,

    /// An idle account loses one decay step per this many days without a
    /// positive event. Decay is stepped, not linear.
    pub trust_decay_step_days: u64,

    /// Score lost per decay step.
    pub trust_decay_weight: i64,

    /// Score lost per explicit penalty entry.
    pub trust_penalty_weight: i64,

    /// Monotone score thresholds for tiers 1..=N. An account whose score is
    /// below `tier_thresholds[0]` sits at tier 0.
    pub tier_thresholds: Vec<i64>,

    /// Cooldown (seconds) before a downward tier crossing is applied.
    /// Penalty entries bypass the cooldown.
    pub tier_cooldown_secs: u64,

    // ── Quotas ───────────────────────────────────────────────────────────
    /// Requests per minute granted at tier 0.
    pub quota_base_per_min: u32,

    /// Additional requests per minute granted per tier level.
    pub quota_per_tier_per_min: u32,

    /// Burst headroom as a multiple of the per-minute rate.
    pub quota_burst_factor: u32,

    // ── Router ───────────────────────────────────────────────────────────
    /// Additional providers tried after the primary fails (fallback chain).
    pub max_fallback_attempts: u32,

    /// Default per-call timeout (seconds) when a provider has no override.
    pub default_call_timeout_secs: u64,

    // ── Provider health machine ──────────────────────────────────────────
    /// Latency above this (ms) counts as a degraded probe.
    pub degraded_latency_ms: u64,

    /// Consecutive hard failures before a provider trips to unavailable.
    pub failures_to_trip: u32,

    /// Consecutive successful probes before a tripped provider recovers.
    pub probes_to_close: u32,

    /// Interval (seconds) between health probe rounds.
    pub health_probe_interval_secs: u64,

    // ── Reconciliation ───────────────────────────────────────────────────
    /// Maximum queued "paid but not billed" records before backpressure.
    pub reconcile_queue_depth: usize,

    /// Delay (seconds) between reconciliation retry passes.
    pub reconcile_retry_secs: u64,
}

impl Default for GatewayParams {
    fn default() -> Self {
        Self {
            trust_window_days: 30,
            trust_credit_weight: 10,
            trust_diversity_weight: 5,
            trust_diversity_cap: 3,
            trust_decay_step_days: 30,
            trust_decay_weight: 15,
            trust_penalty_weight: 25,
            tier_thresholds: vec![10, 25, 45, 70, 100, 140, 190, 250, 320, 400],
            tier_cooldown_secs: 86_400,
            quota_base_per_min: 6,
            quota_per_tier_per_min: 6,
            quota_burst_factor: 2,
            max_fallback_attempts: 2,
            default_call_timeout_secs: 5,
            degraded_latency_ms: 2_000,
            failures_to_trip: 3,
            probes_to_close: 2,
            health_probe_interval_secs: 30,
            reconcile_queue_depth: 1_024,
            reconcile_retry_secs: 30,
        }
    }
}

impl GatewayParams {
    /// Fast timelines for tests and dev deployments: short cooldowns and
    /// aggressive probe intervals.
    pub fn dev_defaults() -> Self {
        Self {
            tier_cooldown_secs: 1,
            health_probe_interval_secs: 1,
            reconcile_retry_secs: 1,
            ..Self::default()
        }
    }

    /// Requests-per-minute quota for a given tier level.
    pub fn quota_for_tier(&self, tier_level: u8) -> u32 {
        self.quota_base_per_min
            .saturating_add(self.quota_per_tier_per_min.saturating_mul(tier_level as u32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_are_monotone() {
        let params = GatewayParams::default();
        for pair in params.tier_thresholds.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn quota_grows_with_tier() {
        let params = GatewayParams::default();
        assert!(params.quota_for_tier(5) > params.quota_for_tier(0));
    }
}
