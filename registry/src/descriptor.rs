use serde::{Deserialize, Serialize};

use soulfra_types::id::ProviderId;
use soulfra_types::tier::TrustTier;

/// Circuit-breaker state for a single provider.
///
/// Healthy providers take traffic normally. Degraded providers still take
/// traffic but sort behind healthy ones. Unavailable providers are excluded
/// from routing entirely until probes close the breaker again.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Healthy,
    Degraded,
    Unavailable,
}

impl HealthState {
    pub fn is_routable(&self) -> bool {
        !matches!(self, HealthState::Unavailable)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HealthState::Healthy => "healthy",
            HealthState::Degraded => "degraded",
            HealthState::Unavailable => "unavailable",
        }
    }
}

/// Static and observed attributes of one downstream AI backend.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    pub id: ProviderId,
    /// Capability tags this provider serves, e.g. "chat" or "embedding".
    pub capability_tags: Vec<String>,
    /// Cost charged to the caller per usage unit, in SpendableCoin.
    pub cost_per_unit: u128,
    /// Rolling average of observed call latency.
    pub avg_latency_ms: u64,
    pub health: HealthState,
    /// Minimum trust tier a caller needs before the router will consider
    /// this provider at all.
    pub tier_requirement: TrustTier,
    pub endpoint: String,
}

impl ProviderDescriptor {
    pub fn serves(&self, capability: &str) -> bool {
        self.capability_tags.iter().any(|t| t == capability)
    }

    /// Routing preference score. Lower is better: cheap, fast and healthy
    /// providers sort first, degraded ones are pushed to the back so they
    /// act as fallbacks rather than primaries.
    pub fn routing_score(&self) -> u128 {
        let base = self
            .cost_per_unit
            .saturating_mul(1_000)
            .saturating_add(u128::from(self.avg_latency_ms) * 10);
        match self.health {
            HealthState::Healthy => base,
            HealthState::Degraded => base.saturating_mul(4),
            HealthState::Unavailable => u128::MAX,
        }
    }
}
