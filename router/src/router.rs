use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use soulfra_registry::{ProbeResult, ProviderDescriptor, ProviderRegistry};
use soulfra_types::id::AccountId;
use soulfra_types::params::GatewayParams;
use soulfra_types::tier::TrustTier;

use crate::adapter::{AdapterError, ProviderAdapter, ProviderRequest, ProviderResponse};
use crate::error::RouterError;
use crate::quota::QuotaLedger;

/// Result of a successful dispatch. The gateway bills from this: cost is
/// always the answering provider's rate, so a fallback that answered is
/// charged at the fallback's price, not the primary's.
#[derive(Clone, Debug)]
pub struct DispatchOutcome {
    pub provider: ProviderDescriptor,
    pub response: ProviderResponse,
    /// Providers tried, including the one that answered.
    pub attempts: u32,
}

impl DispatchOutcome {
    /// Amount of SpendableCoin to charge for this dispatch.
    pub fn cost(&self) -> u128 {
        self.provider
            .cost_per_unit
            .saturating_mul(u128::from(self.response.usage_units))
    }
}

pub struct Router {
    registry: Arc<ProviderRegistry>,
    adapter: Arc<dyn ProviderAdapter>,
    quota: QuotaLedger,
    params: GatewayParams,
}

impl Router {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        adapter: Arc<dyn ProviderAdapter>,
        params: GatewayParams,
    ) -> Self {
        Self {
            registry,
            adapter,
            quota: QuotaLedger::new(params.clone()),
            params,
        }
    }

    /// Build the fallback chain for one request: routable providers serving
    /// the capability, within the caller's tier, best first, truncated to
    /// the primary plus `max_fallback_attempts`.
    pub fn select_chain(
        &self,
        tier: TrustTier,
        capability: &str,
    ) -> Result<Vec<ProviderDescriptor>, RouterError> {
        let serving = self.registry.candidates(capability);
        if serving.is_empty() {
            return Err(RouterError::NoProvider(capability.to_string()));
        }

        // Cheapest tier requirement among serving providers, reported back
        // to the caller when their tier admits none of them.
        let need = serving
            .iter()
            .map(|d| d.tier_requirement)
            .min()
            .unwrap_or(TrustTier::MIN);

        let chain: Vec<_> = serving
            .into_iter()
            .filter(|d| d.tier_requirement <= tier)
            .take(1 + self.params.max_fallback_attempts as usize)
            .collect();

        if chain.is_empty() {
            return Err(RouterError::TierInsufficient { have: tier, need });
        }
        Ok(chain)
    }

    /// Admit and dispatch one request under a deadline.
    ///
    /// Admission order is tier first, then quota, so a caller whose tier
    /// admits no provider is told so even when their bucket is empty. Each
    /// attempt gets `min(default_call_timeout, time left)`; failures feed
    /// the registry's health machine and fall through to the next provider
    /// in the chain.
    pub async fn dispatch(
        &self,
        account: &AccountId,
        tier: TrustTier,
        request: &ProviderRequest,
        deadline: Instant,
    ) -> Result<DispatchOutcome, RouterError> {
        let chain = self.select_chain(tier, &request.capability)?;

        if !self.quota.try_acquire(account, tier) {
            return Err(RouterError::QuotaExceeded);
        }

        let call_timeout = Duration::from_secs(self.params.default_call_timeout_secs);
        let mut attempts = 0u32;

        for descriptor in chain {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(RouterError::DeadlineExceeded);
            }

            attempts += 1;
            let started = Instant::now();
            let result = self
                .adapter
                .call(&descriptor, request, call_timeout.min(remaining))
                .await;
            let latency_ms = started.elapsed().as_millis() as u64;

            match result {
                Ok(response) => {
                    self.registry
                        .report(&descriptor.id, ProbeResult::Success { latency_ms });
                    debug!(
                        account = %account,
                        provider = %descriptor.id,
                        attempts,
                        latency_ms,
                        usage = response.usage_units,
                        "dispatch complete"
                    );
                    return Ok(DispatchOutcome {
                        provider: descriptor,
                        response,
                        attempts,
                    });
                }
                Err(err) => {
                    let report = match err {
                        AdapterError::Malformed(_) => ProbeResult::PartialFailure,
                        AdapterError::Timeout | AdapterError::Transport(_) => {
                            ProbeResult::HardFailure
                        }
                    };
                    warn!(
                        account = %account,
                        provider = %descriptor.id,
                        attempts,
                        error = %err,
                        "provider attempt failed"
                    );
                    self.registry.report(&descriptor.id, report);
                }
            }
        }

        if Instant::now() >= deadline {
            Err(RouterError::DeadlineExceeded)
        } else {
            Err(RouterError::AllProvidersFailed)
        }
    }
}
