use std::collections::HashMap;
use std::sync::RwLock;

use tracing::{debug, info, warn};

use soulfra_types::id::ProviderId;
use soulfra_types::params::GatewayParams;

use crate::descriptor::{HealthState, ProviderDescriptor};
use crate::error::RegistryError;

/// Outcome of one observed interaction with a provider, either a real
/// dispatch or a synthetic health probe. Both feed the same state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProbeResult {
    /// The call completed and returned a usable response.
    Success { latency_ms: u64 },
    /// The call returned but the response was malformed or incomplete.
    PartialFailure,
    /// Connection refused, timeout, or 5xx.
    HardFailure,
}

struct ProviderSlot {
    descriptor: ProviderDescriptor,
    consecutive_failures: u32,
    consecutive_successes: u32,
}

/// In-memory provider catalog shared between the router, the probe driver
/// and the HTTP surface. All mutation goes through [`report`] and
/// [`mark_unavailable`] so the health machine is the only writer of
/// [`HealthState`].
///
/// [`report`]: ProviderRegistry::report
/// [`mark_unavailable`]: ProviderRegistry::mark_unavailable
pub struct ProviderRegistry {
    providers: RwLock<HashMap<ProviderId, ProviderSlot>>,
    params: GatewayParams,
}

impl ProviderRegistry {
    pub fn new(params: GatewayParams) -> Self {
        Self {
            providers: RwLock::new(HashMap::new()),
            params,
        }
    }

    pub fn register(&self, descriptor: ProviderDescriptor) -> Result<(), RegistryError> {
        let mut providers = self.providers.write().expect("registry lock poisoned");
        if providers.contains_key(&descriptor.id) {
            return Err(RegistryError::DuplicateProvider(descriptor.id.to_string()));
        }
        info!(provider = %descriptor.id, tags = ?descriptor.capability_tags, "provider registered");
        providers.insert(
            descriptor.id.clone(),
            ProviderSlot {
                descriptor,
                consecutive_failures: 0,
                consecutive_successes: 0,
            },
        );
        Ok(())
    }

    pub fn get(&self, id: &ProviderId) -> Option<ProviderDescriptor> {
        let providers = self.providers.read().expect("registry lock poisoned");
        providers.get(id).map(|slot| slot.descriptor.clone())
    }

    /// All registered providers, routable or not, in score order. Used by
    /// the catalog endpoint.
    pub fn all(&self) -> Vec<ProviderDescriptor> {
        let providers = self.providers.read().expect("registry lock poisoned");
        let mut out: Vec<_> = providers
            .values()
            .map(|slot| slot.descriptor.clone())
            .collect();
        out.sort_by_key(|d| (d.routing_score(), d.id.to_string()));
        out
    }

    /// Routable candidates for a capability, best first. Unavailable
    /// providers are excluded so tripped breakers shed all traffic.
    pub fn candidates(&self, capability: &str) -> Vec<ProviderDescriptor> {
        let providers = self.providers.read().expect("registry lock poisoned");
        let mut out: Vec<_> = providers
            .values()
            .filter(|slot| slot.descriptor.health.is_routable())
            .filter(|slot| slot.descriptor.serves(capability))
            .map(|slot| slot.descriptor.clone())
            .collect();
        out.sort_by_key(|d| (d.routing_score(), d.id.to_string()));
        out
    }

    /// Feed one observed outcome into the health machine.
    ///
    /// Transitions:
    /// - success at normal latency counts toward closing the breaker; after
    ///   `probes_to_close` in a row a degraded or unavailable provider
    ///   returns to healthy
    /// - success at elevated latency or a partial failure degrades a
    ///   healthy provider and resets the recovery streak
    /// - a hard failure degrades immediately and trips the breaker to
    ///   unavailable after `failures_to_trip` in a row
    pub fn report(&self, id: &ProviderId, result: ProbeResult) {
        let mut providers = self.providers.write().expect("registry lock poisoned");
        let Some(slot) = providers.get_mut(id) else {
            warn!(provider = %id, "health report for unknown provider");
            return;
        };

        match result {
            ProbeResult::Success { latency_ms } => {
                slot.consecutive_failures = 0;
                // Rolling average, weighted toward history so one fast
                // probe does not mask a slow provider.
                slot.descriptor.avg_latency_ms =
                    (slot.descriptor.avg_latency_ms * 3 + latency_ms) / 4;

                if latency_ms > self.params.degraded_latency_ms {
                    slot.consecutive_successes = 0;
                    if slot.descriptor.health == HealthState::Healthy {
                        warn!(provider = %id, latency_ms, "provider degraded: elevated latency");
                        slot.descriptor.health = HealthState::Degraded;
                    }
                    return;
                }

                slot.consecutive_successes += 1;
                if slot.descriptor.health != HealthState::Healthy
                    && slot.consecutive_successes >= self.params.probes_to_close
                {
                    info!(provider = %id, "provider recovered");
                    slot.descriptor.health = HealthState::Healthy;
                }
            }
            ProbeResult::PartialFailure => {
                slot.consecutive_successes = 0;
                if slot.descriptor.health == HealthState::Healthy {
                    warn!(provider = %id, "provider degraded: partial failure");
                    slot.descriptor.health = HealthState::Degraded;
                }
            }
            ProbeResult::HardFailure => {
                slot.consecutive_successes = 0;
                slot.consecutive_failures += 1;
                if slot.consecutive_failures >= self.params.failures_to_trip {
                    if slot.descriptor.health != HealthState::Unavailable {
                        warn!(
                            provider = %id,
                            failures = slot.consecutive_failures,
                            "provider unavailable: breaker tripped"
                        );
                    }
                    slot.descriptor.health = HealthState::Unavailable;
                } else if slot.descriptor.health == HealthState::Healthy {
                    warn!(provider = %id, "provider degraded: hard failure");
                    slot.descriptor.health = HealthState::Degraded;
                } else {
                    debug!(
                        provider = %id,
                        failures = slot.consecutive_failures,
                        "hard failure recorded"
                    );
                }
            }
        }
    }

    /// Administrative override: force a provider out of rotation.
    pub fn mark_unavailable(&self, id: &ProviderId, reason: &str) -> Result<(), RegistryError> {
        let mut providers = self.providers.write().expect("registry lock poisoned");
        let slot = providers
            .get_mut(id)
            .ok_or_else(|| RegistryError::ProviderNotFound(id.to_string()))?;
        warn!(provider = %id, reason, "provider forced unavailable");
        slot.descriptor.health = HealthState::Unavailable;
        slot.consecutive_successes = 0;
        slot.consecutive_failures = self.params.failures_to_trip;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.providers.read().expect("registry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
