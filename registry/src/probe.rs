use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use tracing::{debug, info};

use crate::descriptor::ProviderDescriptor;
use crate::registry::{ProbeResult, ProviderRegistry};

/// Background health prober.
///
/// Every interval it probes all registered providers, including unavailable
/// ones — probes are the only path back from a tripped breaker, since an
/// unavailable provider receives no routed traffic that could vouch for it.
/// The actual probe call is supplied by the caller so the driver stays
/// transport-agnostic.
pub struct ProbeDriver {
    registry: Arc<ProviderRegistry>,
    interval: Duration,
}

impl ProbeDriver {
    pub fn new(registry: Arc<ProviderRegistry>, interval: Duration) -> Self {
        Self { registry, interval }
    }

    pub async fn run<F>(self, mut probe: F, mut shutdown: tokio::sync::broadcast::Receiver<()>)
    where
        F: FnMut(ProviderDescriptor) -> BoxFuture<'static, ProbeResult>,
    {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    for descriptor in self.registry.all() {
                        let id = descriptor.id.clone();
                        let result = probe(descriptor).await;
                        debug!(provider = %id, ?result, "health probe");
                        self.registry.report(&id, result);
                    }
                }
                _ = shutdown.recv() => {
                    info!("health prober stopping");
                    return;
                }
            }
        }
    }
}
