use std::time::Duration;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use soulfra_registry::ProviderDescriptor;

/// The provider-facing slice of an inbound request: which capability is
/// wanted and the already-sanitized payload to forward.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProviderRequest {
    pub capability: String,
    pub payload: serde_json::Value,
}

/// What a provider returned. `usage_units` drives billing: the gateway
/// charges `cost_per_unit * usage_units` of the provider that answered.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProviderResponse {
    pub result: serde_json::Value,
    pub usage_units: u64,
}

/// How a single provider call failed. The router translates these into
/// health reports: timeouts and transport errors are hard failures,
/// malformed responses are partial ones.
#[derive(Clone, Debug, Error)]
pub enum AdapterError {
    #[error("provider call timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed provider response: {0}")]
    Malformed(String),
}

/// Transport seam between the router and downstream AI backends.
///
/// Implementations must honor `timeout`; the router derives it from the
/// request deadline so a slow primary cannot starve its fallbacks.
pub trait ProviderAdapter: Send + Sync {
    fn call(
        &self,
        descriptor: &ProviderDescriptor,
        request: &ProviderRequest,
        timeout: Duration,
    ) -> BoxFuture<'static, Result<ProviderResponse, AdapterError>>;
}
