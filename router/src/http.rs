use std::time::Duration;

use futures_util::future::BoxFuture;
use serde::Deserialize;

use soulfra_registry::ProviderDescriptor;

use crate::adapter::{AdapterError, ProviderAdapter, ProviderRequest, ProviderResponse};

#[derive(Deserialize)]
struct WireResponse {
    result: serde_json::Value,
    #[serde(default = "default_usage")]
    usage_units: u64,
}

fn default_usage() -> u64 {
    1
}

/// JSON-over-HTTP adapter. Posts the sanitized payload to the provider's
/// endpoint and expects `{ "result": ..., "usage_units": n }` back.
pub struct HttpAdapter {
    client: reqwest::Client,
}

impl HttpAdapter {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderAdapter for HttpAdapter {
    fn call(
        &self,
        descriptor: &ProviderDescriptor,
        request: &ProviderRequest,
        timeout: Duration,
    ) -> BoxFuture<'static, Result<ProviderResponse, AdapterError>> {
        let client = self.client.clone();
        let endpoint = descriptor.endpoint.clone();
        let body = serde_json::json!({
            "capability": request.capability,
            "payload": request.payload,
        });

        Box::pin(async move {
            let response = client
                .post(&endpoint)
                .timeout(timeout)
                .json(&body)
                .send()
                .await
                .map_err(|e| {
                    if e.is_timeout() {
                        AdapterError::Timeout
                    } else {
                        AdapterError::Transport(e.to_string())
                    }
                })?;

            let status = response.status();
            if !status.is_success() {
                return Err(AdapterError::Transport(format!("status {status}")));
            }

            let wire: WireResponse = response
                .json()
                .await
                .map_err(|e| AdapterError::Malformed(e.to_string()))?;

            Ok(ProviderResponse {
                result: wire.result,
                usage_units: wire.usage_units,
            })
        })
    }
}
