//! Scriptable adapter for tests. Lives in the library (not behind
//! `cfg(test)`) so downstream integration tests can drive the router and
//! gateway without a live provider.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use futures_util::future::BoxFuture;

use soulfra_registry::ProviderDescriptor;
use soulfra_types::id::ProviderId;

use crate::adapter::{AdapterError, ProviderAdapter, ProviderRequest, ProviderResponse};

/// One scripted outcome for a provider. Behaviors are consumed in FIFO
/// order; once the script runs dry the provider answers with the default
/// response.
#[derive(Clone, Debug)]
pub enum MockBehavior {
    Respond(ProviderResponse),
    Fail(AdapterError),
    /// Consume the full timeout, then report a timeout.
    Hang,
}

#[derive(Default)]
struct MockState {
    scripts: HashMap<ProviderId, VecDeque<MockBehavior>>,
    calls: Vec<ProviderId>,
}

pub struct MockAdapter {
    state: Mutex<MockState>,
    default_response: ProviderResponse,
}

impl MockAdapter {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            default_response: ProviderResponse {
                result: serde_json::json!({"ok": true}),
                usage_units: 1,
            },
        }
    }

    pub fn with_default_response(mut self, response: ProviderResponse) -> Self {
        self.default_response = response;
        self
    }

    /// Append a scripted behavior for one provider.
    pub fn script(&self, provider: &ProviderId, behavior: MockBehavior) {
        let mut state = self.state.lock().expect("mock lock poisoned");
        state
            .scripts
            .entry(provider.clone())
            .or_default()
            .push_back(behavior);
    }

    /// Providers called so far, in call order.
    pub fn calls(&self) -> Vec<ProviderId> {
        self.state.lock().expect("mock lock poisoned").calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().expect("mock lock poisoned").calls.len()
    }
}

impl Default for MockAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderAdapter for MockAdapter {
    fn call(
        &self,
        descriptor: &ProviderDescriptor,
        _request: &ProviderRequest,
        timeout: Duration,
    ) -> BoxFuture<'static, Result<ProviderResponse, AdapterError>> {
        let behavior = {
            let mut state = self.state.lock().expect("mock lock poisoned");
            state.calls.push(descriptor.id.clone());
            state
                .scripts
                .get_mut(&descriptor.id)
                .and_then(|queue| queue.pop_front())
        };
        let behavior =
            behavior.unwrap_or_else(|| MockBehavior::Respond(self.default_response.clone()));

        Box::pin(async move {
            match behavior {
                MockBehavior::Respond(response) => Ok(response),
                MockBehavior::Fail(err) => Err(err),
                MockBehavior::Hang => {
                    tokio::time::sleep(timeout).await;
                    Err(AdapterError::Timeout)
                }
            }
        })
    }
}
