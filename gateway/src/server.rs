//! Application wiring and the axum router.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router as AxumRouter;
use tower_http::cors::CorsLayer;
use tracing::info;

use soulfra_ledger::{EventBus, Ledger, LedgerEvent};
use soulfra_registry::ProviderRegistry;
use soulfra_router::{ProviderAdapter, Router};
use soulfra_store::Store;
use soulfra_trust::TrustEngine;
use soulfra_types::params::GatewayParams;
use soulfra_types::time::Timestamp;

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::handlers;
use crate::reconcile::{ReconcileQueue, ReconcileWorker};

/// Everything the handlers need, shared behind one `Arc`.
pub struct AppState {
    pub ledger: Arc<Ledger>,
    pub trust: Arc<TrustEngine>,
    pub registry: Arc<ProviderRegistry>,
    pub router: Router,
    pub reconcile: ReconcileQueue,
    pub auth_secret: Vec<u8>,
    pub params: GatewayParams,
}

impl AppState {
    /// Wire the full engine stack over a store and an adapter.
    ///
    /// The trust engine subscribes to the ledger's event bus before the
    /// ledger opens, so every append from the very first entry triggers an
    /// incremental trust update. Returns the reconciliation worker
    /// unstarted; the caller decides where to spawn it.
    pub fn build(
        config: &GatewayConfig,
        store: Arc<dyn Store>,
        adapter: Arc<dyn ProviderAdapter>,
    ) -> Result<(Arc<Self>, ReconcileWorker), GatewayError> {
        let params = config.params.clone();

        let trust = Arc::new(TrustEngine::new(store.clone(), params.clone()));
        let mut bus = EventBus::new();
        let trust_listener = trust.clone();
        bus.subscribe(Box::new(move |event| {
            if let LedgerEvent::EntryAppended(entry) = event {
                trust_listener.on_ledger_event(entry, Timestamp::now());
            }
        }));

        let ledger = Arc::new(Ledger::open(store, bus)?);

        let registry = Arc::new(ProviderRegistry::new(params.clone()));
        for provider in &config.providers {
            registry
                .register(provider.descriptor())
                .map_err(|e| GatewayError::Config(e.to_string()))?;
        }
        info!(providers = registry.len(), "registry seeded");

        let router = Router::new(registry.clone(), adapter, params.clone());

        let (reconcile, rx) = ReconcileQueue::bounded(params.reconcile_queue_depth);
        let worker = ReconcileWorker::new(
            ledger.clone(),
            rx,
            std::time::Duration::from_secs(params.reconcile_retry_secs),
        );

        let state = Arc::new(Self {
            ledger,
            trust,
            registry,
            router,
            reconcile,
            auth_secret: config.auth_secret.as_bytes().to_vec(),
            params,
        });
        Ok((state, worker))
    }
}

/// The HTTP surface.
pub fn build_router(state: Arc<AppState>) -> AxumRouter {
    AxumRouter::new()
        .route("/v1/request", post(handlers::dispatch_request))
        .route("/v1/ledger/:account_id", get(handlers::ledger_history))
        .route("/v1/trust/:account_id", get(handlers::trust_assessment))
        .route("/v1/providers", get(handlers::provider_catalog))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until the shutdown signal fires.
pub async fn serve(
    state: Arc<AppState>,
    addr: String,
    port: u16,
    mut shutdown: tokio::sync::broadcast::Receiver<()>,
) -> Result<(), GatewayError> {
    let listener = tokio::net::TcpListener::bind((addr.as_str(), port))
        .await
        .map_err(|e| GatewayError::Server(e.to_string()))?;
    info!(%addr, port, "gateway listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await
        .map_err(|e| GatewayError::Server(e.to_string()))
}
