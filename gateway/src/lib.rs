//! HTTP boundary for the Soulfra gateway.
//!
//! Wires the ledger, trust engine, registry and router behind an axum
//! surface: authenticated request dispatch with billing, paginated ledger
//! history, trust assessments, and the provider catalog. Also owns the
//! ambient pieces — TOML configuration, logging init, graceful shutdown,
//! and the reconciliation worker for dispatches that were served but not
//! yet billed.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod pagination;
pub mod reconcile;
pub mod sanitize;
pub mod server;
pub mod shutdown;

pub use config::{GatewayConfig, ProviderConfig};
pub use error::{ApiError, GatewayError};
pub use logging::{init_logging, LogFormat};
pub use reconcile::{ReconcileQueue, ReconcileWorker, ReconciliationRecord};
pub use server::{build_router, AppState};
pub use shutdown::ShutdownController;
