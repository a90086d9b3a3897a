//! Tier-aware request routing.
//!
//! The router admits a request (tier check, then quota check), selects a
//! primary provider plus a bounded fallback chain from the registry, and
//! dispatches through a [`ProviderAdapter`] under the caller's deadline.
//! It reports every observed outcome back to the registry's health machine
//! but never touches the ledger — billing is the gateway's job.

pub mod adapter;
pub mod error;
pub mod http;
pub mod mock;
pub mod quota;
pub mod router;

pub use adapter::{AdapterError, ProviderAdapter, ProviderRequest, ProviderResponse};
pub use error::RouterError;
pub use http::HttpAdapter;
pub use mock::{MockAdapter, MockBehavior};
pub use quota::QuotaLedger;
pub use router::{DispatchOutcome, Router};
