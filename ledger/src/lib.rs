//! Append-only token ledger.
//!
//! Every balance change is an immutable [`soulfra_types::LedgerEntry`].
//! Writes for a single account+kind are strictly serialized through a
//! per-account lock map; distinct accounts proceed in parallel. Successful
//! appends are pushed to subscribers (the trust engine) over the event bus.

pub mod error;
pub mod event;
pub mod ledger;
pub mod snapshot;

pub use error::LedgerError;
pub use event::{EventBus, LedgerEvent};
pub use ledger::Ledger;
pub use snapshot::{AccountSnapshot, KindBalance};
