//! Fundamental types for the Soulfra gateway.
//!
//! This crate defines the core types shared across every other crate in the
//! workspace: identifiers, token kinds, reason codes, timestamps, trust tiers,
//! tunable parameters, and the shared error taxonomy.

pub mod entry;
pub mod error;
pub mod id;
pub mod kind;
pub mod params;
pub mod tier;
pub mod time;

pub use entry::LedgerEntry;
pub use error::SoulfraError;
pub use id::{AccountId, CorrelationId, ProviderId, RequestId};
pub use kind::{ReasonCode, TokenKind};
pub use params::GatewayParams;
pub use tier::TrustTier;
pub use time::Timestamp;
