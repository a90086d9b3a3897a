//! Trust score and tier engine.
//!
//! Derives a per-account trust score from ledger history and maps it onto a
//! discrete tier through a monotone step function. The score decays with
//! inactivity and drops on explicit penalties; everything else about the
//! weights is a configuration surface (`GatewayParams`).

pub mod engine;
pub mod error;

pub use engine::{ScoreBreakdown, TierAssessment, TrustEngine};
pub use error::TrustError;
