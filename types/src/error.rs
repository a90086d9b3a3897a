//! Top-level error taxonomy shared across crates.
//!
//! Each variant carries a stable `code()` string that is returned verbatim in
//! HTTP error bodies so clients can branch on it without parsing messages.

use thiserror::Error;

use crate::kind::TokenKind;
use crate::tier::TrustTier;

/// Common error taxonomy for the Soulfra gateway.
#[derive(Debug, Error)]
pub enum SoulfraError {
    #[error("insufficient {kind} balance: need {needed}, have {available}")]
    InsufficientBalance {
        kind: TokenKind,
        needed: u128,
        available: u128,
    },

    #[error("correlation id already applied for this account and kind")]
    DuplicateCorrelation,

    #[error("trust {have} does not reach any eligible provider (need {need})")]
    TierInsufficient { have: TrustTier, need: TrustTier },

    #[error("request quota exhausted for this tier")]
    QuotaExceeded,

    #[error("provider {0} unavailable")]
    ProviderUnavailable(String),

    #[error("all providers in the fallback chain failed")]
    AllProvidersFailed,

    #[error("deadline elapsed before a provider responded")]
    DeadlineExceeded,

    #[error("ledger write failed: {0}")]
    LedgerWriteFailed(String),

    #[error("authentication failed")]
    Unauthorized,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl SoulfraError {
    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            SoulfraError::InsufficientBalance { .. } => "insufficient_balance",
            SoulfraError::DuplicateCorrelation => "duplicate_correlation",
            SoulfraError::TierInsufficient { .. } => "tier_insufficient",
            SoulfraError::QuotaExceeded => "quota_exceeded",
            SoulfraError::ProviderUnavailable(_) => "provider_unavailable",
            SoulfraError::AllProvidersFailed => "all_providers_failed",
            SoulfraError::DeadlineExceeded => "deadline_exceeded",
            SoulfraError::LedgerWriteFailed(_) => "ledger_write_failed",
            SoulfraError::Unauthorized => "unauthorized",
            SoulfraError::InvalidRequest(_) => "invalid_request",
            SoulfraError::Internal(_) => "internal",
        }
    }
}
