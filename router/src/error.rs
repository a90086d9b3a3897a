use thiserror::Error;

use soulfra_types::tier::TrustTier;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouterError {
    #[error("trust {have} below cheapest eligible provider (need {need})")]
    TierInsufficient { have: TrustTier, need: TrustTier },

    #[error("request quota exhausted")]
    QuotaExceeded,

    #[error("no routable provider serves capability {0:?}")]
    NoProvider(String),

    #[error("all providers in the fallback chain failed")]
    AllProvidersFailed,

    #[error("deadline elapsed before a provider responded")]
    DeadlineExceeded,
}
