use thiserror::Error;

use soulfra_store::StoreError;
use soulfra_types::TokenKind;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("insufficient {kind} balance: need {needed}, have {available}")]
    InsufficientBalance {
        kind: TokenKind,
        needed: u128,
        available: u128,
    },

    #[error("correlation already applied as entry {applied_seq}")]
    DuplicateCorrelation { applied_seq: u64 },

    #[error("balance overflow")]
    Overflow,

    #[error("zero delta is not a ledger event")]
    ZeroDelta,

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}
