use thiserror::Error;

use soulfra_store::StoreError;

#[derive(Debug, Error)]
pub enum TrustError {
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}
