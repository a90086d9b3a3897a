use thiserror::Error;

#[derive(Debug, Error)]
pub enum LmdbError {
    #[error("failed to open LMDB environment: {0}")]
    Open(String),

    #[error("heed error: {0}")]
    Heed(#[from] heed::Error),
}
