use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("provider not found: {0}")]
    ProviderNotFound(String),

    #[error("provider already registered: {0}")]
    DuplicateProvider(String),
}
