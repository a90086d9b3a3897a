//! Metadata storage trait — schema version and named blobs.

use crate::StoreError;

/// Current schema version written by fresh databases.
pub const SCHEMA_VERSION: u32 = 1;

pub trait MetaStore {
    fn get_blob(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;
    fn put_blob(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;
    fn schema_version(&self) -> Result<u32, StoreError>;
}
