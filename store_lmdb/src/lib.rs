//! LMDB storage backend for the Soulfra gateway.
//!
//! Implements the `soulfra-store` traits on top of heed. One environment
//! holds five databases: accounts, entries, a per-account entry index,
//! the correlation index, and metadata. The entry write path commits all
//! affected databases in a single transaction, so an appended entry and its
//! indexes are atomic.

pub mod environment;
pub mod error;

pub use environment::LmdbStore;
pub use error::LmdbError;
