//! Abstract storage traits for the Soulfra gateway.
//!
//! Every storage backend (LMDB for deployments, in-memory for testing and
//! dev mode) implements these traits. The rest of the codebase depends only
//! on the traits.

pub mod account;
pub mod entry;
pub mod error;
pub mod memory;
pub mod meta;

pub use account::{AccountInfo, AccountStore};
pub use entry::EntryStore;
pub use error::StoreError;
pub use memory::MemoryStore;
pub use meta::MetaStore;

/// Convenience supertrait for code that needs the full backend.
///
/// Blanket-implemented, so any complete backend is a `Store` automatically.
pub trait Store: AccountStore + EntryStore + MetaStore + Send + Sync {}

impl<T: AccountStore + EntryStore + MetaStore + Send + Sync> Store for T {}
