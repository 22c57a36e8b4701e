//! Persisted credential storage for Evently.
//!
//! Provides the [`Storage`] trait, which abstracts over wherever the client
//! keeps its key-value data between reloads, and [`CredentialStore`], the
//! single owner of every read and write to the principal credential keys.
//!
//! # Feature Flags
//!
//! - `file` (default): [`FileStorage`], a JSON file on disk

mod credential_store;
mod error;
#[cfg(feature = "file")]
mod file;
mod memory;

pub use credential_store::{CredentialStore, RepairOutcome};
pub use error::StoreError;
#[cfg(feature = "file")]
pub use file::FileStorage;
pub use memory::MemoryStorage;

/// A flat string key-value store that survives reloads.
///
/// This is the seam where a browser's persisted storage would plug in.
/// Implementations do no validation and no normalization; they return
/// exactly what was written. [`CredentialStore`] layers the semantics on top.
pub trait Storage: Send + Sync + 'static {
    /// Returns the raw value under `key`, or `None` if nothing is stored.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Deletes `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}
