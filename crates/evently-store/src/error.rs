//! Error types for the storage layer.

/// Errors raised by a [`Storage`](crate::Storage) backend.
///
/// These never travel past [`CredentialStore`](crate::CredentialStore),
/// which logs them and carries on as if the key were absent.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The backing file exists but is not a JSON object of strings.
    #[cfg(feature = "file")]
    #[error("storage file {path} is corrupt: {source}")]
    Corrupt {
        path: std::path::PathBuf,
        source: serde_json::Error,
    },

    /// The in-memory map could not be serialized.
    #[cfg(feature = "file")]
    #[error("failed to encode storage: {0}")]
    Encode(serde_json::Error),
}
