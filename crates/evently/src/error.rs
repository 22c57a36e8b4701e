//! Unified error type for the Evently session core.

use std::path::PathBuf;

use evently_api::{ApiError, LoginError};
use evently_session::SessionError;

/// Problems with the client's own setup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("config {path} is not valid: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// [`SessionsBuilder::build`](crate::SessionsBuilder::build) was called
    /// without a verifier.
    #[error("no verifier configured")]
    MissingVerifier,
}

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `evently` facade, you deal with this single error type
/// instead of importing errors from each sub-crate. The `#[from]`
/// attribute on each variant means `?` converts sub-crate errors
/// automatically.
#[derive(Debug, thiserror::Error)]
pub enum EventlyError {
    /// A session action was refused or its verification failed.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The backend client could not be built.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// A login attempt failed.
    #[error(transparent)]
    Login(#[from] LoginError),

    /// The client configuration is unusable.
    #[error(transparent)]
    Config(#[from] ConfigError),
}
