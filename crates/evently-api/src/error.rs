//! Error types for the HTTP client.

use evently_protocol::PrincipalKind;

/// Errors building an [`ApiClient`](crate::ApiClient).
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The base URL does not parse as an absolute `http(s)://` URL with a
    /// host.
    #[error("invalid API base URL {0:?}: expected an absolute http:// or https:// URL")]
    InvalidBaseUrl(String),

    /// The underlying HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Why a login attempt did not produce a session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoginError {
    /// The backend refused the login (bad password, unknown account, ...).
    #[error("{kind} login rejected (HTTP {status})")]
    Rejected { kind: PrincipalKind, status: u16 },

    /// The backend could not be reached, timed out, or is unhealthy.
    #[error("network error: {0}")]
    Network(String),

    /// The backend accepted the login but its response is unusable.
    #[error("malformed login response: {0}")]
    MalformedResponse(String),
}
