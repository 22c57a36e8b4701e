//! Error types for the session layer.

use evently_protocol::{CredentialError, PrincipalKind};
use serde::Serialize;

/// Why a verification was rejected.
///
/// All three end the same way for the session (fail-closed: the credential
/// is dropped). The distinction only matters for logs and for the
/// diagnostic `last_error` a view may show.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
    /// The backend answered 401/403: the credential is invalid or expired.
    #[error("credential rejected (HTTP {status})")]
    Unauthorized { status: u16 },

    /// The backend could not be reached, timed out, or is unhealthy.
    #[error("network error: {0}")]
    Network(String),

    /// The backend answered, but not with something that normalizes into
    /// an identity.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl VerifyError {
    /// The fieldless reason recorded on the session state.
    pub fn reason(&self) -> FailureReason {
        match self {
            Self::Unauthorized { .. } => FailureReason::Unauthorized,
            Self::Network(_) => FailureReason::Network,
            Self::MalformedResponse(_) => FailureReason::MalformedResponse,
        }
    }
}

/// The last verification failure, as exposed to views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    Unauthorized,
    Network,
    MalformedResponse,
}

/// Errors returned by [`SessionSlice`](crate::SessionSlice) actions.
///
/// None of these leave the slice in a half-updated state; by the time the
/// caller sees one, the slice has already settled.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// `verify()` was called with no credential held.
    #[error("no {0} credential to verify")]
    MissingCredential(PrincipalKind),

    /// `login_success()` was handed something that is not a credential.
    /// Nothing was stored.
    #[error("refusing {kind} login with invalid credential: {source}")]
    InvalidCredential {
        kind: PrincipalKind,
        #[source]
        source: CredentialError,
    },

    /// `login_success()` was handed the other principal's identity.
    #[error("identity belongs to a {found}, not a {expected}")]
    IdentityMismatch {
        expected: PrincipalKind,
        found: PrincipalKind,
    },

    /// The verifier rejected the credential; the session has been cleared.
    #[error("{kind} verification failed: {source}")]
    Verification {
        kind: PrincipalKind,
        #[source]
        source: VerifyError,
    },

    /// A logout, login or newer verification happened while this one was
    /// in flight, so its result was discarded.
    #[error("{0} verification was superseded")]
    Superseded(PrincipalKind),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_maps_each_variant() {
        assert_eq!(
            VerifyError::Unauthorized { status: 403 }.reason(),
            FailureReason::Unauthorized
        );
        assert_eq!(
            VerifyError::Network("timeout".into()).reason(),
            FailureReason::Network
        );
        assert_eq!(
            VerifyError::MalformedResponse("no id".into()).reason(),
            FailureReason::MalformedResponse
        );
    }

    #[test]
    fn test_verification_error_message_names_kind() {
        let err = SessionError::Verification {
            kind: PrincipalKind::Organizer,
            source: VerifyError::Unauthorized { status: 401 },
        };
        assert_eq!(
            err.to_string(),
            "organizer verification failed: credential rejected (HTTP 401)"
        );
    }

    #[test]
    fn test_failure_reason_serializes_snake_case() {
        let json = serde_json::to_string(&FailureReason::MalformedResponse).unwrap();
        assert_eq!(json, "\"malformed_response\"");
    }
}
