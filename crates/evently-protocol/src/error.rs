//! Error types for the protocol layer.
//!
//! Each Evently crate defines its own error enum. A `ProtocolError` always
//! means "the data was the wrong shape", never "the network failed" or
//! "storage is broken".

use crate::PrincipalKind;

/// Why a string was refused as a [`Credential`](crate::Credential).
///
/// A credential must be three dot-separated base64url segments. Anything
/// else is flagged here instead of being passed along as if it were valid.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CredentialError {
    /// The string was empty.
    #[error("credential is empty")]
    Empty,

    /// The string did not split into exactly three segments.
    #[error("credential must have 3 segments, found {0}")]
    SegmentCount(usize),

    /// One of the segments was empty (e.g. `"abc..ghi"`).
    #[error("credential segment {0} is empty")]
    EmptySegment(usize),

    /// One of the segments is not valid base64url.
    #[error("credential segment {index} is not base64url: {reason}")]
    InvalidSegment { index: usize, reason: String },
}

/// Errors that can occur while interpreting backend data.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// A principal name other than `user` or `organizer`.
    #[error("unknown principal kind: {0}")]
    UnknownPrincipal(String),

    /// The payload is not an object (or a string/wrapper around one).
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// A required identity field is missing or empty.
    #[error("payload is missing field `{0}`")]
    MissingField(&'static str),

    /// The payload describes the other kind of principal.
    ///
    /// A user profile endpoint answering with an organizer record is
    /// treated as a broken response rather than trusted.
    #[error("expected a {expected} payload, found {found}")]
    PrincipalMismatch {
        expected: PrincipalKind,
        found: PrincipalKind,
    },

    /// A JSON-encoded string payload failed to parse.
    #[error("decode failed: {0}")]
    Decode(#[from] serde_json::Error),

    /// A login response carried an unusable token.
    #[error("invalid credential in payload: {0}")]
    Credential(#[from] CredentialError),
}
