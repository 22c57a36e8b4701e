//! Session state: what one principal's slice knows at a given moment.
//!
//! A [`SessionState`] is a value. The live one is owned by a
//! [`SessionSlice`](crate::SessionSlice) and only changes through its
//! actions; everyone else works with snapshots.

use std::fmt;

use evently_protocol::{Credential, Identity, PrincipalKind};
use serde::Serialize;

use crate::FailureReason;

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Where a session is in its lifecycle.
///
/// ```text
///                 bootstrap / verify
///   Unauthenticated ─────────────────→ Verifying
///      ↑   │                               │
///      │   │ login_success                 │ identity
///      │   ↓                               ↓
///      │  Authenticated ←──────────────────┘
///      │   │
///      └───┘ logout / failed re-verify
/// ```
///
/// A failed verification lands in `Unauthenticated` with
/// [`SessionState::last_error`] set; see [`SessionState::is_failed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Unauthenticated,
    Verifying,
    Authenticated,
}

impl Status {
    /// `true` unless a verification is in flight.
    pub fn is_settled(self) -> bool {
        !matches!(self, Self::Verifying)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthenticated => write!(f, "Unauthenticated"),
            Self::Verifying => write!(f, "Verifying"),
            Self::Authenticated => write!(f, "Authenticated"),
        }
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// A snapshot of one principal's session.
///
/// Fields are private so the invariants hold for every value that exists:
///
/// - `identity` is `Some` exactly when `status` is `Authenticated`
/// - `status` is `Verifying` only while a `credential` is held
///
/// An `Unauthenticated` state may still hold a credential: one that was
/// read from storage and is waiting for `bootstrap()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    kind: PrincipalKind,
    status: Status,
    credential: Option<Credential>,
    identity: Option<Identity>,
    last_error: Option<FailureReason>,
}

impl SessionState {
    /// No session and nothing pending.
    pub fn unauthenticated(kind: PrincipalKind) -> Self {
        Self {
            kind,
            status: Status::Unauthenticated,
            credential: None,
            identity: None,
            last_error: None,
        }
    }

    /// A credential is being checked.
    pub fn verifying(kind: PrincipalKind, credential: Credential) -> Self {
        Self {
            kind,
            status: Status::Verifying,
            credential: Some(credential),
            identity: None,
            last_error: None,
        }
    }

    /// A confirmed session. The principal kind comes from the identity.
    pub fn authenticated(credential: Credential, identity: Identity) -> Self {
        Self {
            kind: identity.kind,
            status: Status::Authenticated,
            credential: Some(credential),
            identity: Some(identity),
            last_error: None,
        }
    }

    /// The outcome of a rejected verification: nothing held, reason kept.
    pub(crate) fn failed(kind: PrincipalKind, reason: FailureReason) -> Self {
        Self {
            last_error: Some(reason),
            ..Self::unauthenticated(kind)
        }
    }

    /// Replaces the pending credential of an unauthenticated state.
    pub(crate) fn hold(&mut self, credential: Option<Credential>) {
        debug_assert_eq!(self.status, Status::Unauthenticated);
        self.credential = credential;
    }

    /// Enters `Verifying`. Returns `false` (and changes nothing) when no
    /// credential is held.
    pub(crate) fn begin_verifying(&mut self) -> bool {
        if self.credential.is_none() {
            return false;
        }
        self.status = Status::Verifying;
        self.identity = None;
        self.last_error = None;
        true
    }

    pub fn kind(&self) -> PrincipalKind {
        self.kind
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Why the most recent verification failed, if it did.
    ///
    /// Cleared when a new verification starts or a login succeeds.
    pub fn last_error(&self) -> Option<FailureReason> {
        self.last_error
    }

    pub fn is_authenticated(&self) -> bool {
        self.status == Status::Authenticated
    }

    pub fn is_verifying(&self) -> bool {
        self.status == Status::Verifying
    }

    pub fn is_settled(&self) -> bool {
        self.status.is_settled()
    }

    /// `true` right after a rejected verification (until the next action).
    pub fn is_failed(&self) -> bool {
        self.status == Status::Unauthenticated && self.last_error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cred() -> Credential {
        Credential::parse("abc.def.ghi").unwrap()
    }

    #[test]
    fn test_unauthenticated_holds_nothing() {
        let state = SessionState::unauthenticated(PrincipalKind::User);
        assert_eq!(state.status(), Status::Unauthenticated);
        assert!(state.credential().is_none());
        assert!(state.identity().is_none());
        assert!(!state.is_failed());
    }

    #[test]
    fn test_authenticated_takes_kind_from_identity() {
        let identity = Identity::new(PrincipalKind::Organizer, "o1", "Venue Co");
        let state = SessionState::authenticated(cred(), identity);
        assert_eq!(state.kind(), PrincipalKind::Organizer);
        assert!(state.is_authenticated());
        assert!(state.identity().is_some());
    }

    #[test]
    fn test_begin_verifying_without_credential_is_refused() {
        let mut state = SessionState::unauthenticated(PrincipalKind::User);
        assert!(!state.begin_verifying());
        assert_eq!(state.status(), Status::Unauthenticated);
    }

    #[test]
    fn test_begin_verifying_drops_identity_and_error() {
        let identity = Identity::new(PrincipalKind::User, "u1", "Alice");
        let mut state = SessionState::authenticated(cred(), identity);

        assert!(state.begin_verifying());

        assert!(state.is_verifying());
        assert!(state.identity().is_none());
        assert!(state.credential().is_some());
    }

    #[test]
    fn test_failed_is_unauthenticated_with_reason() {
        let state = SessionState::failed(PrincipalKind::User, FailureReason::Network);
        assert_eq!(state.status(), Status::Unauthenticated);
        assert!(state.is_failed());
        assert!(state.credential().is_none());
        assert_eq!(state.last_error(), Some(FailureReason::Network));
    }

    #[test]
    fn test_only_verifying_is_unsettled() {
        assert!(Status::Unauthenticated.is_settled());
        assert!(Status::Authenticated.is_settled());
        assert!(!Status::Verifying.is_settled());
    }
}
