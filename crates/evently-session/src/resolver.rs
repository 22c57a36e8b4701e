//! Identity resolution: which of the two sessions the UI presents.
//!
//! Headers, profile links and menus all need one answer to "who is signed
//! in?". They get it from [`resolve`] and nowhere else.

use evently_protocol::{Identity, PrincipalKind};
use serde::Serialize;

use crate::SessionState;

/// The identity the UI acts as, derived from both slices.
///
/// Serializes as `{"type": "user" | "organizer" | "none", "identity": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "identity", rename_all = "lowercase")]
pub enum ActivePrincipal {
    None,
    User(Identity),
    Organizer(Identity),
}

impl ActivePrincipal {
    /// The principal kind in charge, or `None` when nobody is signed in.
    pub fn kind(&self) -> Option<PrincipalKind> {
        match self {
            Self::None => None,
            Self::User(_) => Some(PrincipalKind::User),
            Self::Organizer(_) => Some(PrincipalKind::Organizer),
        }
    }

    /// `"user"`, `"organizer"` or `"none"`.
    pub fn type_name(&self) -> &'static str {
        self.kind().map_or("none", PrincipalKind::as_str)
    }

    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Self::None => None,
            Self::User(identity) | Self::Organizer(identity) => Some(identity),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

impl From<Identity> for ActivePrincipal {
    fn from(identity: Identity) -> Self {
        match identity.kind {
            PrincipalKind::User => Self::User(identity),
            PrincipalKind::Organizer => Self::Organizer(identity),
        }
    }
}

/// Combines the user and organizer slices into one [`ActivePrincipal`].
///
/// When both are authenticated the **organizer wins**: navigation and
/// profile links switch to the organizer context. A slice that is still
/// verifying contributes nothing, so this can run on intermediate states
/// and simply reports whichever slice has settled as authenticated.
pub fn resolve(user: &SessionState, organizer: &SessionState) -> ActivePrincipal {
    organizer
        .identity()
        .or(user.identity())
        .cloned()
        .map_or(ActivePrincipal::None, ActivePrincipal::from)
}
