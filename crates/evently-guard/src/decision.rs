//! The guard rule, as a pure function of the two session snapshots.

use evently_protocol::PrincipalKind;
use evently_session::SessionState;
use serde::{Deserialize, Serialize};

/// Which principal a protected view needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Requirement {
    User,
    Organizer,
    /// Either session will do.
    Any,
}

impl Requirement {
    /// The slices this requirement depends on.
    pub fn kinds(self) -> &'static [PrincipalKind] {
        match self {
            Self::User => &[PrincipalKind::User],
            Self::Organizer => &[PrincipalKind::Organizer],
            Self::Any => &PrincipalKind::ALL,
        }
    }

    /// The principal whose login page an unmet requirement redirects to.
    /// `Any` sends people to the attendee login.
    pub fn login_kind(self) -> PrincipalKind {
        match self {
            Self::User | Self::Any => PrincipalKind::User,
            Self::Organizer => PrincipalKind::Organizer,
        }
    }
}

impl From<PrincipalKind> for Requirement {
    fn from(kind: PrincipalKind) -> Self {
        match kind {
            PrincipalKind::User => Self::User,
            PrincipalKind::Organizer => Self::Organizer,
        }
    }
}

/// Login routes the guard redirects to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardRoutes {
    pub user_login: String,
    pub organizer_login: String,
}

impl Default for GuardRoutes {
    fn default() -> Self {
        Self {
            user_login: "/auth/login".to_string(),
            organizer_login: "/organizer/login".to_string(),
        }
    }
}

impl GuardRoutes {
    pub fn login_for(&self, kind: PrincipalKind) -> &str {
        match kind {
            PrincipalKind::User => &self.user_login,
            PrincipalKind::Organizer => &self.organizer_login,
        }
    }
}

/// What a protected view should do right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum GuardDecision {
    /// Render nothing yet.
    Suspend,
    /// Render the protected content.
    Render,
    /// Navigate to `to`; after login, return to `return_to`.
    Redirect { to: String, return_to: String },
}

impl GuardDecision {
    pub fn is_suspended(&self) -> bool {
        matches!(self, Self::Suspend)
    }
}

/// Applies the guard rule.
///
/// - `User` / `Organizer`: verifying → `Suspend`; authenticated →
///   `Render`; otherwise redirect to that principal's login.
/// - `Any`: an authenticated slice renders straight away, even if the
///   other is still verifying; otherwise any verifying slice suspends;
///   otherwise redirect to the user login.
pub fn decide(
    requirement: Requirement,
    routes: &GuardRoutes,
    user: &SessionState,
    organizer: &SessionState,
    requested_path: &str,
) -> GuardDecision {
    let states: Vec<&SessionState> = requirement
        .kinds()
        .iter()
        .map(|kind| match kind {
            PrincipalKind::User => user,
            PrincipalKind::Organizer => organizer,
        })
        .collect();

    if states.iter().any(|s| s.is_authenticated()) {
        GuardDecision::Render
    } else if states.iter().any(|s| s.is_verifying()) {
        GuardDecision::Suspend
    } else {
        GuardDecision::Redirect {
            to: routes.login_for(requirement.login_kind()).to_string(),
            return_to: requested_path.to_string(),
        }
    }
}
