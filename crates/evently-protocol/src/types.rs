//! Principal kinds and the fixed names attached to each.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// The kind of actor a session belongs to.
///
/// The client can hold one session of each kind simultaneously. Everything
/// that differs between the two (storage key, endpoints, login route) is
/// derived from this enum so no call site spells those strings itself.
///
/// Serialized in lowercase: `"user"`, `"organizer"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrincipalKind {
    /// An attendee account.
    User,
    /// An account that creates and manages events.
    Organizer,
}

impl PrincipalKind {
    /// Both kinds, user first.
    pub const ALL: [PrincipalKind; 2] = [Self::User, Self::Organizer];

    /// Persisted-storage key holding this principal's credential.
    pub const fn storage_key(self) -> &'static str {
        match self {
            Self::User => "token",
            Self::Organizer => "organizer_token",
        }
    }

    /// Backend path that validates a credential and returns the profile.
    pub const fn profile_path(self) -> &'static str {
        match self {
            Self::User => "/users/profile",
            Self::Organizer => "/organizer/profile",
        }
    }

    /// Backend path that exchanges email + password for a credential.
    pub const fn login_path(self) -> &'static str {
        match self {
            Self::User => "/users/login",
            Self::Organizer => "/organizer/login",
        }
    }

    /// Lowercase name, as used on the wire.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Organizer => "organizer",
        }
    }
}

impl fmt::Display for PrincipalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case-insensitive, so `"Organizer"` from a role field parses too.
impl FromStr for PrincipalKind {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Self::User),
            "organizer" => Ok(Self::Organizer),
            _ => Err(ProtocolError::UnknownPrincipal(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_key_per_kind() {
        assert_eq!(PrincipalKind::User.storage_key(), "token");
        assert_eq!(PrincipalKind::Organizer.storage_key(), "organizer_token");
    }

    #[test]
    fn test_endpoints_per_kind() {
        assert_eq!(PrincipalKind::User.profile_path(), "/users/profile");
        assert_eq!(PrincipalKind::Organizer.profile_path(), "/organizer/profile");
        assert_eq!(PrincipalKind::User.login_path(), "/users/login");
        assert_eq!(PrincipalKind::Organizer.login_path(), "/organizer/login");
    }

    #[test]
    fn test_from_str_is_case_insensitive() {
        assert_eq!("Organizer".parse::<PrincipalKind>().unwrap(), PrincipalKind::Organizer);
        assert_eq!(" user ".parse::<PrincipalKind>().unwrap(), PrincipalKind::User);
    }

    #[test]
    fn test_from_str_unknown_returns_error() {
        let err = "admin".parse::<PrincipalKind>().unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownPrincipal(ref s) if s == "admin"));
    }

    #[test]
    fn test_serde_uses_lowercase() {
        let json = serde_json::to_string(&PrincipalKind::Organizer).unwrap();
        assert_eq!(json, "\"organizer\"");
    }
}
