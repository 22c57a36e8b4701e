//! The canonical identity record and the one function that builds it.
//!
//! The backend does not answer in one shape. Depending on the endpoint and
//! on how a document was serialized, a profile arrives as:
//!
//! - a plain JSON object,
//! - a string containing a JSON-encoded object,
//! - a database document wrapped in `_doc`,
//! - an envelope such as `{ "user": { ... } }`.
//!
//! [`Identity::from_payload`] accepts all of these and is the only place
//! in the client that looks at payload shape. Everything downstream works
//! with [`Identity`] and never branches on where it came from.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Credential, PrincipalKind, ProtocolError};

/// How many wrapper layers (`_doc`, envelope, encoded string) are peeled
/// before a payload is declared malformed.
const MAX_UNWRAP_DEPTH: usize = 4;

/// A normalized, user-facing record of who holds a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Stable backend id.
    pub id: String,

    /// Name to show in headers and menus.
    pub display_name: String,

    /// Which principal this identity belongs to.
    pub kind: PrincipalKind,

    /// Profile picture URL or path, if the account has one.
    pub picture: Option<String>,

    pub email: Option<String>,
}

impl Identity {
    /// Creates an identity with no picture or email.
    pub fn new(
        kind: PrincipalKind,
        id: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            kind,
            picture: None,
            email: None,
        }
    }

    pub fn with_picture(mut self, picture: impl Into<String>) -> Self {
        self.picture = Some(picture.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Normalizes a backend profile payload for the given principal kind.
    ///
    /// # Errors
    /// - [`ProtocolError::MalformedPayload`] / [`ProtocolError::Decode`]:
    ///   the payload is not (a wrapper around) a JSON object
    /// - [`ProtocolError::MissingField`]: no usable id or display name
    /// - [`ProtocolError::PrincipalMismatch`]: the record declares the
    ///   other principal kind
    pub fn from_payload(
        kind: PrincipalKind,
        payload: &Value,
    ) -> Result<Self, ProtocolError> {
        let record = unwrap_record(kind, payload.clone(), 0)?;
        Self::from_record(kind, &record)
    }

    fn from_record(
        kind: PrincipalKind,
        record: &Map<String, Value>,
    ) -> Result<Self, ProtocolError> {
        // Roles other than the two principal kinds (e.g. "admin") are not
        // ours to judge.
        if let Some(found) = first_string(record, &["role", "type", "userType"])
            .and_then(|role| role.parse::<PrincipalKind>().ok())
        {
            if found != kind {
                return Err(ProtocolError::PrincipalMismatch {
                    expected: kind,
                    found,
                });
            }
        }

        let id = record_id(record).ok_or(ProtocolError::MissingField("id"))?;
        let email = first_string(record, &["email"]);
        let display_name = first_string(record, &["name", "fullName", "username"])
            .or_else(|| full_name(record))
            .or_else(|| email.clone())
            .ok_or(ProtocolError::MissingField("name"))?;
        let picture = first_string(
            record,
            &["picture", "profilePicture", "profile_picture", "avatar"],
        );

        Ok(Self {
            id,
            display_name,
            kind,
            picture,
            email,
        })
    }
}

/// A successful login: the issued credential plus who it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginGrant {
    pub credential: Credential,
    pub identity: Identity,
}

impl LoginGrant {
    /// Parses a login response of the form `{ "token": ..., "user": {...} }`.
    ///
    /// Organizer logins may key the record as `organizer` instead of `user`;
    /// both are accepted.
    ///
    /// # Errors
    /// Any [`ProtocolError`]; a token that is not a valid credential is
    /// [`ProtocolError::Credential`].
    pub fn from_payload(
        kind: PrincipalKind,
        payload: &Value,
    ) -> Result<Self, ProtocolError> {
        let body = match payload {
            Value::String(text) => serde_json::from_str(text)?,
            other => other.clone(),
        };
        let found = json_type(&body);
        let Value::Object(map) = body else {
            return Err(ProtocolError::MalformedPayload(format!(
                "login response must be an object, found {found}"
            )));
        };

        let token = first_string(&map, &["token", "accessToken"])
            .ok_or(ProtocolError::MissingField("token"))?;
        let credential = Credential::parse(&token)?;

        let record = envelope_keys(kind)
            .iter()
            .find_map(|key| map.get(*key))
            .ok_or(ProtocolError::MissingField(kind.as_str()))?;
        let identity = Identity::from_payload(kind, record)?;

        Ok(Self {
            credential,
            identity,
        })
    }
}

/// Peels `_doc`, envelope and encoded-string layers until a record remains.
fn unwrap_record(
    kind: PrincipalKind,
    value: Value,
    depth: usize,
) -> Result<Map<String, Value>, ProtocolError> {
    if depth > MAX_UNWRAP_DEPTH {
        return Err(ProtocolError::MalformedPayload(
            "payload is nested too deeply".into(),
        ));
    }

    match value {
        Value::String(text) => {
            let inner: Value = serde_json::from_str(&text)?;
            unwrap_record(kind, inner, depth + 1)
        }
        Value::Object(mut map) => {
            if let Some(doc) = map.remove("_doc") {
                return unwrap_record(kind, doc, depth + 1);
            }
            // Only a record without its own id can be an envelope.
            if record_id(&map).is_none() {
                let key = envelope_keys(kind).iter().copied().find(|key| {
                    map.get(*key)
                        .is_some_and(|v| v.is_object() || v.is_string())
                });
                if let Some(inner) = key.and_then(|key| map.remove(key)) {
                    return unwrap_record(kind, inner, depth + 1);
                }
            }
            Ok(map)
        }
        other => Err(ProtocolError::MalformedPayload(format!(
            "expected an object, found {}",
            json_type(&other)
        ))),
    }
}

fn envelope_keys(kind: PrincipalKind) -> &'static [&'static str] {
    match kind {
        PrincipalKind::User => &["user", "data", "profile"],
        PrincipalKind::Organizer => &["organizer", "user", "data", "profile"],
    }
}

/// `id` or `_id`, as a string, a number, or an extended-JSON `{"$oid": ..}`.
fn record_id(record: &Map<String, Value>) -> Option<String> {
    ["id", "_id"].iter().find_map(|key| match record.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(o) => match o.get("$oid") {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            _ => None,
        },
        _ => None,
    })
}

fn first_string(record: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match record.get(*key) {
        Some(Value::String(s)) if !s.trim().is_empty() => {
            Some(s.trim().to_string())
        }
        _ => None,
    })
}

fn full_name(record: &Map<String, Value>) -> Option<String> {
    let parts: Vec<String> = [
        first_string(record, &["firstName", "first_name"]),
        first_string(record, &["lastName", "last_name"]),
    ]
    .into_iter()
    .flatten()
    .collect();

    (!parts.is_empty()).then(|| parts.join(" "))
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
