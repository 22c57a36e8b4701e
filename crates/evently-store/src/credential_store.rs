//! The credential store and the persistence repair service.
//!
//! Every read and write of the `token` / `organizer_token` keys goes
//! through [`CredentialStore`]. Headers, hooks and debug tooling that want
//! to know about a credential ask this type (or, better, the session
//! layer above it) rather than touching storage themselves.

use std::fmt;
use std::sync::Arc;

use evently_protocol::{Credential, CredentialError, PrincipalKind};

use crate::Storage;

/// Stored strings that mean "nothing here". Older code paths wrote them
/// by stringifying an absent value.
const PLACEHOLDERS: [&str; 2] = ["null", "undefined"];

/// What [`CredentialStore::repair`] did to a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairOutcome {
    /// Nothing was stored.
    Absent,
    /// The stored value was already clean and was left alone.
    Clean,
    /// One layer of surrounding quotes was stripped and the value rewritten.
    Unquoted,
    /// The value was a placeholder (or empty) and the key was deleted.
    Removed,
}

/// Typed access to persisted credentials.
///
/// Cheap to clone; clones share the same backend.
#[derive(Clone)]
pub struct CredentialStore {
    storage: Arc<dyn Storage>,
}

impl CredentialStore {
    /// Wraps a storage backend.
    pub fn new(storage: impl Storage) -> Self {
        Self {
            storage: Arc::new(storage),
        }
    }

    /// Wraps a backend that is shared with other owners.
    pub fn from_shared(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    // -- Raw key access ---------------------------------------------------

    /// Returns the value under `key`.
    ///
    /// `None` covers true absence *and* the literals `"null"` /
    /// `"undefined"`, so callers never have to special-case them. A backend
    /// failure is logged and reported as absence.
    pub fn get(&self, key: &str) -> Option<String> {
        self.raw(key)
            .filter(|value| !PLACEHOLDERS.contains(&value.as_str()))
    }

    /// Writes `value` under `key`. Backend failures are logged, not returned.
    pub fn set(&self, key: &str, value: &str) {
        if let Err(e) = self.storage.set(key, value) {
            tracing::error!(key, error = %e, "failed to persist value");
        }
    }

    /// Deletes `key`. Backend failures are logged, not returned.
    pub fn remove(&self, key: &str) {
        if let Err(e) = self.storage.remove(key) {
            tracing::error!(key, error = %e, "failed to remove persisted value");
        }
    }

    /// The stored string exactly as written, placeholders included.
    ///
    /// Only diagnostics should need this; everything else wants [`get`](Self::get).
    pub fn raw(&self, key: &str) -> Option<String> {
        match self.storage.get(key) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key, error = %e, "failed to read persisted value");
                None
            }
        }
    }

    // -- Principal credentials ------------------------------------------

    /// Loads the credential for `kind`.
    ///
    /// - `Ok(None)`: nothing stored
    /// - `Ok(Some(_))`: a syntactically valid credential
    /// - `Err(_)`: something is stored but it is not a credential
    pub fn load(
        &self,
        kind: PrincipalKind,
    ) -> Result<Option<Credential>, CredentialError> {
        self.get(kind.storage_key())
            .map(|raw| Credential::parse(&raw))
            .transpose()
    }

    /// Persists `credential` as the credential for `kind`.
    pub fn save(&self, kind: PrincipalKind, credential: &Credential) {
        self.set(kind.storage_key(), credential.as_str());
    }

    /// Deletes the credential for `kind`.
    pub fn clear(&self, kind: PrincipalKind) {
        self.remove(kind.storage_key());
    }

    // -- Repair -----------------------------------------------------------

    /// Fixes a corrupted persisted value in place.
    ///
    /// - A value wrapped in `"` has exactly one layer stripped and is
    ///   rewritten.
    /// - A value that is (after stripping) `"null"`, `"undefined"` or empty
    ///   is deleted.
    /// - Anything else is left untouched.
    ///
    /// Safe to call any number of times: a clean value is never rewritten.
    pub fn repair(&self, key: &str) -> RepairOutcome {
        let Some(raw) = self.raw(key) else {
            return RepairOutcome::Absent;
        };

        let unquoted = strip_quotes(&raw);
        let value = unquoted.unwrap_or(&raw);

        let outcome = if value.is_empty() || PLACEHOLDERS.contains(&value) {
            self.remove(key);
            RepairOutcome::Removed
        } else if let Some(value) = unquoted {
            self.set(key, value);
            RepairOutcome::Unquoted
        } else {
            RepairOutcome::Clean
        };

        if outcome != RepairOutcome::Clean {
            tracing::info!(key, ?outcome, "repaired persisted value");
        }
        outcome
    }

    /// Repairs the credential key for `kind`.
    pub fn repair_kind(&self, kind: PrincipalKind) -> RepairOutcome {
        self.repair(kind.storage_key())
    }

    /// Repairs both principal keys, user first.
    pub fn repair_all(&self) -> [(PrincipalKind, RepairOutcome); 2] {
        PrincipalKind::ALL.map(|kind| (kind, self.repair_kind(kind)))
    }
}

impl fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialStore").finish_non_exhaustive()
    }
}

fn strip_quotes(raw: &str) -> Option<&str> {
    raw.strip_prefix('"')?.strip_suffix('"')
}
