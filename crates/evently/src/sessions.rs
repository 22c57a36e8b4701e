//! `Sessions` builder and the two-slice handle.
//!
//! This is the entry point for a client. It ties together all the layers:
//! storage → repair → slices → resolver → guard.

use std::sync::Arc;

use evently_api::ApiClient;
use evently_guard::{GuardRoutes, Requirement, RouteGuard};
use evently_protocol::{Credential, LoginGrant, PrincipalKind};
use evently_session::{
    ActivePrincipal, FailureReason, SessionSlice, SessionState, SessionWatcher,
    Status, Verifier, resolve,
};
use evently_store::{CredentialStore, FileStorage, RepairOutcome, Storage};
use serde::Serialize;

use crate::{ClientConfig, ConfigError, EventlyError};

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for configuring and starting a [`Sessions`].
///
/// # Example
///
/// ```rust,no_run
/// use evently::prelude::*;
///
/// # async fn run() -> Result<(), EventlyError> {
/// let config = ClientConfig::from_json_file("evently.json")?;
/// let sessions = Sessions::builder()
///     .config(config)
///     .storage(MemoryStorage::new())
///     .connect()
///     .await?;
/// println!("{:?}", sessions.active());
/// # Ok(())
/// # }
/// ```
pub struct SessionsBuilder<V> {
    config: ClientConfig,
    storage: Option<Arc<dyn Storage>>,
    verifier: Option<Arc<V>>,
}

impl<V: Verifier> SessionsBuilder<V> {
    /// Sets the client configuration.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the storage backend. Defaults to a
    /// [`FileStorage`] at `config.storage_path`.
    pub fn storage(mut self, storage: impl Storage) -> Self {
        self.storage = Some(Arc::new(storage));
        self
    }

    /// Sets a storage backend that is also used elsewhere.
    pub fn shared_storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Sets the verifier both slices use.
    pub fn verifier<W: Verifier>(self, verifier: W) -> SessionsBuilder<W> {
        SessionsBuilder {
            config: self.config,
            storage: self.storage,
            verifier: Some(Arc::new(verifier)),
        }
    }

    /// Repairs both persisted keys and constructs the slices, without
    /// verifying anything yet.
    ///
    /// Each slice holds its stored credential (if any) until something
    /// calls `bootstrap()` on it: [`Sessions::bootstrap`], or a guard
    /// mounted through [`Sessions::guard`].
    ///
    /// # Errors
    /// [`ConfigError::MissingVerifier`] if no verifier was set.
    pub fn build(self) -> Result<Sessions<V>, EventlyError> {
        let config = self.config.validated();
        let verifier = self.verifier.ok_or(ConfigError::MissingVerifier)?;
        let storage = match self.storage {
            Some(storage) => storage,
            None => {
                tracing::debug!(path = %config.storage_path.display(), "using file storage");
                Arc::new(FileStorage::new(&config.storage_path))
            }
        };

        let store = CredentialStore::from_shared(storage);
        for (kind, outcome) in store.repair_all() {
            tracing::debug!(%kind, ?outcome, "startup repair");
        }

        let user = SessionSlice::new(PrincipalKind::User, store.clone(), Arc::clone(&verifier));
        let organizer = SessionSlice::new(PrincipalKind::Organizer, store.clone(), verifier);

        Ok(Sessions {
            store,
            user,
            organizer,
            routes: config.routes,
        })
    }

    /// [`build`](Self::build), then bootstrap both slices concurrently.
    ///
    /// Returns once both have settled, so this waits for the backend (up
    /// to the verifier's own timeout).
    ///
    /// # Errors
    /// Same as [`build`](Self::build). Verification failures are not
    /// errors here; they leave the slice `Unauthenticated`.
    pub async fn start(self) -> Result<Sessions<V>, EventlyError> {
        let sessions = self.build()?;
        let (user, organizer) = sessions.bootstrap().await;
        tracing::info!(
            user = %user.status(),
            organizer = %organizer.status(),
            "sessions started"
        );
        Ok(sessions)
    }
}

impl SessionsBuilder<ApiClient> {
    /// [`start`](Self::start) with an [`ApiClient`] built from the config,
    /// unless a verifier has already been set.
    ///
    /// # Errors
    /// [`EventlyError::Api`] if the configured base URL is unusable.
    pub async fn connect(mut self) -> Result<Sessions<ApiClient>, EventlyError> {
        if self.verifier.is_none() {
            let client = self.config.clone().validated().api_client()?;
            self.verifier = Some(Arc::new(client));
        }
        self.start().await
    }
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

/// Both session slices plus the store behind them.
///
/// Cheap to clone; clones share the same slices.
pub struct Sessions<V: Verifier> {
    store: CredentialStore,
    user: SessionSlice<V>,
    organizer: SessionSlice<V>,
    routes: GuardRoutes,
}

impl<V: Verifier> Clone for Sessions<V> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            user: self.user.clone(),
            organizer: self.organizer.clone(),
            routes: self.routes.clone(),
        }
    }
}

impl<V: Verifier> std::fmt::Debug for Sessions<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sessions")
            .field("user", &self.user)
            .field("organizer", &self.organizer)
            .finish_non_exhaustive()
    }
}

impl Sessions<ApiClient> {
    /// Creates a new builder.
    pub fn builder() -> SessionsBuilder<ApiClient> {
        SessionsBuilder {
            config: ClientConfig::default(),
            storage: None,
            verifier: None,
        }
    }
}

impl<V: Verifier> Sessions<V> {
    pub fn user(&self) -> &SessionSlice<V> {
        &self.user
    }

    pub fn organizer(&self) -> &SessionSlice<V> {
        &self.organizer
    }

    pub fn slice(&self, kind: PrincipalKind) -> &SessionSlice<V> {
        match kind {
            PrincipalKind::User => &self.user,
            PrincipalKind::Organizer => &self.organizer,
        }
    }

    /// The identity the UI should show right now. Organizer wins when both
    /// are signed in.
    pub fn active(&self) -> ActivePrincipal {
        resolve(&self.user.snapshot(), &self.organizer.snapshot())
    }

    /// A read-only handle that follows the active principal.
    pub fn watch(&self) -> ActiveWatcher {
        ActiveWatcher {
            user: self.user.subscribe(),
            organizer: self.organizer.subscribe(),
        }
    }

    /// Mounts a guard for a protected view.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn guard(&self, requirement: Requirement) -> RouteGuard {
        RouteGuard::mount(requirement, self.routes.clone(), &self.user, &self.organizer)
    }

    /// Bootstraps both slices concurrently; returns where each landed.
    pub async fn bootstrap(&self) -> (SessionState, SessionState) {
        tokio::join!(self.user.bootstrap(), self.organizer.bootstrap())
    }

    /// Applies a login to the slice its identity belongs to.
    ///
    /// # Errors
    /// Whatever [`SessionSlice::login`] refuses.
    pub fn sign_in(&self, grant: LoginGrant) -> Result<(), EventlyError> {
        self.slice(grant.identity.kind).login(grant)?;
        Ok(())
    }

    /// Re-runs persistence repair on both keys.
    pub fn repair(&self) -> [(PrincipalKind, RepairOutcome); 2] {
        [
            (PrincipalKind::User, self.user.repair()),
            (PrincipalKind::Organizer, self.organizer.repair()),
        ]
    }

    /// Logs both principals out.
    pub fn logout_all(&self) {
        self.user.logout();
        self.organizer.logout();
    }

    /// A redacted snapshot of everything session-related, for debugging.
    ///
    /// Stored values are described by shape only; no credential text
    /// leaves this method.
    pub fn diagnostics(&self) -> Diagnostics {
        let report = |slice: &SessionSlice<V>| {
            let kind = slice.kind();
            let state = slice.snapshot();
            SliceDiagnostics {
                kind,
                key: kind.storage_key(),
                stored: StoredValue::classify(self.store.raw(kind.storage_key()).as_deref()),
                status: state.status(),
                bootstrapped: slice.has_bootstrapped(),
                identity_id: state.identity().map(|identity| identity.id.clone()),
                last_error: state.last_error(),
            }
        };

        Diagnostics {
            user: report(&self.user),
            organizer: report(&self.organizer),
            active: self.active(),
        }
    }
}

// ---------------------------------------------------------------------------
// ActiveWatcher
// ---------------------------------------------------------------------------

/// Follows the resolved active principal across both slices.
#[derive(Debug, Clone)]
pub struct ActiveWatcher {
    user: SessionWatcher,
    organizer: SessionWatcher,
}

impl ActiveWatcher {
    pub fn current(&self) -> ActivePrincipal {
        resolve(&self.user.current(), &self.organizer.current())
    }

    /// Waits for either slice to change and returns the new resolution.
    ///
    /// Returns `None` once the slices have been dropped.
    pub async fn changed(&mut self) -> Option<ActivePrincipal> {
        let alive = tokio::select! {
            state = self.user.changed() => state.is_some(),
            state = self.organizer.changed() => state.is_some(),
        };
        alive.then(|| self.current())
    }
}

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

/// What [`Sessions::diagnostics`] reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    pub user: SliceDiagnostics,
    pub organizer: SliceDiagnostics,
    pub active: ActivePrincipal,
}

/// One slice's entry in [`Diagnostics`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SliceDiagnostics {
    pub kind: PrincipalKind,
    pub key: &'static str,
    pub stored: StoredValue,
    pub status: Status,
    pub bootstrapped: bool,
    pub identity_id: Option<String>,
    pub last_error: Option<FailureReason>,
}

/// The shape of a persisted value, without the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum StoredValue {
    Absent,
    /// `"null"`, `"undefined"` or empty.
    Placeholder,
    /// Wrapped in quotes; repair will strip them.
    Quoted,
    Credential { length: usize },
    Malformed { length: usize },
}

impl StoredValue {
    fn classify(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Self::Absent;
        };
        if raw.is_empty() || raw == "null" || raw == "undefined" {
            Self::Placeholder
        } else if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
            Self::Quoted
        } else if Credential::parse(raw).is_ok() {
            Self::Credential { length: raw.len() }
        } else {
            Self::Malformed { length: raw.len() }
        }
    }
}
