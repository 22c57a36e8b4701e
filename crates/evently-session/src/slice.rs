//! The session slice: one principal's session state machine.
//!
//! There is one slice per [`PrincipalKind`]. Both are structurally
//! identical and fully independent; neither ever looks at the other.
//!
//! # Concurrency note
//!
//! The live state sits in a `tokio::sync::watch` channel. Every transition
//! is a single `send_if_modified` closure, and the matching write to the
//! [`CredentialStore`] happens inside that same closure, so the in-memory
//! state and the persisted key never disagree for an observer.
//!
//! Verifications are tagged with an *epoch*. `logout`, `login_success` and
//! any newer verification bump it; a verification that settles under a
//! stale epoch has its result thrown away instead of applied.
//!
//! Storage writes run inside those closures, so a [`FileStorage`] backend
//! does blocking file I/O while the channel's write lock is held. Readers
//! wait for at most one small JSON write; a backend that can block for
//! longer should not be used here.
//!
//! [`FileStorage`]: evently_store::FileStorage

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use evently_protocol::{Credential, Identity, LoginGrant, PrincipalKind};
use evently_store::{CredentialStore, RepairOutcome};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::{
    FailureReason, SessionError, SessionState, Status, Verifier, VerifyError,
};

/// What the watch channel carries: the public state plus bookkeeping.
#[derive(Debug, Clone)]
struct Slot {
    state: SessionState,
    epoch: u64,
    bootstrapped: bool,
}

/// Everything needed to run one verification, captured when it starts.
struct Ticket<V: Verifier> {
    credential: Credential,
    epoch: u64,
    pending: PendingVerification<V>,
}

enum Begin<V: Verifier> {
    Started(Ticket<V>),
    /// Bootstrap found the slice already verifying or authenticated.
    Skipped,
    NoCredential,
}

struct Inner<V> {
    kind: PrincipalKind,
    store: CredentialStore,
    verifier: Arc<V>,
    slot: watch::Sender<Slot>,
    /// The background bootstrap shared by every [`BootstrapLease`] holder.
    shared: Mutex<Weak<BootstrapTask>>,
}

/// One principal's session: credential, identity and status.
///
/// Cheap to clone; clones share the same state. Views should not hold a
/// slice at all, only a [`SessionWatcher`] from [`subscribe`](Self::subscribe).
pub struct SessionSlice<V: Verifier> {
    inner: Arc<Inner<V>>,
}

impl<V: Verifier> Clone for SessionSlice<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V: Verifier> fmt::Debug for SessionSlice<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionSlice")
            .field("kind", &self.inner.kind)
            .field("state", &self.snapshot())
            .finish_non_exhaustive()
    }
}

impl<V: Verifier> SessionSlice<V> {
    /// Creates the slice for `kind`.
    ///
    /// Repairs the persisted key *before* reading it, so a slice can never
    /// observe a value the repair service has not seen. A valid credential
    /// is held, pending [`bootstrap`](Self::bootstrap); a value that is
    /// still malformed after repair is deleted.
    pub fn new(
        kind: PrincipalKind,
        store: CredentialStore,
        verifier: Arc<V>,
    ) -> Self {
        store.repair_kind(kind);

        let mut state = SessionState::unauthenticated(kind);
        state.hold(load_credential(&store, kind));

        let (slot, _) = watch::channel(Slot {
            state,
            epoch: 0,
            bootstrapped: false,
        });

        Self {
            inner: Arc::new(Inner {
                kind,
                store,
                verifier,
                slot,
                shared: Mutex::new(Weak::new()),
            }),
        }
    }

    pub fn kind(&self) -> PrincipalKind {
        self.inner.kind
    }

    /// The current state.
    pub fn snapshot(&self) -> SessionState {
        self.inner.slot.borrow().state.clone()
    }

    /// A read-only handle that can await changes.
    pub fn subscribe(&self) -> SessionWatcher {
        SessionWatcher {
            rx: self.inner.slot.subscribe(),
        }
    }

    /// Whether [`bootstrap`](Self::bootstrap) has run (or a login made it
    /// unnecessary).
    pub fn has_bootstrapped(&self) -> bool {
        self.inner.slot.borrow().bootstrapped
    }

    // -- Actions ----------------------------------------------------------

    /// Resumes a persisted session.
    ///
    /// With a held credential, the slice enters `Verifying` as soon as this
    /// is called, before the returned future is first polled, and the
    /// future then waits for the verifier. Without one, stays
    /// `Unauthenticated`. Already `Verifying` or `Authenticated` → no-op.
    ///
    /// Failures are absorbed into the state; the returned snapshot says
    /// where the slice landed. Dropping the future unfinished rolls the
    /// slice back out of `Verifying`.
    pub fn bootstrap(&self) -> impl Future<Output = SessionState> + Send + 'static {
        let begin = self.begin(true);
        let this = self.clone();
        async move {
            match begin {
                Begin::Started(ticket) => {
                    // Failures are already logged and recorded on the state.
                    let _ = this.run(ticket).await;
                }
                Begin::Skipped => {
                    tracing::trace!(kind = %this.kind(), "bootstrap skipped");
                }
                Begin::NoCredential => {
                    tracing::debug!(kind = %this.kind(), "no stored credential");
                }
            }
            this.snapshot()
        }
    }

    /// Runs [`bootstrap`](Self::bootstrap) as a background task that any
    /// number of owners can share.
    ///
    /// Joins the running task if there is one. Otherwise starts a new one
    /// whenever the slice is `Unauthenticated` and holds a credential,
    /// whether or not it has bootstrapped before: a credential reloaded by
    /// [`repair`](Self::repair), or one whose verification was cancelled,
    /// still needs checking. Returns `None` when there is nothing to run.
    ///
    /// The task is aborted, and the slice rolled back, only once the last
    /// lease is dropped. Must be called from within a Tokio runtime.
    pub fn bootstrap_shared(&self) -> Option<BootstrapLease> {
        let mut shared = self
            .inner
            .shared
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(task) = shared.upgrade() {
            if !task.handle.is_finished() {
                return Some(BootstrapLease { task });
            }
        }

        let Begin::Started(ticket) = self.begin(true) else {
            return None;
        };

        let kind = self.kind();
        let this = self.clone();
        let handle = tokio::spawn(async move {
            // Failures are already logged and recorded on the state.
            let _ = this.run(ticket).await;
        });
        tracing::debug!(%kind, "shared bootstrap started");

        let task = Arc::new(BootstrapTask { kind, handle });
        *shared = Arc::downgrade(&task);
        Some(BootstrapLease { task })
    }

    /// Re-checks the held credential with the backend.
    ///
    /// Any failure clears the session and its persisted key (fail-closed).
    ///
    /// # Errors
    /// - [`SessionError::MissingCredential`]: nothing to verify
    /// - [`SessionError::Verification`]: rejected; the session is cleared
    /// - [`SessionError::Superseded`]: a logout, login or newer verify
    ///   won the race; this result was discarded
    pub async fn verify(&self) -> Result<Identity, SessionError> {
        match self.begin(false) {
            Begin::Started(ticket) => self.run(ticket).await,
            Begin::Skipped | Begin::NoCredential => {
                Err(SessionError::MissingCredential(self.kind()))
            }
        }
    }

    /// Records a successful login and persists its credential.
    ///
    /// # Errors
    /// Refuses, storing nothing and leaving the state untouched, when
    /// `credential` is empty or malformed
    /// ([`SessionError::InvalidCredential`]) or `identity` belongs to the
    /// other principal ([`SessionError::IdentityMismatch`]).
    pub fn login_success(
        &self,
        credential: &str,
        identity: Identity,
    ) -> Result<(), SessionError> {
        let kind = self.kind();
        let credential = Credential::parse(credential).map_err(|source| {
            tracing::warn!(%kind, error = %source, "login rejected: bad credential");
            SessionError::InvalidCredential { kind, source }
        })?;
        self.accept(credential, identity)
    }

    /// [`login_success`](Self::login_success) for an already-parsed grant.
    ///
    /// # Errors
    /// [`SessionError::IdentityMismatch`] if the grant is for the other
    /// principal.
    pub fn login(&self, grant: LoginGrant) -> Result<(), SessionError> {
        self.accept(grant.credential, grant.identity)
    }

    /// Ends the session. Synchronous, and always ends `Unauthenticated`
    /// with the persisted key removed. Any verification in flight is
    /// discarded when it settles.
    pub fn logout(&self) {
        let kind = self.kind();
        let store = &self.inner.store;
        self.inner.slot.send_modify(|slot| {
            slot.epoch += 1;
            store.clear(kind);
            slot.state = SessionState::unauthenticated(kind);
        });
        tracing::info!(%kind, "logged out");
    }

    /// Re-runs the repair service for this slice's key.
    ///
    /// An `Unauthenticated` slice then reloads its pending credential from
    /// the repaired value. A clean key is left alone, so this is safe to
    /// call on every route change.
    pub fn repair(&self) -> RepairOutcome {
        let kind = self.kind();
        let store = &self.inner.store;
        let outcome = store.repair_kind(kind);

        self.inner.slot.send_if_modified(|slot| {
            if slot.state.status() != Status::Unauthenticated {
                return false;
            }
            let reloaded = load_credential(store, kind);
            if slot.state.credential() == reloaded.as_ref() {
                return false;
            }
            slot.state.hold(reloaded);
            true
        });

        outcome
    }

    // -- Internals --------------------------------------------------------

    fn accept(
        &self,
        credential: Credential,
        identity: Identity,
    ) -> Result<(), SessionError> {
        let kind = self.kind();
        if identity.kind != kind {
            tracing::warn!(%kind, found = %identity.kind, "login rejected: identity mismatch");
            return Err(SessionError::IdentityMismatch {
                expected: kind,
                found: identity.kind,
            });
        }

        let id = identity.id.clone();
        let store = &self.inner.store;
        self.inner.slot.send_modify(|slot| {
            slot.epoch += 1;
            slot.bootstrapped = true;
            store.save(kind, &credential);
            slot.state = SessionState::authenticated(credential, identity);
        });

        tracing::info!(%kind, %id, "logged in");
        Ok(())
    }

    /// Atomically decides whether a verification starts and, if so, moves
    /// the slice to `Verifying` under a fresh epoch.
    fn begin(&self, bootstrap: bool) -> Begin<V> {
        let mut begin = Begin::Skipped;

        self.inner.slot.send_if_modified(|slot| {
            let was_bootstrapped = slot.bootstrapped;
            if bootstrap {
                slot.bootstrapped = true;
                if slot.state.status() != Status::Unauthenticated {
                    return false;
                }
            }

            let Some(credential) = slot.state.credential().cloned() else {
                begin = Begin::NoCredential;
                return false;
            };

            // Rolling back onto another verification's `Verifying` would
            // strand the slice, since that verification is now stale.
            let previous = if slot.state.is_verifying() {
                let mut pending = SessionState::unauthenticated(slot.state.kind());
                pending.hold(Some(credential.clone()));
                pending
            } else {
                slot.state.clone()
            };
            slot.epoch += 1;
            slot.state.begin_verifying();

            begin = Begin::Started(Ticket {
                credential,
                epoch: slot.epoch,
                pending: PendingVerification {
                    inner: Arc::clone(&self.inner),
                    epoch: slot.epoch,
                    rollback: Some((previous, was_bootstrapped)),
                },
            });
            true
        });

        begin
    }

    async fn run(&self, ticket: Ticket<V>) -> Result<Identity, SessionError> {
        let kind = self.kind();
        let Ticket {
            credential,
            epoch,
            mut pending,
        } = ticket;
        tracing::debug!(%kind, epoch, "verifying credential");

        let outcome = self.inner.verifier.verify(kind, &credential).await;

        pending.disarm();
        self.settle(epoch, credential, outcome)
    }

    /// Applies a verification outcome, unless its epoch is stale.
    fn settle(
        &self,
        epoch: u64,
        credential: Credential,
        outcome: Result<Identity, VerifyError>,
    ) -> Result<Identity, SessionError> {
        let kind = self.kind();

        // A verifier answering for the wrong principal is a broken response.
        let outcome = outcome.and_then(|identity| {
            if identity.kind == kind {
                Ok(identity)
            } else {
                Err(VerifyError::MalformedResponse(format!(
                    "expected a {kind} identity, got a {}",
                    identity.kind
                )))
            }
        });

        let store = &self.inner.store;
        let mut applied = false;
        self.inner.slot.send_if_modified(|slot| {
            if slot.epoch != epoch {
                return false;
            }
            applied = true;
            slot.state = match &outcome {
                Ok(identity) => {
                    store.save(kind, &credential);
                    SessionState::authenticated(credential, identity.clone())
                }
                Err(e) => {
                    store.clear(kind);
                    SessionState::failed(kind, e.reason())
                }
            };
            true
        });

        if !applied {
            tracing::debug!(%kind, epoch, "discarding superseded verification result");
            return Err(SessionError::Superseded(kind));
        }

        match outcome {
            Ok(identity) => {
                tracing::info!(%kind, id = %identity.id, "session verified");
                Ok(identity)
            }
            Err(source) => {
                if source.reason() == FailureReason::Network {
                    tracing::warn!(%kind, error = %source, "backend unreachable; session cleared");
                } else {
                    tracing::info!(%kind, error = %source, "credential rejected; session cleared");
                }
                Err(SessionError::Verification { kind, source })
            }
        }
    }
}

/// Rolls a slice back out of `Verifying` if the verification future is
/// dropped before it settles (e.g. the component that started it went away).
///
/// The rollback only applies while the epoch is still current; if something
/// newer has happened since, that newer state stays.
struct PendingVerification<V: Verifier> {
    inner: Arc<Inner<V>>,
    epoch: u64,
    rollback: Option<(SessionState, bool)>,
}

impl<V: Verifier> PendingVerification<V> {
    fn disarm(&mut self) {
        self.rollback = None;
    }
}

impl<V: Verifier> Drop for PendingVerification<V> {
    fn drop(&mut self) {
        let Some((previous, was_bootstrapped)) = self.rollback.take() else {
            return;
        };
        let epoch = self.epoch;
        let kind = previous.kind();

        let rolled_back = self.inner.slot.send_if_modified(|slot| {
            if slot.epoch != epoch {
                return false;
            }
            slot.state = previous;
            slot.bootstrapped = was_bootstrapped;
            true
        });

        if rolled_back {
            tracing::debug!(%kind, epoch, "verification cancelled; state rolled back");
        }
    }
}

/// A claim on a slice's shared background bootstrap, from
/// [`SessionSlice::bootstrap_shared`].
///
/// Clones share one task. Dropping the last one aborts it if it is still
/// running.
#[derive(Debug, Clone)]
pub struct BootstrapLease {
    task: Arc<BootstrapTask>,
}

impl BootstrapLease {
    pub fn kind(&self) -> PrincipalKind {
        self.task.kind
    }

    /// Whether the verification has settled (or was aborted).
    pub fn is_finished(&self) -> bool {
        self.task.handle.is_finished()
    }
}

#[derive(Debug)]
struct BootstrapTask {
    kind: PrincipalKind,
    handle: JoinHandle<()>,
}

impl Drop for BootstrapTask {
    fn drop(&mut self) {
        if !self.handle.is_finished() {
            tracing::debug!(kind = %self.kind, "last lease released; aborting bootstrap");
            self.handle.abort();
        }
    }
}

/// Loads a credential, deleting a stored value that is not one.
fn load_credential(
    store: &CredentialStore,
    kind: PrincipalKind,
) -> Option<Credential> {
    match store.load(kind) {
        Ok(credential) => credential,
        Err(e) => {
            tracing::warn!(%kind, error = %e, "discarding malformed stored credential");
            store.clear(kind);
            None
        }
    }
}

// ---------------------------------------------------------------------------
// SessionWatcher
// ---------------------------------------------------------------------------

/// Read-only view of a slice.
///
/// Holding a watcher does not keep a slice's actions reachable: there is
/// no way to mutate through it.
#[derive(Debug, Clone)]
pub struct SessionWatcher {
    rx: watch::Receiver<Slot>,
}

impl SessionWatcher {
    /// The current state.
    pub fn current(&self) -> SessionState {
        self.rx.borrow().state.clone()
    }

    /// Waits for the next change and returns the new state.
    ///
    /// Returns `None` once the slice has been dropped.
    pub async fn changed(&mut self) -> Option<SessionState> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().state.clone())
    }

    /// Waits until no verification is in flight and returns that state.
    ///
    /// Pends for as long as a verification hangs; there is no timeout here.
    pub async fn settled(&mut self) -> SessionState {
        let settled = self
            .rx
            .wait_for(|slot| slot.state.is_settled())
            .await
            .map(|slot| slot.state.clone());
        settled.unwrap_or_else(|_| self.current())
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for the slice's synchronous actions. The async lifecycle
    //! (bootstrap, verify, races, cancellation) lives in
    //! `tests/slice_lifecycle.rs`.

    use evently_store::MemoryStorage;

    use super::*;

    /// Never called by these tests.
    struct UnreachableVerifier;

    impl Verifier for UnreachableVerifier {
        async fn verify(
            &self,
            _kind: PrincipalKind,
            _credential: &Credential,
        ) -> Result<Identity, VerifyError> {
            Err(VerifyError::Network("unreachable".into()))
        }
    }

    fn slice_with(
        kind: PrincipalKind,
        entries: &[(&str, &str)],
    ) -> (SessionSlice<UnreachableVerifier>, MemoryStorage) {
        let storage = MemoryStorage::with_entries(entries.iter().copied());
        let store = CredentialStore::new(storage.clone());
        (
            SessionSlice::new(kind, store, Arc::new(UnreachableVerifier)),
            storage,
        )
    }

    fn alice() -> Identity {
        Identity::new(PrincipalKind::User, "u1", "Alice")
    }

    // =====================================================================
    // new()
    // =====================================================================

    #[test]
    fn test_new_holds_valid_credential_unauthenticated() {
        let (slice, _) = slice_with(PrincipalKind::User, &[("token", "abc.def.ghi")]);
        let state = slice.snapshot();
        assert_eq!(state.status(), Status::Unauthenticated);
        assert_eq!(state.credential().map(Credential::as_str), Some("abc.def.ghi"));
        assert!(!slice.has_bootstrapped());
    }

    #[test]
    fn test_new_repairs_before_reading() {
        let (slice, storage) =
            slice_with(PrincipalKind::User, &[("token", "\"abc.def.ghi\"")]);
        assert_eq!(
            slice.snapshot().credential().map(Credential::as_str),
            Some("abc.def.ghi")
        );
        assert_eq!(
            evently_store::Storage::get(&storage, "token").unwrap().as_deref(),
            Some("abc.def.ghi")
        );
    }

    #[test]
    fn test_new_discards_malformed_credential() {
        let (slice, storage) = slice_with(PrincipalKind::User, &[("token", "garbage")]);
        assert!(slice.snapshot().credential().is_none());
        assert!(storage.is_empty());
    }

    #[test]
    fn test_new_ignores_other_principal_key() {
        let (slice, _) =
            slice_with(PrincipalKind::Organizer, &[("token", "abc.def.ghi")]);
        assert!(slice.snapshot().credential().is_none());
    }

    // =====================================================================
    // login_success()
    // =====================================================================

    #[test]
    fn test_login_success_persists_and_authenticates() {
        let (slice, storage) = slice_with(PrincipalKind::User, &[]);

        slice.login_success("abc.def.ghi", alice()).unwrap();

        let state = slice.snapshot();
        assert!(state.is_authenticated());
        assert_eq!(state.identity(), Some(&alice()));
        assert_eq!(
            evently_store::Storage::get(&storage, "token").unwrap().as_deref(),
            Some("abc.def.ghi")
        );
        assert!(slice.has_bootstrapped());
    }

    #[test]
    fn test_login_success_empty_credential_is_refused() {
        let (slice, storage) = slice_with(PrincipalKind::User, &[]);

        let err = slice.login_success("", alice()).unwrap_err();

        assert!(matches!(err, SessionError::InvalidCredential { .. }));
        assert_eq!(slice.snapshot(), SessionState::unauthenticated(PrincipalKind::User));
        assert!(storage.is_empty());
    }

    #[test]
    fn test_login_success_quoted_credential_is_refused() {
        let (slice, storage) = slice_with(PrincipalKind::User, &[]);
        let err = slice.login_success("\"abc.def.ghi\"", alice()).unwrap_err();
        assert!(matches!(err, SessionError::InvalidCredential { .. }));
        assert!(storage.is_empty());
    }

    #[test]
    fn test_login_success_wrong_identity_kind_is_refused() {
        let (slice, storage) = slice_with(PrincipalKind::Organizer, &[]);
        let err = slice.login_success("abc.def.ghi", alice()).unwrap_err();
        assert!(matches!(
            err,
            SessionError::IdentityMismatch {
                expected: PrincipalKind::Organizer,
                found: PrincipalKind::User,
            }
        ));
        assert!(storage.is_empty());
    }

    // =====================================================================
    // logout()
    // =====================================================================

    #[test]
    fn test_logout_from_authenticated_clears_everything() {
        let (slice, storage) = slice_with(PrincipalKind::User, &[]);
        slice.login_success("abc.def.ghi", alice()).unwrap();

        slice.logout();

        assert_eq!(slice.snapshot(), SessionState::unauthenticated(PrincipalKind::User));
        assert!(storage.is_empty());
    }

    #[test]
    fn test_logout_with_pending_credential_clears_it() {
        let (slice, storage) = slice_with(PrincipalKind::User, &[("token", "abc.def.ghi")]);
        slice.logout();
        assert!(slice.snapshot().credential().is_none());
        assert!(storage.is_empty());
    }

    #[test]
    fn test_logout_when_already_logged_out_is_fine() {
        let (slice, _) = slice_with(PrincipalKind::User, &[]);
        slice.logout();
        slice.logout();
        assert_eq!(slice.snapshot().status(), Status::Unauthenticated);
    }

    // =====================================================================
    // repair()
    // =====================================================================

    #[test]
    fn test_repair_reloads_value_written_after_construction() {
        let (slice, storage) = slice_with(PrincipalKind::User, &[]);
        evently_store::Storage::set(&storage, "token", "\"abc.def.ghi\"").unwrap();

        assert_eq!(slice.repair(), RepairOutcome::Unquoted);
        assert_eq!(
            slice.snapshot().credential().map(Credential::as_str),
            Some("abc.def.ghi")
        );
    }

    #[test]
    fn test_repair_leaves_authenticated_state_alone() {
        let (slice, _) = slice_with(PrincipalKind::User, &[]);
        slice.login_success("abc.def.ghi", alice()).unwrap();
        let before = slice.snapshot();

        assert_eq!(slice.repair(), RepairOutcome::Clean);
        assert_eq!(slice.snapshot(), before);
    }

    // =====================================================================
    // verify() preconditions
    // =====================================================================

    #[tokio::test]
    async fn test_verify_without_credential_errors_and_stays_put() {
        let (slice, _) = slice_with(PrincipalKind::User, &[]);
        let err = slice.verify().await.unwrap_err();
        assert!(matches!(err, SessionError::MissingCredential(PrincipalKind::User)));
        assert_eq!(slice.snapshot().status(), Status::Unauthenticated);
    }

    #[tokio::test]
    async fn test_bootstrap_without_credential_never_verifies() {
        let (slice, _) = slice_with(PrincipalKind::User, &[("token", "null")]);
        let mut watcher = slice.subscribe();

        let state = slice.bootstrap().await;

        assert_eq!(state.status(), Status::Unauthenticated);
        assert!(!state.is_failed());
        assert!(slice.has_bootstrapped());
        // No transition was published at all, so Verifying was never visible.
        assert!(!watcher.rx.has_changed().unwrap());
    }
}
