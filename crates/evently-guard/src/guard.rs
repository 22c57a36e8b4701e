//! The mounted guard component.
//!
//! A [`RouteGuard`] lives as long as the protected view it wraps. While it
//! is mounted it holds a lease on the bootstrap of every slice it depends
//! on. Guards mounted at the same time share one bootstrap per slice; it is
//! aborted, and the slice rolled back, only when the last of them goes.

use std::fmt;

use evently_protocol::PrincipalKind;
use evently_session::{BootstrapLease, SessionSlice, SessionWatcher, Verifier};

use crate::{GuardDecision, GuardRoutes, Requirement, decide};

/// Gates one protected view on the session(s) it requires.
///
/// Reads session state only. Its one side effect is joining or starting
/// the bootstrap of a relevant slice whose credential is unverified.
#[derive(Debug)]
pub struct RouteGuard {
    requirement: Requirement,
    routes: GuardRoutes,
    user: SessionWatcher,
    organizer: SessionWatcher,
    bootstraps: Vec<Bootstrap>,
}

/// One relevant slice's bootstrap, as seen from a guard.
struct Bootstrap {
    kind: PrincipalKind,
    start: Box<dyn Fn() -> Option<BootstrapLease> + Send + Sync>,
    lease: Option<BootstrapLease>,
}

impl Bootstrap {
    fn new<V: Verifier>(slice: &SessionSlice<V>) -> Self {
        let kind = slice.kind();
        let slice = slice.clone();
        let start: Box<dyn Fn() -> Option<BootstrapLease> + Send + Sync> =
            Box::new(move || slice.bootstrap_shared());
        let lease = start();
        if lease.is_some() {
            tracing::debug!(%kind, "guard holding bootstrap");
        }
        Self { kind, start, lease }
    }

    /// Joins or restarts the bootstrap unless this guard already holds a
    /// running one.
    fn refresh(&mut self) {
        if self.lease.as_ref().is_some_and(|lease| !lease.is_finished()) {
            return;
        }
        self.lease = (self.start)();
        if self.lease.is_some() {
            tracing::debug!(kind = %self.kind, "guard restarted bootstrap");
        }
    }
}

impl fmt::Debug for Bootstrap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bootstrap")
            .field("kind", &self.kind)
            .field("lease", &self.lease)
            .finish_non_exhaustive()
    }
}

impl RouteGuard {
    /// Mounts a guard and joins or starts any bootstrap it depends on.
    ///
    /// Must be called from within a Tokio runtime: bootstraps run as tasks
    /// so the caller can keep rendering while they run. A slice with an
    /// unverified credential is already `Verifying` when this returns, so
    /// the first [`evaluate`](Self::evaluate) suspends instead of
    /// redirecting.
    pub fn mount<V: Verifier>(
        requirement: Requirement,
        routes: GuardRoutes,
        user: &SessionSlice<V>,
        organizer: &SessionSlice<V>,
    ) -> Self {
        let bootstraps = requirement
            .kinds()
            .iter()
            .map(|kind| match kind {
                PrincipalKind::User => Bootstrap::new(user),
                PrincipalKind::Organizer => Bootstrap::new(organizer),
            })
            .collect();

        Self {
            requirement,
            routes,
            user: user.subscribe(),
            organizer: organizer.subscribe(),
            bootstraps,
        }
    }

    pub fn requirement(&self) -> Requirement {
        self.requirement
    }

    /// The decision for `requested_path` right now, without waiting.
    ///
    /// This is what a render pass calls: `Suspend` means "draw nothing".
    pub fn evaluate(&self, requested_path: &str) -> GuardDecision {
        decide(
            self.requirement,
            &self.routes,
            &self.user.current(),
            &self.organizer.current(),
            requested_path,
        )
    }

    /// Waits until the decision is no longer `Suspend` and returns it.
    ///
    /// A relevant slice holding an unverified credential is bootstrapped
    /// again first, so a credential reloaded by repair, or one whose
    /// verification was cancelled elsewhere, is checked before the guard
    /// redirects. A verification that never settles keeps this pending;
    /// there is no timeout, and a hang is never treated as a pass.
    pub async fn resolve(&mut self, requested_path: &str) -> GuardDecision {
        loop {
            for bootstrap in &mut self.bootstraps {
                bootstrap.refresh();
            }
            let decision = self.evaluate(requested_path);
            if !decision.is_suspended() {
                tracing::debug!(
                    requirement = ?self.requirement,
                    ?decision,
                    "guard settled"
                );
                return decision;
            }
            if !self.next_change().await {
                // The slice is gone; nothing will ever settle it.
                return GuardDecision::Redirect {
                    to: self
                        .routes
                        .login_for(self.requirement.login_kind())
                        .to_string(),
                    return_to: requested_path.to_string(),
                };
            }
        }
    }

    /// Waits for a relevant slice to change. `false` if it was dropped.
    async fn next_change(&mut self) -> bool {
        match self.requirement {
            Requirement::User => self.user.changed().await.is_some(),
            Requirement::Organizer => self.organizer.changed().await.is_some(),
            Requirement::Any => tokio::select! {
                state = self.user.changed() => state.is_some(),
                state = self.organizer.changed() => state.is_some(),
            },
        }
    }
}
