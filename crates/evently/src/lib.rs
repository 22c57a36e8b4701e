//! # Evently
//!
//! Client-side session management for a two-sided event platform.
//!
//! A client can be signed in as an attendee ("user") and as an organizer at
//! the same time. Evently keeps one independent session per principal kind,
//! resumes both from persisted credentials on startup, verifies them
//! against the backend, and gates protected views on the result.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use evently::prelude::*;
//!
//! # async fn run() -> Result<(), EventlyError> {
//! let sessions = Sessions::builder()
//!     .config(ClientConfig::default())
//!     .connect()
//!     .await?;
//!
//! let mut guard = sessions.guard(Requirement::Organizer);
//! match guard.resolve("/organizer/events/new").await {
//!     GuardDecision::Render => { /* show the page */ }
//!     GuardDecision::Redirect { to, return_to } => { /* navigate */ }
//!     GuardDecision::Suspend => unreachable!("resolve never suspends"),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Crates
//!
//! | Crate              | Concern                                            |
//! |--------------------|----------------------------------------------------|
//! | `evently-protocol` | principal kinds, credentials, identity payloads    |
//! | `evently-store`    | persisted key-value storage and repair             |
//! | `evently-session`  | per-principal state machines, resolver             |
//! | `evently-api`      | HTTP verification and login                        |
//! | `evently-guard`    | suspend / render / redirect decisions              |

mod config;
mod error;
mod sessions;
pub mod telemetry;

pub use config::ClientConfig;
pub use error::{ConfigError, EventlyError};
pub use sessions::{
    ActiveWatcher, Diagnostics, Sessions, SessionsBuilder, SliceDiagnostics, StoredValue,
};

pub use evently_api as api;
pub use evently_guard as guard;
pub use evently_protocol as protocol;
pub use evently_session as session;
pub use evently_store as store;

/// Everything a typical client needs, in one import.
pub mod prelude {
    pub use crate::{
        ActiveWatcher, ClientConfig, ConfigError, Diagnostics, EventlyError, Sessions,
        SessionsBuilder, StoredValue,
    };
    pub use evently_api::{ApiClient, LoginError};
    pub use evently_guard::{GuardDecision, GuardRoutes, Requirement, RouteGuard};
    pub use evently_protocol::{Credential, Identity, LoginGrant, PrincipalKind};
    pub use evently_session::{
        ActivePrincipal, BootstrapLease, FailureReason, SessionError, SessionSlice, SessionState,
        SessionWatcher, Status, Verifier, VerifyError,
    };
    pub use evently_store::{CredentialStore, FileStorage, MemoryStorage, RepairOutcome, Storage};
}
