//! Session management for the Evently client.
//!
//! The client can be signed in as an attendee and as an organizer at the
//! same time. This crate tracks both:
//!
//! 1. **Verification**: exchanging a stored credential for an identity
//!    ([`Verifier`] trait)
//! 2. **Session slices**: one independent state machine per principal
//!    kind ([`SessionSlice`]), observed read-only through
//!    [`SessionWatcher`]
//! 3. **Resolution**: folding both slices into the one identity the UI
//!    shows ([`resolve`], [`ActivePrincipal`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Guard (above)   ← suspends, renders or redirects based on slice status
//!     ↕
//! Session (this crate)  ← owns credential + identity + status per principal
//!     ↕
//! Store / Protocol (below)  ← persisted keys, Credential, Identity
//! ```

#![allow(async_fn_in_trait)]

mod error;
mod resolver;
mod slice;
mod state;
mod verifier;

pub use error::{FailureReason, SessionError, VerifyError};
pub use resolver::{ActivePrincipal, resolve};
pub use slice::{BootstrapLease, SessionSlice, SessionWatcher};
pub use state::{SessionState, Status};
pub use verifier::Verifier;
