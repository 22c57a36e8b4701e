//! Wire-level types for the Evently session core.
//!
//! This crate defines the vocabulary every other layer speaks:
//!
//! - **Principals** ([`PrincipalKind`]): the two kinds of actor that can
//!   hold a session at the same time, and the storage keys, endpoints and
//!   login routes each one maps to.
//! - **Credentials** ([`Credential`]): bearer tokens that can only exist
//!   in a syntactically valid form.
//! - **Identities** ([`Identity`], [`LoginGrant`]): the one canonical
//!   shape the rest of the client works with, produced from whatever the
//!   backend sent by a single normalization pass.
//! - **Errors** ([`ProtocolError`], [`CredentialError`]).
//!
//! # Architecture
//!
//! ```text
//! Store (raw strings) → Protocol (Credential, Identity) → Session (state machine)
//! ```
//!
//! Nothing here performs I/O. Payloads arrive as `serde_json::Value` and
//! leave as typed values or an error.

mod credential;
mod error;
mod identity;
mod types;

pub use credential::Credential;
pub use error::{CredentialError, ProtocolError};
pub use identity::{Identity, LoginGrant};
pub use types::PrincipalKind;
