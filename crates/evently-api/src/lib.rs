//! HTTP client for the Evently backend.
//!
//! [`ApiClient`] talks to two endpoints per principal kind:
//!
//! - `GET {base}/users/profile`, `GET {base}/organizer/profile`: verify a
//!   credential (sent as a bearer header) and fetch the identity behind it.
//!   This is the [`Verifier`](evently_session::Verifier) implementation.
//! - `POST {base}/users/login`, `POST {base}/organizer/login`: exchange an
//!   email and password for a [`LoginGrant`](evently_protocol::LoginGrant).
//!
//! Status codes map onto the verification failure kinds as follows:
//!
//! | Answer                        | Verify                   | Login               |
//! |-------------------------------|--------------------------|---------------------|
//! | 2xx, usable body              | `Ok(Identity)`           | `Ok(LoginGrant)`    |
//! | 2xx, unusable body            | `MalformedResponse`      | `MalformedResponse` |
//! | 401 / 403                     | `Unauthorized`           | `Rejected`          |
//! | other 4xx                     | `Network`                | `Rejected`          |
//! | 5xx, timeout, no connection   | `Network`                | `Network`           |

mod client;
mod error;

pub use client::{ApiClient, DEFAULT_TIMEOUT};
pub use error::{ApiError, LoginError};
