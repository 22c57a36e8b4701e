//! Route guarding for the Evently client.
//!
//! A protected view declares which principal it needs ([`Requirement`]).
//! The guard then answers one of three things ([`GuardDecision`]):
//!
//! - **Suspend**: a relevant session is still verifying; render nothing
//!   so the user never sees a redirect flash before the content appears
//! - **Render**: the requirement is met
//! - **Redirect**: send the user to the right login route, carrying the
//!   path they asked for so login can bring them back
//!
//! [`decide`] is the pure rule. [`RouteGuard`] is the mounted component
//! that kicks off bootstrap for the slices it depends on and waits for
//! them to settle.

mod decision;
mod guard;

pub use decision::{GuardDecision, GuardRoutes, Requirement, decide};
pub use guard::RouteGuard;
