//! The verification hook.
//!
//! The session layer does not know how a credential is checked. It calls a
//! [`Verifier`], which in production is the HTTP client in `evently-api`
//! and in tests is whatever scripted stand-in the test needs.

use std::future::Future;

use evently_protocol::{Credential, Identity, PrincipalKind};

use crate::VerifyError;

/// Exchanges a credential for the identity it belongs to.
///
/// # Trait bounds
///
/// - `Send + Sync` → one verifier is shared by both slices, whose
///   verifications may be in flight at the same time.
/// - `'static` → the verifier lives as long as the sessions do.
///
/// # Contract
///
/// - Resolve with an [`Identity`] of the requested `kind`, already
///   normalized (see [`Identity::from_payload`]).
/// - Reject with a [`VerifyError`] naming why. Do not retry: a fresh
///   `verify` call is the only retry mechanism, and the caller decides
///   whether to make one.
///
/// # Example
///
/// ```rust
/// use evently_protocol::{Credential, Identity, PrincipalKind};
/// use evently_session::{Verifier, VerifyError};
///
/// /// Trusts every credential. Only for local demos.
/// struct TrustingVerifier;
///
/// impl Verifier for TrustingVerifier {
///     async fn verify(
///         &self,
///         kind: PrincipalKind,
///         _credential: &Credential,
///     ) -> Result<Identity, VerifyError> {
///         Ok(Identity::new(kind, "demo", "Demo Account"))
///     }
/// }
/// ```
pub trait Verifier: Send + Sync + 'static {
    /// Validates `credential` for `kind` and returns its identity.
    fn verify(
        &self,
        kind: PrincipalKind,
        credential: &Credential,
    ) -> impl Future<Output = Result<Identity, VerifyError>> + Send;
}
