//! The backend client: profile verification and login.

use std::time::Duration;

use evently_protocol::{Credential, Identity, LoginGrant, PrincipalKind};
use evently_session::{Verifier, VerifyError};
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Response, StatusCode, Url};
use serde::Serialize;
use serde_json::Value;

use crate::{ApiError, LoginError};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// HTTP client for the Evently backend.
///
/// Implements [`Verifier`], so it can be handed straight to a
/// [`SessionSlice`](evently_session::SessionSlice). Cheap to clone; clones
/// share one connection pool.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: Url,
    http: Client,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

impl ApiClient {
    /// Creates a client with the [default timeout](DEFAULT_TIMEOUT).
    ///
    /// # Errors
    /// [`ApiError::InvalidBaseUrl`] if `base_url` is not an absolute
    /// `http(s)://` URL with a host.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    /// Creates a client whose requests give up after `timeout`.
    ///
    /// A timed-out request surfaces as a network failure.
    ///
    /// # Errors
    /// [`ApiError::InvalidBaseUrl`] or [`ApiError::Client`].
    pub fn with_timeout(
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let raw = base_url.into();
        let Some(mut base_url) = Url::parse(raw.trim())
            .ok()
            .filter(|url| matches!(url.scheme(), "http" | "https") && url.has_host())
        else {
            return Err(ApiError::InvalidBaseUrl(raw));
        };
        let path = base_url.path().trim_end_matches('/').to_string();
        base_url.set_path(&path);

        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self { base_url, http })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.as_str().trim_end_matches('/'))
    }

    /// Exchanges an email and password for a credential and identity.
    ///
    /// The result is not applied anywhere; pass it to
    /// [`SessionSlice::login`](evently_session::SessionSlice::login).
    ///
    /// # Errors
    /// - [`LoginError::Rejected`]: any 4xx answer
    /// - [`LoginError::Network`]: unreachable, timed out, or 5xx
    /// - [`LoginError::MalformedResponse`]: a 2xx body without a usable
    ///   token and record
    pub async fn login(
        &self,
        kind: PrincipalKind,
        email: &str,
        password: &str,
    ) -> Result<LoginGrant, LoginError> {
        let url = self.endpoint(kind.login_path());
        tracing::debug!(%kind, %url, "logging in");

        let response = self
            .http
            .post(&url)
            .json(&LoginRequest { email, password })
            .send()
            .await
            .map_err(|e| LoginError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_client_error() {
            return Err(LoginError::Rejected {
                kind,
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(LoginError::Network(format!(
                "login request failed with status {status}"
            )));
        }

        let body = read_json(response)
            .await
            .map_err(|failure| match failure {
                BodyFailure::Transport(e) => LoginError::Network(e),
                BodyFailure::Decode(e) => LoginError::MalformedResponse(e),
            })?;

        LoginGrant::from_payload(kind, &body)
            .map_err(|e| LoginError::MalformedResponse(e.to_string()))
    }
}

impl Verifier for ApiClient {
    async fn verify(
        &self,
        kind: PrincipalKind,
        credential: &Credential,
    ) -> Result<Identity, VerifyError> {
        let url = self.endpoint(kind.profile_path());
        tracing::debug!(%kind, %url, "fetching profile");

        let response = self
            .http
            .get(&url)
            .header(AUTHORIZATION, credential.bearer())
            .send()
            .await
            .map_err(|e| VerifyError::Network(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(VerifyError::Unauthorized {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(VerifyError::Network(format!(
                "profile request failed with status {status}"
            )));
        }

        let body = read_json(response)
            .await
            .map_err(|failure| match failure {
                BodyFailure::Transport(e) => VerifyError::Network(e),
                BodyFailure::Decode(e) => VerifyError::MalformedResponse(e),
            })?;

        Identity::from_payload(kind, &body)
            .map_err(|e| VerifyError::MalformedResponse(e.to_string()))
    }
}

enum BodyFailure {
    /// The body could not be read off the wire.
    Transport(String),
    /// The body arrived but is not JSON.
    Decode(String),
}

async fn read_json(response: Response) -> Result<Value, BodyFailure> {
    let text = response
        .text()
        .await
        .map_err(|e| BodyFailure::Transport(e.to_string()))?;
    serde_json::from_str(&text).map_err(|e| BodyFailure::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_trims_trailing_slash() {
        let client = ApiClient::new("http://localhost:5000/api/").unwrap();
        assert_eq!(client.base_url().as_str(), "http://localhost:5000/api");
        assert_eq!(
            client.endpoint(PrincipalKind::Organizer.profile_path()),
            "http://localhost:5000/api/organizer/profile"
        );
    }

    #[test]
    fn test_new_rejects_relative_url() {
        let err = ApiClient::new("/api").unwrap_err();
        assert!(matches!(err, ApiError::InvalidBaseUrl(url) if url == "/api"));
    }

    #[test]
    fn test_new_rejects_other_schemes() {
        assert!(ApiClient::new("ftp://example.com").is_err());
        assert!(ApiClient::new("").is_err());
        assert!(ApiClient::new("localhost:5000").is_err());
    }

    #[test]
    fn test_new_rejects_scheme_without_usable_host() {
        assert!(ApiClient::new("http://").is_err());
        assert!(ApiClient::new("http://bad host/api").is_err());
        assert!(ApiClient::new("https://[::1/api").is_err());
    }

    #[test]
    fn test_endpoint_for_bare_host() {
        let client = ApiClient::new("https://api.evently.test").unwrap();
        assert_eq!(
            client.endpoint(PrincipalKind::User.login_path()),
            "https://api.evently.test/users/login"
        );
    }

    #[test]
    fn test_login_request_body_shape() {
        let body = serde_json::to_value(LoginRequest {
            email: "a@b.c",
            password: "hunter2",
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"email": "a@b.c", "password": "hunter2"}));
    }
}
