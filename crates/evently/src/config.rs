//! Client configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use evently_api::{ApiClient, ApiError};
use evently_guard::GuardRoutes;
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Everything the session core needs to know about its environment.
///
/// Every field has a default, so a config file only has to name what it
/// changes:
///
/// ```json
/// { "api_base_url": "https://api.evently.example/api" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL the profile and login paths are appended to.
    pub api_base_url: String,

    /// Per-request timeout for the backend. A timeout fails verification
    /// as a network error.
    pub request_timeout_secs: u64,

    /// Where [`FileStorage`](evently_store::FileStorage) keeps credentials.
    pub storage_path: PathBuf,

    /// Login routes the guard redirects to.
    pub routes: GuardRoutes,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:5000/api".to_string(),
            request_timeout_secs: 15,
            storage_path: PathBuf::from("evently-session.json"),
            routes: GuardRoutes::default(),
        }
    }
}

impl ClientConfig {
    pub const MIN_TIMEOUT_SECS: u64 = 1;
    pub const MAX_TIMEOUT_SECS: u64 = 120;

    /// Reads a config from a JSON file. Missing fields take their defaults.
    ///
    /// # Errors
    /// [`ConfigError::Read`] or [`ConfigError::Parse`].
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self =
            serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(config.validated())
    }

    /// Clamp and fix any out-of-range values so the config is safe to use.
    ///
    /// - `request_timeout_secs` clamped to
    ///   [`MIN_TIMEOUT_SECS`](Self::MIN_TIMEOUT_SECS)..=[`MAX_TIMEOUT_SECS`](Self::MAX_TIMEOUT_SECS).
    /// - A blank `api_base_url` falls back to the default; trailing slashes
    ///   are dropped.
    pub fn validated(mut self) -> Self {
        let clamped = self
            .request_timeout_secs
            .clamp(Self::MIN_TIMEOUT_SECS, Self::MAX_TIMEOUT_SECS);
        if clamped != self.request_timeout_secs {
            tracing::warn!(
                requested = self.request_timeout_secs,
                clamped,
                "request_timeout_secs out of range, clamping"
            );
            self.request_timeout_secs = clamped;
        }

        let trimmed = self.api_base_url.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            tracing::warn!("api_base_url is blank, using the default");
            self.api_base_url = Self::default().api_base_url;
        } else if trimmed != self.api_base_url {
            self.api_base_url = trimmed.to_string();
        }
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Builds the backend client this config describes.
    ///
    /// # Errors
    /// [`ApiError`] if the base URL is not `http(s)://`.
    pub fn api_client(&self) -> Result<ApiClient, ApiError> {
        ApiClient::with_timeout(&self.api_base_url, self.request_timeout())
    }
}
