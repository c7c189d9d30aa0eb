//! Cloud Storage gateway configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

/// Default JSON API endpoint.
pub(crate) const DEFAULT_ENDPOINT: &str = "https://storage.googleapis.com";

/// Configuration for [`super::GcsGateway`].
///
/// Passed explicitly into the gateway constructor; nothing is read from
/// process-wide state after construction.
///
/// # Examples
///
/// ```
/// use slicefold_storage::GcsConfig;
///
/// let config = GcsConfig::builder()
///     .endpoint("http://localhost:4443".into())
///     .build();
/// assert_eq!(config.max_compose_inputs, 32);
/// assert!(config.access_token.is_none());
/// ```
#[derive(Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct GcsConfig {
    /// Base URL of the JSON API (or an emulator).
    #[builder(default = String::from(DEFAULT_ENDPOINT))]
    pub endpoint: String,

    /// OAuth2 bearer token sent with every request.
    #[serde(skip_serializing)]
    #[builder(default, setter(strip_option))]
    pub access_token: Option<String>,

    /// Project billed for requester-pays buckets.
    #[builder(default, setter(strip_option))]
    pub user_project: Option<String>,

    /// Per-request timeout, in seconds.
    #[builder(default = 30)]
    pub timeout_secs: u64,

    /// Compose input ceiling enforced before sending a request.
    #[builder(default = 32)]
    pub max_compose_inputs: usize,
}

impl std::fmt::Debug for GcsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcsConfig")
            .field("endpoint", &self.endpoint)
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "<redacted>"),
            )
            .field("user_project", &self.user_project)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_compose_inputs", &self.max_compose_inputs)
            .finish()
    }
}

impl Default for GcsConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl GcsConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `GCS_ENDPOINT` | `https://storage.googleapis.com` |
    /// | `GCS_ACCESS_TOKEN` | *(unset)* |
    /// | `GCS_USER_PROJECT` | *(unset)* |
    /// | `GCS_TIMEOUT_SECS` | `30` |
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("GCS_ENDPOINT") {
            config.endpoint = v;
        }
        if let Ok(v) = std::env::var("GCS_ACCESS_TOKEN") {
            if !v.is_empty() {
                config.access_token = Some(v);
            }
        }
        if let Ok(v) = std::env::var("GCS_USER_PROJECT") {
            if !v.is_empty() {
                config.user_project = Some(v);
            }
        }
        if let Ok(v) = std::env::var("GCS_TIMEOUT_SECS") {
            if let Ok(n) = v.parse::<u64>() {
                config.timeout_secs = n;
            }
        }

        config
    }

    /// Per-request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
