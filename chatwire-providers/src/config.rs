//! Provider configuration.

use crate::provider::ProviderError;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Minimum spacing between two dispatches on one queue.
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(250);

/// Configuration for one backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Default credential, used when a request carries none.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// Backend origin, overriding the preset.
    #[serde(default)]
    pub base_url: Option<String>,
    /// HTTP client timeout in seconds.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Minimum spacing between dispatches, in milliseconds.
    #[serde(default)]
    pub min_interval_ms: Option<u64>,
}

impl ProviderConfig {
    /// Create a new empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set API key.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set base URL.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = Some(timeout.as_secs());
        self
    }

    /// Set the minimum dispatch interval.
    #[must_use]
    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.min_interval_ms = Some(u64::try_from(interval.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Load from environment variables with given prefix.
    ///
    /// Looks for:
    /// - `{PREFIX}_API_KEY`
    /// - `{PREFIX}_BASE_URL`
    /// - `{PREFIX}_TIMEOUT_SECS`
    /// - `{PREFIX}_MIN_INTERVAL_MS`
    ///
    /// Numeric variables that fail to parse are ignored.
    pub fn from_env(prefix: &str) -> Self {
        let var = |name: &str| std::env::var(format!("{prefix}_{name}")).ok();
        Self {
            api_key: var("API_KEY"),
            base_url: var("BASE_URL"),
            timeout_secs: var("TIMEOUT_SECS").and_then(|v| v.trim().parse().ok()),
            min_interval_ms: var("MIN_INTERVAL_MS").and_then(|v| v.trim().parse().ok()),
        }
    }

    /// Whether anything was configured at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Client timeout, if set.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Minimum dispatch interval, defaulting to [`DEFAULT_MIN_INTERVAL`].
    #[must_use]
    pub fn min_interval(&self) -> Duration {
        self.min_interval_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_MIN_INTERVAL)
    }

    /// The configured base URL, or `default`, validated and without a
    /// trailing slash.
    pub fn resolve_base_url(
        &self,
        default: Option<&str>,
        env_prefix: &str,
    ) -> Result<String, ProviderError> {
        let raw = self
            .base_url
            .as_deref()
            .or(default)
            .ok_or_else(|| ProviderError::MissingConfig(format!("{env_prefix}_BASE_URL")))?;
        Url::parse(raw).map_err(|e| ProviderError::InvalidBaseUrl(format!("{raw}: {e}")))?;
        Ok(raw.trim_end_matches('/').to_string())
    }

    /// Build an HTTP client with this config.
    pub fn build_client(&self) -> Client {
        let mut builder = Client::builder().user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ));

        if let Some(timeout) = self.timeout() {
            builder = builder.timeout(timeout);
        }

        builder.build().unwrap_or_default()
    }
}
