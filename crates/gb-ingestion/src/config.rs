//! Configuration for the session gateway.
//!
//! # Environment Variables
//!
//! - `GB_GATEWAY_URL`: Base URL of the session gateway (required)
//! - `GB_GATEWAY_TIMEOUT_SECS`: Per-request timeout in seconds (default: 30)

use std::env;
use std::time::Duration;
use url::Url;

use crate::error::TransportError;

/// Default per-request timeout.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Where the gateway lives and how long to wait for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Base URL, always ending in `/` so relative joins keep the full path.
    pub base_url: Url,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl GatewayConfig {
    /// Create a config for the given base URL with the default timeout.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Config`] if `base_url` is not a valid URL.
    pub fn new(base_url: &str) -> Result<Self, TransportError> {
        let mut base_url = base_url.trim().to_string();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        Ok(Self {
            base_url: Url::parse(&base_url)?,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        })
    }

    /// Set the per-request timeout (builder pattern).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Load from `GB_GATEWAY_URL` and `GB_GATEWAY_TIMEOUT_SECS`.
    ///
    /// A missing gateway URL is an error: without it no user can be started.
    /// An unparsable timeout falls back to the default.
    pub fn from_env() -> Result<Self, TransportError> {
        let url = env::var("GB_GATEWAY_URL")
            .map_err(|_| TransportError::Config("GB_GATEWAY_URL is not set".to_string()))?;

        let timeout = env::var("GB_GATEWAY_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Ok(Self::new(&url)?.with_timeout(Duration::from_secs(timeout)))
    }
}
