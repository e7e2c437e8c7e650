//! Shared HTTP client construction for provider and tenant calls.
//!
//! Both directions make a single attempt under a fixed timeout and never
//! follow redirects: a provider 3xx is relayed to the tenant, and a tenant
//! 3xx counts as a rejected callback. Connectivity failures are categorized
//! here so callers only see `NetworkError` or `Timeout`.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName};
use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, Result};

/// Configuration for outbound HTTP clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Timeout for a whole request, connect through body.
    pub timeout: Duration,
    /// User agent string for requests.
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            user_agent: concat!("paybroker/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ClientConfig {
    /// Returns the default configuration with a different timeout.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout, ..Self::default() }
    }
}

/// Builds a pooled client for the given configuration.
///
/// # Errors
///
/// Returns `GatewayError::ConfigurationError` if the timeout is zero or the
/// client cannot be constructed.
pub fn build_client(config: &ClientConfig) -> Result<reqwest::Client> {
    if config.timeout.is_zero() {
        return Err(GatewayError::configuration("client timeout must be greater than zero"));
    }

    reqwest::Client::builder()
        .timeout(config.timeout)
        .user_agent(&config.user_agent)
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .map_err(|e| GatewayError::configuration(format!("failed to build HTTP client: {e}")))
}

/// Maps a send failure to a gateway error.
pub(crate) fn send_error(err: &reqwest::Error, timeout: Duration) -> GatewayError {
    if err.is_timeout() {
        return GatewayError::timeout(timeout.as_secs());
    }
    if err.is_connect() {
        return GatewayError::network(format!("connection failed: {err}"));
    }
    GatewayError::network(err.to_string())
}

/// Returns true for headers that describe a single connection and must not
/// be relayed.
pub fn is_hop_by_hop(name: &HeaderName) -> bool {
    matches!(
        name.as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailer"
            | "transfer-encoding"
            | "upgrade"
            | "content-length"
    )
}

/// Copies a header map without its hop-by-hop headers.
pub fn end_to_end_headers(headers: &HeaderMap) -> HeaderMap {
    let mut relayed = HeaderMap::with_capacity(headers.len());

    for (name, value) in headers {
        if !is_hop_by_hop(name) {
            relayed.append(name.clone(), value.clone());
        }
    }

    relayed
}
