//! Transparent forwarding to the payment provider.
//!
//! One attempt per call, no retries. Whatever the provider answers, including
//! 4xx and 5xx, is handed back untouched for the caller to relay; only a
//! failure to get an answer at all is an error.

use std::time::Instant;

use bytes::Bytes;
use reqwest::{header::HeaderMap, StatusCode};
use tracing::{info_span, Instrument};

use crate::{
    annotate::{AnnotatedRequest, FOR_USER_ID_HEADER, SPLIT_RULE_HEADER},
    client::{build_client, end_to_end_headers, send_error, ClientConfig},
    error::{GatewayError, Result},
};

/// Raw provider response.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    /// Status returned by the provider.
    pub status: StatusCode,
    /// End-to-end response headers.
    pub headers: HeaderMap,
    /// Response body, byte for byte.
    pub body: Bytes,
}

/// HTTP client for the shared provider account.
#[derive(Debug, Clone)]
pub struct UpstreamGateway {
    client: reqwest::Client,
    config: ClientConfig,
}

impl UpstreamGateway {
    /// Creates a gateway with the given client configuration.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::ConfigurationError` if the client cannot be
    /// built.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let client = build_client(&config)?;
        Ok(Self { client, config })
    }

    /// Creates a gateway with default configuration.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::ConfigurationError` if the client cannot be
    /// built.
    pub fn with_defaults() -> Result<Self> {
        Self::new(ClientConfig::default())
    }

    /// Sends an annotated request to the provider.
    ///
    /// # Errors
    ///
    /// Returns `NetworkError` or `Timeout` when no response was received.
    pub async fn forward(&self, request: &AnnotatedRequest) -> Result<UpstreamResponse> {
        let span = info_span!(
            "upstream_forward",
            operation = %request.operation,
            for_user_id = %request.for_user_id,
        );

        async move {
            let start_time = Instant::now();

            let mut http_request = self
                .client
                .post(request.url.clone())
                .basic_auth(&request.secret_key, Some(""))
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .header(FOR_USER_ID_HEADER, &request.for_user_id)
                .body(request.body.clone());

            if let Some(rule) = &request.split_rule_id {
                http_request = http_request.header(SPLIT_RULE_HEADER, rule);
            }

            let response = http_request.send().await.map_err(|e| {
                tracing::warn!(
                    duration_ms = start_time.elapsed().as_millis(),
                    error = %e,
                    "Provider request failed"
                );
                send_error(&e, self.config.timeout)
            })?;

            let status = response.status();
            let headers = end_to_end_headers(response.headers());
            let body = response.bytes().await.map_err(|e| {
                tracing::warn!(error = %e, "Failed to read provider response body");
                GatewayError::network(format!("failed to read provider response: {e}"))
            })?;

            if status.is_success() {
                tracing::debug!(
                    status = status.as_u16(),
                    duration_ms = start_time.elapsed().as_millis(),
                    "Provider accepted request"
                );
            } else {
                tracing::info!(
                    status = status.as_u16(),
                    duration_ms = start_time.elapsed().as_millis(),
                    "Provider rejected request"
                );
            }

            Ok(UpstreamResponse { status, headers, body })
        }
        .instrument(span)
        .await
    }
}
