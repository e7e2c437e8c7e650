//! Delivery of provider callbacks to tenant endpoints.

use std::time::Instant;

use bytes::Bytes;
use paybroker_core::CallbackTarget;
use tracing::{info_span, Instrument};

use crate::{
    client::{build_client, send_error, ClientConfig},
    error::{GatewayError, Result},
};

/// Header carrying the tenant credential on forwarded callbacks.
pub const TENANT_CREDENTIAL_HEADER: &str = "X-Api-Key";

/// Posts raw callback bodies to tenant endpoints.
#[derive(Debug, Clone)]
pub struct CallbackForwarder {
    client: reqwest::Client,
    config: ClientConfig,
}

impl CallbackForwarder {
    /// Creates a forwarder with the given client configuration.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::ConfigurationError` if the client cannot be
    /// built.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let client = build_client(&config)?;
        Ok(Self { client, config })
    }

    /// Creates a forwarder with default configuration.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::ConfigurationError` if the client cannot be
    /// built.
    pub fn with_defaults() -> Result<Self> {
        Self::new(ClientConfig::default())
    }

    /// Sends `body` unchanged to the tenant's callback URL. Single attempt.
    ///
    /// # Errors
    ///
    /// - `NetworkError` / `Timeout` if the tenant endpoint is unreachable.
    /// - `CallbackRejected` if it answers with a non-2xx status.
    pub async fn deliver(&self, target: &CallbackTarget, body: Bytes) -> Result<u16> {
        let span = info_span!(
            "callback_delivery",
            tenant_id = %target.tenant_id,
            url = %target.url,
            bytes = body.len(),
        );

        async move {
            let start_time = Instant::now();

            let response = self
                .client
                .post(&target.url)
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .header(TENANT_CREDENTIAL_HEADER, &target.credential)
                .body(body)
                .send()
                .await
                .map_err(|e| {
                    tracing::warn!(
                        duration_ms = start_time.elapsed().as_millis(),
                        error = %e,
                        "Callback delivery failed"
                    );
                    send_error(&e, self.config.timeout)
                })?;

            let status_code = response.status().as_u16();
            if !response.status().is_success() {
                tracing::warn!(status = status_code, "Tenant rejected callback");
                return Err(GatewayError::CallbackRejected { tenant_id: target.tenant_id, status_code });
            }

            tracing::info!(
                status = status_code,
                duration_ms = start_time.elapsed().as_millis(),
                "Callback delivered"
            );
            Ok(status_code)
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use paybroker_core::TenantId;
    use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

    use super::*;

    fn target(url: String) -> CallbackTarget {
        CallbackTarget { tenant_id: TenantId(7), url, credential: "CRED7".into() }
    }

    #[tokio::test]
    async fn posts_raw_bytes_with_tenant_credential() {
        let mock_server = MockServer::start().await;
        // Whitespace and key order must survive forwarding.
        let raw = Bytes::from_static(b"{ \"z\": 1,  \"a\": \"7:A\" }");

        Mock::given(matchers::method("POST"))
            .and(matchers::path("/hooks"))
            .and(matchers::header("x-api-key", "CRED7"))
            .and(matchers::header("content-type", "application/json"))
            .and(matchers::body_bytes(raw.to_vec()))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&mock_server)
            .await;

        let forwarder = CallbackForwarder::with_defaults().unwrap();
        let status =
            forwarder.deliver(&target(format!("{}/hooks", mock_server.uri())), raw).await.unwrap();

        assert_eq!(status, 204);
    }

    #[tokio::test]
    async fn non_success_status_is_rejection() {
        let mock_server = MockServer::start().await;

        Mock::given(matchers::method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let forwarder = CallbackForwarder::with_defaults().unwrap();
        let err = forwarder
            .deliver(&target(mock_server.uri()), Bytes::from_static(b"{}"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            GatewayError::CallbackRejected { tenant_id: TenantId(7), status_code: 503 }
        ));
    }

    #[tokio::test]
    async fn redirect_is_rejection() {
        let mock_server = MockServer::start().await;

        Mock::given(matchers::method("POST"))
            .and(matchers::path("/hooks"))
            .respond_with(
                ResponseTemplate::new(302)
                    .append_header("location", format!("{}/moved", mock_server.uri())),
            )
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(matchers::path("/moved"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let forwarder = CallbackForwarder::with_defaults().unwrap();
        let err = forwarder
            .deliver(&target(format!("{}/hooks", mock_server.uri())), Bytes::from_static(b"{}"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            GatewayError::CallbackRejected { tenant_id: TenantId(7), status_code: 302 }
        ));
    }

    #[tokio::test]
    async fn unreachable_tenant_is_network_error() {
        let forwarder = CallbackForwarder::with_defaults().unwrap();

        let err = forwarder
            .deliver(&target("http://127.0.0.1:1/hooks".into()), Bytes::from_static(b"{}"))
            .await
            .unwrap_err();

        assert!(err.is_unreachable());
    }
}
