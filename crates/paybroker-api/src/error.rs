//! HTTP error responses.
//!
//! Every error leaves the service as `{"error": "<message>"}`. Internal
//! failures are logged with their cause and answered with a generic message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use paybroker_core::CoreError;
use paybroker_gateway::GatewayError;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Errors returned by handlers and middleware.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No credential header on a tenant call.
    #[error("missing api key")]
    MissingCredential,

    /// Credential does not belong to any tenant.
    #[error("invalid api key")]
    InvalidCredential,

    /// Provider callback without the expected token.
    #[error("invalid callback token")]
    InvalidCallbackToken,

    /// Caller exceeded its request budget.
    #[error("too many requests")]
    RateLimited,

    /// Request did not finish within the server timeout.
    #[error("request timed out")]
    RequestTimeout,

    /// Unexpected failure inside the middleware stack.
    #[error("middleware failure: {0}")]
    Middleware(String),

    /// Rate limit backend failed.
    #[error("error handling requests")]
    RateLimiterUnavailable(#[source] CoreError),

    /// Tenant directory failure during authentication.
    #[error(transparent)]
    Directory(#[from] CoreError),

    /// Annotation, forwarding or routing failure.
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

impl ApiError {
    /// HTTP status this error is reported with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingCredential | Self::InvalidCredential | Self::InvalidCallbackToken => {
                StatusCode::UNAUTHORIZED
            },
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::RequestTimeout => StatusCode::REQUEST_TIMEOUT,
            Self::Middleware(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::RateLimiterUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Directory(CoreError::NotFound(_)) => StatusCode::UNAUTHORIZED,
            Self::Directory(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Gateway(e) => match e {
                GatewayError::Validation { .. }
                | GatewayError::MissingIdentifier
                | GatewayError::UnregisteredTenant { .. } => StatusCode::BAD_REQUEST,
                GatewayError::NetworkError { .. }
                | GatewayError::Timeout { .. }
                | GatewayError::CallbackRejected { .. } => StatusCode::BAD_GATEWAY,
                GatewayError::ConfigurationError { .. } | GatewayError::Store(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                },
            },
        }
    }

    fn public_message(&self) -> String {
        match self {
            Self::Directory(CoreError::NotFound(_)) => Self::InvalidCredential.to_string(),
            Self::Gateway(GatewayError::NetworkError { .. } | GatewayError::Timeout { .. }) => {
                "upstream unavailable".to_string()
            },
            Self::Gateway(GatewayError::CallbackRejected { .. }) => {
                "tenant callback delivery failed".to_string()
            },
            Self::RateLimiterUnavailable(_) => self.to_string(),
            _ if self.status_code() == StatusCode::INTERNAL_SERVER_ERROR => {
                "internal server error".to_string()
            },
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "Request failed");
        }

        let message = self.public_message();
        (status, Json(ErrorBody { error: &message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use paybroker_core::TenantId;

    use super::*;

    #[test]
    fn status_mapping() {
        let cases = [
            (ApiError::MissingCredential, StatusCode::UNAUTHORIZED),
            (ApiError::InvalidCallbackToken, StatusCode::UNAUTHORIZED),
            (ApiError::RateLimited, StatusCode::TOO_MANY_REQUESTS),
            (ApiError::RequestTimeout, StatusCode::REQUEST_TIMEOUT),
            (ApiError::Middleware("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (ApiError::Directory(CoreError::NotFound("x".into())), StatusCode::UNAUTHORIZED),
            (ApiError::Directory(CoreError::Cache("down".into())), StatusCode::INTERNAL_SERVER_ERROR),
            (GatewayError::validation("bad").into(), StatusCode::BAD_REQUEST),
            (GatewayError::MissingIdentifier.into(), StatusCode::BAD_REQUEST),
            (GatewayError::unregistered("9").into(), StatusCode::BAD_REQUEST),
            (GatewayError::network("refused").into(), StatusCode::BAD_GATEWAY),
            (GatewayError::timeout(10).into(), StatusCode::BAD_GATEWAY),
            (
                GatewayError::CallbackRejected { tenant_id: TenantId(7), status_code: 500 }.into(),
                StatusCode::BAD_GATEWAY,
            ),
            (
                GatewayError::Store(CoreError::Database("down".into())).into(),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.status_code(), expected, "{error}");
        }
    }

    #[test]
    fn internal_details_are_not_exposed() {
        let error = ApiError::Directory(CoreError::Database("password authentication failed".into()));
        assert_eq!(error.public_message(), "internal server error");

        let error = ApiError::RateLimiterUnavailable(CoreError::Cache("refused".into()));
        assert_eq!(error.public_message(), "error handling requests");
    }

    #[test]
    fn unknown_credential_reads_as_invalid() {
        let error = ApiError::Directory(CoreError::NotFound("credential is not registered".into()));
        assert_eq!(error.public_message(), "invalid api key");
    }

    #[tokio::test]
    async fn renders_error_envelope() {
        let response = ApiError::RateLimited.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json, serde_json::json!({"error": "too many requests"}));
    }
}
