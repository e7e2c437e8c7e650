//! Error types for provider forwarding and callback routing.

use paybroker_core::{CoreError, TenantId};
use thiserror::Error;

/// Result type alias for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Errors raised while talking to the provider or routing its callbacks.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// Network-level connectivity failure.
    #[error("network connection failed: {message}")]
    NetworkError {
        /// Error message describing the network failure
        message: String,
    },

    /// HTTP request timeout exceeded.
    #[error("request timeout after {timeout_seconds}s")]
    Timeout {
        /// Number of seconds before the request timed out
        timeout_seconds: u64,
    },

    /// The tenant endpoint answered a forwarded callback with a non-2xx status.
    #[error("tenant {tenant_id} rejected callback: HTTP {status_code}")]
    CallbackRejected {
        /// Tenant whose endpoint rejected the callback
        tenant_id: TenantId,
        /// HTTP status returned by the tenant
        status_code: u16,
    },

    /// Payload is not the JSON shape the operation expects.
    #[error("invalid payload: {message}")]
    Validation {
        /// What was wrong with the payload
        message: String,
    },

    /// Callback carries no tenant-scoped identifier.
    #[error("callback has no tenant-scoped identifier")]
    MissingIdentifier,

    /// Callback identifier names a tenant that does not exist.
    #[error("unregistered tenant: {reference}")]
    UnregisteredTenant {
        /// Tenant part of the identifier
        reference: String,
    },

    /// Invalid gateway configuration.
    #[error("invalid gateway configuration: {message}")]
    ConfigurationError {
        /// Configuration error message
        message: String,
    },

    /// Tenant store or cache failed.
    #[error(transparent)]
    Store(#[from] CoreError),
}

impl GatewayError {
    /// Creates a network error from a message.
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkError { message: message.into() }
    }

    /// Creates a timeout error.
    pub fn timeout(timeout_seconds: u64) -> Self {
        Self::Timeout { timeout_seconds }
    }

    /// Creates a payload validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into() }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::ConfigurationError { message: message.into() }
    }

    /// Creates an unregistered tenant error.
    pub fn unregistered(reference: impl Into<String>) -> Self {
        Self::UnregisteredTenant { reference: reference.into() }
    }

    /// Returns true when the remote side could not be reached at all.
    pub const fn is_unreachable(&self) -> bool {
        matches!(self, Self::NetworkError { .. } | Self::Timeout { .. })
    }

    /// Returns true when the caller sent something the gateway cannot route.
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. } | Self::MissingIdentifier | Self::UnregisteredTenant { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_unreachable_errors() {
        assert!(GatewayError::network("refused").is_unreachable());
        assert!(GatewayError::timeout(10).is_unreachable());
        assert!(!GatewayError::MissingIdentifier.is_unreachable());
    }

    #[test]
    fn classifies_client_errors() {
        assert!(GatewayError::validation("not an object").is_client_error());
        assert!(GatewayError::MissingIdentifier.is_client_error());
        assert!(GatewayError::unregistered("9").is_client_error());
        assert!(!GatewayError::Store(CoreError::Database("down".into())).is_client_error());
    }

    #[test]
    fn store_errors_keep_their_message() {
        let err: GatewayError = CoreError::Cache("connection refused".into()).into();
        assert_eq!(err.to_string(), "cache error: connection refused");
    }
}
