//! Reverse-routing of provider callbacks.
//!
//! The provider echoes back the composite identifier embedded on the way
//! out. Two payload shapes exist: event envelopes, recognised by a top-level
//! `event` key and carrying the identifier in `data.reference_id`, and legacy
//! flat payloads carrying `reference_id` (or `external_id` for invoices) at
//! the top level. The body is parsed once into [`WebhookPayload`]; the bytes
//! forwarded to the tenant are always the original ones.

use bytes::Bytes;
use paybroker_core::{
    reference::{CompositeReference, ReferenceError},
    CoreError, TenantDirectory, TenantId,
};
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

use crate::{
    callback::CallbackForwarder,
    error::{GatewayError, Result},
};

/// A provider callback, validated at the boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookPayload {
    /// Event envelope: `{"event": ..., "data": {"reference_id": ...}}`.
    Event {
        /// Event name, if it was a string.
        event: Option<String>,
        /// `data.reference_id`, if present and non-empty.
        reference_id: Option<String>,
    },
    /// Flat payload with the identifier at the top level.
    Legacy {
        /// `reference_id`, falling back to `external_id`.
        reference_id: Option<String>,
    },
}

impl WebhookPayload {
    /// Parses a raw callback body.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Validation` if the body is not a JSON object.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let object = match serde_json::from_slice::<Value>(raw) {
            Ok(Value::Object(object)) => object,
            Ok(_) => return Err(GatewayError::validation("callback body must be a JSON object")),
            Err(e) => return Err(GatewayError::validation(format!("malformed callback: {e}"))),
        };

        if let Some(event) = object.get("event") {
            let reference_id = object
                .get("data")
                .and_then(Value::as_object)
                .and_then(|data| non_empty_string(data, "reference_id"));

            return Ok(Self::Event { event: event.as_str().map(String::from), reference_id });
        }

        let reference_id = non_empty_string(&object, "reference_id")
            .or_else(|| non_empty_string(&object, "external_id"));

        Ok(Self::Legacy { reference_id })
    }

    /// The composite identifier carried by the payload, if any.
    pub fn reference(&self) -> Option<&str> {
        match self {
            Self::Event { reference_id, .. } | Self::Legacy { reference_id } => {
                reference_id.as_deref()
            },
        }
    }

    /// Short label for logs.
    pub const fn shape(&self) -> &'static str {
        match self {
            Self::Event { .. } => "event",
            Self::Legacy { .. } => "legacy",
        }
    }
}

fn non_empty_string(object: &Map<String, Value>, key: &str) -> Option<String> {
    object.get(key).and_then(Value::as_str).filter(|s| !s.is_empty()).map(String::from)
}

/// Recovers the tenant a callback belongs to.
///
/// # Errors
///
/// - `Validation` for a body that is not a JSON object.
/// - `MissingIdentifier` when there is no identifier or it was never
///   annotated.
/// - `UnregisteredTenant` when the prefix is not a tenant id.
pub fn extract_tenant_reference(raw: &[u8]) -> Result<CompositeReference> {
    let payload = WebhookPayload::parse(raw)?;
    let reference = payload.reference().ok_or(GatewayError::MissingIdentifier)?;

    CompositeReference::parse(reference).map_err(|e| match e {
        ReferenceError::MissingSeparator => GatewayError::MissingIdentifier,
        ReferenceError::InvalidTenant(tenant) => GatewayError::unregistered(tenant),
    })
}

/// Outcome of a successfully routed callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutedWebhook {
    /// Tenant the callback was delivered to.
    pub tenant_id: TenantId,
    /// Status the tenant endpoint answered with.
    pub status_code: u16,
}

/// Routes provider callbacks to tenant endpoints.
#[derive(Clone)]
pub struct WebhookRouter {
    directory: TenantDirectory,
    forwarder: CallbackForwarder,
}

impl WebhookRouter {
    /// Creates a router.
    pub fn new(directory: TenantDirectory, forwarder: CallbackForwarder) -> Self {
        Self { directory, forwarder }
    }

    /// Resolves the owning tenant and forwards the original bytes to it.
    ///
    /// # Errors
    ///
    /// Any error from [`extract_tenant_reference`], plus:
    /// - `UnregisteredTenant` when the tenant does not exist (nothing is sent).
    /// - `Store` when the tenant store is unreachable.
    /// - `NetworkError`, `Timeout` or `CallbackRejected` from delivery.
    #[instrument(name = "route_webhook", skip_all, fields(bytes = raw.len()))]
    pub async fn route(&self, raw: Bytes) -> Result<RoutedWebhook> {
        let reference = extract_tenant_reference(&raw).inspect_err(|e| {
            warn!(error = %e, "Callback has no routable identifier");
        })?;
        let tenant_id = reference.tenant_id;
        debug!(tenant_id = %tenant_id, "Extracted tenant from callback");

        let target = match self.directory.resolve_callback_target(tenant_id).await {
            Ok(target) => target,
            Err(CoreError::NotFound(_)) => {
                warn!(tenant_id = %tenant_id, "Callback for unregistered tenant");
                return Err(GatewayError::unregistered(tenant_id.to_string()));
            },
            Err(e) => return Err(e.into()),
        };

        let status_code = self.forwarder.deliver(&target, raw).await?;
        info!(tenant_id = %tenant_id, status = status_code, "Callback routed");

        Ok(RoutedWebhook { tenant_id, status_code })
    }
}
