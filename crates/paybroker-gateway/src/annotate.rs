//! Outbound request annotation.
//!
//! Every tenant call is rewritten before it reaches the provider: the
//! operation's scoped identifier field becomes `"{tenant_id}:{value}"` so the
//! provider echoes the tenant back on callbacks, and the provider routing
//! credentials for the tenant's sub-account are attached.
//!
//! Field values other than the scoped one are carried as raw JSON text, so
//! amounts keep their exact digits and fields keep their order.

use std::fmt;

use bytes::Bytes;
use paybroker_core::{reference, TenantId, TenantIdentity};
use serde::{
    de::{MapAccess, Visitor},
    ser::SerializeMap,
    Deserialize, Deserializer, Serialize, Serializer,
};
use serde_json::value::RawValue;
use tracing::debug;
use url::Url;

use crate::error::{GatewayError, Result};

/// Header naming the provider sub-account a call acts for.
pub const FOR_USER_ID_HEADER: &str = "for-user-id";

/// Header naming the split rule applied to a payment.
pub const SPLIT_RULE_HEADER: &str = "with-split-rule";

/// The closed set of operations tenants can call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// Create an invoice.
    CreateInvoice,
    /// Create a recurring plan.
    CreateSubscription,
    /// Create a payout.
    CreatePayout,
    /// Create a customer.
    CreateCustomer,
}

impl OperationKind {
    /// Every supported operation.
    pub const ALL: [Self; 4] =
        [Self::CreateInvoice, Self::CreateSubscription, Self::CreatePayout, Self::CreateCustomer];

    /// Provider path the operation is forwarded to.
    pub const fn upstream_path(self) -> &'static str {
        match self {
            Self::CreateInvoice => "/v2/invoices",
            Self::CreateSubscription => "/recurring/plans",
            Self::CreatePayout => "/v2/payouts",
            Self::CreateCustomer => "/customers",
        }
    }

    /// Payload field that carries the tenant-scoped identifier.
    pub const fn scoped_field(self) -> &'static str {
        match self {
            Self::CreateInvoice => "external_id",
            Self::CreateSubscription | Self::CreatePayout | Self::CreateCustomer => "reference_id",
        }
    }

    /// Stable name used in logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreateInvoice => "create-invoice",
            Self::CreateSubscription => "create-subscription",
            Self::CreatePayout => "create-payout",
            Self::CreateCustomer => "create-customer",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A provider call ready to be sent.
#[derive(Clone)]
pub struct AnnotatedRequest {
    /// Operation being performed.
    pub operation: OperationKind,
    /// Absolute provider URL.
    pub url: Url,
    /// Rewritten JSON body.
    pub body: Bytes,
    /// Provider sub-account the call acts for.
    pub for_user_id: String,
    /// Split rule to apply, if configured.
    pub split_rule_id: Option<String>,
    /// Provider secret used as the basic-auth user name.
    pub(crate) secret_key: String,
}

impl fmt::Debug for AnnotatedRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnnotatedRequest")
            .field("operation", &self.operation)
            .field("url", &self.url.as_str())
            .field("body_len", &self.body.len())
            .field("for_user_id", &self.for_user_id)
            .field("split_rule_id", &self.split_rule_id)
            .field("secret_key", &"[REDACTED]")
            .finish()
    }
}

/// Rewrites tenant payloads and attaches provider routing credentials.
#[derive(Clone)]
pub struct RequestAnnotator {
    base_url: String,
    secret_key: String,
    split_rule_id: Option<String>,
}

impl fmt::Debug for RequestAnnotator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestAnnotator")
            .field("base_url", &self.base_url)
            .field("secret_key", &"[REDACTED]")
            .field("split_rule_id", &self.split_rule_id)
            .finish()
    }
}

impl RequestAnnotator {
    /// Creates an annotator for the provider at `base_url`.
    ///
    /// An empty split rule is treated as none.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::ConfigurationError` if the base URL is not an
    /// absolute `http`/`https` URL or the secret is empty.
    pub fn new(
        base_url: &str,
        secret_key: impl Into<String>,
        split_rule_id: Option<String>,
    ) -> Result<Self> {
        let parsed = Url::parse(base_url)
            .map_err(|e| GatewayError::configuration(format!("invalid provider base url: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
            return Err(GatewayError::configuration(
                "provider base url must be an absolute http:// or https:// url",
            ));
        }

        let secret_key = secret_key.into();
        if secret_key.is_empty() {
            return Err(GatewayError::configuration("provider secret key must not be empty"));
        }

        Ok(Self {
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
            secret_key,
            split_rule_id: split_rule_id.filter(|rule| !rule.is_empty()),
        })
    }

    /// Annotates a tenant payload for `operation`.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Validation` if the body is not a JSON object.
    pub fn annotate(
        &self,
        operation: OperationKind,
        identity: &TenantIdentity,
        body: &[u8],
    ) -> Result<AnnotatedRequest> {
        let mut payload = RawPayload::parse(body)?;

        let scoped = payload.scope(operation.scoped_field(), identity.tenant_id)?;
        debug!(
            operation = %operation,
            tenant_id = %identity.tenant_id,
            scoped,
            "Annotated outbound payload"
        );

        let body = serde_json::to_vec(&payload)
            .map_err(|e| GatewayError::validation(format!("cannot encode body: {e}")))?;

        Ok(AnnotatedRequest {
            operation,
            url: self.upstream_url(operation)?,
            body: Bytes::from(body),
            for_user_id: identity.provider_account_id.clone(),
            split_rule_id: self.split_rule_id.clone(),
            secret_key: self.secret_key.clone(),
        })
    }

    /// Absolute provider URL for `operation`.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::ConfigurationError` if the joined URL is invalid.
    pub fn upstream_url(&self, operation: OperationKind) -> Result<Url> {
        let joined = format!("{}{}", self.base_url, operation.upstream_path());
        Url::parse(&joined)
            .map_err(|e| GatewayError::configuration(format!("invalid upstream url {joined}: {e}")))
    }
}

/// A JSON object whose member values are kept as the tenant sent them.
#[derive(Debug)]
pub struct RawPayload {
    entries: Vec<(String, Box<RawValue>)>,
}

impl RawPayload {
    /// Parses a request body that must be a JSON object.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Validation` for malformed JSON or a non-object.
    pub fn parse(body: &[u8]) -> Result<Self> {
        serde_json::from_slice(body).map_err(|e| {
            if e.is_data() {
                GatewayError::validation("request body must be a JSON object")
            } else {
                GatewayError::validation(format!("malformed JSON body: {e}"))
            }
        })
    }

    /// Prefixes `field` with the tenant wherever it holds a non-empty string.
    ///
    /// Absent, empty and non-string values are left untouched. Returns whether
    /// the payload was rewritten.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Validation` if the rewritten value cannot be
    /// encoded.
    pub fn scope(&mut self, field: &str, tenant_id: TenantId) -> Result<bool> {
        let mut scoped = false;

        for (key, value) in &mut self.entries {
            if key.as_str() != field {
                continue;
            }

            let Ok(original) = serde_json::from_str::<String>(value.get()) else {
                continue;
            };
            if original.is_empty() {
                continue;
            }

            let encoded = serde_json::to_string(&reference::embed(tenant_id, &original))
                .and_then(RawValue::from_string)
                .map_err(|e| GatewayError::validation(format!("cannot encode {field}: {e}")))?;
            *value = encoded;
            scoped = true;
        }

        Ok(scoped)
    }
}

impl<'de> Deserialize<'de> for RawPayload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct ObjectVisitor;

        impl<'de> Visitor<'de> for ObjectVisitor {
            type Value = RawPayload;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a JSON object")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut map: A,
            ) -> std::result::Result<RawPayload, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some(entry) = map.next_entry::<String, Box<RawValue>>()? {
                    entries.push(entry);
                }
                Ok(RawPayload { entries })
            }
        }

        deserializer.deserialize_map(ObjectVisitor)
    }
}

impl Serialize for RawPayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;

    fn identity() -> TenantIdentity {
        TenantIdentity { tenant_id: TenantId(7), provider_account_id: "acct_7".into() }
    }

    fn annotator() -> RequestAnnotator {
        RequestAnnotator::new("https://api.provider.test/", "sk_test", Some("split_1".into()))
            .unwrap()
    }

    fn body_of(request: &AnnotatedRequest) -> Value {
        serde_json::from_slice(&request.body).unwrap()
    }

    #[test]
    fn operation_table() {
        assert_eq!(OperationKind::CreateInvoice.upstream_path(), "/v2/invoices");
        assert_eq!(OperationKind::CreateInvoice.scoped_field(), "external_id");
        assert_eq!(OperationKind::CreateSubscription.upstream_path(), "/recurring/plans");
        assert_eq!(OperationKind::CreatePayout.upstream_path(), "/v2/payouts");
        assert_eq!(OperationKind::CreateCustomer.upstream_path(), "/customers");

        for op in &OperationKind::ALL[1..] {
            assert_eq!(op.scoped_field(), "reference_id");
        }
    }

    #[test]
    fn invoice_external_id_is_scoped() {
        let body = br#"{"external_id":"A","amount":10000}"#;

        let request =
            annotator().annotate(OperationKind::CreateInvoice, &identity(), body).unwrap();

        assert_eq!(body_of(&request), json!({"external_id": "7:A", "amount": 10000}));
        assert_eq!(request.url.as_str(), "https://api.provider.test/v2/invoices");
        assert_eq!(request.for_user_id, "acct_7");
        assert_eq!(request.split_rule_id.as_deref(), Some("split_1"));
    }

    #[test]
    fn reference_id_is_scoped_for_other_operations() {
        let body = br#"{"reference_id":"cust-1","external_id":"untouched"}"#;

        let request =
            annotator().annotate(OperationKind::CreateCustomer, &identity(), body).unwrap();

        assert_eq!(body_of(&request), json!({"reference_id": "7:cust-1", "external_id": "untouched"}));
    }

    #[test]
    fn missing_empty_or_non_string_field_left_unchanged() {
        for body in [
            json!({"amount": 1}),
            json!({"external_id": ""}),
            json!({"external_id": 42}),
            json!({"external_id": null}),
        ] {
            let raw = serde_json::to_vec(&body).unwrap();
            let request =
                annotator().annotate(OperationKind::CreateInvoice, &identity(), &raw).unwrap();
            assert_eq!(body_of(&request), body);
        }
    }

    #[test]
    fn untouched_fields_keep_their_exact_text() {
        let body = br#"{"external_id":"A","amount":123456789012345678901234,"fee":10.50,"rate":0.12345678901234567890}"#;

        let request =
            annotator().annotate(OperationKind::CreateInvoice, &identity(), body).unwrap();

        assert_eq!(
            std::str::from_utf8(&request.body).unwrap(),
            r#"{"external_id":"7:A","amount":123456789012345678901234,"fee":10.50,"rate":0.12345678901234567890}"#
        );
    }

    #[test]
    fn field_order_and_nested_values_preserved() {
        let body = br#"{"zeta":1,"reference_id":"p-1","alpha":{"b":2.0,"a":[1e3]}}"#;

        let request =
            annotator().annotate(OperationKind::CreatePayout, &identity(), body).unwrap();

        assert_eq!(
            std::str::from_utf8(&request.body).unwrap(),
            r#"{"zeta":1,"reference_id":"7:p-1","alpha":{"b":2.0,"a":[1e3]}}"#
        );
    }

    #[test]
    fn escaped_identifier_is_reencoded() {
        let body = br#"{"external_id":"a\"b\u00e9"}"#;

        let request =
            annotator().annotate(OperationKind::CreateInvoice, &identity(), body).unwrap();

        assert_eq!(body_of(&request), json!({"external_id": "7:a\"b\u{e9}"}));
    }

    #[test]
    fn non_object_bodies_rejected() {
        for body in [&b"[1,2]"[..], b"\"text\"", b"{not json", b""] {
            let err =
                annotator().annotate(OperationKind::CreatePayout, &identity(), body).unwrap_err();
            assert!(matches!(err, GatewayError::Validation { .. }));
        }
    }

    #[test]
    fn empty_split_rule_is_omitted() {
        let annotator =
            RequestAnnotator::new("https://api.provider.test", "sk_test", Some(String::new()))
                .unwrap();

        let request =
            annotator.annotate(OperationKind::CreateInvoice, &identity(), b"{}").unwrap();

        assert_eq!(request.split_rule_id, None);
    }

    #[test]
    fn invalid_configuration_rejected() {
        assert!(RequestAnnotator::new("/relative", "sk", None).is_err());
        assert!(RequestAnnotator::new("ftp://provider.test", "sk", None).is_err());
        assert!(RequestAnnotator::new("https://provider.test", "", None).is_err());
    }

    #[test]
    fn base_url_path_prefix_preserved() {
        let annotator = RequestAnnotator::new("http://localhost:9000/mock/", "sk", None).unwrap();

        let url = annotator.upstream_url(OperationKind::CreatePayout).unwrap();

        assert_eq!(url.as_str(), "http://localhost:9000/mock/v2/payouts");
    }

    #[test]
    fn debug_output_redacts_secret() {
        let rendered = format!("{:?}", annotator());
        assert!(!rendered.contains("sk_test"));

        let request = annotator().annotate(OperationKind::CreateInvoice, &identity(), b"{}").unwrap();
        assert!(!format!("{request:?}").contains("sk_test"));
    }
}
