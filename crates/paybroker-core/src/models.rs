//! Core domain models and strongly-typed identifiers.
//!
//! Defines the tenant record, the resolved identity carried through a request,
//! and the callback target used for webhook reverse-routing.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{
    error::{CoreError, Result},
    reference,
};

type PgDb = sqlx::Postgres;
type PgValueRef<'r> = sqlx::postgres::PgValueRef<'r>;
type PgTypeInfo = sqlx::postgres::PgTypeInfo;
type PgArgumentBuffer = sqlx::postgres::PgArgumentBuffer;
type EncodeResult =
    std::result::Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync + 'static>>;
type BoxDynError = sqlx::error::BoxDynError;

/// Length of generated tenant credentials.
pub const CREDENTIAL_LENGTH: usize = 12;

const CREDENTIAL_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Strongly-typed tenant identifier.
///
/// Assigned by the store on creation. The identifier is numeric, so its
/// string form can never contain the composite reference separator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TenantId(pub i64);

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for TenantId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl FromStr for TenantId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        s.parse::<i64>()
            .map(Self)
            .map_err(|_| CoreError::InvalidInput(format!("invalid tenant id: {s:?}")))
    }
}

impl sqlx::Type<PgDb> for TenantId {
    fn type_info() -> PgTypeInfo {
        <i64 as sqlx::Type<PgDb>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, PgDb> for TenantId {
    fn decode(value: PgValueRef<'r>) -> std::result::Result<Self, BoxDynError> {
        let id = <i64 as sqlx::Decode<PgDb>>::decode(value)?;
        Ok(Self(id))
    }
}

impl sqlx::Encode<'_, PgDb> for TenantId {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> EncodeResult {
        <i64 as sqlx::Encode<PgDb>>::encode_by_ref(&self.0, buf)
    }
}

/// A tenant of the broker.
///
/// Each tenant maps to one provider sub-account and one callback endpoint.
/// The broker only reads tenant records; they are created and deleted by the
/// administration CLI.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Tenant {
    /// Store-assigned identifier.
    pub id: TenantId,

    /// Human-readable name.
    pub name: String,

    /// Provider sub-account that calls are routed to.
    pub provider_account_id: String,

    /// Absolute URL that provider callbacks are forwarded to.
    pub callback_url: String,

    /// Opaque credential the tenant presents on every call.
    pub credential: String,

    /// When this tenant was created.
    pub created_at: DateTime<Utc>,
}

impl Tenant {
    /// Returns the identity threaded through an authenticated request.
    pub fn identity(&self) -> TenantIdentity {
        TenantIdentity {
            tenant_id: self.id,
            provider_account_id: self.provider_account_id.clone(),
        }
    }

    /// Returns where callbacks for this tenant are delivered.
    pub fn callback_target(&self) -> CallbackTarget {
        CallbackTarget {
            tenant_id: self.id,
            url: self.callback_url.clone(),
            credential: self.credential.clone(),
        }
    }
}

/// Input for registering a new tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTenant {
    /// Human-readable name.
    pub name: String,
    /// Provider sub-account identifier.
    pub provider_account_id: String,
    /// Absolute callback URL.
    pub callback_url: String,
    /// Credential issued to the tenant.
    pub credential: String,
}

impl NewTenant {
    /// Builds a tenant registration with a freshly generated credential.
    pub fn new(
        name: impl Into<String>,
        provider_account_id: impl Into<String>,
        callback_url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            provider_account_id: provider_account_id.into(),
            callback_url: callback_url.into(),
            credential: generate_credential(),
        }
    }

    /// Checks the record invariants before it reaches the store.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidInput` when the name or provider account is
    /// blank, the credential is empty, or the callback URL is not an absolute
    /// `http`/`https` URL.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(CoreError::InvalidInput("tenant name must not be empty".into()));
        }

        if self.provider_account_id.trim().is_empty() {
            return Err(CoreError::InvalidInput("provider account id must not be empty".into()));
        }

        if self.credential.is_empty() {
            return Err(CoreError::InvalidInput("credential must not be empty".into()));
        }

        let url = Url::parse(&self.callback_url)
            .map_err(|e| CoreError::InvalidInput(format!("invalid callback url: {e}")))?;

        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(CoreError::InvalidInput(
                "callback url must be an absolute http:// or https:// url".into(),
            ));
        }

        Ok(())
    }
}

/// Generates a random upper-case alphanumeric tenant credential.
pub fn generate_credential() -> String {
    let mut rng = rand::thread_rng();
    (0..CREDENTIAL_LENGTH)
        .map(|_| char::from(CREDENTIAL_CHARSET[rng.gen_range(0..CREDENTIAL_CHARSET.len())]))
        .collect()
}

/// Tenant identity resolved from a credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TenantIdentity {
    /// Tenant the credential belongs to.
    pub tenant_id: TenantId,
    /// Provider sub-account for the tenant.
    pub provider_account_id: String,
}

impl TenantIdentity {
    /// Encodes the identity as the cached `"{tenant_id}:{provider_account_id}"`.
    pub fn to_cache_value(&self) -> String {
        reference::embed(self.tenant_id, &self.provider_account_id)
    }

    /// Decodes a cached value. Returns `None` for anything that is not a
    /// well-formed composite with a non-empty account.
    pub fn from_cache_value(value: &str) -> Option<Self> {
        let (tenant, account) = reference::split(value)?;
        let tenant_id = tenant.parse().ok()?;

        if account.is_empty() {
            return None;
        }

        Some(Self { tenant_id, provider_account_id: account.to_string() })
    }

    /// An identity is usable only when it routes to a real sub-account.
    pub fn is_complete(&self) -> bool {
        !self.provider_account_id.is_empty()
    }
}

/// Destination for a tenant's forwarded callbacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackTarget {
    /// Tenant that owns the endpoint.
    pub tenant_id: TenantId,
    /// Absolute callback URL.
    pub url: String,
    /// Credential sent with each forwarded callback.
    pub credential: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_tenant() -> NewTenant {
        NewTenant::new("Acme", "acct_123", "https://acme.example.com/hooks")
    }

    #[test]
    fn generated_credentials_are_alphanumeric_upper() {
        let credential = generate_credential();

        assert_eq!(credential.len(), CREDENTIAL_LENGTH);
        assert!(credential.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn valid_tenant_passes_validation() {
        assert!(valid_tenant().validate().is_ok());
    }

    #[test]
    fn blank_fields_rejected() {
        let mut tenant = valid_tenant();
        tenant.name = "  ".into();
        assert!(tenant.validate().is_err());

        let mut tenant = valid_tenant();
        tenant.provider_account_id = String::new();
        assert!(tenant.validate().is_err());

        let mut tenant = valid_tenant();
        tenant.credential = String::new();
        assert!(tenant.validate().is_err());
    }

    #[test]
    fn relative_or_non_http_callback_rejected() {
        for url in ["/hooks", "ftp://acme.example.com/hooks", "not a url", "mailto:ops@acme.io"] {
            let mut tenant = valid_tenant();
            tenant.callback_url = url.into();
            assert!(tenant.validate().is_err(), "{url} should be rejected");
        }
    }

    #[test]
    fn cache_value_round_trips() {
        let identity =
            TenantIdentity { tenant_id: TenantId(7), provider_account_id: "acct_123".into() };

        assert_eq!(identity.to_cache_value(), "7:acct_123");
        assert_eq!(TenantIdentity::from_cache_value("7:acct_123"), Some(identity));
    }

    #[test]
    fn malformed_cache_values_rejected() {
        assert_eq!(TenantIdentity::from_cache_value("7"), None);
        assert_eq!(TenantIdentity::from_cache_value("seven:acct"), None);
        assert_eq!(TenantIdentity::from_cache_value("7:"), None);
    }

    #[test]
    fn tenant_id_parses_from_string() {
        assert_eq!("42".parse::<TenantId>().ok(), Some(TenantId(42)));
        assert!("4:2".parse::<TenantId>().is_err());
        assert!("".parse::<TenantId>().is_err());
    }
}
