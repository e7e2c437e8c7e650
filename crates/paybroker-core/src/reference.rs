//! Composite tenant-scoped reference identifiers.
//!
//! Outbound calls embed the tenant into a caller-supplied identifier as
//! `"{tenant_id}:{original}"`. Provider callbacks echo the identifier back and
//! the tenant is recovered by splitting on the first separator only, so the
//! original identifier may itself contain separators while the tenant part
//! may not.

use std::fmt;

use crate::{error::CoreError, models::TenantId};

/// Separator between the tenant and the original identifier.
pub const SEPARATOR: char = ':';

/// Embeds a tenant into an identifier.
///
/// ```
/// use paybroker_core::{reference, TenantId};
///
/// assert_eq!(reference::embed(TenantId(7), "A"), "7:A");
/// ```
pub fn embed(tenant_id: TenantId, original: &str) -> String {
    format!("{tenant_id}{SEPARATOR}{original}")
}

/// Splits a composite on its first separator.
pub fn split(composite: &str) -> Option<(&str, &str)> {
    composite.split_once(SEPARATOR)
}

/// A parsed composite reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeReference {
    /// Tenant recovered from the prefix.
    pub tenant_id: TenantId,
    /// Identifier originally supplied by the tenant.
    pub original: String,
}

impl CompositeReference {
    /// Parses `"{tenant_id}:{original}"`.
    ///
    /// # Errors
    ///
    /// Returns `ReferenceError::MissingSeparator` when the value was never
    /// annotated and `ReferenceError::InvalidTenant` when the prefix is not a
    /// tenant identifier.
    pub fn parse(composite: &str) -> Result<Self, ReferenceError> {
        let (tenant, original) = split(composite).ok_or(ReferenceError::MissingSeparator)?;

        let tenant_id = tenant
            .parse::<TenantId>()
            .map_err(|_: CoreError| ReferenceError::InvalidTenant(tenant.to_string()))?;

        Ok(Self { tenant_id, original: original.to_string() })
    }
}

impl fmt::Display for CompositeReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{SEPARATOR}{}", self.tenant_id, self.original)
    }
}

/// Reasons a composite reference cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReferenceError {
    /// The identifier carries no tenant prefix.
    #[error("identifier has no tenant prefix")]
    MissingSeparator,

    /// The prefix is not a tenant identifier.
    #[error("identifier prefix {0:?} is not a tenant id")]
    InvalidTenant(String),
}
