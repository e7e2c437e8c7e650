//! Tenant credential authentication.
//!
//! Resolves the `X-Api-Key` header through the tenant directory and injects
//! the resulting [`TenantIdentity`] into request extensions for handlers.

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use paybroker_core::{CoreError, TenantIdentity};
use tracing::{debug, warn};

use crate::{error::ApiError, server::AppState};

/// Header carrying the tenant credential.
pub const CREDENTIAL_HEADER: &str = "x-api-key";

/// Extracts a non-empty credential from the request headers.
fn extract_credential(headers: &HeaderMap) -> Option<String> {
    headers
        .get(CREDENTIAL_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// Axum middleware that authenticates tenant calls.
///
/// A missing header is rejected before the directory is consulted.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let credential = extract_credential(req.headers()).ok_or(ApiError::MissingCredential)?;

    let identity: TenantIdentity = match state.directory.resolve_by_credential(&credential).await {
        Ok(identity) => identity,
        Err(CoreError::NotFound(_)) => {
            warn!("Rejected unknown credential");
            return Err(ApiError::InvalidCredential);
        },
        Err(e) => return Err(ApiError::Directory(e)),
    };

    debug!(tenant_id = %identity.tenant_id, "Authenticated tenant");
    req.extensions_mut().insert(identity);

    Ok(next.run(req).await)
}
