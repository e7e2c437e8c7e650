//! Tenant operation handlers.
//!
//! Each handler annotates the tenant's body for its operation, forwards it to
//! the provider and relays the provider's answer as-is: status, end-to-end
//! headers and body bytes.

use axum::{
    body::{Body, Bytes},
    extract::State,
    response::Response,
    Extension,
};
use paybroker_core::TenantIdentity;
use paybroker_gateway::{OperationKind, UpstreamResponse};
use tracing::{info, instrument};

use crate::{error::ApiError, server::AppState};

/// `POST /v1/invoices`
pub async fn create_invoice(
    State(state): State<AppState>,
    Extension(identity): Extension<TenantIdentity>,
    body: Bytes,
) -> Result<Response, ApiError> {
    forward_operation(&state, OperationKind::CreateInvoice, &identity, &body).await
}

/// `POST /v1/recurring/plans`
pub async fn create_subscription(
    State(state): State<AppState>,
    Extension(identity): Extension<TenantIdentity>,
    body: Bytes,
) -> Result<Response, ApiError> {
    forward_operation(&state, OperationKind::CreateSubscription, &identity, &body).await
}

/// `POST /v1/payouts`
pub async fn create_payout(
    State(state): State<AppState>,
    Extension(identity): Extension<TenantIdentity>,
    body: Bytes,
) -> Result<Response, ApiError> {
    forward_operation(&state, OperationKind::CreatePayout, &identity, &body).await
}

/// `POST /v1/customers`
pub async fn create_customer(
    State(state): State<AppState>,
    Extension(identity): Extension<TenantIdentity>,
    body: Bytes,
) -> Result<Response, ApiError> {
    forward_operation(&state, OperationKind::CreateCustomer, &identity, &body).await
}

#[instrument(
    name = "forward_operation",
    skip_all,
    fields(tenant_id = %identity.tenant_id, operation = %operation)
)]
async fn forward_operation(
    state: &AppState,
    operation: OperationKind,
    identity: &TenantIdentity,
    body: &[u8],
) -> Result<Response, ApiError> {
    let request = state.annotator.annotate(operation, identity, body)?;
    let upstream = state.upstream.forward(&request).await?;

    info!(status = upstream.status.as_u16(), "Relaying provider response");
    Ok(relay(upstream))
}

fn relay(upstream: UpstreamResponse) -> Response {
    let mut response = Response::new(Body::from(upstream.body));
    *response.status_mut() = upstream.status;
    *response.headers_mut() = upstream.headers;
    response
}
