//! Provider callback handler.

use axum::{body::Bytes, extract::State, Json};
use serde::Serialize;
use tracing::instrument;

use crate::{error::ApiError, server::AppState};

/// Acknowledgement returned to the provider.
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    /// Always `"forwarded"`.
    pub status: &'static str,
}

/// `POST /v1/webhooks`
///
/// The raw body is routed as received; the provider only sees success once
/// the owning tenant accepted the callback.
#[instrument(name = "receive_webhook", skip_all, fields(bytes = body.len()))]
pub async fn receive_webhook(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<WebhookAck>, ApiError> {
    state.webhooks.route(body).await?;

    Ok(Json(WebhookAck { status: "forwarded" }))
}
