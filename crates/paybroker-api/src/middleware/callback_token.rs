//! Provider callback authenticity check.

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::{crypto::timing_safe_eq, error::ApiError, server::AppState};

/// Header the provider sends its verification token in.
pub const CALLBACK_TOKEN_HEADER: &str = "x-callback-token";

fn token_matches(headers: &HeaderMap, expected: &str) -> bool {
    headers
        .get(CALLBACK_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|presented| timing_safe_eq(presented, expected))
}

/// Axum middleware that admits only callbacks carrying the configured token.
pub async fn callback_token_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    if !token_matches(req.headers(), &state.callback_token) {
        warn!("Rejected callback with missing or invalid token");
        return Err(ApiError::InvalidCallbackToken);
    }

    Ok(next.run(req).await)
}
