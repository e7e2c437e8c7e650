//! Per-address rate limiting.

use std::net::SocketAddr;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::{error::ApiError, server::AppState};

/// Key used when the peer address is unknown, e.g. in in-process tests.
const UNKNOWN_CLIENT: &str = "unknown";

fn client_key(req: &Request<Body>) -> String {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(|| UNKNOWN_CLIENT.to_string(), |ConnectInfo(addr)| addr.ip().to_string())
}

/// Axum middleware that rejects clients over their per-second budget.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let key = client_key(&req);

    match state.rate_limiter.allow(&key, state.rate_limit_per_second).await {
        Ok(true) => Ok(next.run(req).await),
        Ok(false) => {
            warn!(client = %key, limit = state.rate_limit_per_second, "Rate limit exceeded");
            Err(ApiError::RateLimited)
        },
        Err(e) => Err(ApiError::RateLimiterUnavailable(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_key_uses_peer_ip() {
        let mut req = Request::new(Body::empty());
        assert_eq!(client_key(&req), "unknown");

        let addr: SocketAddr = "203.0.113.9:51234".parse().unwrap();
        req.extensions_mut().insert(ConnectInfo(addr));
        assert_eq!(client_key(&req), "203.0.113.9");
    }
}
