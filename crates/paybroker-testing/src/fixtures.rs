//! Request builders for tenant calls and provider callbacks.

use axum::{
    body::Body,
    http::{header::CONTENT_TYPE, Method, Request},
};

/// Builds `POST /v1{path}` with an optional `X-Api-Key`.
pub fn tenant_call(path: &str, credential: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(format!("/v1{path}"))
        .header(CONTENT_TYPE, "application/json");

    if let Some(credential) = credential {
        builder = builder.header("X-Api-Key", credential);
    }

    builder.body(Body::from(body.to_string())).expect("request builder inputs are static")
}

/// Builds `POST /v1/webhooks` with an optional `x-callback-token`.
pub fn webhook_call(token: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/v1/webhooks")
        .header(CONTENT_TYPE, "application/json");

    if let Some(token) = token {
        builder = builder.header("x-callback-token", token);
    }

    builder.body(Body::from(body.to_string())).expect("request builder inputs are static")
}
