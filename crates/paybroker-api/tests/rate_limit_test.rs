//! Admission control tests for `/v1` routes.

use std::time::Duration;

use axum::http::StatusCode;
use paybroker_testing::{tenant_call, webhook_call, TestEnv};

/// Test requests over the per-second budget get 429 before authentication.
#[tokio::test]
async fn excess_requests_rejected() {
    let env = TestEnv::with_config(|config| config.rate_limit_per_second = 2)
        .await
        .expect("test env setup");

    for _ in 0..2 {
        let response = env.send(tenant_call("/invoices", None, "{}")).await.expect("request");
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    }

    let response = env.send(tenant_call("/invoices", Some("CRED7"), "{}")).await.expect("request");

    assert_eq!(response.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.json().unwrap()["error"], "too many requests");
    assert_eq!(env.store.credential_reads(), 0);
}

/// Test the budget is shared with the webhook route and resets each second.
#[tokio::test]
async fn budget_resets_next_second() {
    let env = TestEnv::with_config(|config| config.rate_limit_per_second = 1)
        .await
        .expect("test env setup");

    let first = env.send(webhook_call(None, "{}")).await.expect("request");
    assert_eq!(first.status, StatusCode::UNAUTHORIZED);

    let second = env.send(webhook_call(None, "{}")).await.expect("request");
    assert_eq!(second.status, StatusCode::TOO_MANY_REQUESTS);

    env.clock.advance(Duration::from_secs(1));

    let third = env.send(webhook_call(None, "{}")).await.expect("request");
    assert_eq!(third.status, StatusCode::UNAUTHORIZED);
}

/// Test a failing limiter backend fails closed with 500.
#[tokio::test]
async fn limiter_outage_is_internal_error() {
    let env = TestEnv::new().await.expect("test env setup");
    env.limiter.set_failing(true);

    let response = env.send(tenant_call("/invoices", None, "{}")).await.expect("request");

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.json().unwrap()["error"], "error handling requests");
}
