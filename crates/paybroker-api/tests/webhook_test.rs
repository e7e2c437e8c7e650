//! Integration tests for the provider webhook endpoint.

use axum::http::StatusCode;
use paybroker_testing::{webhook_call, TestEnv, CALLBACK_TOKEN};
use serde_json::json;
use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

/// Test an event webhook reaches only the owning tenant, byte for byte.
#[tokio::test]
async fn event_webhook_forwarded_to_owning_tenant() {
    let env = TestEnv::new().await.expect("test env setup");
    let seven = MockServer::start().await;
    let eight = MockServer::start().await;
    env.add_tenant(7, "acct_7", &format!("{}/hooks", seven.uri()), "CRED7").await;
    env.add_tenant(8, "acct_8", &format!("{}/hooks", eight.uri()), "CRED8").await;

    let raw = r#"{"event":"invoice.paid", "data":{"reference_id":"7:A","amount":10000}}"#;

    Mock::given(matchers::method("POST"))
        .and(matchers::path("/hooks"))
        .and(matchers::header("x-api-key", "CRED7"))
        .and(matchers::body_string(raw))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&seven)
        .await;
    Mock::given(matchers::any()).respond_with(ResponseTemplate::new(200)).expect(0).mount(&eight).await;

    let response = env.send(webhook_call(Some(CALLBACK_TOKEN), raw)).await.expect("request");

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json().unwrap(), json!({"status": "forwarded"}));
}

/// Test missing or wrong callback tokens are rejected.
#[tokio::test]
async fn callback_token_required() {
    let env = TestEnv::new().await.expect("test env setup");
    let raw = r#"{"reference_id":"7:A"}"#;

    for token in [None, Some("wrong-token")] {
        let response = env.send(webhook_call(token, raw)).await.expect("request");
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    }

    assert_eq!(env.store.id_reads(), 0);
}

/// Test legacy webhook for an unregistered tenant is a 400 with no forward.
#[tokio::test]
async fn unregistered_tenant_is_bad_request() {
    let env = TestEnv::new().await.expect("test env setup");
    let seven = MockServer::start().await;
    env.add_tenant(7, "acct_7", &seven.uri(), "CRED7").await;
    Mock::given(matchers::any()).respond_with(ResponseTemplate::new(200)).expect(0).mount(&seven).await;

    let response = env
        .send(webhook_call(Some(CALLBACK_TOKEN), r#"{"reference_id":"9:X","status":"PAID"}"#))
        .await
        .expect("request");

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

/// Test unroutable payloads are 400s.
#[tokio::test]
async fn unroutable_payloads_rejected() {
    let env = TestEnv::new().await.expect("test env setup");

    for raw in ["not json", "[]", r#"{"status":"PAID"}"#, r#"{"reference_id":"unscoped"}"#] {
        let response = env.send(webhook_call(Some(CALLBACK_TOKEN), raw)).await.expect("request");
        assert_eq!(response.status, StatusCode::BAD_REQUEST, "{raw}");
    }
}

/// Test tenant failures are reported to the provider as 502.
#[tokio::test]
async fn tenant_failure_is_bad_gateway() {
    let env = TestEnv::new().await.expect("test env setup");
    let seven = MockServer::start().await;
    env.add_tenant(7, "acct_7", &seven.uri(), "CRED7").await;
    Mock::given(matchers::any()).respond_with(ResponseTemplate::new(500)).mount(&seven).await;

    let response = env
        .send(webhook_call(Some(CALLBACK_TOKEN), r#"{"external_id":"7:inv-1"}"#))
        .await
        .expect("request");

    assert_eq!(response.status, StatusCode::BAD_GATEWAY);
}

/// Test a store outage during routing is a 500.
#[tokio::test]
async fn store_outage_is_internal_error() {
    let env = TestEnv::new().await.expect("test env setup");
    env.store.set_failing(true);

    let response = env
        .send(webhook_call(Some(CALLBACK_TOKEN), r#"{"reference_id":"7:A"}"#))
        .await
        .expect("request");

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
}

/// Test a tenant redirect counts as a failed delivery, not a forward.
#[tokio::test]
async fn tenant_redirect_is_bad_gateway() {
    let env = TestEnv::new().await.expect("test env setup");
    let seven = MockServer::start().await;
    env.add_tenant(7, "acct_7", &format!("{}/hooks", seven.uri()), "CRED7").await;

    Mock::given(matchers::path("/hooks"))
        .respond_with(
            ResponseTemplate::new(302).append_header("location", format!("{}/moved", seven.uri())),
        )
        .expect(1)
        .mount(&seven)
        .await;
    Mock::given(matchers::path("/moved"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&seven)
        .await;

    let response = env
        .send(webhook_call(Some(CALLBACK_TOKEN), r#"{"reference_id":"7:A"}"#))
        .await
        .expect("request");

    assert_eq!(response.status, StatusCode::BAD_GATEWAY);
    assert_eq!(response.json().unwrap()["error"], "tenant callback delivery failed");
}
