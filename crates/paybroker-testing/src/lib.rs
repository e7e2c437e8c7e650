//! In-process test environment for router-level tests.
//!
//! [`TestEnv`] wires the real router to in-memory tenant store, credential
//! cache and rate limiter, and to a wiremock server standing in for the
//! payment provider. No database or Redis is needed.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    body::{to_bytes, Body},
    http::{HeaderMap, Request, StatusCode},
    Router,
};
use paybroker_api::{create_router, ratelimit::mock::InMemoryRateLimiter, AppState, Config};
use paybroker_core::{
    cache::mock::InMemoryCredentialCache,
    directory::mock::{tenant, InMemoryTenantStore},
    Clock, TestClock,
};
use serde_json::Value;
use tower::ServiceExt;
use wiremock::MockServer;

pub mod fixtures;

pub use fixtures::{tenant_call, webhook_call};

/// Provider secret configured in every test environment.
pub const PROVIDER_SECRET: &str = "xnd_development_test_secret";

/// Split rule configured in every test environment.
pub const SPLIT_RULE_ID: &str = "splitru_test";

/// Callback token configured in every test environment.
pub const CALLBACK_TOKEN: &str = "test-callback-token";

/// A captured HTTP response.
#[derive(Debug)]
pub struct TestResponse {
    /// Response status.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Raw response body.
    pub body: Vec<u8>,
}

impl TestResponse {
    /// Parses the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not valid JSON.
    pub fn json(&self) -> Result<Value> {
        serde_json::from_slice(&self.body).context("response body is not JSON")
    }
}

/// Router plus every collaborator it talks to.
pub struct TestEnv {
    /// Router under test.
    pub router: Router,
    /// Tenant store behind the directory.
    pub store: Arc<InMemoryTenantStore>,
    /// Credential cache behind the directory.
    pub cache: Arc<InMemoryCredentialCache>,
    /// Admission control backend.
    pub limiter: Arc<InMemoryRateLimiter>,
    /// Mock payment provider.
    pub provider: MockServer,
    /// Clock shared by the cache, limiter and health handler.
    pub clock: TestClock,
}

impl TestEnv {
    /// Creates an environment with a generous rate limit.
    ///
    /// # Errors
    ///
    /// Returns an error if the application state cannot be built.
    pub async fn new() -> Result<Self> {
        Self::with_config(|_| {}).await
    }

    /// Creates an environment after letting `customize` adjust the config.
    ///
    /// # Errors
    ///
    /// Returns an error if the adjusted configuration is invalid.
    pub async fn with_config(customize: impl FnOnce(&mut Config)) -> Result<Self> {
        let provider = MockServer::start().await;
        let clock = TestClock::new();

        let mut config = Config {
            provider_base_url: provider.uri(),
            provider_secret_key: PROVIDER_SECRET.to_string(),
            provider_split_rule_id: SPLIT_RULE_ID.to_string(),
            callback_token: CALLBACK_TOKEN.to_string(),
            upstream_timeout_seconds: 2,
            rate_limit_per_second: 1_000,
            ..Config::default()
        };
        customize(&mut config);
        config.validate()?;

        let shared_clock: Arc<dyn Clock> = Arc::new(clock.clone());
        let store = Arc::new(InMemoryTenantStore::new());
        let cache = Arc::new(InMemoryCredentialCache::with_clock(shared_clock.clone()));
        let limiter = Arc::new(InMemoryRateLimiter::with_clock(shared_clock.clone()));

        let state = AppState::from_config(&config, store.clone(), cache.clone(), limiter.clone())?
            .with_clock(shared_clock);

        Ok(Self { router: create_router(state), store, cache, limiter, provider, clock })
    }

    /// Registers a tenant directly in the store.
    pub async fn add_tenant(&self, id: i64, account: &str, callback_url: &str, credential: &str) {
        self.store.insert(tenant(id, account, callback_url, credential)).await;
    }

    /// Sends a request through the router.
    ///
    /// # Errors
    ///
    /// Returns an error if the router fails or the body cannot be read.
    pub async fn send(&self, request: Request<Body>) -> Result<TestResponse> {
        let response = self.router.clone().oneshot(request).await.context("router failed")?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await.context("reading body")?;

        Ok(TestResponse { status, headers, body: body.to_vec() })
    }

    /// Requests received by the mock provider so far.
    pub async fn provider_requests(&self) -> Vec<wiremock::Request> {
        self.provider.received_requests().await.unwrap_or_default()
    }
}
