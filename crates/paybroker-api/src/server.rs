//! HTTP server setup and request routing.
//!
//! Requests flow through middleware in order:
//! 1. Request ID generation
//! 2. Request/response logging
//! 3. Timeout enforcement
//! 4. Rate limiting (`/v1` routes only)
//! 5. Tenant credential or callback token check
//! 6. Handler execution
//!
//! # Graceful Shutdown
//!
//! On CTRL+C or SIGTERM the server stops accepting connections and waits for
//! in-flight requests to finish.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::{
    error_handling::HandleErrorLayer,
    extract::Request,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    BoxError, Router,
};
use paybroker_core::{Clock, CredentialCache, RealClock, TenantDirectory, TenantStore};
use paybroker_gateway::{CallbackForwarder, RequestAnnotator, UpstreamGateway, WebhookRouter};
use tower::{timeout::TimeoutLayer, ServiceBuilder};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    config::Config,
    error::ApiError,
    handlers,
    middleware::{
        auth::auth_middleware, callback_token::callback_token_middleware,
        rate_limit::rate_limit_middleware,
    },
    ratelimit::RateLimiter,
};

/// Shared state handed to every handler and middleware.
#[derive(Clone)]
pub struct AppState {
    /// Credential and callback target resolution.
    pub directory: TenantDirectory,
    /// Outbound payload rewriting.
    pub annotator: RequestAnnotator,
    /// Provider client.
    pub upstream: UpstreamGateway,
    /// Callback reverse-routing.
    pub webhooks: WebhookRouter,
    /// Admission control backend.
    pub rate_limiter: Arc<dyn RateLimiter>,
    /// Requests per second allowed per client address.
    pub rate_limit_per_second: u64,
    /// Expected `x-callback-token` value.
    pub callback_token: Arc<str>,
    /// Server-wide request timeout.
    pub request_timeout: Duration,
    /// Time source for health timestamps.
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// Wires the service from configuration and its storage collaborators.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider or HTTP client settings are invalid.
    pub fn from_config(
        config: &Config,
        store: Arc<dyn TenantStore>,
        cache: Arc<dyn CredentialCache>,
        rate_limiter: Arc<dyn RateLimiter>,
    ) -> anyhow::Result<Self> {
        let directory = TenantDirectory::new(store, cache, config.credential_cache_ttl());

        let annotator = RequestAnnotator::new(
            &config.provider_base_url,
            config.provider_secret_key.clone(),
            config.split_rule_id(),
        )
        .context("Invalid provider configuration")?;

        let client_config = config.to_client_config();
        let upstream =
            UpstreamGateway::new(client_config.clone()).context("Failed to build provider client")?;
        let forwarder =
            CallbackForwarder::new(client_config).context("Failed to build callback client")?;

        Ok(Self {
            webhooks: WebhookRouter::new(directory.clone(), forwarder),
            directory,
            annotator,
            upstream,
            rate_limiter,
            rate_limit_per_second: config.rate_limit_per_second,
            callback_token: Arc::from(config.callback_token.as_str()),
            request_timeout: config.request_timeout(),
            clock: Arc::new(RealClock),
        })
    }

    /// Replaces the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

/// Creates the Axum router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    let health_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/live", get(handlers::liveness_check));

    let tenant_routes = Router::new()
        .route("/invoices", post(handlers::create_invoice))
        .route("/recurring/plans", post(handlers::create_subscription))
        .route("/payouts", post(handlers::create_payout))
        .route("/customers", post(handlers::create_customer))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let webhook_routes = Router::new()
        .route("/webhooks", post(handlers::receive_webhook))
        .route_layer(middleware::from_fn_with_state(state.clone(), callback_token_middleware));

    let api_routes = Router::new()
        .merge(tenant_routes)
        .merge(webhook_routes)
        .route_layer(middleware::from_fn_with_state(state.clone(), rate_limit_middleware));

    Router::new()
        .merge(health_routes)
        .nest("/v1", api_routes)
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_middleware_error))
                .layer(TimeoutLayer::new(state.request_timeout)),
        )
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(inject_request_id))
        .with_state(state)
}

/// Converts errors raised by tower middleware into API errors.
async fn handle_middleware_error(err: BoxError) -> ApiError {
    if err.is::<tower::timeout::error::Elapsed>() {
        warn!("Request exceeded the server timeout");
        ApiError::RequestTimeout
    } else {
        ApiError::Middleware(err.to_string())
    }
}

/// Middleware to inject request ID into all responses.
///
/// Adds X-Request-Id header for tracing requests across services.
async fn inject_request_id(req: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();

    let mut req = req;
    req.extensions_mut().insert(request_id.clone());

    let mut response = next.run(req).await;

    if let Ok(header_value) = request_id.parse() {
        response.headers_mut().insert("X-Request-Id", header_value);
    }

    response
}

/// Starts the HTTP server with graceful shutdown support.
///
/// # Errors
///
/// Returns `std::io::Error` if the address cannot be bound or serving fails.
pub async fn start_server(state: AppState, addr: SocketAddr) -> Result<(), std::io::Error> {
    let app = create_router(state);

    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    info!("HTTP server listening on {}", actual_addr);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server stopped gracefully");
    Ok(())
}

/// Waits for shutdown signal (CTRL+C or SIGTERM).
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received CTRL+C, starting graceful shutdown");
        },
        () = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        },
    }

    warn!("Waiting for in-flight requests to complete");
}
