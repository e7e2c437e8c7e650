//! Health check handlers for service monitoring.
//!
//! `/health` checks both collaborators the request path depends on: the
//! tenant store and the credential cache. `/live` only proves the process is
//! serving HTTP.

use std::{sync::Arc, time::Instant};

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use paybroker_core::{Clock, Result as CoreResult, TenantDirectory};
use serde::Serialize;
use tracing::{debug, error, instrument};

use crate::server::AppState;

/// Health check response structure.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall service health status
    pub status: HealthStatus,
    /// Timestamp when health check was performed
    pub timestamp: DateTime<Utc>,
    /// Individual component health checks
    pub checks: HealthChecks,
    /// Service version information
    pub version: String,
}

/// Overall health status enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// All systems operational
    Healthy,
    /// A dependency is failing
    Unhealthy,
}

/// Individual component health check results.
#[derive(Debug, Serialize)]
pub struct HealthChecks {
    /// Tenant store connectivity
    pub database: ComponentHealth,
    /// Credential cache connectivity
    pub cache: ComponentHealth,
}

/// Health status for individual components.
#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    /// Component status
    pub status: ComponentStatus,
    /// Optional error message if unhealthy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Response time in milliseconds
    pub response_time_ms: u64,
}

/// Component-level health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    /// Component is healthy
    Up,
    /// Component is experiencing issues
    Down,
}

/// Health service that encapsulates the clock so timestamps are testable.
pub struct HealthService {
    clock: Arc<dyn Clock>,
}

impl HealthService {
    /// Creates a new health service with the given clock.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Checks the tenant store and the credential cache.
    pub async fn health_check(&self, directory: &TenantDirectory) -> HealthResponse {
        debug!("Performing health check");

        let timestamp = DateTime::<Utc>::from(self.clock.now_system());

        let database = Self::check_component("database", directory.check_store()).await;
        let cache = Self::check_component("cache", directory.check_cache()).await;

        let status = if database.status == ComponentStatus::Up && cache.status == ComponentStatus::Up
        {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        };

        HealthResponse {
            status,
            timestamp,
            checks: HealthChecks { database, cache },
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    async fn check_component(
        component: &str,
        check: impl std::future::Future<Output = CoreResult<()>>,
    ) -> ComponentHealth {
        let start_time = Instant::now();
        let result = check.await;
        let response_time_ms = u64::try_from(start_time.elapsed().as_millis()).unwrap_or(u64::MAX);

        match result {
            Ok(()) => {
                debug!(component, "Health check passed");
                ComponentHealth { status: ComponentStatus::Up, message: None, response_time_ms }
            },
            Err(e) => {
                error!(component, error = %e, "Health check failed");
                ComponentHealth {
                    status: ComponentStatus::Down,
                    message: Some(format!("{component} unavailable: {e}")),
                    response_time_ms,
                }
            },
        }
    }
}

/// Health check endpoint handler.
#[instrument(name = "health_check", skip(app_state))]
pub async fn health_check(State(app_state): State<AppState>) -> Response {
    let health_service = HealthService::new(app_state.clock.clone());
    let response = health_service.health_check(&app_state.directory).await;

    let status_code = match response.status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    debug!(
        status = ?response.status,
        db_status = ?response.checks.database.status,
        cache_status = ?response.checks.cache.status,
        "Health check completed"
    );

    (status_code, Json(response)).into_response()
}

/// Liveness check endpoint for orchestration health checks.
///
/// Does not touch external dependencies.
#[instrument(name = "liveness_check", skip(app_state))]
pub async fn liveness_check(State(app_state): State<AppState>) -> Response {
    debug!("Performing liveness check");

    let response = serde_json::json!({
        "status": "alive",
        "timestamp": DateTime::<Utc>::from(app_state.clock.now_system()),
        "service": "paybroker"
    });

    (StatusCode::OK, Json(response)).into_response()
}
