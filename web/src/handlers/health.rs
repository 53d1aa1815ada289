//! Health check endpoints.
//!
//! These endpoints are used by load balancers and monitoring systems
//! to verify service health.

use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A dependency the service cannot serve traffic without.
pub trait ReadinessProbe: Send + Sync {
    /// Name reported in the readiness body
    fn component(&self) -> &'static str;

    /// Resolve to `Err(reason)` when the dependency is unreachable
    fn check(&self) -> Pin<Box<dyn Future<Output = Result<(), String>> + Send + '_>>;
}

/// Health response body
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `ok` or `unavailable`
    pub status: &'static str,
    /// Probed component, absent for liveness
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component: Option<&'static str>,
    /// Failure reason, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Liveness endpoint.
///
/// Returns 200 OK to indicate the process is running. Dependencies are not
/// checked.
///
/// ```text
/// GET /health
/// {"status": "ok"}
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok",
            component: None,
            message: None,
        }),
    )
}

/// Readiness endpoint.
///
/// - 200 OK: the probe succeeded
/// - 503 Service Unavailable: the probe failed
///
/// ```text
/// GET /ready
/// {"status": "ok", "component": "postgres"}
/// ```
pub async fn readiness_check(
    State(probe): State<Arc<dyn ReadinessProbe>>,
) -> (StatusCode, Json<HealthResponse>) {
    match probe.check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok",
                component: Some(probe.component()),
                message: None,
            }),
        ),
        Err(reason) => {
            tracing::warn!(component = probe.component(), %reason, "Readiness probe failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unavailable",
                    component: Some(probe.component()),
                    message: Some(reason),
                }),
            )
        },
    }
}
