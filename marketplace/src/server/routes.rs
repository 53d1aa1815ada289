//! Router configuration for the marketplace.
//!
//! Builds the complete Axum router with all endpoints.

use super::state::AppState;
use crate::api;
use axum::{
    Router,
    extract::State,
    http::{HeaderValue, StatusCode},
    routing::{delete, get, post, put},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utshob_runtime::metrics::MetricsServer;
use utshob_web::correlation_id_layer;
use utshob_web::handlers::{health_check, readiness_check};

/// Build the complete Axum router.
///
/// Configures:
/// - Health checks at `/health` and `/ready`
/// - Account, catalog, booking, payment and feedback endpoints under `/api`
/// - Request tracing, CORS and correlation ids
pub fn build_router(state: AppState, cors: CorsLayer) -> Router {
    let api_routes = Router::new()
        // Accounts
        .route("/users/signup", post(api::signup))
        .route("/users/login", post(api::login))
        .route("/users/me", get(api::me))
        .route("/users/cleanup-orphaned", post(api::cleanup_orphaned))
        .route("/users", get(api::list_users))
        .route("/users/:id", delete(api::delete_user))
        // Catalog
        .route("/services", get(api::list_services).post(api::create_service))
        .route("/services/:id", get(api::get_service))
        // Bookings
        .route("/bookings", get(api::list_bookings).post(api::create_booking))
        .route("/bookings/customer/:id", get(api::customer_bookings))
        .route("/bookings/vendor/:id", get(api::vendor_bookings))
        .route("/bookings/:id", get(api::get_booking))
        .route("/bookings/:id/status", put(api::update_booking_status))
        .route("/bookings/:id/payment", put(api::update_booking_payment))
        // Payments
        .route("/payments/pending/:user_id", get(api::pending_payments))
        .route("/payments/process", post(api::process_payment))
        .route("/payments/history/:user_id", get(api::payment_history))
        // Feedback
        .route("/reviews/submit", post(api::submit_review))
        .route("/reviews/vendor/:id", get(api::vendor_reviews))
        .route("/reviews/customer/:id", get(api::customer_reviews))
        .route("/ratings/submit", post(api::submit_rating))
        .route("/ratings/vendor/:id", get(api::vendor_summary))
        .route("/ratings/vendor/:id/all", get(api::vendor_ratings))
        .route("/ratings/customer/:id", get(api::customer_ratings));

    Router::new()
        // Health checks (no authentication)
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(correlation_id_layer())
        .with_state(state)
}

/// CORS policy for a configured origin; `*` allows any.
#[must_use]
pub fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origin.trim() == "*" {
        return layer.allow_origin(Any);
    }
    match HeaderValue::from_str(origin.trim()) {
        Ok(value) => layer.allow_origin(value),
        Err(e) => {
            tracing::warn!(origin, error = %e, "Invalid CORS origin, allowing any");
            layer.allow_origin(Any)
        },
    }
}

/// Router serving the Prometheus scrape endpoint at `/metrics`.
pub fn metrics_router(metrics: Arc<MetricsServer>) -> Router {
    Router::new().route("/metrics", get(render_metrics)).with_state(metrics)
}

async fn render_metrics(State(metrics): State<Arc<MetricsServer>>) -> Result<String, StatusCode> {
    metrics.render().ok_or(StatusCode::SERVICE_UNAVAILABLE)
}
