//! Rating API endpoints.
//!
//! - POST /api/ratings/submit - Rate a service 1 to 5, replacing an earlier rating (customers)
//! - GET /api/ratings/vendor/:id - A vendor's average rating
//! - GET /api/ratings/vendor/:id/all - Every rating a vendor received
//! - GET /api/ratings/customer/:id - Ratings a customer gave

#![allow(clippy::missing_errors_doc)]

use crate::auth::{Capability, SessionUser};
use crate::flows::feedback::VendorRatingSummary;
use crate::server::state::AppState;
use crate::store::FeedbackFilter;
use crate::types::{AccountId, Rating, ServiceId};
use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use utshob_web::{ApiJson, ApiPath, AppError};

/// Request to rate a service.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRatingRequest {
    /// Rated service
    pub service_id: ServiceId,
    /// Vendor offering the service
    pub vendor_id: AccountId,
    /// Stars, 1 to 5
    pub rating: i32,
}

/// Response after storing a rating.
#[derive(Debug, Serialize)]
pub struct SubmitRatingResponse {
    /// Always `true`; failures are error responses
    pub success: bool,
    /// Whether the rating was new or replaced one
    pub message: &'static str,
    /// Stored rating
    pub rating: Rating,
}

/// Rate a service.
///
/// # Example
///
/// ```bash
/// curl -X POST http://localhost:5000/api/ratings/submit \
///   -H "Authorization: Bearer <session_token>" \
///   -H "Content-Type: application/json" \
///   -d '{"serviceId": "...", "vendorId": "...", "rating": 5}'
/// ```
pub async fn submit_rating(
    session: SessionUser,
    State(state): State<AppState>,
    ApiJson(request): ApiJson<SubmitRatingRequest>,
) -> Result<Json<SubmitRatingResponse>, AppError> {
    let customer_id = session.require(Capability::SubmitFeedback)?;

    let (rating, updated) = state
        .marketplace
        .submit_rating(customer_id, request.service_id, request.vendor_id, request.rating)
        .await?;

    Ok(Json(SubmitRatingResponse {
        success: true,
        message: if updated {
            "Rating updated successfully"
        } else {
            "Rating submitted successfully"
        },
        rating,
    }))
}

/// A vendor's average rating.
///
/// Response:
/// ```json
/// { "averageRating": 4.0, "totalRatings": 3, "ratings": [ ... ] }
/// ```
pub async fn vendor_summary(
    State(state): State<AppState>,
    ApiPath(vendor_id): ApiPath<AccountId>,
) -> Result<Json<VendorRatingSummary>, AppError> {
    Ok(Json(state.marketplace.vendor_rating_summary(vendor_id).await?))
}

/// Every rating a vendor received, newest first.
pub async fn vendor_ratings(
    State(state): State<AppState>,
    ApiPath(vendor_id): ApiPath<AccountId>,
) -> Result<Json<Vec<Rating>>, AppError> {
    Ok(Json(state.marketplace.ratings(FeedbackFilter::Vendor(vendor_id)).await?))
}

/// Ratings a customer gave, newest first.
pub async fn customer_ratings(
    State(state): State<AppState>,
    ApiPath(customer_id): ApiPath<AccountId>,
) -> Result<Json<Vec<Rating>>, AppError> {
    Ok(Json(state.marketplace.ratings(FeedbackFilter::Customer(customer_id)).await?))
}
