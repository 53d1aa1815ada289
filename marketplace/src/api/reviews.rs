//! Review API endpoints.
//!
//! - POST /api/reviews/submit - Review a service once (customers)
//! - GET /api/reviews/vendor/:id - Reviews a vendor received
//! - GET /api/reviews/customer/:id - Reviews a customer wrote

#![allow(clippy::missing_errors_doc)]

use crate::auth::{Capability, SessionUser};
use crate::server::state::AppState;
use crate::store::FeedbackFilter;
use crate::types::{AccountId, Review, ServiceId};
use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use utshob_web::{ApiJson, ApiPath, AppError};

/// Request to review a service.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReviewRequest {
    /// Reviewed service
    pub service_id: ServiceId,
    /// Vendor offering the service
    pub vendor_id: AccountId,
    /// Review text
    #[serde(default)]
    pub comment: String,
}

/// Response after storing a review.
#[derive(Debug, Serialize)]
pub struct SubmitReviewResponse {
    /// Always `true`; failures are error responses
    pub success: bool,
    /// Confirmation for the user
    pub message: &'static str,
    /// Stored review
    pub review: Review,
}

/// Review a service.
///
/// A second review of the same service by the same customer is rejected
/// with 400 and `"You have already reviewed this service"`.
pub async fn submit_review(
    session: SessionUser,
    State(state): State<AppState>,
    ApiJson(request): ApiJson<SubmitReviewRequest>,
) -> Result<Json<SubmitReviewResponse>, AppError> {
    let customer_id = session.require(Capability::SubmitFeedback)?;

    let review = state
        .marketplace
        .submit_review(customer_id, request.service_id, request.vendor_id, request.comment)
        .await?;

    Ok(Json(SubmitReviewResponse {
        success: true,
        message: "Review submitted successfully",
        review,
    }))
}

/// Reviews a vendor received, newest first.
pub async fn vendor_reviews(
    State(state): State<AppState>,
    ApiPath(vendor_id): ApiPath<AccountId>,
) -> Result<Json<Vec<Review>>, AppError> {
    Ok(Json(state.marketplace.reviews(FeedbackFilter::Vendor(vendor_id)).await?))
}

/// Reviews a customer wrote, newest first.
pub async fn customer_reviews(
    State(state): State<AppState>,
    ApiPath(customer_id): ApiPath<AccountId>,
) -> Result<Json<Vec<Review>>, AppError> {
    Ok(Json(state.marketplace.reviews(FeedbackFilter::Customer(customer_id)).await?))
}
