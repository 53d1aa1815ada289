//! Booking API endpoints.
//!
//! - POST /api/bookings - Book an available service (customers)
//! - GET /api/bookings - Every booking (admin)
//! - GET /api/bookings/:id - One booking (its customer, its vendor or admin)
//! - GET /api/bookings/customer/:id - A customer's bookings
//! - GET /api/bookings/vendor/:id - A vendor's bookings
//! - PUT /api/bookings/:id/status - Change the lifecycle status (vendor or admin)
//! - PUT /api/bookings/:id/payment - Change the payment status (vendor or admin)
//!
//! Booking a service takes it off the market until the booking is paid.

#![allow(clippy::missing_errors_doc)]

use crate::auth::{Capability, SessionUser};
use crate::server::state::AppState;
use crate::store::BookingFilter;
use crate::types::{AccountId, Booking, BookingId, BookingPaymentStatus, BookingStatus, ServiceId};
use axum::{Json, extract::State, http::StatusCode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utshob_web::{ApiJson, ApiPath, AppError};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request to book a service.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    /// Service to book
    pub service_id: ServiceId,
    /// Date of the event, if known
    pub event_date: Option<DateTime<Utc>>,
    /// Free-text requirements
    pub special_requirements: Option<String>,
    /// Notes
    pub notes: Option<String>,
}

/// Request to change a booking's lifecycle status.
#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    /// New status
    pub status: BookingStatus,
}

/// Request to change a booking's payment status.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePaymentStatusRequest {
    /// New payment status
    pub payment_status: BookingPaymentStatus,
}

/// A booking with a confirmation message.
#[derive(Debug, Serialize)]
pub struct BookingResponse {
    /// Confirmation for the user
    pub message: &'static str,
    /// The booking as stored
    pub booking: Booking,
}

// ============================================================================
// Handlers
// ============================================================================

/// Book an available service for the calling customer.
///
/// # Example
///
/// ```bash
/// curl -X POST http://localhost:5000/api/bookings \
///   -H "Authorization: Bearer <session_token>" \
///   -H "Content-Type: application/json" \
///   -d '{
///     "serviceId": "550e8400-e29b-41d4-a716-446655440000",
///     "eventDate": "2025-03-14T18:00:00Z",
///     "specialRequirements": "Outdoor venue"
///   }'
/// ```
///
/// Booking a service that is already taken returns 400 with
/// `"Service is not available for booking"`.
pub async fn create_booking(
    session: SessionUser,
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreateBookingRequest>,
) -> Result<(StatusCode, Json<BookingResponse>), AppError> {
    let customer_id = session.require(Capability::BookServices)?;

    let booking = state
        .marketplace
        .create_booking(
            customer_id,
            request.service_id,
            request.event_date,
            request.special_requirements,
            request.notes,
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(BookingResponse {
            message: "Booking created successfully",
            booking,
        }),
    ))
}

/// Every booking, newest first.
pub async fn list_bookings(
    session: SessionUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Booking>>, AppError> {
    session.require(Capability::ManageAccounts)?;
    Ok(Json(state.marketplace.bookings(BookingFilter::All).await?))
}

/// One booking, visible to its customer, its vendor and admins.
pub async fn get_booking(
    session: SessionUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<BookingId>,
) -> Result<Json<Booking>, AppError> {
    let booking = state.marketplace.booking(id).await?;
    session.require_party_or_admin(&[booking.customer_id, booking.vendor_id])?;
    Ok(Json(booking))
}

/// A customer's bookings.
pub async fn customer_bookings(
    session: SessionUser,
    State(state): State<AppState>,
    ApiPath(customer_id): ApiPath<AccountId>,
) -> Result<Json<Vec<Booking>>, AppError> {
    session.require_self_or_admin(customer_id)?;
    Ok(Json(state.marketplace.bookings(BookingFilter::Customer(customer_id)).await?))
}

/// Bookings of a vendor's services.
pub async fn vendor_bookings(
    session: SessionUser,
    State(state): State<AppState>,
    ApiPath(vendor_id): ApiPath<AccountId>,
) -> Result<Json<Vec<Booking>>, AppError> {
    session.require_self_or_admin(vendor_id)?;
    Ok(Json(state.marketplace.bookings(BookingFilter::Vendor(vendor_id)).await?))
}

/// Change a booking's lifecycle status.
///
/// # Example
///
/// ```bash
/// curl -X PUT http://localhost:5000/api/bookings/<booking_id>/status \
///   -H "Authorization: Bearer <session_token>" \
///   -H "Content-Type: application/json" \
///   -d '{"status": "in-progress"}'
/// ```
pub async fn update_booking_status(
    session: SessionUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<BookingId>,
    ApiJson(request): ApiJson<UpdateStatusRequest>,
) -> Result<Json<BookingResponse>, AppError> {
    let current = state.marketplace.booking(id).await?;
    session.require_party_or_admin(&[current.vendor_id])?;

    let booking = state.marketplace.update_booking_status(id, request.status).await?;
    Ok(Json(BookingResponse {
        message: "Booking status updated successfully",
        booking,
    }))
}

/// Change a booking's payment status.
pub async fn update_booking_payment(
    session: SessionUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<BookingId>,
    ApiJson(request): ApiJson<UpdatePaymentStatusRequest>,
) -> Result<Json<BookingResponse>, AppError> {
    let current = state.marketplace.booking(id).await?;
    session.require_party_or_admin(&[current.vendor_id])?;

    let booking = state
        .marketplace
        .update_booking_payment_status(id, request.payment_status)
        .await?;
    Ok(Json(BookingResponse {
        message: "Payment status updated successfully",
        booking,
    }))
}
