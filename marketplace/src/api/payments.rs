//! Payment API endpoints.
//!
//! - GET /api/payments/pending/:userId - What a customer owes (self or admin)
//! - POST /api/payments/process - Pay for bookings (customers)
//! - GET /api/payments/history/:userId - Recorded payments (self or admin)
//!
//! # Payment Flow
//!
//! 1. **Pending**: the client fetches the unpaid bookings and their total
//! 2. **Process**: the client submits an amount against those bookings
//! 3. **Success**: amount equals the required amount; bookings are marked
//!    paid and confirmed and their services become bookable again
//! 4. **Mismatch**: the attempt is recorded as unsuccessful and nothing else
//!    changes
//!
//! No payment gateway is involved; instrument digits are stored masked.

#![allow(clippy::missing_errors_doc)]

use crate::app::PaymentSubmission;
use crate::auth::{Capability, SessionUser};
use crate::flows::payment::{PaymentReceipt, PendingPayments};
use crate::server::state::AppState;
use crate::types::{AccountId, BookingId, Money, Payment, PaymentMethod};
use axum::{Json, extract::State};
use serde::Deserialize;
use utshob_web::{ApiJson, ApiPath, AppError};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request to process a payment.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessPaymentRequest {
    /// Payer; must be the caller when present
    pub user_id: Option<AccountId>,
    /// Instrument type
    pub payment_method: PaymentMethod,
    /// Bank or wallet name
    #[serde(default)]
    pub payment_provider: String,
    /// Card digits, stored masked
    pub card_number: Option<String>,
    /// Wallet number, stored masked
    pub mobile_number: Option<String>,
    /// Amount submitted
    pub amount: Money,
    /// Amount due
    pub required_amount: Money,
    /// Bookings being paid for
    #[serde(default)]
    pub services: Vec<PaidService>,
    /// Free-form notes
    pub notes: Option<String>,
}

/// One booking line of a payment request.
///
/// Clients echo back the lines from the pending summary; only the booking id
/// is used, names and prices come from the stored booking.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaidService {
    /// Booking being paid
    pub booking_id: BookingId,
}

// ============================================================================
// Handlers
// ============================================================================

/// Unpaid bookings of a customer and their total.
///
/// Response:
/// ```json
/// {
///   "totalDue": 8000,
///   "services": [
///     {
///       "serviceId": "...",
///       "serviceName": "Shutter Stories",
///       "servicePrice": 5000,
///       "bookingId": "...",
///       "vendorId": "...",
///       "vendorName": "Nadia Rahman"
///     }
///   ],
///   "count": 2
/// }
/// ```
pub async fn pending_payments(
    session: SessionUser,
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<AccountId>,
) -> Result<Json<PendingPayments>, AppError> {
    session.require_self_or_admin(user_id)?;
    Ok(Json(state.marketplace.pending_payments(user_id).await?))
}

/// Pay for bookings.
///
/// An amount that differs from the required amount is still recorded, as an
/// unsuccessful payment, and answered with 200 and `"success": false`.
///
/// # Example
///
/// ```bash
/// curl -X POST http://localhost:5000/api/payments/process \
///   -H "Authorization: Bearer <session_token>" \
///   -H "Content-Type: application/json" \
///   -d '{
///     "paymentMethod": "mobile_banking",
///     "paymentProvider": "bKash",
///     "mobileNumber": "01712345678",
///     "amount": 5000,
///     "requiredAmount": 5000,
///     "services": [{"bookingId": "660e8400-e29b-41d4-a716-446655440001"}]
///   }'
/// ```
///
/// Response:
/// ```json
/// {
///   "success": true,
///   "paymentStatus": "successful",
///   "transactionId": "TXN1735689600000K3J9Z0QWA",
///   "message": "Your Payment is Successful!!!",
///   "paymentId": "770e8400-e29b-41d4-a716-446655440002"
/// }
/// ```
pub async fn process_payment(
    session: SessionUser,
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ProcessPaymentRequest>,
) -> Result<Json<PaymentReceipt>, AppError> {
    let payer = session.require(Capability::PayBookings)?;
    if request.user_id.is_some_and(|id| id != payer) {
        return Err(AppError::forbidden("Payments can only be made for your own bookings"));
    }

    let receipt = state
        .marketplace
        .process_payment(PaymentSubmission {
            user_id: payer,
            payment_method: request.payment_method,
            payment_provider: request.payment_provider,
            card_number: request.card_number,
            mobile_number: request.mobile_number,
            amount: request.amount,
            required_amount: request.required_amount,
            booking_ids: request.services.into_iter().map(|line| line.booking_id).collect(),
            notes: request.notes,
        })
        .await?;

    Ok(Json(receipt))
}

/// A payer's recorded payments, newest first.
pub async fn payment_history(
    session: SessionUser,
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<AccountId>,
) -> Result<Json<Vec<Payment>>, AppError> {
    session.require_self_or_admin(user_id)?;
    Ok(Json(state.marketplace.payment_history(user_id).await?))
}
