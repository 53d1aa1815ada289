//! Payment processing.
//!
//! A payment attempt is always recorded. It succeeds only when the submitted
//! amount equals the amount due exactly; a successful attempt also settles
//! every referenced booking and puts its service back on the market. All of
//! it is one unit of work: a booking that is missing or belongs to someone
//! else fails the whole payment before anything is written.

use super::{MarketplaceEnvironment, commit, required};
use crate::error::MarketplaceError;
use crate::store::{UnitOfWork, Write};
use crate::types::{
    Account, AccountId, Availability, Booking, BookingId, BookingPaymentStatus, Money, Payment, PaymentId,
    PaymentLine, PaymentMethod, PaymentOutcome, ServiceId, mask_digits,
};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use utshob_core::{SmallVec, effect::Effect, reducer::Reducer, smallvec};

/// Message returned for a matching amount
pub const SUCCESS_MESSAGE: &str = "Your Payment is Successful!!!";

/// Message returned for a mismatched amount
pub const MISMATCH_MESSAGE: &str = "Payment unsuccessful - Amount does not match required amount";

const TRANSACTION_SUFFIX_LEN: usize = 9;
const BASE36: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Build a transaction id: `TXN`, the epoch milliseconds of `now`, then nine
/// random upper-case base-36 characters.
#[must_use]
pub fn transaction_id(now: DateTime<Utc>) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..TRANSACTION_SUFFIX_LEN)
        .map(|_| char::from(BASE36[rng.gen_range(0..BASE36.len())]))
        .collect();
    format!("TXN{}{suffix}", now.timestamp_millis())
}

// ============================================================================
// Pending total
// ============================================================================

/// One unpaid booking in a [`PendingPayments`] summary
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingLine {
    /// Booked service
    pub service_id: ServiceId,
    /// Service name at booking time
    pub service_name: String,
    /// Amount due for the booking
    pub service_price: Money,
    /// The booking
    pub booking_id: BookingId,
    /// Vendor of the service
    pub vendor_id: AccountId,
    /// Vendor name at booking time
    pub vendor_name: String,
}

/// What a customer currently owes
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingPayments {
    /// Sum of the amounts due
    pub total_due: Money,
    /// Unpaid bookings
    pub services: Vec<PendingLine>,
    /// Number of unpaid bookings
    pub count: usize,
    /// Set when nothing is owed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl PendingPayments {
    /// Summarize a customer's unpaid bookings
    #[must_use]
    pub fn from_bookings(bookings: &[Booking]) -> Self {
        let services: Vec<PendingLine> = bookings
            .iter()
            .map(|b| PendingLine {
                service_id: b.service_id,
                service_name: b.service_name.clone(),
                service_price: b.total_amount,
                booking_id: b.id,
                vendor_id: b.vendor_id,
                vendor_name: b.vendor_name.clone(),
            })
            .collect();
        let total_due = services
            .iter()
            .fold(Money::ZERO, |total, line| total.saturating_add(line.service_price));

        Self {
            total_due,
            count: services.len(),
            message: services.is_empty().then(|| "No pending payments found".to_string()),
            services,
        }
    }
}

// ============================================================================
// State and actions
// ============================================================================

/// What the caller gets back from a processed payment
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReceipt {
    /// Whether the amount matched
    pub success: bool,
    /// Recorded outcome
    pub payment_status: PaymentOutcome,
    /// Generated transaction id
    pub transaction_id: String,
    /// Human-readable result
    pub message: String,
    /// Stored payment record
    pub payment_id: PaymentId,
}

impl From<&Payment> for PaymentReceipt {
    fn from(payment: &Payment) -> Self {
        let success = payment.payment_status == PaymentOutcome::Successful;
        Self {
            success,
            payment_status: payment.payment_status,
            transaction_id: payment.transaction_id.clone(),
            message: if success { SUCCESS_MESSAGE } else { MISMATCH_MESSAGE }.to_string(),
            payment_id: payment.id,
        }
    }
}

/// Records the payment flow decides on
#[derive(Clone, Debug, Default)]
pub struct PaymentState {
    /// Paying account
    pub payer: Option<Account>,
    /// Referenced bookings that exist
    pub bookings: Vec<Booking>,
    /// Result of the command, once settled
    pub outcome: Option<Result<PaymentReceipt, MarketplaceError>>,
}

/// Commands and events of the payment flow
#[derive(Clone, Debug)]
pub enum PaymentAction {
    // Commands
    /// Submit a payment for one or more bookings
    ProcessPayment {
        /// Paying account
        user_id: AccountId,
        /// Instrument type
        payment_method: PaymentMethod,
        /// Bank or wallet name
        payment_provider: String,
        /// Card digits, masked before storage
        card_number: Option<String>,
        /// Wallet number, masked before storage
        mobile_number: Option<String>,
        /// Amount submitted
        amount: Money,
        /// Amount the client believes is due
        required_amount: Money,
        /// Bookings covered
        booking_ids: Vec<BookingId>,
        /// Free-form notes
        notes: Option<String>,
    },

    // Events
    /// The attempt was recorded, with its side effects on success
    PaymentRecorded {
        /// Stored payment
        payment: Payment,
    },

    /// The command was refused
    PaymentRejected {
        /// Reason
        error: MarketplaceError,
    },
}

// ============================================================================
// Reducer
// ============================================================================

/// Reducer for payment processing
#[derive(Clone, Copy, Debug, Default)]
pub struct PaymentReducer;

impl PaymentReducer {
    /// Resolve the referenced bookings in request order, each once.
    ///
    /// Every booking must belong to the payer and still be awaiting payment.
    fn covered_bookings<'a>(
        state: &'a PaymentState,
        payer: AccountId,
        booking_ids: &[BookingId],
    ) -> Result<Vec<&'a Booking>, MarketplaceError> {
        if booking_ids.is_empty() {
            return Err(MarketplaceError::invalid("At least one booking is required"));
        }

        let mut covered: Vec<&Booking> = Vec::with_capacity(booking_ids.len());
        for id in booking_ids {
            if covered.iter().any(|b| b.id == *id) {
                continue;
            }
            let booking = state
                .bookings
                .iter()
                .find(|b| b.id == *id && b.customer_id == payer)
                .ok_or_else(|| MarketplaceError::not_found("Booking", id))?;
            if booking.payment_status != BookingPaymentStatus::Pending {
                return Err(MarketplaceError::InvalidState(format!(
                    "Booking {id} is not awaiting payment"
                )));
            }
            covered.push(booking);
        }
        Ok(covered)
    }
}

impl Reducer for PaymentReducer {
    type State = PaymentState;
    type Action = PaymentAction;
    type Environment = MarketplaceEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            PaymentAction::ProcessPayment {
                user_id,
                payment_method,
                payment_provider,
                card_number,
                mobile_number,
                amount,
                required_amount,
                booking_ids,
                notes,
            } => {
                let validated = state
                    .payer
                    .as_ref()
                    .filter(|p| p.id == user_id)
                    .ok_or_else(|| MarketplaceError::not_found("User", user_id))
                    .and_then(|payer| {
                        let provider = required(&payment_provider, "Payment provider")?;
                        let covered = Self::covered_bookings(state, user_id, &booking_ids)?;
                        Ok((payer, provider, covered))
                    });

                let (payer, payment_provider, covered) = match validated {
                    Ok(parts) => parts,
                    Err(error) => {
                        tracing::warn!(%user_id, %error, "Payment rejected");
                        state.outcome = Some(Err(error));
                        return SmallVec::new();
                    },
                };

                let now = env.clock.now();
                let payment_status = if amount == required_amount {
                    PaymentOutcome::Successful
                } else {
                    PaymentOutcome::Unsuccessful
                };

                let payment = Payment {
                    id: PaymentId::new(),
                    user_id,
                    customer_name: payer.name.clone(),
                    customer_email: payer.email.clone(),
                    customer_phone: payer.phone.clone(),
                    payment_method,
                    payment_provider,
                    card_number: card_number.filter(|c| !c.trim().is_empty()).map(|c| mask_digits(&c)),
                    mobile_number: mobile_number.filter(|m| !m.trim().is_empty()).map(|m| mask_digits(&m)),
                    amount,
                    required_amount,
                    payment_status,
                    services: covered
                        .iter()
                        .map(|b| PaymentLine {
                            service_id: b.service_id,
                            service_name: b.service_name.clone(),
                            service_price: b.total_amount,
                            booking_id: b.id,
                        })
                        .collect(),
                    transaction_id: transaction_id(now),
                    payment_date: now,
                    notes: notes.filter(|n| !n.trim().is_empty()),
                };

                let mut unit = UnitOfWork::new().with(Write::InsertPayment(payment.clone()));
                if payment_status == PaymentOutcome::Successful {
                    for booking in &covered {
                        unit = unit
                            .with(Write::SettleBooking {
                                booking_id: booking.id,
                                payer: user_id,
                                at: now,
                            })
                            .with(Write::SetAvailability {
                                service_id: booking.service_id,
                                expected: None,
                                availability: Availability::Yes,
                            });
                    }
                }

                smallvec![commit(
                    env,
                    unit,
                    move || PaymentAction::PaymentRecorded { payment },
                    |err| PaymentAction::PaymentRejected { error: err.into() },
                )]
            },

            PaymentAction::PaymentRecorded { payment } => {
                tracing::info!(
                    payment_id = %payment.id,
                    transaction_id = %payment.transaction_id,
                    status = %payment.payment_status,
                    bookings = payment.services.len(),
                    "Payment recorded"
                );
                metrics::counter!("marketplace.payments.processed", "status" => payment.payment_status.as_str())
                    .increment(1);
                state.outcome = Some(Ok(PaymentReceipt::from(&payment)));
                smallvec![Effect::None]
            },

            PaymentAction::PaymentRejected { error } => {
                tracing::warn!(%error, "Payment rejected");
                state.outcome = Some(Err(error));
                smallvec![Effect::None]
            },
        }
    }
}
