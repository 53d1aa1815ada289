//! Booking creation and status changes.
//!
//! A booking snapshots the customer, vendor and service at creation time and
//! flips the service's availability from `Yes` to `No` in the same unit of
//! work. The availability write is a compare-and-set, so of two concurrent
//! bookings for one service at most one commits.

use super::{MarketplaceEnvironment, commit};
use crate::error::MarketplaceError;
use crate::store::{StoreError, UnitOfWork, Write};
use crate::types::{
    Account, AccountId, Availability, Booking, BookingId, BookingPaymentStatus, BookingStatus,
    Service, ServiceId,
};
use chrono::{DateTime, Utc};
use utshob_core::{SmallVec, effect::Effect, reducer::Reducer, smallvec};

/// Message for a service that cannot currently be booked
pub const UNAVAILABLE_MESSAGE: &str = "Service is not available for booking";

// ============================================================================
// State
// ============================================================================

/// Records the booking flow decides on
#[derive(Clone, Debug, Default)]
pub struct BookingState {
    /// Customer placing the booking
    pub customer: Option<Account>,
    /// Service being booked
    pub service: Option<Service>,
    /// Vendor owning the service
    pub vendor: Option<Account>,
    /// Booking targeted by a status change
    pub booking: Option<Booking>,
    /// Result of the command, once settled
    pub outcome: Option<Result<Booking, MarketplaceError>>,
}

// ============================================================================
// Actions
// ============================================================================

/// Commands and events of the booking flow
#[derive(Clone, Debug)]
pub enum BookingAction {
    // Commands
    /// Book an available service
    CreateBooking {
        /// Booking customer
        customer_id: AccountId,
        /// Service to book
        service_id: ServiceId,
        /// Date of the event, if known
        event_date: Option<DateTime<Utc>>,
        /// Free-form requirements
        special_requirements: Option<String>,
        /// Free-form notes
        notes: Option<String>,
    },

    /// Replace a booking's lifecycle status
    UpdateStatus {
        /// Booking to update
        booking_id: BookingId,
        /// New status
        status: BookingStatus,
    },

    /// Replace a booking's payment status
    UpdatePaymentStatus {
        /// Booking to update
        booking_id: BookingId,
        /// New payment status
        payment_status: BookingPaymentStatus,
    },

    // Events
    /// The booking and the availability change were written
    BookingCreated {
        /// Booking as stored
        booking: Booking,
    },

    /// A status change was written
    BookingUpdated {
        /// Booking after the change
        booking: Booking,
    },

    /// The command was refused
    BookingRejected {
        /// Reason
        error: MarketplaceError,
    },
}

// ============================================================================
// Reducer
// ============================================================================

/// Reducer for the booking flow
#[derive(Clone, Copy, Debug, Default)]
pub struct BookingReducer;

impl BookingReducer {
    /// Checks run in a fixed order and nothing is written until all pass.
    fn validate_create<'a>(
        state: &'a BookingState,
        customer_id: AccountId,
        service_id: ServiceId,
    ) -> Result<(&'a Account, &'a Service, &'a Account), MarketplaceError> {
        let customer = state
            .customer
            .as_ref()
            .ok_or_else(|| MarketplaceError::not_found("Customer", customer_id))?;
        let service = state
            .service
            .as_ref()
            .ok_or_else(|| MarketplaceError::not_found("Service", service_id))?;
        if service.availability != Availability::Yes {
            return Err(MarketplaceError::InvalidState(UNAVAILABLE_MESSAGE.into()));
        }
        let vendor = state
            .vendor
            .as_ref()
            .filter(|v| v.id == service.vendor_id)
            .ok_or_else(|| MarketplaceError::not_found("Vendor", service.vendor_id))?;

        Ok((customer, service, vendor))
    }

    fn update(
        state: &mut BookingState,
        env: &MarketplaceEnvironment,
        booking_id: BookingId,
        status: Option<BookingStatus>,
        payment_status: Option<BookingPaymentStatus>,
    ) -> SmallVec<[Effect<BookingAction>; 4]> {
        let Some(mut booking) = state.booking.clone().filter(|b| b.id == booking_id) else {
            state.outcome = Some(Err(MarketplaceError::not_found("Booking", booking_id)));
            return SmallVec::new();
        };

        let at = env.clock.now();
        if let Some(status) = status {
            booking.status = status;
        }
        if let Some(payment_status) = payment_status {
            booking.payment_status = payment_status;
        }
        booking.updated_at = at;

        let unit = UnitOfWork::new().with(Write::UpdateBooking {
            booking_id,
            status,
            payment_status,
            at,
        });
        smallvec![commit(
            env,
            unit,
            move || BookingAction::BookingUpdated { booking },
            |err| BookingAction::BookingRejected { error: err.into() },
        )]
    }
}

impl Reducer for BookingReducer {
    type State = BookingState;
    type Action = BookingAction;
    type Environment = MarketplaceEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            BookingAction::CreateBooking {
                customer_id,
                service_id,
                event_date,
                special_requirements,
                notes,
            } => {
                let (customer, service, vendor) = match Self::validate_create(state, customer_id, service_id) {
                    Ok(records) => records,
                    Err(error) => {
                        tracing::warn!(%customer_id, %service_id, %error, "Booking rejected");
                        state.outcome = Some(Err(error));
                        return SmallVec::new();
                    },
                };

                let now = env.clock.now();
                let booking = Booking {
                    id: BookingId::new(),
                    customer_id: customer.id,
                    customer_name: customer.name.clone(),
                    customer_email: customer.email.clone(),
                    customer_phone: customer.phone.clone(),
                    vendor_id: vendor.id,
                    vendor_name: vendor.name.clone(),
                    vendor_email: vendor.email.clone(),
                    service_id: service.id,
                    service_name: service.organization_name.clone(),
                    service_category: service.category,
                    service_price: service.price,
                    service_description: service.description.clone(),
                    booking_date: now,
                    event_date,
                    status: BookingStatus::Pending,
                    total_amount: service.price,
                    payment_status: BookingPaymentStatus::Pending,
                    special_requirements: special_requirements.unwrap_or_default().trim().to_string(),
                    notes: notes.filter(|n| !n.trim().is_empty()),
                    created_at: now,
                    updated_at: now,
                };

                let unit = UnitOfWork::new()
                    .with(Write::InsertBooking(booking.clone()))
                    .with(Write::SetAvailability {
                        service_id: service.id,
                        expected: Some(Availability::Yes),
                        availability: Availability::No,
                    });

                smallvec![commit(
                    env,
                    unit,
                    move || BookingAction::BookingCreated { booking },
                    |err| BookingAction::BookingRejected {
                        error: match err {
                            StoreError::Conflict(_) => MarketplaceError::InvalidState(UNAVAILABLE_MESSAGE.into()),
                            other => other.into(),
                        },
                    },
                )]
            },

            BookingAction::UpdateStatus { booking_id, status } => {
                Self::update(state, env, booking_id, Some(status), None)
            },

            BookingAction::UpdatePaymentStatus {
                booking_id,
                payment_status,
            } => Self::update(state, env, booking_id, None, Some(payment_status)),

            BookingAction::BookingCreated { booking } => {
                tracing::info!(
                    booking_id = %booking.id,
                    service_id = %booking.service_id,
                    customer_id = %booking.customer_id,
                    "Booking created"
                );
                metrics::counter!("marketplace.bookings.created").increment(1);
                state.outcome = Some(Ok(booking));
                smallvec![Effect::None]
            },

            BookingAction::BookingUpdated { booking } => {
                tracing::info!(
                    booking_id = %booking.id,
                    status = %booking.status,
                    payment_status = %booking.payment_status,
                    "Booking updated"
                );
                state.outcome = Some(Ok(booking));
                smallvec![Effect::None]
            },

            BookingAction::BookingRejected { error } => {
                tracing::warn!(%error, "Booking change rejected");
                state.outcome = Some(Err(error));
                smallvec![Effect::None]
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::flows::fixtures;
    use crate::types::Money;
    use utshob_testing::{ReducerTest, assertions, effects::collect_actions};

    fn create(customer_id: AccountId, service_id: ServiceId) -> BookingAction {
        BookingAction::CreateBooking {
            customer_id,
            service_id,
            event_date: None,
            special_requirements: Some(" Outdoor stage ".into()),
            notes: None,
        }
    }

    #[test]
    fn test_missing_customer_checked_first() {
        let customer_id = AccountId::new();
        ReducerTest::new(BookingReducer)
            .with_env(fixtures::env())
            .given_state(BookingState::default())
            .when_action(create(customer_id, ServiceId::new()))
            .then_state(move |state| {
                assert_eq!(
                    state.outcome,
                    Some(Err(MarketplaceError::not_found("Customer", customer_id)))
                );
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn test_unavailable_service_rejected() {
        let customer = fixtures::customer("c@example.com");
        let vendor = fixtures::vendor("v@example.com");
        let mut service = fixtures::service(&vendor, 5000);
        service.availability = Availability::No;

        ReducerTest::new(BookingReducer)
            .with_env(fixtures::env())
            .given_state(BookingState {
                customer: Some(customer.clone()),
                service: Some(service.clone()),
                vendor: Some(vendor),
                ..BookingState::default()
            })
            .when_action(create(customer.id, service.id))
            .then_state(|state| {
                assert_eq!(
                    state.outcome,
                    Some(Err(MarketplaceError::InvalidState(UNAVAILABLE_MESSAGE.into())))
                );
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn test_missing_vendor_rejected() {
        let customer = fixtures::customer("c@example.com");
        let vendor = fixtures::vendor("v@example.com");
        let service = fixtures::service(&vendor, 5000);

        ReducerTest::new(BookingReducer)
            .with_env(fixtures::env())
            .given_state(BookingState {
                customer: Some(customer.clone()),
                service: Some(service.clone()),
                ..BookingState::default()
            })
            .when_action(create(customer.id, service.id))
            .then_state(move |state| {
                assert_eq!(
                    state.outcome,
                    Some(Err(MarketplaceError::not_found("Vendor", vendor.id)))
                );
            })
            .run();
    }

    #[tokio::test]
    async fn test_booking_snapshots_and_takes_service_off_market() {
        let env = fixtures::env();
        let customer = fixtures::customer("c@example.com");
        let vendor = fixtures::vendor("v@example.com");
        let service = fixtures::service(&vendor, 5000);
        fixtures::seed(&env, vec![Write::InsertService(service.clone())]).await;

        let mut state = BookingState {
            customer: Some(customer.clone()),
            service: Some(service.clone()),
            vendor: Some(vendor.clone()),
            ..BookingState::default()
        };
        let effects = BookingReducer.reduce(&mut state, create(customer.id, service.id), &env);
        assertions::assert_has_future_effect(&effects);

        let Some(BookingAction::BookingCreated { booking }) = collect_actions(effects).await.into_iter().next()
        else {
            panic!("expected BookingCreated");
        };
        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(booking.payment_status, BookingPaymentStatus::Pending);
        assert_eq!(booking.total_amount, Money::new(5000));
        assert_eq!(booking.vendor_email, vendor.email);
        assert_eq!(booking.special_requirements, "Outdoor stage");

        let stored = env.store.service(service.id).await.unwrap().unwrap();
        assert_eq!(stored.availability, Availability::No);
    }

    #[tokio::test]
    async fn test_lost_race_maps_to_invalid_state() {
        let env = fixtures::env();
        let customer = fixtures::customer("c@example.com");
        let vendor = fixtures::vendor("v@example.com");
        let service = fixtures::service(&vendor, 5000);
        fixtures::seed(&env, vec![Write::InsertService(service.clone())]).await;

        // Another booking took the service after this request loaded it.
        fixtures::seed(
            &env,
            vec![Write::SetAvailability {
                service_id: service.id,
                expected: None,
                availability: Availability::No,
            }],
        )
        .await;

        let mut state = BookingState {
            customer: Some(customer.clone()),
            service: Some(service.clone()),
            vendor: Some(vendor),
            ..BookingState::default()
        };
        let effects = BookingReducer.reduce(&mut state, create(customer.id, service.id), &env);
        let actions = collect_actions(effects).await;

        assert!(matches!(
            actions.as_slice(),
            [BookingAction::BookingRejected { error: MarketplaceError::InvalidState(_) }]
        ));
        assert!(env.store.bookings(crate::store::BookingFilter::All).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_status_replaces_field() {
        let env = fixtures::env();
        let customer = fixtures::customer("c@example.com");
        let vendor = fixtures::vendor("v@example.com");
        let service = fixtures::service(&vendor, 5000);
        let booking = fixtures::booking(&customer, &vendor, &service);
        fixtures::seed(&env, vec![Write::InsertBooking(booking.clone())]).await;

        let mut state = BookingState {
            booking: Some(booking.clone()),
            ..BookingState::default()
        };
        let effects = BookingReducer.reduce(
            &mut state,
            BookingAction::UpdateStatus {
                booking_id: booking.id,
                status: BookingStatus::InProgress,
            },
            &env,
        );
        for action in collect_actions(effects).await {
            let _ = BookingReducer.reduce(&mut state, action, &env);
        }

        let updated = state.outcome.unwrap().unwrap();
        assert_eq!(updated.status, BookingStatus::InProgress);
        assert_eq!(updated.payment_status, BookingPaymentStatus::Pending);

        let stored = env.store.booking(booking.id).await.unwrap().unwrap();
        assert_eq!(stored.status, BookingStatus::InProgress);
    }

    #[test]
    fn test_update_missing_booking() {
        let booking_id = BookingId::new();
        ReducerTest::new(BookingReducer)
            .with_env(fixtures::env())
            .given_state(BookingState::default())
            .when_action(BookingAction::UpdatePaymentStatus {
                booking_id,
                payment_status: BookingPaymentStatus::Refunded,
            })
            .then_state(move |state| {
                assert_eq!(
                    state.outcome,
                    Some(Err(MarketplaceError::not_found("Booking", booking_id)))
                );
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }
}
