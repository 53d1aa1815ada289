//! Command handlers and queries over the marketplace store.
//!
//! A command goes through three steps:
//! 1. Load the records the flow decides on into its state
//! 2. Run the reducer to quiescence in a per-request runtime `Store`
//! 3. Read the outcome out of the final state

use crate::auth::password::{hash_password, verify_password};
use crate::error::{MarketplaceError, Result};
use crate::flows::MarketplaceEnvironment;
use crate::flows::accounts::{AccountsAction, AccountsReducer, AccountsState, normalize_email};
use crate::flows::booking::{BookingAction, BookingReducer, BookingState};
use crate::flows::catalog::{CatalogAction, CatalogReducer, CatalogState};
use crate::flows::feedback::{
    Feedback, FeedbackAction, FeedbackReducer, FeedbackState, VendorRatingSummary,
};
use crate::flows::payment::{PaymentAction, PaymentReceipt, PaymentReducer, PaymentState, PendingPayments};
use crate::store::{
    BookingFilter, FeedbackFilter, MarketplaceStore, PurgeReport, ServiceFilter, UnitOfWork, Write,
};
use crate::types::{
    Account, AccountId, Booking, BookingId, BookingPaymentStatus, BookingStatus, Category, Money,
    Payment, PaymentMethod, Rating, Review, Role, Service, ServiceId,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use utshob_core::environment::Clock;
use utshob_core::reducer::Reducer;
use utshob_runtime::Store;

/// Flow states that end with an outcome
trait Settles {
    type Output;

    fn into_outcome(self) -> Option<Result<Self::Output>>;
}

macro_rules! settles {
    ($($state:ty => $output:ty),+ $(,)?) => {
        $(
            impl Settles for $state {
                type Output = $output;

                fn into_outcome(self) -> Option<Result<Self::Output>> {
                    self.outcome
                }
            }
        )+
    };
}

settles!(
    AccountsState => Account,
    CatalogState => Service,
    BookingState => Booking,
    PaymentState => PaymentReceipt,
    FeedbackState => Feedback,
);

/// A payment as submitted by the payer
#[derive(Clone, Debug)]
pub struct PaymentSubmission {
    /// Paying account
    pub user_id: AccountId,
    /// Instrument type
    pub payment_method: PaymentMethod,
    /// Bank or wallet name
    pub payment_provider: String,
    /// Card digits
    pub card_number: Option<String>,
    /// Wallet number
    pub mobile_number: Option<String>,
    /// Amount submitted
    pub amount: Money,
    /// Amount due
    pub required_amount: Money,
    /// Bookings covered
    pub booking_ids: Vec<BookingId>,
    /// Free-form notes
    pub notes: Option<String>,
}

/// The marketplace application service
#[derive(Clone)]
pub struct Marketplace {
    env: MarketplaceEnvironment,
}

impl Marketplace {
    /// Creates a marketplace over a store and clock
    #[must_use]
    pub fn new(store: Arc<dyn MarketplaceStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            env: MarketplaceEnvironment::new(clock, store),
        }
    }

    /// Current time according to the marketplace clock
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.env.clock.now()
    }

    /// Underlying store
    #[must_use]
    pub fn store(&self) -> &Arc<dyn MarketplaceStore> {
        &self.env.store
    }

    async fn dispatch<R>(&self, reducer: R, state: R::State, action: R::Action) -> Result<<R::State as Settles>::Output>
    where
        R: Reducer<Environment = MarketplaceEnvironment> + Send + Sync,
        R::State: Settles + Send + Sync,
        R::Action: Send + 'static,
    {
        let store = Store::new(state, reducer, self.env.clone());
        store.send(action).await.map_err(|e| {
            tracing::error!(error = %e, "Flow did not complete");
            MarketplaceError::Internal(e.to_string())
        })?;

        store
            .into_state()
            .and_then(|state| state.into_outcome())
            .unwrap_or_else(|| Err(MarketplaceError::Internal("flow finished without an outcome".into())))
    }

    // ========================================================================
    // Accounts
    // ========================================================================

    /// Register a new account.
    ///
    /// # Errors
    ///
    /// [`MarketplaceError::InvalidInput`] for a missing field, short password
    /// or used email; [`MarketplaceError::Forbidden`] for an admin role.
    pub async fn register(
        &self,
        name: String,
        email: String,
        password: String,
        phone: String,
        address: String,
        role: Option<Role>,
    ) -> Result<Account> {
        let existing = self.env.store.account_by_email(normalize_email(&email)).await?;
        let state = AccountsState {
            existing,
            ..AccountsState::default()
        };
        self.dispatch(
            AccountsReducer,
            state,
            AccountsAction::Register {
                name,
                email,
                password,
                phone,
                address,
                role,
            },
        )
        .await
    }

    /// Create the administrator account unless the email is already taken.
    ///
    /// Administrators cannot sign up, so the server bootstraps one from its
    /// configuration.
    ///
    /// # Errors
    ///
    /// [`MarketplaceError::InvalidInput`] if the email belongs to a
    /// non-admin account.
    pub async fn ensure_admin(&self, name: &str, email: &str, password: &str) -> Result<Account> {
        let email = normalize_email(email);
        if let Some(existing) = self.env.store.account_by_email(email.clone()).await? {
            if existing.role != Role::Admin {
                return Err(MarketplaceError::invalid(format!("{email} is registered as {}", existing.role)));
            }
            return Ok(existing);
        }

        let admin = Account {
            id: AccountId::new(),
            name: name.to_string(),
            email,
            password_hash: hash_password(password)?,
            phone: String::new(),
            address: String::new(),
            role: Role::Admin,
            created_at: self.now(),
        };
        self.env
            .store
            .commit(UnitOfWork::new().with(Write::InsertAccount(admin.clone())))
            .await?;
        tracing::info!(account_id = %admin.id, "Administrator account created");
        Ok(admin)
    }

    /// Check an email and password pair.
    ///
    /// # Errors
    ///
    /// [`MarketplaceError::InvalidInput`] "Invalid credentials" for an
    /// unknown email or a wrong password.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<Account> {
        let account = self.env.store.account_by_email(normalize_email(email)).await?;
        match account {
            Some(account) if verify_password(password, &account.password_hash) => Ok(account),
            _ => {
                tracing::warn!("Login failed");
                Err(MarketplaceError::invalid("Invalid credentials"))
            },
        }
    }

    /// Account by id.
    ///
    /// # Errors
    ///
    /// [`MarketplaceError::NotFound`] if no such account.
    pub async fn account(&self, id: AccountId) -> Result<Account> {
        self.env
            .store
            .account(id)
            .await?
            .ok_or_else(|| MarketplaceError::not_found("User", id))
    }

    /// Every account, optionally of one role, newest first.
    ///
    /// # Errors
    ///
    /// [`MarketplaceError::Storage`] on a backend failure.
    pub async fn accounts(&self, role: Option<Role>) -> Result<Vec<Account>> {
        Ok(self.env.store.accounts(role).await?)
    }

    /// Delete an account with everything it owns.
    ///
    /// # Errors
    ///
    /// [`MarketplaceError::NotFound`] if missing, [`MarketplaceError::InvalidInput`]
    /// for an admin account.
    pub async fn remove_account(&self, account_id: AccountId) -> Result<Account> {
        let target = self.env.store.account(account_id).await?;
        let state = AccountsState {
            target,
            ..AccountsState::default()
        };
        self.dispatch(AccountsReducer, state, AccountsAction::Remove { account_id })
            .await
    }

    /// Delete records that point at missing accounts or services.
    ///
    /// # Errors
    ///
    /// [`MarketplaceError::Storage`] on a backend failure.
    pub async fn purge_orphans(&self) -> Result<PurgeReport> {
        let report = self.env.store.purge_orphans().await?;
        tracing::info!(
            services = report.services,
            bookings = report.bookings,
            reviews = report.reviews,
            ratings = report.ratings,
            "Orphaned records removed"
        );
        Ok(report)
    }

    // ========================================================================
    // Catalog
    // ========================================================================

    /// Create a service listing for a vendor.
    ///
    /// # Errors
    ///
    /// [`MarketplaceError::Forbidden`] unless the account is a vendor;
    /// [`MarketplaceError::InvalidInput`] for a field rule violation.
    pub async fn list_service(
        &self,
        vendor_id: AccountId,
        organization_name: String,
        category: Category,
        price: Money,
        description: String,
        photo: Option<String>,
    ) -> Result<Service> {
        let vendor = self.env.store.account(vendor_id).await?;
        self.dispatch(
            CatalogReducer,
            CatalogState { vendor, outcome: None },
            CatalogAction::ListService {
                vendor_id,
                organization_name,
                category,
                price,
                description,
                photo,
            },
        )
        .await
    }

    /// Browse the catalog.
    ///
    /// # Errors
    ///
    /// [`MarketplaceError::Storage`] on a backend failure.
    pub async fn services(&self, filter: ServiceFilter) -> Result<Vec<Service>> {
        Ok(self.env.store.services(filter).await?)
    }

    /// Service by id.
    ///
    /// # Errors
    ///
    /// [`MarketplaceError::NotFound`] if no such service.
    pub async fn service(&self, id: ServiceId) -> Result<Service> {
        self.env
            .store
            .service(id)
            .await?
            .ok_or_else(|| MarketplaceError::not_found("Service", id))
    }

    // ========================================================================
    // Bookings
    // ========================================================================

    /// Book an available service.
    ///
    /// # Errors
    ///
    /// [`MarketplaceError::NotFound`] for a missing customer, service or
    /// vendor; [`MarketplaceError::InvalidState`] if the service is taken.
    pub async fn create_booking(
        &self,
        customer_id: AccountId,
        service_id: ServiceId,
        event_date: Option<DateTime<Utc>>,
        special_requirements: Option<String>,
        notes: Option<String>,
    ) -> Result<Booking> {
        let customer = self.env.store.account(customer_id).await?;
        let service = self.env.store.service(service_id).await?;
        let vendor = match &service {
            Some(service) => self.env.store.account(service.vendor_id).await?,
            None => None,
        };

        self.dispatch(
            BookingReducer,
            BookingState {
                customer,
                service,
                vendor,
                ..BookingState::default()
            },
            BookingAction::CreateBooking {
                customer_id,
                service_id,
                event_date,
                special_requirements,
                notes,
            },
        )
        .await
    }

    /// Replace a booking's lifecycle status.
    ///
    /// # Errors
    ///
    /// [`MarketplaceError::NotFound`] if no such booking.
    pub async fn update_booking_status(&self, booking_id: BookingId, status: BookingStatus) -> Result<Booking> {
        let booking = self.env.store.booking(booking_id).await?;
        self.dispatch(
            BookingReducer,
            BookingState {
                booking,
                ..BookingState::default()
            },
            BookingAction::UpdateStatus { booking_id, status },
        )
        .await
    }

    /// Replace a booking's payment status.
    ///
    /// # Errors
    ///
    /// [`MarketplaceError::NotFound`] if no such booking.
    pub async fn update_booking_payment_status(
        &self,
        booking_id: BookingId,
        payment_status: BookingPaymentStatus,
    ) -> Result<Booking> {
        let booking = self.env.store.booking(booking_id).await?;
        self.dispatch(
            BookingReducer,
            BookingState {
                booking,
                ..BookingState::default()
            },
            BookingAction::UpdatePaymentStatus {
                booking_id,
                payment_status,
            },
        )
        .await
    }

    /// Booking by id.
    ///
    /// # Errors
    ///
    /// [`MarketplaceError::NotFound`] if no such booking.
    pub async fn booking(&self, id: BookingId) -> Result<Booking> {
        self.env
            .store
            .booking(id)
            .await?
            .ok_or_else(|| MarketplaceError::not_found("Booking", id))
    }

    /// Bookings matching a filter, newest first.
    ///
    /// # Errors
    ///
    /// [`MarketplaceError::Storage`] on a backend failure.
    pub async fn bookings(&self, filter: BookingFilter) -> Result<Vec<Booking>> {
        Ok(self.env.store.bookings(filter).await?)
    }

    // ========================================================================
    // Payments
    // ========================================================================

    /// What a customer currently owes. Never fails for an empty result.
    ///
    /// # Errors
    ///
    /// [`MarketplaceError::Storage`] on a backend failure.
    pub async fn pending_payments(&self, customer_id: AccountId) -> Result<PendingPayments> {
        let unpaid = self.env.store.bookings(BookingFilter::PendingPayment(customer_id)).await?;
        Ok(PendingPayments::from_bookings(&unpaid))
    }

    /// Record a payment attempt and settle its bookings when it matches.
    ///
    /// # Errors
    ///
    /// [`MarketplaceError::NotFound`] for a missing payer, or a booking that
    /// is missing or not the payer's; [`MarketplaceError::InvalidInput`] for
    /// an empty booking list or provider.
    pub async fn process_payment(&self, submission: PaymentSubmission) -> Result<PaymentReceipt> {
        let payer = self.env.store.account(submission.user_id).await?;
        let mut bookings = Vec::with_capacity(submission.booking_ids.len());
        for id in &submission.booking_ids {
            if bookings.iter().any(|b: &Booking| b.id == *id) {
                continue;
            }
            if let Some(booking) = self.env.store.booking(*id).await? {
                bookings.push(booking);
            }
        }

        self.dispatch(
            PaymentReducer,
            PaymentState {
                payer,
                bookings,
                outcome: None,
            },
            PaymentAction::ProcessPayment {
                user_id: submission.user_id,
                payment_method: submission.payment_method,
                payment_provider: submission.payment_provider,
                card_number: submission.card_number,
                mobile_number: submission.mobile_number,
                amount: submission.amount,
                required_amount: submission.required_amount,
                booking_ids: submission.booking_ids,
                notes: submission.notes,
            },
        )
        .await
    }

    /// A payer's payments, newest first.
    ///
    /// # Errors
    ///
    /// [`MarketplaceError::Storage`] on a backend failure.
    pub async fn payment_history(&self, user_id: AccountId) -> Result<Vec<Payment>> {
        Ok(self.env.store.payments(user_id).await?)
    }

    // ========================================================================
    // Feedback
    // ========================================================================

    async fn feedback_state(
        &self,
        customer_id: AccountId,
        service_id: ServiceId,
        vendor_id: AccountId,
    ) -> Result<FeedbackState> {
        Ok(FeedbackState {
            customer: self.env.store.account(customer_id).await?,
            service: self.env.store.service(service_id).await?,
            vendor: self.env.store.account(vendor_id).await?,
            ..FeedbackState::default()
        })
    }

    /// Rate a service; returns the rating and whether it replaced one.
    ///
    /// # Errors
    ///
    /// [`MarketplaceError::NotFound`] for a missing party;
    /// [`MarketplaceError::InvalidInput`] for a value outside 1..=5.
    pub async fn submit_rating(
        &self,
        customer_id: AccountId,
        service_id: ServiceId,
        vendor_id: AccountId,
        rating: i32,
    ) -> Result<(Rating, bool)> {
        let mut state = self.feedback_state(customer_id, service_id, vendor_id).await?;
        state.existing_rating = self.env.store.rating(customer_id, service_id).await?;

        let feedback = self
            .dispatch(
                FeedbackReducer,
                state,
                FeedbackAction::SubmitRating {
                    customer_id,
                    service_id,
                    vendor_id,
                    rating,
                },
            )
            .await?;
        match feedback {
            Feedback::Rating { rating, updated } => Ok((rating, updated)),
            Feedback::Review(_) => Err(MarketplaceError::Internal("rating flow stored a review".into())),
        }
    }

    /// Review a service once.
    ///
    /// # Errors
    ///
    /// [`MarketplaceError::Duplicate`] for a second review of the same
    /// service; [`MarketplaceError::InvalidInput`] for an empty comment.
    pub async fn submit_review(
        &self,
        customer_id: AccountId,
        service_id: ServiceId,
        vendor_id: AccountId,
        comment: String,
    ) -> Result<Review> {
        let mut state = self.feedback_state(customer_id, service_id, vendor_id).await?;
        state.existing_review = self.env.store.review(customer_id, service_id).await?;

        let feedback = self
            .dispatch(
                FeedbackReducer,
                state,
                FeedbackAction::SubmitReview {
                    customer_id,
                    service_id,
                    vendor_id,
                    comment,
                },
            )
            .await?;
        match feedback {
            Feedback::Review(review) => Ok(review),
            Feedback::Rating { .. } => Err(MarketplaceError::Internal("review flow stored a rating".into())),
        }
    }

    /// Average rating of a vendor, recomputed on every call.
    ///
    /// # Errors
    ///
    /// [`MarketplaceError::Storage`] on a backend failure.
    pub async fn vendor_rating_summary(&self, vendor_id: AccountId) -> Result<VendorRatingSummary> {
        let ratings = self.env.store.ratings(FeedbackFilter::Vendor(vendor_id)).await?;
        Ok(VendorRatingSummary::from_ratings(ratings))
    }

    /// Ratings matching a filter, newest first.
    ///
    /// # Errors
    ///
    /// [`MarketplaceError::Storage`] on a backend failure.
    pub async fn ratings(&self, filter: FeedbackFilter) -> Result<Vec<Rating>> {
        Ok(self.env.store.ratings(filter).await?)
    }

    /// Reviews matching a filter, newest first.
    ///
    /// # Errors
    ///
    /// [`MarketplaceError::Storage`] on a backend failure.
    pub async fn reviews(&self, filter: FeedbackFilter) -> Result<Vec<Review>> {
        Ok(self.env.store.reviews(filter).await?)
    }
}
