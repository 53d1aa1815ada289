//! Marketplace persistence.
//!
//! [`MarketplaceStore`] is the single storage seam. Reads are individual
//! queries; every write goes through [`MarketplaceStore::commit`] as a
//! [`UnitOfWork`] that is applied atomically: either every [`Write`] in it
//! takes effect or none does.
//!
//! Two implementations ship with the crate:
//!
//! - [`memory::InMemoryMarketplaceStore`]: tables behind a tokio `RwLock`,
//!   used by tests and local demos
//! - [`postgres::PostgresMarketplaceStore`]: `sqlx` with one transaction per
//!   unit of work

use crate::types::{
    Account, AccountId, Availability, Booking, BookingId, BookingPaymentStatus, BookingStatus,
    Category, Payment, Rating, Review, Role, Service, ServiceId,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

pub mod memory;
pub mod postgres;

pub use memory::InMemoryMarketplaceStore;
pub use postgres::PostgresMarketplaceStore;

/// Storage-level failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A write targeted a record that does not exist
    #[error("{entity} with id {id} not found")]
    NotFound {
        /// Kind of record
        entity: &'static str,
        /// Identifier
        id: String,
    },

    /// A compare-and-set lost against a concurrent change
    #[error("conflict: {0}")]
    Conflict(String),

    /// A unique key rejected the write
    #[error("duplicate: {0}")]
    Duplicate(String),

    /// A check constraint rejected the write
    #[error("constraint violated: {0}")]
    Constraint(String),

    /// Connection, query or decoding failure
    #[error("database error: {0}")]
    Database(String),
}

impl StoreError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

/// Boxed future returned by [`MarketplaceStore`] methods
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Message attached to a rating outside 1..=5
pub const RATING_RANGE_MESSAGE: &str = "Rating must be between 1 and 5";

/// Message attached to a second review of the same service
pub const DUPLICATE_REVIEW_MESSAGE: &str = "You have already reviewed this service";

/// Catalog browse filter; `None` fields match everything
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ServiceFilter {
    /// Only this category
    pub category: Option<Category>,
    /// Only this vendor's listings
    pub vendor_id: Option<AccountId>,
    /// Only listings with this availability
    pub availability: Option<Availability>,
}

impl ServiceFilter {
    pub(crate) fn matches(&self, service: &Service) -> bool {
        self.category.is_none_or(|c| c == service.category)
            && self.vendor_id.is_none_or(|v| v == service.vendor_id)
            && self.availability.is_none_or(|a| a == service.availability)
    }
}

/// Which bookings to list
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BookingFilter {
    /// Every booking
    All,
    /// Bookings placed by a customer
    Customer(AccountId),
    /// Bookings of a vendor's services
    Vendor(AccountId),
    /// A customer's bookings that are still unpaid
    PendingPayment(AccountId),
}

impl BookingFilter {
    pub(crate) fn matches(&self, booking: &Booking) -> bool {
        match self {
            Self::All => true,
            Self::Customer(id) => booking.customer_id == *id,
            Self::Vendor(id) => booking.vendor_id == *id,
            Self::PendingPayment(id) => {
                booking.customer_id == *id && booking.payment_status == BookingPaymentStatus::Pending
            },
        }
    }
}

/// Whose ratings or reviews to list
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeedbackFilter {
    /// Feedback received by a vendor
    Vendor(AccountId),
    /// Feedback written by a customer
    Customer(AccountId),
}

impl FeedbackFilter {
    pub(crate) fn matches(&self, customer_id: AccountId, vendor_id: AccountId) -> bool {
        match self {
            Self::Vendor(id) => *id == vendor_id,
            Self::Customer(id) => *id == customer_id,
        }
    }
}

/// Counts of records removed by [`MarketplaceStore::purge_orphans`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PurgeReport {
    /// Services whose vendor is gone
    pub services: u64,
    /// Bookings whose customer, vendor or service is gone
    pub bookings: u64,
    /// Reviews whose customer, vendor or service is gone
    pub reviews: u64,
    /// Ratings whose customer, vendor or service is gone
    pub ratings: u64,
}

/// One mutation inside a [`UnitOfWork`]
#[derive(Clone, Debug, PartialEq)]
pub enum Write {
    /// Insert an account; the email must be unused
    InsertAccount(Account),

    /// Delete an account and the records it owns.
    ///
    /// Vendors take their services, bookings, reviews and ratings with them,
    /// plus payments that reference any of their services. Customers take
    /// their bookings, reviews, ratings and payments.
    DeleteAccount {
        /// Account to delete
        id: AccountId,
        /// Role of the account, selects the cascade
        role: Role,
    },

    /// Insert a service listing
    InsertService(Service),

    /// Set a service's availability.
    ///
    /// With `expected`, the write only applies while the current value
    /// equals it and otherwise fails with [`StoreError::Conflict`].
    SetAvailability {
        /// Service to update
        service_id: ServiceId,
        /// Required current value, if any
        expected: Option<Availability>,
        /// New value
        availability: Availability,
    },

    /// Insert a booking
    InsertBooking(Booking),

    /// Replace a booking's status fields, last write wins
    UpdateBooking {
        /// Booking to update
        booking_id: BookingId,
        /// New lifecycle status
        status: Option<BookingStatus>,
        /// New payment status
        payment_status: Option<BookingPaymentStatus>,
        /// Modification time
        at: DateTime<Utc>,
    },

    /// Mark a booking paid and confirmed.
    ///
    /// Fails with [`StoreError::NotFound`] unless the booking exists and
    /// belongs to `payer`.
    SettleBooking {
        /// Booking being paid
        booking_id: BookingId,
        /// Account that paid
        payer: AccountId,
        /// Settlement time
        at: DateTime<Utc>,
    },

    /// Record a payment attempt; the transaction id must be unused
    InsertPayment(Payment),

    /// Insert or replace the rating for its (customer, service) pair.
    ///
    /// An existing rating keeps its id. Values outside 1..=5 fail with
    /// [`StoreError::Constraint`].
    UpsertRating(Rating),

    /// Insert a review; a second review for the same (customer, service)
    /// pair fails with [`StoreError::Duplicate`]
    InsertReview(Review),
}

/// Writes committed together or not at all
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UnitOfWork {
    /// Writes in application order
    pub writes: Vec<Write>,
}

impl UnitOfWork {
    /// Creates an empty unit of work
    #[must_use]
    pub const fn new() -> Self {
        Self { writes: Vec::new() }
    }

    /// Appends a write
    #[must_use]
    pub fn with(mut self, write: Write) -> Self {
        self.writes.push(write);
        self
    }

    /// Number of writes
    #[must_use]
    pub fn len(&self) -> usize {
        self.writes.len()
    }

    /// Whether the unit holds no writes
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}

impl From<Vec<Write>> for UnitOfWork {
    fn from(writes: Vec<Write>) -> Self {
        Self { writes }
    }
}

/// Persistence for every marketplace record.
///
/// List queries return records newest first.
pub trait MarketplaceStore: Send + Sync {
    /// Account by id
    fn account(&self, id: AccountId) -> StoreFuture<'_, Option<Account>>;

    /// Account by normalized email
    fn account_by_email(&self, email: String) -> StoreFuture<'_, Option<Account>>;

    /// All accounts, optionally of one role
    fn accounts(&self, role: Option<Role>) -> StoreFuture<'_, Vec<Account>>;

    /// Service by id
    fn service(&self, id: ServiceId) -> StoreFuture<'_, Option<Service>>;

    /// Services matching a filter
    fn services(&self, filter: ServiceFilter) -> StoreFuture<'_, Vec<Service>>;

    /// Booking by id
    fn booking(&self, id: BookingId) -> StoreFuture<'_, Option<Booking>>;

    /// Bookings matching a filter
    fn bookings(&self, filter: BookingFilter) -> StoreFuture<'_, Vec<Booking>>;

    /// Payments made by an account
    fn payments(&self, user_id: AccountId) -> StoreFuture<'_, Vec<Payment>>;

    /// The rating a customer gave a service
    fn rating(&self, customer_id: AccountId, service_id: ServiceId) -> StoreFuture<'_, Option<Rating>>;

    /// Ratings matching a filter
    fn ratings(&self, filter: FeedbackFilter) -> StoreFuture<'_, Vec<Rating>>;

    /// The review a customer wrote for a service
    fn review(&self, customer_id: AccountId, service_id: ServiceId) -> StoreFuture<'_, Option<Review>>;

    /// Reviews matching a filter
    fn reviews(&self, filter: FeedbackFilter) -> StoreFuture<'_, Vec<Review>>;

    /// Apply a unit of work atomically
    fn commit(&self, unit: UnitOfWork) -> StoreFuture<'_, ()>;

    /// Delete records that point at missing accounts or services
    fn purge_orphans(&self) -> StoreFuture<'_, PurgeReport>;

    /// Check the backend is reachable
    fn ping(&self) -> StoreFuture<'_, ()>;
}
