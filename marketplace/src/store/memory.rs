//! In-memory marketplace store.
//!
//! Tables are plain vectors in insertion order behind one tokio `RwLock`.
//! A commit stages every write on a copy of the tables and swaps the copy in
//! only when all writes succeeded, so a failed unit leaves nothing behind.

use super::{
    BookingFilter, DUPLICATE_REVIEW_MESSAGE, FeedbackFilter, MarketplaceStore, PurgeReport,
    RATING_RANGE_MESSAGE, ServiceFilter, StoreError, StoreFuture, UnitOfWork, Write,
};
use crate::types::{
    Account, AccountId, Availability, Booking, BookingId, BookingPaymentStatus, BookingStatus,
    Payment, Rating, Review, Role, Service, ServiceId,
};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Clone, Debug, Default)]
struct Tables {
    accounts: Vec<Account>,
    services: Vec<Service>,
    bookings: Vec<Booking>,
    payments: Vec<Payment>,
    ratings: Vec<Rating>,
    reviews: Vec<Review>,
}

/// Newest first; ties keep the later insertion first.
fn newest_first<T: Clone>(rows: impl DoubleEndedIterator<Item = T>, at: impl Fn(&T) -> DateTime<Utc>) -> Vec<T> {
    let mut rows: Vec<T> = rows.rev().collect();
    rows.sort_by_key(|row| std::cmp::Reverse(at(row)));
    rows
}

impl Tables {
    fn apply(&mut self, write: Write) -> Result<(), StoreError> {
        match write {
            Write::InsertAccount(account) => {
                if self.accounts.iter().any(|a| a.email == account.email) {
                    return Err(StoreError::Duplicate("User already exists".to_string()));
                }
                self.accounts.push(account);
            },

            Write::DeleteAccount { id, role } => {
                if !self.accounts.iter().any(|a| a.id == id) {
                    return Err(StoreError::not_found("User", id));
                }
                match role {
                    Role::Vendor => {
                        let owned: HashSet<ServiceId> = self
                            .services
                            .iter()
                            .filter(|s| s.vendor_id == id)
                            .map(|s| s.id)
                            .collect();
                        self.payments
                            .retain(|p| !p.services.iter().any(|line| owned.contains(&line.service_id)));
                        self.services.retain(|s| s.vendor_id != id);
                        self.bookings.retain(|b| b.vendor_id != id);
                        self.reviews.retain(|r| r.vendor_id != id);
                        self.ratings.retain(|r| r.vendor_id != id);
                    },
                    Role::Customer => {
                        self.bookings.retain(|b| b.customer_id != id);
                        self.reviews.retain(|r| r.customer_id != id);
                        self.ratings.retain(|r| r.customer_id != id);
                        self.payments.retain(|p| p.user_id != id);
                    },
                    Role::Admin => {},
                }
                self.accounts.retain(|a| a.id != id);
            },

            Write::InsertService(service) => self.services.push(service),

            Write::SetAvailability {
                service_id,
                expected,
                availability,
            } => {
                let service = self
                    .services
                    .iter_mut()
                    .find(|s| s.id == service_id)
                    .ok_or_else(|| StoreError::not_found("Service", service_id))?;
                if let Some(expected) = expected {
                    if service.availability != expected {
                        return Err(StoreError::Conflict(format!(
                            "service {service_id} availability is {}, expected {expected}",
                            service.availability
                        )));
                    }
                }
                service.availability = availability;
            },

            Write::InsertBooking(booking) => self.bookings.push(booking),

            Write::UpdateBooking {
                booking_id,
                status,
                payment_status,
                at,
            } => {
                let booking = self.booking_mut(booking_id)?;
                if let Some(status) = status {
                    booking.status = status;
                }
                if let Some(payment_status) = payment_status {
                    booking.payment_status = payment_status;
                }
                booking.updated_at = at;
            },

            Write::SettleBooking { booking_id, payer, at } => {
                let booking = self
                    .bookings
                    .iter_mut()
                    .find(|b| b.id == booking_id && b.customer_id == payer)
                    .ok_or_else(|| StoreError::not_found("Booking", booking_id))?;
                if booking.payment_status != BookingPaymentStatus::Pending {
                    return Err(StoreError::Conflict(format!("booking {booking_id} is already settled")));
                }
                booking.payment_status = BookingPaymentStatus::Paid;
                booking.status = BookingStatus::Confirmed;
                booking.updated_at = at;
            },

            Write::InsertPayment(payment) => {
                if self.payments.iter().any(|p| p.transaction_id == payment.transaction_id) {
                    return Err(StoreError::Database(format!(
                        "transaction id {} already recorded",
                        payment.transaction_id
                    )));
                }
                self.payments.push(payment);
            },

            Write::UpsertRating(rating) => {
                if !(1..=5).contains(&rating.rating) {
                    return Err(StoreError::Constraint(RATING_RANGE_MESSAGE.to_string()));
                }
                match self
                    .ratings
                    .iter_mut()
                    .find(|r| r.customer_id == rating.customer_id && r.service_id == rating.service_id)
                {
                    Some(existing) => {
                        let id = existing.id;
                        *existing = Rating { id, ..rating };
                    },
                    None => self.ratings.push(rating),
                }
            },

            Write::InsertReview(review) => {
                if self
                    .reviews
                    .iter()
                    .any(|r| r.customer_id == review.customer_id && r.service_id == review.service_id)
                {
                    return Err(StoreError::Duplicate(DUPLICATE_REVIEW_MESSAGE.to_string()));
                }
                self.reviews.push(review);
            },
        }
        Ok(())
    }

    fn booking_mut(&mut self, id: BookingId) -> Result<&mut Booking, StoreError> {
        self.bookings
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| StoreError::not_found("Booking", id))
    }

    fn purge(&mut self) -> PurgeReport {
        let mut report = PurgeReport::default();

        let accounts: HashSet<AccountId> = self.accounts.iter().map(|a| a.id).collect();
        let before = self.services.len();
        self.services.retain(|s| accounts.contains(&s.vendor_id));
        report.services = (before - self.services.len()) as u64;

        // Services purged above count as missing for everything below.
        let services: HashSet<ServiceId> = self.services.iter().map(|s| s.id).collect();
        let alive = |customer: &AccountId, vendor: &AccountId, service: &ServiceId| {
            accounts.contains(customer) && accounts.contains(vendor) && services.contains(service)
        };

        let before = self.bookings.len();
        self.bookings
            .retain(|b| alive(&b.customer_id, &b.vendor_id, &b.service_id));
        report.bookings = (before - self.bookings.len()) as u64;

        let before = self.reviews.len();
        self.reviews
            .retain(|r| alive(&r.customer_id, &r.vendor_id, &r.service_id));
        report.reviews = (before - self.reviews.len()) as u64;

        let before = self.ratings.len();
        self.ratings
            .retain(|r| alive(&r.customer_id, &r.vendor_id, &r.service_id));
        report.ratings = (before - self.ratings.len()) as u64;

        report
    }
}

/// Marketplace store held entirely in process memory.
///
/// Cloning shares the same tables.
#[derive(Clone, Debug, Default)]
pub struct InMemoryMarketplaceStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryMarketplaceStore {
    /// Creates an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl MarketplaceStore for InMemoryMarketplaceStore {
    fn account(&self, id: AccountId) -> StoreFuture<'_, Option<Account>> {
        Box::pin(async move {
            let tables = self.tables.read().await;
            Ok(tables.accounts.iter().find(|a| a.id == id).cloned())
        })
    }

    fn account_by_email(&self, email: String) -> StoreFuture<'_, Option<Account>> {
        Box::pin(async move {
            let tables = self.tables.read().await;
            Ok(tables.accounts.iter().find(|a| a.email == email).cloned())
        })
    }

    fn accounts(&self, role: Option<Role>) -> StoreFuture<'_, Vec<Account>> {
        Box::pin(async move {
            let tables = self.tables.read().await;
            let rows = tables
                .accounts
                .iter()
                .filter(|a| role.is_none_or(|r| r == a.role))
                .cloned();
            Ok(newest_first(rows, |a| a.created_at))
        })
    }

    fn service(&self, id: ServiceId) -> StoreFuture<'_, Option<Service>> {
        Box::pin(async move {
            let tables = self.tables.read().await;
            Ok(tables.services.iter().find(|s| s.id == id).cloned())
        })
    }

    fn services(&self, filter: ServiceFilter) -> StoreFuture<'_, Vec<Service>> {
        Box::pin(async move {
            let tables = self.tables.read().await;
            let rows = tables.services.iter().filter(|s| filter.matches(s)).cloned();
            Ok(newest_first(rows, |s| s.created_at))
        })
    }

    fn booking(&self, id: BookingId) -> StoreFuture<'_, Option<Booking>> {
        Box::pin(async move {
            let tables = self.tables.read().await;
            Ok(tables.bookings.iter().find(|b| b.id == id).cloned())
        })
    }

    fn bookings(&self, filter: BookingFilter) -> StoreFuture<'_, Vec<Booking>> {
        Box::pin(async move {
            let tables = self.tables.read().await;
            let rows = tables.bookings.iter().filter(|b| filter.matches(b)).cloned();
            Ok(newest_first(rows, |b| b.created_at))
        })
    }

    fn payments(&self, user_id: AccountId) -> StoreFuture<'_, Vec<Payment>> {
        Box::pin(async move {
            let tables = self.tables.read().await;
            let rows = tables.payments.iter().filter(|p| p.user_id == user_id).cloned();
            Ok(newest_first(rows, |p| p.payment_date))
        })
    }

    fn rating(&self, customer_id: AccountId, service_id: ServiceId) -> StoreFuture<'_, Option<Rating>> {
        Box::pin(async move {
            let tables = self.tables.read().await;
            Ok(tables
                .ratings
                .iter()
                .find(|r| r.customer_id == customer_id && r.service_id == service_id)
                .cloned())
        })
    }

    fn ratings(&self, filter: FeedbackFilter) -> StoreFuture<'_, Vec<Rating>> {
        Box::pin(async move {
            let tables = self.tables.read().await;
            let rows = tables
                .ratings
                .iter()
                .filter(|r| filter.matches(r.customer_id, r.vendor_id))
                .cloned();
            Ok(newest_first(rows, |r| r.rating_date))
        })
    }

    fn review(&self, customer_id: AccountId, service_id: ServiceId) -> StoreFuture<'_, Option<Review>> {
        Box::pin(async move {
            let tables = self.tables.read().await;
            Ok(tables
                .reviews
                .iter()
                .find(|r| r.customer_id == customer_id && r.service_id == service_id)
                .cloned())
        })
    }

    fn reviews(&self, filter: FeedbackFilter) -> StoreFuture<'_, Vec<Review>> {
        Box::pin(async move {
            let tables = self.tables.read().await;
            let rows = tables
                .reviews
                .iter()
                .filter(|r| filter.matches(r.customer_id, r.vendor_id))
                .cloned();
            Ok(newest_first(rows, |r| r.review_date))
        })
    }

    fn commit(&self, unit: UnitOfWork) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let mut tables = self.tables.write().await;
            let mut staged = tables.clone();
            for write in unit.writes {
                staged.apply(write)?;
            }
            *tables = staged;
            Ok(())
        })
    }

    fn purge_orphans(&self) -> StoreFuture<'_, PurgeReport> {
        Box::pin(async move {
            let mut tables = self.tables.write().await;
            Ok(tables.purge())
        })
    }

    fn ping(&self) -> StoreFuture<'_, ()> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::types::{Category, Money};
    use chrono::Duration;

    fn at(minutes: i64) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
            .expect("valid timestamp")
            .with_timezone(&Utc)
            + Duration::minutes(minutes)
    }

    fn account(email: &str, role: Role, minute: i64) -> Account {
        Account {
            id: AccountId::new(),
            name: email.split('@').next().unwrap_or_default().to_string(),
            email: email.to_string(),
            password_hash: String::new(),
            phone: "01700000000".into(),
            address: "Dhaka".into(),
            role,
            created_at: at(minute),
        }
    }

    fn service(vendor: &Account, minute: i64) -> Service {
        Service {
            id: ServiceId::new(),
            organization_name: "Lens & Light".into(),
            category: Category::Photography,
            price: Money::new(5000),
            availability: Availability::Yes,
            description: "Wedding photography".into(),
            vendor_id: vendor.id,
            vendor_name: vendor.name.clone(),
            photo: None,
            created_at: at(minute),
        }
    }

    fn rating(customer: &Account, service: &Service, value: i32) -> Rating {
        Rating {
            id: crate::types::RatingId::new(),
            customer_id: customer.id,
            customer_name: customer.name.clone(),
            vendor_id: service.vendor_id,
            vendor_name: service.vendor_name.clone(),
            service_id: service.id,
            service_name: service.organization_name.clone(),
            rating: value,
            rating_date: at(10),
        }
    }

    #[tokio::test]
    async fn test_failed_unit_leaves_no_trace() {
        let store = InMemoryMarketplaceStore::new();
        let vendor = account("vendor@example.com", Role::Vendor, 0);
        let listing = service(&vendor, 1);

        let unit = UnitOfWork::new()
            .with(Write::InsertAccount(vendor.clone()))
            .with(Write::InsertService(listing.clone()))
            .with(Write::SetAvailability {
                service_id: listing.id,
                expected: Some(Availability::No),
                availability: Availability::Yes,
            });

        let err = store.commit(unit).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert!(store.account(vendor.id).await.unwrap().is_none());
        assert!(store.service(listing.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_availability_compare_and_set() {
        let store = InMemoryMarketplaceStore::new();
        let vendor = account("vendor@example.com", Role::Vendor, 0);
        let listing = service(&vendor, 1);
        store
            .commit(vec![Write::InsertAccount(vendor), Write::InsertService(listing.clone())].into())
            .await
            .unwrap();

        let take = || {
            UnitOfWork::new().with(Write::SetAvailability {
                service_id: listing.id,
                expected: Some(Availability::Yes),
                availability: Availability::No,
            })
        };

        store.commit(take()).await.unwrap();
        assert!(matches!(store.commit(take()).await, Err(StoreError::Conflict(_))));
        assert_eq!(
            store.service(listing.id).await.unwrap().unwrap().availability,
            Availability::No
        );
    }

    #[tokio::test]
    async fn test_booking_settles_once() {
        let store = InMemoryMarketplaceStore::new();
        let customer = crate::flows::fixtures::customer("c@example.com");
        let vendor = crate::flows::fixtures::vendor("v@example.com");
        let listing = crate::flows::fixtures::service(&vendor, 5000);
        let booking = crate::flows::fixtures::booking(&customer, &vendor, &listing);
        store
            .commit(vec![Write::InsertService(listing), Write::InsertBooking(booking.clone())].into())
            .await
            .unwrap();

        let settle = || {
            UnitOfWork::new().with(Write::SettleBooking {
                booking_id: booking.id,
                payer: customer.id,
                at: at(30),
            })
        };

        store.commit(settle()).await.unwrap();
        assert!(matches!(store.commit(settle()).await, Err(StoreError::Conflict(_))));
        let stored = store.booking(booking.id).await.unwrap().unwrap();
        assert_eq!(stored.payment_status, BookingPaymentStatus::Paid);
        assert_eq!(stored.updated_at, at(30));
    }

    #[tokio::test]
    async fn test_rating_range_enforced() {
        let store = InMemoryMarketplaceStore::new();
        let customer = account("c@example.com", Role::Customer, 0);
        let vendor = account("v@example.com", Role::Vendor, 0);
        let listing = service(&vendor, 1);

        for value in [0, 6, -1] {
            let err = store
                .commit(UnitOfWork::new().with(Write::UpsertRating(rating(&customer, &listing, value))))
                .await
                .unwrap_err();
            assert_eq!(err, StoreError::Constraint(RATING_RANGE_MESSAGE.to_string()));
        }
    }

    #[tokio::test]
    async fn test_rating_upsert_keeps_id() {
        let store = InMemoryMarketplaceStore::new();
        let customer = account("c@example.com", Role::Customer, 0);
        let vendor = account("v@example.com", Role::Vendor, 0);
        let listing = service(&vendor, 1);

        let first = rating(&customer, &listing, 3);
        store.commit(UnitOfWork::new().with(Write::UpsertRating(first.clone()))).await.unwrap();
        store
            .commit(UnitOfWork::new().with(Write::UpsertRating(rating(&customer, &listing, 5))))
            .await
            .unwrap();

        let ratings = store.ratings(FeedbackFilter::Vendor(vendor.id)).await.unwrap();
        assert_eq!(ratings.len(), 1);
        assert_eq!(ratings[0].id, first.id);
        assert_eq!(ratings[0].rating, 5);
    }

    #[tokio::test]
    async fn test_lists_newest_first() {
        let store = InMemoryMarketplaceStore::new();
        let old = account("old@example.com", Role::Customer, 0);
        let new = account("new@example.com", Role::Customer, 5);
        let vendor = account("v@example.com", Role::Vendor, 3);
        store
            .commit(
                vec![
                    Write::InsertAccount(old.clone()),
                    Write::InsertAccount(new.clone()),
                    Write::InsertAccount(vendor),
                ]
                .into(),
            )
            .await
            .unwrap();

        let customers = store.accounts(Some(Role::Customer)).await.unwrap();
        let emails: Vec<_> = customers.iter().map(|a| a.email.as_str()).collect();
        assert_eq!(emails, ["new@example.com", "old@example.com"]);
        assert_eq!(store.accounts(None).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_purge_removes_services_of_missing_vendor_and_dependents() {
        let store = InMemoryMarketplaceStore::new();
        let vendor = account("v@example.com", Role::Vendor, 0);
        let customer = account("c@example.com", Role::Customer, 0);
        let listing = service(&vendor, 1);
        let orphan_rating = rating(&customer, &listing, 4);

        // Vendor never inserted: its listing and the rating on it are orphans.
        store
            .commit(
                vec![
                    Write::InsertAccount(customer),
                    Write::InsertService(listing),
                    Write::UpsertRating(orphan_rating),
                ]
                .into(),
            )
            .await
            .unwrap();

        let report = store.purge_orphans().await.unwrap();
        assert_eq!(
            report,
            PurgeReport {
                services: 1,
                bookings: 0,
                reviews: 0,
                ratings: 1
            }
        );
        assert_eq!(store.purge_orphans().await.unwrap(), PurgeReport::default());
    }
}
