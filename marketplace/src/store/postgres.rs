//! `PostgreSQL` marketplace store.
//!
//! Each [`UnitOfWork`] runs inside one transaction; any failing write drops
//! the transaction, which rolls back everything before it. Uniqueness and
//! the rating range are enforced by the schema in `migrations/` and mapped
//! back into [`StoreError`] variants here.

use super::{
    BookingFilter, DUPLICATE_REVIEW_MESSAGE, FeedbackFilter, MarketplaceStore, PurgeReport,
    RATING_RANGE_MESSAGE, ServiceFilter, StoreError, StoreFuture, UnitOfWork, Write,
};
use crate::types::{
    Account, AccountId, Availability, Booking, BookingId, BookingPaymentStatus, Money, Payment,
    PaymentLine, Rating, RatingId, Review, ReviewId, Role, Service, ServiceId,
};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{Postgres, Row, Transaction};
use std::str::FromStr;
use std::time::Duration;

/// Marketplace store backed by `PostgreSQL`
#[derive(Clone, Debug)]
pub struct PostgresMarketplaceStore {
    pool: PgPool,
}

impl PostgresMarketplaceStore {
    /// Wrap an existing pool
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a connection pool.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if no connection can be established.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
        connect_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(connect_timeout)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Database(format!("Failed to connect: {e}")))?;

        Ok(Self::new(pool))
    }

    /// Run the bundled schema migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("Migration failed: {e}")))?;
        Ok(())
    }

    /// The underlying connection pool
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

// ============================================================================
// Error and value mapping
// ============================================================================

fn database(context: &'static str) -> impl FnOnce(sqlx::Error) -> StoreError {
    move |e| StoreError::Database(format!("{context}: {e}"))
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

fn is_check_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db_err) if db_err.is_check_violation())
}

fn to_db(money: Money) -> Result<i64, StoreError> {
    i64::try_from(money.amount())
        .map_err(|_| StoreError::Constraint(format!("amount {money} is out of range")))
}

fn money(row: &PgRow, column: &str) -> Result<Money, StoreError> {
    let value: i64 = row.try_get(column).map_err(database("decode amount"))?;
    u64::try_from(value)
        .map(Money::new)
        .map_err(|_| StoreError::Database(format!("negative amount in column {column}")))
}

fn parse<T>(row: &PgRow, column: &str) -> Result<T, StoreError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw: String = row.try_get(column).map_err(database("decode column"))?;
    raw.parse()
        .map_err(|e: T::Err| StoreError::Database(format!("{column}: {e}")))
}

fn get<'r, T>(row: &'r PgRow, column: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(column).map_err(database("decode column"))
}

fn account_from_row(row: &PgRow) -> Result<Account, StoreError> {
    Ok(Account {
        id: AccountId::from_uuid(get(row, "id")?),
        name: get(row, "name")?,
        email: get(row, "email")?,
        password_hash: get(row, "password_hash")?,
        phone: get(row, "phone")?,
        address: get(row, "address")?,
        role: parse(row, "role")?,
        created_at: get(row, "created_at")?,
    })
}

fn service_from_row(row: &PgRow) -> Result<Service, StoreError> {
    Ok(Service {
        id: ServiceId::from_uuid(get(row, "id")?),
        organization_name: get(row, "organization_name")?,
        category: parse(row, "category")?,
        price: money(row, "price")?,
        availability: parse(row, "availability")?,
        description: get(row, "description")?,
        vendor_id: AccountId::from_uuid(get(row, "vendor_id")?),
        vendor_name: get(row, "vendor_name")?,
        photo: get(row, "photo")?,
        created_at: get(row, "created_at")?,
    })
}

fn booking_from_row(row: &PgRow) -> Result<Booking, StoreError> {
    Ok(Booking {
        id: BookingId::from_uuid(get(row, "id")?),
        customer_id: AccountId::from_uuid(get(row, "customer_id")?),
        customer_name: get(row, "customer_name")?,
        customer_email: get(row, "customer_email")?,
        customer_phone: get(row, "customer_phone")?,
        vendor_id: AccountId::from_uuid(get(row, "vendor_id")?),
        vendor_name: get(row, "vendor_name")?,
        vendor_email: get(row, "vendor_email")?,
        service_id: ServiceId::from_uuid(get(row, "service_id")?),
        service_name: get(row, "service_name")?,
        service_category: parse(row, "service_category")?,
        service_price: money(row, "service_price")?,
        service_description: get(row, "service_description")?,
        booking_date: get(row, "booking_date")?,
        event_date: get(row, "event_date")?,
        status: parse(row, "status")?,
        total_amount: money(row, "total_amount")?,
        payment_status: parse(row, "payment_status")?,
        special_requirements: get(row, "special_requirements")?,
        notes: get(row, "notes")?,
        created_at: get(row, "created_at")?,
        updated_at: get(row, "updated_at")?,
    })
}

fn payment_from_row(row: &PgRow) -> Result<Payment, StoreError> {
    let Json(services): Json<Vec<PaymentLine>> = get(row, "services")?;
    Ok(Payment {
        id: crate::types::PaymentId::from_uuid(get(row, "id")?),
        user_id: AccountId::from_uuid(get(row, "user_id")?),
        customer_name: get(row, "customer_name")?,
        customer_email: get(row, "customer_email")?,
        customer_phone: get(row, "customer_phone")?,
        payment_method: parse(row, "payment_method")?,
        payment_provider: get(row, "payment_provider")?,
        card_number: get(row, "card_number")?,
        mobile_number: get(row, "mobile_number")?,
        amount: money(row, "amount")?,
        required_amount: money(row, "required_amount")?,
        payment_status: parse(row, "payment_status")?,
        services,
        transaction_id: get(row, "transaction_id")?,
        payment_date: get(row, "payment_date")?,
        notes: get(row, "notes")?,
    })
}

fn rating_from_row(row: &PgRow) -> Result<Rating, StoreError> {
    Ok(Rating {
        id: RatingId::from_uuid(get(row, "id")?),
        customer_id: AccountId::from_uuid(get(row, "customer_id")?),
        customer_name: get(row, "customer_name")?,
        vendor_id: AccountId::from_uuid(get(row, "vendor_id")?),
        vendor_name: get(row, "vendor_name")?,
        service_id: ServiceId::from_uuid(get(row, "service_id")?),
        service_name: get(row, "service_name")?,
        rating: get(row, "rating")?,
        rating_date: get(row, "rating_date")?,
    })
}

fn review_from_row(row: &PgRow) -> Result<Review, StoreError> {
    Ok(Review {
        id: ReviewId::from_uuid(get(row, "id")?),
        customer_id: AccountId::from_uuid(get(row, "customer_id")?),
        customer_name: get(row, "customer_name")?,
        vendor_id: AccountId::from_uuid(get(row, "vendor_id")?),
        vendor_name: get(row, "vendor_name")?,
        service_id: ServiceId::from_uuid(get(row, "service_id")?),
        service_name: get(row, "service_name")?,
        comment: get(row, "comment")?,
        review_date: get(row, "review_date")?,
    })
}

const FEEDBACK_FILTER: &str = "($1::uuid IS NULL OR customer_id = $1) AND ($2::uuid IS NULL OR vendor_id = $2)";

fn feedback_binds(filter: FeedbackFilter) -> (Option<uuid::Uuid>, Option<uuid::Uuid>) {
    match filter {
        FeedbackFilter::Customer(id) => (Some(*id.as_uuid()), None),
        FeedbackFilter::Vendor(id) => (None, Some(*id.as_uuid())),
    }
}

// ============================================================================
// Unit of work
// ============================================================================

#[allow(clippy::too_many_lines)] // One arm per write kind
async fn apply(tx: &mut Transaction<'_, Postgres>, write: Write) -> Result<(), StoreError> {
    match write {
        Write::InsertAccount(account) => {
            sqlx::query(
                r"
                INSERT INTO accounts (id, name, email, password_hash, phone, address, role, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ",
            )
            .bind(account.id.as_uuid())
            .bind(&account.name)
            .bind(&account.email)
            .bind(&account.password_hash)
            .bind(&account.phone)
            .bind(&account.address)
            .bind(account.role.as_str())
            .bind(account.created_at)
            .execute(&mut **tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    return StoreError::Duplicate("User already exists".to_string());
                }
                StoreError::Database(format!("Failed to insert account: {e}"))
            })?;
        },

        Write::DeleteAccount { id, role } => {
            let statements: &[&str] = match role {
                Role::Vendor => &[
                    // Payments first: they are found through the vendor's services.
                    r"
                    DELETE FROM payments p
                    WHERE EXISTS (
                        SELECT 1
                        FROM jsonb_array_elements(p.services) AS line
                        JOIN services s ON s.id = (line ->> 'serviceId')::uuid
                        WHERE s.vendor_id = $1
                    )
                    ",
                    "DELETE FROM services WHERE vendor_id = $1",
                    "DELETE FROM bookings WHERE vendor_id = $1",
                    "DELETE FROM reviews WHERE vendor_id = $1",
                    "DELETE FROM ratings WHERE vendor_id = $1",
                ],
                Role::Customer => &[
                    "DELETE FROM bookings WHERE customer_id = $1",
                    "DELETE FROM reviews WHERE customer_id = $1",
                    "DELETE FROM ratings WHERE customer_id = $1",
                    "DELETE FROM payments WHERE user_id = $1",
                ],
                Role::Admin => &[],
            };

            for statement in statements {
                sqlx::query(*statement)
                    .bind(id.as_uuid())
                    .execute(&mut **tx)
                    .await
                    .map_err(database("Failed to delete account data"))?;
            }

            let deleted = sqlx::query("DELETE FROM accounts WHERE id = $1")
                .bind(id.as_uuid())
                .execute(&mut **tx)
                .await
                .map_err(database("Failed to delete account"))?;
            if deleted.rows_affected() == 0 {
                return Err(StoreError::not_found("User", id));
            }
        },

        Write::InsertService(service) => {
            sqlx::query(
                r"
                INSERT INTO services
                    (id, organization_name, category, price, availability, description,
                     vendor_id, vendor_name, photo, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                ",
            )
            .bind(service.id.as_uuid())
            .bind(&service.organization_name)
            .bind(service.category.as_str())
            .bind(to_db(service.price)?)
            .bind(service.availability.as_str())
            .bind(&service.description)
            .bind(service.vendor_id.as_uuid())
            .bind(&service.vendor_name)
            .bind(&service.photo)
            .bind(service.created_at)
            .execute(&mut **tx)
            .await
            .map_err(database("Failed to insert service"))?;
        },

        Write::SetAvailability {
            service_id,
            expected,
            availability,
        } => {
            let updated = sqlx::query(
                r"
                UPDATE services
                SET availability = $2
                WHERE id = $1 AND ($3::text IS NULL OR availability = $3)
                ",
            )
            .bind(service_id.as_uuid())
            .bind(availability.as_str())
            .bind(expected.map(|a| a.as_str()))
            .execute(&mut **tx)
            .await
            .map_err(database("Failed to update availability"))?;

            if updated.rows_affected() == 0 {
                let current: Option<String> =
                    sqlx::query_scalar("SELECT availability FROM services WHERE id = $1")
                        .bind(service_id.as_uuid())
                        .fetch_optional(&mut **tx)
                        .await
                        .map_err(database("Failed to read availability"))?;
                return Err(match current {
                    None => StoreError::not_found("Service", service_id),
                    Some(current) => StoreError::Conflict(format!(
                        "service {service_id} availability is {current}, expected {}",
                        expected.map_or("any", |a: Availability| a.as_str())
                    )),
                });
            }
        },

        Write::InsertBooking(booking) => {
            sqlx::query(
                r"
                INSERT INTO bookings
                    (id, customer_id, customer_name, customer_email, customer_phone,
                     vendor_id, vendor_name, vendor_email,
                     service_id, service_name, service_category, service_price, service_description,
                     booking_date, event_date, status, total_amount, payment_status,
                     special_requirements, notes, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11,
                        $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22)
                ",
            )
            .bind(booking.id.as_uuid())
            .bind(booking.customer_id.as_uuid())
            .bind(&booking.customer_name)
            .bind(&booking.customer_email)
            .bind(&booking.customer_phone)
            .bind(booking.vendor_id.as_uuid())
            .bind(&booking.vendor_name)
            .bind(&booking.vendor_email)
            .bind(booking.service_id.as_uuid())
            .bind(&booking.service_name)
            .bind(booking.service_category.as_str())
            .bind(to_db(booking.service_price)?)
            .bind(&booking.service_description)
            .bind(booking.booking_date)
            .bind(booking.event_date)
            .bind(booking.status.as_str())
            .bind(to_db(booking.total_amount)?)
            .bind(booking.payment_status.as_str())
            .bind(&booking.special_requirements)
            .bind(&booking.notes)
            .bind(booking.created_at)
            .bind(booking.updated_at)
            .execute(&mut **tx)
            .await
            .map_err(database("Failed to insert booking"))?;
        },

        Write::UpdateBooking {
            booking_id,
            status,
            payment_status,
            at,
        } => {
            let updated = sqlx::query(
                r"
                UPDATE bookings
                SET status = COALESCE($2, status),
                    payment_status = COALESCE($3, payment_status),
                    updated_at = $4
                WHERE id = $1
                ",
            )
            .bind(booking_id.as_uuid())
            .bind(status.map(|s| s.as_str()))
            .bind(payment_status.map(|s| s.as_str()))
            .bind(at)
            .execute(&mut **tx)
            .await
            .map_err(database("Failed to update booking"))?;
            if updated.rows_affected() == 0 {
                return Err(StoreError::not_found("Booking", booking_id));
            }
        },

        Write::SettleBooking { booking_id, payer, at } => {
            let updated = sqlx::query(
                r"
                UPDATE bookings
                SET payment_status = $3, status = $4, updated_at = $5
                WHERE id = $1 AND customer_id = $2 AND payment_status = $6
                ",
            )
            .bind(booking_id.as_uuid())
            .bind(payer.as_uuid())
            .bind(BookingPaymentStatus::Paid.as_str())
            .bind(crate::types::BookingStatus::Confirmed.as_str())
            .bind(at)
            .bind(BookingPaymentStatus::Pending.as_str())
            .execute(&mut **tx)
            .await
            .map_err(database("Failed to settle booking"))?;
            if updated.rows_affected() == 0 {
                let exists: bool =
                    sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM bookings WHERE id = $1 AND customer_id = $2)")
                        .bind(booking_id.as_uuid())
                        .bind(payer.as_uuid())
                        .fetch_one(&mut **tx)
                        .await
                        .map_err(database("Failed to settle booking"))?;
                return Err(if exists {
                    StoreError::Conflict(format!("booking {booking_id} is already settled"))
                } else {
                    StoreError::not_found("Booking", booking_id)
                });
            }
        },

        Write::InsertPayment(payment) => {
            sqlx::query(
                r"
                INSERT INTO payments
                    (id, user_id, customer_name, customer_email, customer_phone,
                     payment_method, payment_provider, card_number, mobile_number,
                     amount, required_amount, payment_status, services,
                     transaction_id, payment_date, notes)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
                ",
            )
            .bind(payment.id.as_uuid())
            .bind(payment.user_id.as_uuid())
            .bind(&payment.customer_name)
            .bind(&payment.customer_email)
            .bind(&payment.customer_phone)
            .bind(payment.payment_method.as_str())
            .bind(&payment.payment_provider)
            .bind(&payment.card_number)
            .bind(&payment.mobile_number)
            .bind(to_db(payment.amount)?)
            .bind(to_db(payment.required_amount)?)
            .bind(payment.payment_status.as_str())
            .bind(Json(&payment.services))
            .bind(&payment.transaction_id)
            .bind(payment.payment_date)
            .bind(&payment.notes)
            .execute(&mut **tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    return StoreError::Database(format!(
                        "transaction id {} already recorded",
                        payment.transaction_id
                    ));
                }
                StoreError::Database(format!("Failed to insert payment: {e}"))
            })?;
        },

        Write::UpsertRating(rating) => {
            sqlx::query(
                r"
                INSERT INTO ratings
                    (id, customer_id, customer_name, vendor_id, vendor_name,
                     service_id, service_name, rating, rating_date)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ON CONFLICT (customer_id, service_id) DO UPDATE
                SET rating = EXCLUDED.rating,
                    rating_date = EXCLUDED.rating_date,
                    customer_name = EXCLUDED.customer_name,
                    vendor_id = EXCLUDED.vendor_id,
                    vendor_name = EXCLUDED.vendor_name,
                    service_name = EXCLUDED.service_name
                ",
            )
            .bind(rating.id.as_uuid())
            .bind(rating.customer_id.as_uuid())
            .bind(&rating.customer_name)
            .bind(rating.vendor_id.as_uuid())
            .bind(&rating.vendor_name)
            .bind(rating.service_id.as_uuid())
            .bind(&rating.service_name)
            .bind(rating.rating)
            .bind(rating.rating_date)
            .execute(&mut **tx)
            .await
            .map_err(|e| {
                if is_check_violation(&e) {
                    return StoreError::Constraint(RATING_RANGE_MESSAGE.to_string());
                }
                StoreError::Database(format!("Failed to upsert rating: {e}"))
            })?;
        },

        Write::InsertReview(review) => {
            sqlx::query(
                r"
                INSERT INTO reviews
                    (id, customer_id, customer_name, vendor_id, vendor_name,
                     service_id, service_name, comment, review_date)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ",
            )
            .bind(review.id.as_uuid())
            .bind(review.customer_id.as_uuid())
            .bind(&review.customer_name)
            .bind(review.vendor_id.as_uuid())
            .bind(&review.vendor_name)
            .bind(review.service_id.as_uuid())
            .bind(&review.service_name)
            .bind(&review.comment)
            .bind(review.review_date)
            .execute(&mut **tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    return StoreError::Duplicate(DUPLICATE_REVIEW_MESSAGE.to_string());
                }
                StoreError::Database(format!("Failed to insert review: {e}"))
            })?;
        },
    }
    Ok(())
}

// ============================================================================
// Trait implementation
// ============================================================================

impl MarketplaceStore for PostgresMarketplaceStore {
    fn account(&self, id: AccountId) -> StoreFuture<'_, Option<Account>> {
        Box::pin(async move {
            let row = sqlx::query(
                r"
                SELECT id, name, email, password_hash, phone, address, role, created_at
                FROM accounts
                WHERE id = $1
                ",
            )
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(database("Failed to get account"))?;

            row.as_ref().map(account_from_row).transpose()
        })
    }

    fn account_by_email(&self, email: String) -> StoreFuture<'_, Option<Account>> {
        Box::pin(async move {
            let row = sqlx::query(
                r"
                SELECT id, name, email, password_hash, phone, address, role, created_at
                FROM accounts
                WHERE email = $1
                ",
            )
            .bind(&email)
            .fetch_optional(&self.pool)
            .await
            .map_err(database("Failed to get account"))?;

            row.as_ref().map(account_from_row).transpose()
        })
    }

    fn accounts(&self, role: Option<Role>) -> StoreFuture<'_, Vec<Account>> {
        Box::pin(async move {
            let rows = sqlx::query(
                r"
                SELECT id, name, email, password_hash, phone, address, role, created_at
                FROM accounts
                WHERE ($1::text IS NULL OR role = $1)
                ORDER BY created_at DESC, id
                ",
            )
            .bind(role.map(|r| r.as_str()))
            .fetch_all(&self.pool)
            .await
            .map_err(database("Failed to list accounts"))?;

            rows.iter().map(account_from_row).collect()
        })
    }

    fn service(&self, id: ServiceId) -> StoreFuture<'_, Option<Service>> {
        Box::pin(async move {
            let row = sqlx::query(
                r"
                SELECT id, organization_name, category, price, availability, description,
                       vendor_id, vendor_name, photo, created_at
                FROM services
                WHERE id = $1
                ",
            )
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(database("Failed to get service"))?;

            row.as_ref().map(service_from_row).transpose()
        })
    }

    fn services(&self, filter: ServiceFilter) -> StoreFuture<'_, Vec<Service>> {
        Box::pin(async move {
            let rows = sqlx::query(
                r"
                SELECT id, organization_name, category, price, availability, description,
                       vendor_id, vendor_name, photo, created_at
                FROM services
                WHERE ($1::text IS NULL OR category = $1)
                  AND ($2::uuid IS NULL OR vendor_id = $2)
                  AND ($3::text IS NULL OR availability = $3)
                ORDER BY created_at DESC, id
                ",
            )
            .bind(filter.category.map(|c| c.as_str()))
            .bind(filter.vendor_id.map(|v| *v.as_uuid()))
            .bind(filter.availability.map(|a| a.as_str()))
            .fetch_all(&self.pool)
            .await
            .map_err(database("Failed to list services"))?;

            rows.iter().map(service_from_row).collect()
        })
    }

    fn booking(&self, id: BookingId) -> StoreFuture<'_, Option<Booking>> {
        Box::pin(async move {
            let row = sqlx::query("SELECT * FROM bookings WHERE id = $1")
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(database("Failed to get booking"))?;

            row.as_ref().map(booking_from_row).transpose()
        })
    }

    fn bookings(&self, filter: BookingFilter) -> StoreFuture<'_, Vec<Booking>> {
        Box::pin(async move {
            let (customer, vendor, payment_status) = match filter {
                BookingFilter::All => (None, None, None),
                BookingFilter::Customer(id) => (Some(*id.as_uuid()), None, None),
                BookingFilter::Vendor(id) => (None, Some(*id.as_uuid()), None),
                BookingFilter::PendingPayment(id) => (
                    Some(*id.as_uuid()),
                    None,
                    Some(BookingPaymentStatus::Pending.as_str()),
                ),
            };

            let rows = sqlx::query(
                r"
                SELECT *
                FROM bookings
                WHERE ($1::uuid IS NULL OR customer_id = $1)
                  AND ($2::uuid IS NULL OR vendor_id = $2)
                  AND ($3::text IS NULL OR payment_status = $3)
                ORDER BY created_at DESC, id
                ",
            )
            .bind(customer)
            .bind(vendor)
            .bind(payment_status)
            .fetch_all(&self.pool)
            .await
            .map_err(database("Failed to list bookings"))?;

            rows.iter().map(booking_from_row).collect()
        })
    }

    fn payments(&self, user_id: AccountId) -> StoreFuture<'_, Vec<Payment>> {
        Box::pin(async move {
            let rows = sqlx::query(
                r"
                SELECT *
                FROM payments
                WHERE user_id = $1
                ORDER BY payment_date DESC, id
                ",
            )
            .bind(user_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(database("Failed to list payments"))?;

            rows.iter().map(payment_from_row).collect()
        })
    }

    fn rating(&self, customer_id: AccountId, service_id: ServiceId) -> StoreFuture<'_, Option<Rating>> {
        Box::pin(async move {
            let row = sqlx::query("SELECT * FROM ratings WHERE customer_id = $1 AND service_id = $2")
                .bind(customer_id.as_uuid())
                .bind(service_id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(database("Failed to get rating"))?;

            row.as_ref().map(rating_from_row).transpose()
        })
    }

    fn ratings(&self, filter: FeedbackFilter) -> StoreFuture<'_, Vec<Rating>> {
        Box::pin(async move {
            let (customer, vendor) = feedback_binds(filter);
            let sql = format!("SELECT * FROM ratings WHERE {FEEDBACK_FILTER} ORDER BY rating_date DESC, id");
            let rows = sqlx::query(&sql)
                .bind(customer)
                .bind(vendor)
                .fetch_all(&self.pool)
                .await
                .map_err(database("Failed to list ratings"))?;

            rows.iter().map(rating_from_row).collect()
        })
    }

    fn review(&self, customer_id: AccountId, service_id: ServiceId) -> StoreFuture<'_, Option<Review>> {
        Box::pin(async move {
            let row = sqlx::query("SELECT * FROM reviews WHERE customer_id = $1 AND service_id = $2")
                .bind(customer_id.as_uuid())
                .bind(service_id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(database("Failed to get review"))?;

            row.as_ref().map(review_from_row).transpose()
        })
    }

    fn reviews(&self, filter: FeedbackFilter) -> StoreFuture<'_, Vec<Review>> {
        Box::pin(async move {
            let (customer, vendor) = feedback_binds(filter);
            let sql = format!("SELECT * FROM reviews WHERE {FEEDBACK_FILTER} ORDER BY review_date DESC, id");
            let rows = sqlx::query(&sql)
                .bind(customer)
                .bind(vendor)
                .fetch_all(&self.pool)
                .await
                .map_err(database("Failed to list reviews"))?;

            rows.iter().map(review_from_row).collect()
        })
    }

    fn commit(&self, unit: UnitOfWork) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(database("Failed to begin transaction"))?;

            for write in unit.writes {
                apply(&mut tx, write).await?;
            }

            tx.commit()
                .await
                .map_err(database("Failed to commit transaction"))
        })
    }

    fn purge_orphans(&self) -> StoreFuture<'_, PurgeReport> {
        Box::pin(async move {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(database("Failed to begin transaction"))?;

            let services = sqlx::query(
                r"
                DELETE FROM services s
                WHERE NOT EXISTS (SELECT 1 FROM accounts a WHERE a.id = s.vendor_id)
                ",
            )
            .execute(&mut *tx)
            .await
            .map_err(database("Failed to purge services"))?
            .rows_affected();

            let mut dependents = [0_u64; 3];
            for (count, table) in dependents.iter_mut().zip(["bookings", "reviews", "ratings"]) {
                let sql = format!(
                    r"
                    DELETE FROM {table} t
                    WHERE NOT EXISTS (SELECT 1 FROM accounts a WHERE a.id = t.customer_id)
                       OR NOT EXISTS (SELECT 1 FROM accounts a WHERE a.id = t.vendor_id)
                       OR NOT EXISTS (SELECT 1 FROM services s WHERE s.id = t.service_id)
                    "
                );
                *count = sqlx::query(&sql)
                    .execute(&mut *tx)
                    .await
                    .map_err(database("Failed to purge orphans"))?
                    .rows_affected();
            }

            tx.commit()
                .await
                .map_err(database("Failed to commit transaction"))?;

            let [bookings, reviews, ratings] = dependents;
            Ok(PurgeReport {
                services,
                bookings,
                reviews,
                ratings,
            })
        })
    }

    fn ping(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            sqlx::query("SELECT 1")
                .execute(&self.pool)
                .await
                .map_err(database("Database ping failed"))?;
            Ok(())
        })
    }
}
