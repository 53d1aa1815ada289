//! Domain types for the marketplace.
//!
//! Records are plain data: accounts, service listings, bookings, payments and
//! the two feedback kinds. Bookings and payments carry snapshots of the
//! names, prices and descriptions they were created from, so later edits or
//! deletions of the source records never change them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            #[doc = concat!("Creates a new random `", stringify!($name), "`")]
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            #[doc = concat!("Create a `", stringify!($name), "` from a `Uuid`")]
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the inner UUID
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_id!(
    /// Unique identifier for an account (customer, vendor or admin)
    AccountId
);
define_id!(
    /// Unique identifier for a service listing
    ServiceId
);
define_id!(
    /// Unique identifier for a booking
    BookingId
);
define_id!(
    /// Unique identifier for a payment attempt
    PaymentId
);
define_id!(
    /// Unique identifier for a rating
    RatingId
);
define_id!(
    /// Unique identifier for a review
    ReviewId
);

// ============================================================================
// Value Objects
// ============================================================================

/// Whole-unit, non-negative amount of money
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    /// Zero
    pub const ZERO: Self = Self(0);

    /// Creates a `Money` value from whole units
    #[must_use]
    pub const fn new(amount: u64) -> Self {
        Self(amount)
    }

    /// Returns the amount in whole units
    #[must_use]
    pub const fn amount(&self) -> u64 {
        self.0
    }

    /// Checks if the amount is zero
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Adds two money amounts, `None` on overflow
    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(result) => Some(Self(result)),
            None => None,
        }
    }

    /// Adds two money amounts, clamping at `u64::MAX`
    #[must_use]
    pub const fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error parsing one of the string-backed enums below
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseEnumError {
    /// Which enum was being parsed
    pub kind: &'static str,
    /// The rejected input
    pub value: String,
}

macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $name:ident ($kind:literal) {
            $($(#[$vmeta:meta])* $variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                $(#[$vmeta])*
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            /// Wire and storage representation
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(ParseEnumError { kind: $kind, value: other.to_string() }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

string_enum!(
    /// Account role
    Role ("role") {
        /// Books and pays for services
        Customer => "customer",
        /// Lists services
        Vendor => "vendor",
        /// Manages accounts
        Admin => "admin",
    }
);

string_enum!(
    /// Service category
    Category ("category") {
        /// Decoration
        Decoration => "Decoration",
        /// Photography
        Photography => "Photography",
        /// Transportation
        Transportation => "Transportation",
        /// Music
        Music => "Music",
        /// Food
        Food => "Food",
    }
);

string_enum!(
    /// Whether a service can currently be booked
    Availability ("availability") {
        /// Bookable
        Yes => "Yes",
        /// Held by an unpaid booking
        No => "No",
    }
);

string_enum!(
    /// Booking lifecycle status
    BookingStatus ("booking status") {
        /// Created, awaiting payment
        Pending => "pending",
        /// Paid
        Confirmed => "confirmed",
        /// Event underway
        InProgress => "in-progress",
        /// Event finished
        Completed => "completed",
        /// Called off
        Cancelled => "cancelled",
    }
);

string_enum!(
    /// Payment state of a booking
    BookingPaymentStatus ("booking payment status") {
        /// Not paid yet
        Pending => "pending",
        /// Paid in full
        Paid => "paid",
        /// Money returned
        Refunded => "refunded",
    }
);

string_enum!(
    /// How a payment was made
    PaymentMethod ("payment method") {
        /// Mobile wallet
        MobileBanking => "mobile_banking",
        /// Bank card
        Bank => "bank",
    }
);

string_enum!(
    /// Result of a payment attempt
    PaymentOutcome ("payment status") {
        /// Amount matched the amount due
        Successful => "successful",
        /// Amount did not match
        Unsuccessful => "unsuccessful",
    }
);

/// Mask instrument digits, keeping only the last four characters.
///
/// Inputs of four characters or fewer are masked entirely.
#[must_use]
pub fn mask_digits(raw: &str) -> String {
    let chars: Vec<char> = raw.trim().chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let visible = chars.len() - 4;
    chars
        .iter()
        .enumerate()
        .map(|(i, c)| if i < visible { '*' } else { *c })
        .collect()
}

// ============================================================================
// Records
// ============================================================================

/// A registered user
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Account identifier
    pub id: AccountId,
    /// Display name
    pub name: String,
    /// Login email, trimmed and lower-cased
    pub email: String,
    /// Encoded password hash
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Contact number
    pub phone: String,
    /// Postal address
    pub address: String,
    /// Role
    pub role: Role,
    /// Signup time
    pub created_at: DateTime<Utc>,
}

/// A vendor's service listing
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    /// Service identifier
    pub id: ServiceId,
    /// Business name shown to customers
    pub organization_name: String,
    /// Category
    pub category: Category,
    /// Price per booking
    pub price: Money,
    /// Whether it can be booked right now
    pub availability: Availability,
    /// Short description, at most 150 characters
    pub description: String,
    /// Owning vendor
    pub vendor_id: AccountId,
    /// Vendor name at listing time
    pub vendor_name: String,
    /// Opaque photo reference supplied by the client
    pub photo: Option<String>,
    /// Listing time
    pub created_at: DateTime<Utc>,
}

/// A customer's reservation of a service
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    /// Booking identifier
    pub id: BookingId,
    /// Customer
    pub customer_id: AccountId,
    /// Customer name snapshot
    pub customer_name: String,
    /// Customer email snapshot
    pub customer_email: String,
    /// Customer phone snapshot
    pub customer_phone: String,
    /// Vendor
    pub vendor_id: AccountId,
    /// Vendor name snapshot
    pub vendor_name: String,
    /// Vendor email snapshot
    pub vendor_email: String,
    /// Booked service
    pub service_id: ServiceId,
    /// Service name snapshot (the organization name)
    pub service_name: String,
    /// Service category snapshot
    pub service_category: Category,
    /// Service price snapshot
    pub service_price: Money,
    /// Service description snapshot
    pub service_description: String,
    /// When the booking was placed
    pub booking_date: DateTime<Utc>,
    /// When the event takes place, if known
    pub event_date: Option<DateTime<Utc>>,
    /// Lifecycle status
    pub status: BookingStatus,
    /// Amount owed
    pub total_amount: Money,
    /// Payment state
    pub payment_status: BookingPaymentStatus,
    /// Free-text requirements from the customer
    pub special_requirements: String,
    /// Internal notes
    pub notes: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

/// One booking settled by a payment
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentLine {
    /// Service that was booked
    pub service_id: ServiceId,
    /// Service name snapshot
    pub service_name: String,
    /// Amount owed for the booking
    pub service_price: Money,
    /// Booking being paid
    pub booking_id: BookingId,
}

/// A recorded payment attempt; never modified once written
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    /// Payment identifier
    pub id: PaymentId,
    /// Payer
    pub user_id: AccountId,
    /// Payer name snapshot
    pub customer_name: String,
    /// Payer email snapshot
    pub customer_email: String,
    /// Payer phone snapshot
    pub customer_phone: String,
    /// Payment method
    pub payment_method: PaymentMethod,
    /// Provider name (bank or wallet)
    pub payment_provider: String,
    /// Masked card number
    pub card_number: Option<String>,
    /// Masked mobile wallet number
    pub mobile_number: Option<String>,
    /// Amount submitted
    pub amount: Money,
    /// Amount due
    pub required_amount: Money,
    /// Outcome
    pub payment_status: PaymentOutcome,
    /// Bookings covered by this payment
    pub services: Vec<PaymentLine>,
    /// Generated transaction id, unique
    pub transaction_id: String,
    /// Submission time
    pub payment_date: DateTime<Utc>,
    /// Free-text notes
    pub notes: Option<String>,
}

/// A customer's star rating of a service; one per customer and service
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    /// Rating identifier, kept across updates
    pub id: RatingId,
    /// Rating customer
    pub customer_id: AccountId,
    /// Customer name snapshot
    pub customer_name: String,
    /// Rated vendor
    pub vendor_id: AccountId,
    /// Vendor name snapshot
    pub vendor_name: String,
    /// Rated service
    pub service_id: ServiceId,
    /// Service name snapshot
    pub service_name: String,
    /// Stars; storage accepts 1 to 5
    pub rating: i32,
    /// Time of the latest submission
    pub rating_date: DateTime<Utc>,
}

/// A customer's written review of a service; one per customer and service
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    /// Review identifier
    pub id: ReviewId,
    /// Reviewing customer
    pub customer_id: AccountId,
    /// Customer name snapshot
    pub customer_name: String,
    /// Reviewed vendor
    pub vendor_id: AccountId,
    /// Vendor name snapshot
    pub vendor_name: String,
    /// Reviewed service
    pub service_id: ServiceId,
    /// Service name snapshot
    pub service_name: String,
    /// Review text, trimmed and non-empty
    pub comment: String,
    /// Submission time
    pub review_date: DateTime<Utc>,
}
