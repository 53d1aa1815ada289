//! API endpoints for the marketplace.
//!
//! HTTP handlers organized by domain:
//! - Users: signup, login and account administration
//! - Services: the vendor catalog
//! - Bookings: reserving services and tracking their status
//! - Payments: pending totals, payment processing and history
//! - Reviews and ratings: customer feedback and vendor averages

pub mod bookings;
pub mod payments;
pub mod ratings;
pub mod reviews;
pub mod services;
pub mod users;

pub use bookings::{
    create_booking, customer_bookings, get_booking, list_bookings, update_booking_payment, update_booking_status,
    vendor_bookings,
};
pub use payments::{payment_history, pending_payments, process_payment};
pub use ratings::{customer_ratings, submit_rating, vendor_ratings, vendor_summary};
pub use reviews::{customer_reviews, submit_review, vendor_reviews};
pub use services::{create_service, get_service, list_services};
pub use users::{cleanup_orphaned, delete_user, list_users, login, me, signup};
