//! Utshob - a booking marketplace for event services.
//!
//! Customers browse services listed by vendors (decoration, photography,
//! transportation, music, food), book them, pay, and leave ratings and
//! reviews. Administrators manage accounts.
//!
//! # Architecture
//!
//! ```text
//!   HTTP (axum)          api/ + server/     bearer session → Actor
//!        │
//!        ▼
//!   Marketplace          app/               loads records, runs one flow
//!        │
//!        ▼
//!   Flow reducers        flows/             validate, describe a UnitOfWork
//!        │
//!        ▼
//!   MarketplaceStore     store/             in-memory or PostgreSQL,
//!                                           one transaction per unit
//! ```
//!
//! # Key Features
//!
//! ## Booking holds the service
//!
//! Creating a booking inserts it and flips the service from `Yes` to `No`
//! availability in the same unit of work. The flip is compare-and-set, so of
//! two concurrent bookings of one service exactly one succeeds.
//!
//! ## Payments settle atomically
//!
//! A payment whose amount equals the amount due is recorded together with
//! marking every covered booking paid and confirmed and making its service
//! bookable again. A mismatched amount is recorded as unsuccessful and
//! changes nothing else.
//!
//! ## Feedback
//!
//! Ratings are upserted per customer and service; reviews are written once.
//! A vendor's average is recomputed from its ratings on every request.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod flows;
pub mod server;
pub mod store;
pub mod types;

pub use app::{Marketplace, PaymentSubmission};
pub use config::Config;
pub use error::{MarketplaceError, Result};
pub use store::{InMemoryMarketplaceStore, MarketplaceStore, PostgresMarketplaceStore};
pub use types::*;
