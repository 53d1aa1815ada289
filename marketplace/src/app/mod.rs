//! Application services.
//!
//! [`Marketplace`] is what the HTTP layer talks to. Each command loads the
//! records its flow needs, runs the flow's reducer in a short-lived runtime
//! `Store` and returns the settled outcome. Queries go straight to the
//! marketplace store.

mod services;

pub use services::{Marketplace, PaymentSubmission};
