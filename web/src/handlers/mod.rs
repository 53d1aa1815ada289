//! HTTP request handlers shared by Utshob services.

pub mod health;

pub use health::{ReadinessProbe, health_check, readiness_check};
