//! Identity for the marketplace.
//!
//! - Password hashing for stored credentials
//! - Sealed, expiring session tokens
//! - The role capability table and the tagged [`Actor`]
//! - Axum extractors that turn a bearer token into a checked identity

pub mod capability;
pub mod middleware;
pub mod password;
pub mod session;

pub use capability::{Actor, Capability};
pub use middleware::SessionUser;
pub use session::{SessionClaims, SessionError, SessionSealer};
