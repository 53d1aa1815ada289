//! Domain error taxonomy.
//!
//! Every flow and query returns [`MarketplaceError`]. Storage failures are
//! folded into it at the service boundary, and the HTTP layer converts it
//! into an [`AppError`] body.

use crate::auth::password::PasswordError;
use crate::store::StoreError;
use thiserror::Error;
use utshob_web::AppError;

/// Errors surfaced by marketplace operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarketplaceError {
    /// A referenced record does not exist
    #[error("{entity} with id {id} not found")]
    NotFound {
        /// Kind of record ("Customer", "Service", ...)
        entity: &'static str,
        /// Identifier that was looked up
        id: String,
    },

    /// The request itself is malformed or violates a field rule
    #[error("{0}")]
    InvalidInput(String),

    /// The request would create a second record where only one is allowed
    #[error("{0}")]
    Duplicate(String),

    /// The current state of a record does not allow the request
    #[error("{0}")]
    InvalidState(String),

    /// No valid identity
    #[error("{0}")]
    Unauthorized(String),

    /// Identity lacks the capability
    #[error("{0}")]
    Forbidden(String),

    /// Backing store failure
    #[error("storage error: {0}")]
    Storage(String),

    /// Any other server-side failure
    #[error("internal error: {0}")]
    Internal(String),
}

impl MarketplaceError {
    /// Shorthand for [`MarketplaceError::NotFound`]
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Shorthand for [`MarketplaceError::InvalidInput`]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Shorthand for [`MarketplaceError::Forbidden`]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }
}

impl From<StoreError> for MarketplaceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => Self::NotFound { entity, id },
            StoreError::Conflict(message) => Self::InvalidState(message),
            StoreError::Duplicate(message) => Self::Duplicate(message),
            StoreError::Constraint(message) => Self::InvalidInput(message),
            StoreError::Database(message) => Self::Storage(message),
        }
    }
}

impl From<PasswordError> for MarketplaceError {
    fn from(err: PasswordError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<MarketplaceError> for AppError {
    fn from(err: MarketplaceError) -> Self {
        match err {
            MarketplaceError::NotFound { entity, id } => Self::not_found(entity, id),
            MarketplaceError::InvalidInput(message) => Self::bad_request(message),
            MarketplaceError::Duplicate(message) => Self::duplicate(message),
            MarketplaceError::InvalidState(message) => Self::invalid_state(message),
            MarketplaceError::Unauthorized(message) => Self::unauthorized(message),
            MarketplaceError::Forbidden(message) => Self::forbidden(message),
            MarketplaceError::Storage(message) | MarketplaceError::Internal(message) => {
                Self::internal("An internal error occurred").with_source(anyhow::anyhow!(message))
            },
        }
    }
}

/// Result alias for marketplace operations
pub type Result<T> = std::result::Result<T, MarketplaceError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (MarketplaceError::not_found("Booking", "b1"), StatusCode::NOT_FOUND),
            (MarketplaceError::invalid("Comment is required"), StatusCode::BAD_REQUEST),
            (MarketplaceError::Duplicate("dup".into()), StatusCode::BAD_REQUEST),
            (MarketplaceError::InvalidState("taken".into()), StatusCode::BAD_REQUEST),
            (MarketplaceError::Unauthorized("who".into()), StatusCode::UNAUTHORIZED),
            (MarketplaceError::forbidden("no"), StatusCode::FORBIDDEN),
            (MarketplaceError::Storage("pool timed out".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (MarketplaceError::Internal("hashing".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, status) in cases {
            assert_eq!(AppError::from(err).status(), status);
        }
    }

    #[test]
    fn test_storage_message_not_leaked() {
        let app: AppError = MarketplaceError::Storage("relation \"bookings\" does not exist".into()).into();
        assert_eq!(app.message(), "An internal error occurred");
    }

    #[test]
    fn test_store_conflict_becomes_invalid_state() {
        let err: MarketplaceError = StoreError::Conflict("availability changed".into()).into();
        assert_eq!(err, MarketplaceError::InvalidState("availability changed".into()));
    }
}
