//! Authentication extractors for the marketplace API.
//!
//! [`SessionUser`] opens the bearer token, checks it has not expired and
//! that its account still exists. Handlers then ask it for a capability or
//! for access to a specific account's records.
//!
//! # Usage
//!
//! ```rust,ignore
//! async fn create_booking(
//!     State(state): State<AppState>,
//!     session: SessionUser,
//!     ApiJson(request): ApiJson<CreateBookingRequest>,
//! ) -> Result<Json<Booking>, AppError> {
//!     let customer_id = session.require(Capability::BookServices)?;
//!     ...
//! }
//! ```

use super::capability::{Actor, Capability};
use super::session::{SessionClaims, SessionError};
use crate::error::MarketplaceError;
use crate::server::state::AppState;
use crate::types::{Account, AccountId};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use utshob_web::{AppError, BearerToken};

/// Authenticated caller of a request.
#[derive(Debug, Clone)]
pub struct SessionUser {
    /// Caller tagged by current role
    pub actor: Actor,
    /// Caller's account as stored now
    pub account: Account,
    /// Claims carried by the token
    pub claims: SessionClaims,
}

impl SessionUser {
    /// Caller id, provided the caller holds `capability`.
    ///
    /// # Errors
    ///
    /// 403 if the caller's role lacks the capability.
    pub fn require(&self, capability: Capability) -> Result<AccountId, AppError> {
        if self.actor.can(capability) {
            Ok(self.actor.id())
        } else {
            tracing::warn!(account_id = %self.actor.id(), role = %self.actor.role(), ?capability, "Capability denied");
            Err(AppError::forbidden("Insufficient permissions"))
        }
    }

    /// Allow the account itself or an administrator.
    ///
    /// # Errors
    ///
    /// 403 for anyone else.
    pub fn require_self_or_admin(&self, account: AccountId) -> Result<(), AppError> {
        if self.actor.is_self_or_admin(account) {
            Ok(())
        } else {
            Err(AppError::forbidden("Not allowed to access another account's records"))
        }
    }

    /// Allow any of `parties`, or an administrator.
    ///
    /// # Errors
    ///
    /// 403 for anyone else.
    pub fn require_party_or_admin(&self, parties: &[AccountId]) -> Result<(), AppError> {
        if matches!(self.actor, Actor::Admin(_)) || parties.contains(&self.actor.id()) {
            Ok(())
        } else {
            Err(AppError::forbidden("Not a party to this booking"))
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for SessionUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let BearerToken(token) = BearerToken::from_request_parts(parts, state).await?;

        let claims = state
            .sealer
            .open(&token, state.marketplace.now())
            .map_err(|err| match err {
                SessionError::Invalid | SessionError::Expired => {
                    tracing::debug!(error = %err, "Session refused");
                    AppError::unauthorized(err.to_string())
                },
                other => AppError::internal("Session validation failed").with_source(other.into()),
            })?;

        let account = match state.marketplace.account(claims.account_id).await {
            Ok(account) => account,
            Err(MarketplaceError::NotFound { .. }) => {
                return Err(AppError::unauthorized("Account no longer exists"));
            },
            Err(other) => return Err(other.into()),
        };

        Ok(Self {
            actor: Actor::new(account.id, account.role),
            account,
            claims,
        })
    }
}
