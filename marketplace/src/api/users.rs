//! Account API endpoints.
//!
//! - POST /api/users/signup - Register a customer or vendor
//! - POST /api/users/login - Exchange credentials for a session token
//! - GET /api/users/me - Current account (requires auth)
//! - GET /api/users?role= - List accounts (admin)
//! - DELETE /api/users/:id - Delete an account and its records (admin)
//! - POST /api/users/cleanup-orphaned - Remove records left without owners (admin)

#![allow(clippy::missing_errors_doc)]

use crate::auth::{Capability, SessionUser};
use crate::server::state::AppState;
use crate::store::PurgeReport;
use crate::types::{Account, AccountId, Role};
use axum::{Json, extract::State, http::StatusCode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utshob_web::{ApiJson, ApiPath, ApiQuery, AppError};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request to register an account.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Login email
    #[serde(default)]
    pub email: String,
    /// Password, at least six characters
    #[serde(default)]
    pub password: String,
    /// Contact number
    #[serde(default, alias = "number")]
    pub phone: String,
    /// Postal address
    #[serde(default)]
    pub address: String,
    /// `customer` (default) or `vendor`
    pub role: Option<Role>,
}

/// Response after registering.
#[derive(Debug, Serialize)]
pub struct SignupResponse {
    /// Confirmation for the user
    pub message: &'static str,
    /// The new account
    pub user: Account,
}

/// Login credentials.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Login email
    #[serde(default)]
    pub email: String,
    /// Password
    #[serde(default)]
    pub password: String,
}

/// Response after a successful login.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    /// The authenticated account
    pub user: Account,
    /// Bearer token for the `Authorization` header
    pub token: String,
    /// When the token stops being accepted
    pub expires_at: DateTime<Utc>,
}

/// Query for listing accounts.
#[derive(Debug, Default, Deserialize)]
pub struct ListUsersQuery {
    /// Only accounts with this role
    pub role: Option<Role>,
}

/// Plain confirmation.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    /// Confirmation for the user
    pub message: &'static str,
}

/// Response after removing orphaned records.
#[derive(Debug, Serialize)]
pub struct CleanupResponse {
    /// Confirmation for the user
    pub message: &'static str,
    /// Removed record counts per kind
    pub removed: PurgeReport,
}

// ============================================================================
// Handlers
// ============================================================================

/// Register a new account.
///
/// # Example
///
/// ```bash
/// curl -X POST http://localhost:5000/api/users/signup \
///   -H "Content-Type: application/json" \
///   -d '{
///     "name": "Nadia Rahman",
///     "email": "nadia@example.com",
///     "password": "secret1",
///     "phone": "01712345678",
///     "address": "Dhaka",
///     "role": "vendor"
///   }'
/// ```
pub async fn signup(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<SignupRequest>,
) -> Result<(StatusCode, Json<SignupResponse>), AppError> {
    let user = state
        .marketplace
        .register(
            request.name,
            request.email,
            request.password,
            request.phone,
            request.address,
            request.role,
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            message: "User registered successfully",
            user,
        }),
    ))
}

/// Log in and receive a session token.
///
/// # Example
///
/// ```bash
/// curl -X POST http://localhost:5000/api/users/login \
///   -H "Content-Type: application/json" \
///   -d '{"email": "nadia@example.com", "password": "secret1"}'
/// ```
///
/// Response:
/// ```json
/// {
///   "user": { "id": "...", "name": "Nadia Rahman", "role": "vendor", ... },
///   "token": "q3Vb...",
///   "expiresAt": "2025-01-08T00:00:00Z"
/// }
/// ```
pub async fn login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let user = state.marketplace.authenticate(&request.email, &request.password).await?;

    let (token, claims) = state
        .sealer
        .issue(&user, state.marketplace.now())
        .map_err(|e| AppError::internal("Failed to issue session").with_source(e.into()))?;

    tracing::info!(account_id = %user.id, role = %user.role, "Session issued");

    Ok(Json(LoginResponse {
        user,
        token,
        expires_at: claims.expires_at,
    }))
}

/// The caller's own account.
pub async fn me(session: SessionUser) -> Json<Account> {
    Json(session.account)
}

/// List accounts, newest first.
pub async fn list_users(
    session: SessionUser,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListUsersQuery>,
) -> Result<Json<Vec<Account>>, AppError> {
    session.require(Capability::ManageAccounts)?;
    let accounts = state.marketplace.accounts(query.role).await?;
    Ok(Json(accounts))
}

/// Delete an account together with its services, bookings, payments and feedback.
pub async fn delete_user(
    session: SessionUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<AccountId>,
) -> Result<Json<MessageResponse>, AppError> {
    session.require(Capability::ManageAccounts)?;
    state.marketplace.remove_account(id).await?;
    Ok(Json(MessageResponse {
        message: "User deleted successfully",
    }))
}

/// Remove services, bookings and feedback whose owners no longer exist.
pub async fn cleanup_orphaned(
    session: SessionUser,
    State(state): State<AppState>,
) -> Result<Json<CleanupResponse>, AppError> {
    session.require(Capability::ManageAccounts)?;
    let removed = state.marketplace.purge_orphans().await?;
    Ok(Json(CleanupResponse {
        message: "Orphaned records cleaned up successfully",
        removed,
    }))
}
