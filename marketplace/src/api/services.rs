//! Service catalog API endpoints.
//!
//! - GET /api/services?category=&vendorId=&available= - Browse listings
//! - GET /api/services/:id - One listing
//! - POST /api/services - List a new service (vendors)

#![allow(clippy::missing_errors_doc)]

use crate::auth::{Capability, SessionUser};
use crate::server::state::AppState;
use crate::store::ServiceFilter;
use crate::types::{AccountId, Availability, Category, Money, Service, ServiceId};
use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;
use utshob_web::{ApiJson, ApiPath, ApiQuery, AppError};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Catalog browse filters.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowseQuery {
    /// Only this category
    pub category: Option<Category>,
    /// Only this vendor's listings
    pub vendor_id: Option<AccountId>,
    /// Only listings with this availability
    pub available: Option<Availability>,
}

impl From<BrowseQuery> for ServiceFilter {
    fn from(query: BrowseQuery) -> Self {
        Self {
            category: query.category,
            vendor_id: query.vendor_id,
            availability: query.available,
        }
    }
}

/// Request to list a service.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateServiceRequest {
    /// Business name shown to customers
    #[serde(default)]
    pub organization_name: String,
    /// Category
    pub category: Category,
    /// Price in whole units
    pub price: Money,
    /// Short description
    #[serde(default)]
    pub description: String,
    /// Photo reference
    pub photo: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Browse listings.
///
/// # Example
///
/// ```bash
/// curl "http://localhost:5000/api/services?category=Photography&available=Yes"
/// ```
pub async fn list_services(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<BrowseQuery>,
) -> Result<Json<Vec<Service>>, AppError> {
    let services = state.marketplace.services(query.into()).await?;
    Ok(Json(services))
}

/// One listing by id.
pub async fn get_service(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ServiceId>,
) -> Result<Json<Service>, AppError> {
    Ok(Json(state.marketplace.service(id).await?))
}

/// List a new service under the caller's vendor account.
///
/// # Example
///
/// ```bash
/// curl -X POST http://localhost:5000/api/services \
///   -H "Authorization: Bearer <session_token>" \
///   -H "Content-Type: application/json" \
///   -d '{
///     "organizationName": "Shutter Stories",
///     "category": "Photography",
///     "price": 5000,
///     "description": "Full-day wedding coverage"
///   }'
/// ```
pub async fn create_service(
    session: SessionUser,
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreateServiceRequest>,
) -> Result<(StatusCode, Json<Service>), AppError> {
    let vendor_id = session.require(Capability::ListServices)?;

    let service = state
        .marketplace
        .list_service(
            vendor_id,
            request.organization_name,
            request.category,
            request.price,
            request.description,
            request.photo,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(service)))
}
