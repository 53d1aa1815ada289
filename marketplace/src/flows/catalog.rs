//! Service listings.
//!
//! Only vendors list services. A new listing starts available and keeps a
//! snapshot of the vendor's name. Availability afterwards changes only
//! through the booking and payment flows.

use super::{MarketplaceEnvironment, commit, required};
use crate::error::MarketplaceError;
use crate::store::{UnitOfWork, Write};
use crate::types::{Account, AccountId, Availability, Category, Money, Role, Service, ServiceId};
use utshob_core::{SmallVec, effect::Effect, reducer::Reducer, smallvec};

/// Longest accepted description, in characters
pub const MAX_DESCRIPTION_LEN: usize = 150;

/// Records the catalog flow decides on
#[derive(Clone, Debug, Default)]
pub struct CatalogState {
    /// Account submitting the listing
    pub vendor: Option<Account>,
    /// Result of the command, once settled
    pub outcome: Option<Result<Service, MarketplaceError>>,
}

/// Commands and events of the catalog flow
#[derive(Clone, Debug)]
pub enum CatalogAction {
    /// Create a service listing
    ListService {
        /// Listing vendor
        vendor_id: AccountId,
        /// Business name
        organization_name: String,
        /// Category
        category: Category,
        /// Price per booking
        price: Money,
        /// Short description
        description: String,
        /// Opaque photo reference
        photo: Option<String>,
    },

    /// The listing was stored
    Listed {
        /// Stored listing
        service: Service,
    },

    /// The command was refused
    Rejected {
        /// Reason
        error: MarketplaceError,
    },
}

/// Reducer for service listings
#[derive(Clone, Copy, Debug, Default)]
pub struct CatalogReducer;

impl CatalogReducer {
    /// Returns the vendor name snapshot, trimmed name and trimmed description
    fn validate_listing(
        state: &CatalogState,
        vendor_id: AccountId,
        organization_name: &str,
        price: Money,
        description: &str,
    ) -> Result<(String, String, String), MarketplaceError> {
        let vendor = state
            .vendor
            .as_ref()
            .filter(|v| v.id == vendor_id && v.role == Role::Vendor)
            .ok_or_else(|| MarketplaceError::forbidden("Only vendors can list services"))?;

        let organization_name = required(organization_name, "Organization name")?;
        if price.is_zero() {
            return Err(MarketplaceError::invalid("Price must be greater than 0"));
        }
        let description = description.trim().to_string();
        if description.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(MarketplaceError::invalid(format!(
                "Description must be at most {MAX_DESCRIPTION_LEN} characters"
            )));
        }

        Ok((vendor.name.clone(), organization_name, description))
    }
}

impl Reducer for CatalogReducer {
    type State = CatalogState;
    type Action = CatalogAction;
    type Environment = MarketplaceEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            CatalogAction::ListService {
                vendor_id,
                organization_name,
                category,
                price,
                description,
                photo,
            } => {
                let validated = Self::validate_listing(state, vendor_id, &organization_name, price, &description);

                let (vendor_name, organization_name, description) = match validated {
                    Ok(fields) => fields,
                    Err(error) => {
                        tracing::warn!(%vendor_id, %error, "Service listing rejected");
                        state.outcome = Some(Err(error));
                        return SmallVec::new();
                    },
                };

                let service = Service {
                    id: ServiceId::new(),
                    organization_name,
                    category,
                    price,
                    availability: Availability::Yes,
                    description,
                    vendor_id,
                    vendor_name,
                    photo: photo.filter(|p| !p.trim().is_empty()),
                    created_at: env.clock.now(),
                };

                smallvec![commit(
                    env,
                    UnitOfWork::new().with(Write::InsertService(service.clone())),
                    move || CatalogAction::Listed { service },
                    |err| CatalogAction::Rejected { error: err.into() },
                )]
            },

            CatalogAction::Listed { service } => {
                tracing::info!(service_id = %service.id, vendor_id = %service.vendor_id, "Service listed");
                state.outcome = Some(Ok(service));
                smallvec![Effect::None]
            },

            CatalogAction::Rejected { error } => {
                state.outcome = Some(Err(error));
                smallvec![Effect::None]
            },
        }
    }
}
