//! Ratings and reviews.
//!
//! Both are keyed by (customer, service) but behave differently on a repeat
//! submission: a rating is replaced in place and keeps its id, a second
//! review is refused. Range checking of rating values is left to storage.

use super::{MarketplaceEnvironment, commit};
use crate::error::MarketplaceError;
use crate::store::{DUPLICATE_REVIEW_MESSAGE, StoreError, UnitOfWork, Write};
use crate::types::{Account, AccountId, Rating, RatingId, Review, ReviewId, Service, ServiceId};
use serde::Serialize;
use utshob_core::{SmallVec, effect::Effect, reducer::Reducer, smallvec};

// ============================================================================
// Vendor aggregate
// ============================================================================

/// Average rating of a vendor, recomputed from all of its ratings
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorRatingSummary {
    /// Mean rounded to one decimal, `0` without ratings
    pub average_rating: f64,
    /// Number of ratings
    pub total_ratings: usize,
    /// The ratings themselves
    pub ratings: Vec<Rating>,
}

impl VendorRatingSummary {
    /// Aggregate a vendor's ratings
    #[must_use]
    pub fn from_ratings(ratings: Vec<Rating>) -> Self {
        Self {
            average_rating: average(ratings.iter().map(|r| r.rating)),
            total_ratings: ratings.len(),
            ratings,
        }
    }
}

/// Arithmetic mean rounded to one decimal; `0.0` for no values
#[must_use]
#[allow(clippy::cast_precision_loss)] // counts and sums stay far below 2^52
pub fn average(values: impl IntoIterator<Item = i32>) -> f64 {
    let (sum, count) = values
        .into_iter()
        .fold((0_i64, 0_u64), |(sum, count), v| (sum + i64::from(v), count + 1));
    if count == 0 {
        return 0.0;
    }
    let mean = sum as f64 / count as f64;
    (mean * 10.0).round() / 10.0
}

// ============================================================================
// State and actions
// ============================================================================

/// A stored piece of feedback
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Feedback {
    /// A rating, with whether it replaced an earlier one
    Rating {
        /// Stored rating
        rating: Rating,
        /// An earlier rating for the pair was replaced
        updated: bool,
    },
    /// A new review
    Review(Review),
}

/// Records the feedback flow decides on
#[derive(Clone, Debug, Default)]
pub struct FeedbackState {
    /// Submitting customer
    pub customer: Option<Account>,
    /// Service the feedback is about
    pub service: Option<Service>,
    /// Vendor of the service
    pub vendor: Option<Account>,
    /// Earlier rating for the (customer, service) pair
    pub existing_rating: Option<Rating>,
    /// Earlier review for the (customer, service) pair
    pub existing_review: Option<Review>,
    /// Result of the command, once settled
    pub outcome: Option<Result<Feedback, MarketplaceError>>,
}

/// Commands and events of the feedback flow
#[derive(Clone, Debug)]
pub enum FeedbackAction {
    // Commands
    /// Rate a service, replacing an earlier rating
    SubmitRating {
        /// Rating customer
        customer_id: AccountId,
        /// Rated service
        service_id: ServiceId,
        /// Vendor of the service
        vendor_id: AccountId,
        /// Stars, 1 to 5
        rating: i32,
    },

    /// Review a service once
    SubmitReview {
        /// Reviewing customer
        customer_id: AccountId,
        /// Reviewed service
        service_id: ServiceId,
        /// Vendor of the service
        vendor_id: AccountId,
        /// Review text
        comment: String,
    },

    // Events
    /// Feedback was stored
    FeedbackStored {
        /// What was stored
        feedback: Feedback,
    },

    /// The command was refused
    FeedbackRejected {
        /// Reason
        error: MarketplaceError,
    },
}

// ============================================================================
// Reducer
// ============================================================================

/// Reducer for ratings and reviews
#[derive(Clone, Copy, Debug, Default)]
pub struct FeedbackReducer;

/// Name snapshots taken into a rating or review
struct Parties {
    customer_name: String,
    vendor_name: String,
    service_name: String,
}

impl FeedbackReducer {
    fn resolve_parties(
        state: &FeedbackState,
        customer_id: AccountId,
        service_id: ServiceId,
        vendor_id: AccountId,
    ) -> Result<Parties, MarketplaceError> {
        let customer = state
            .customer
            .as_ref()
            .filter(|c| c.id == customer_id)
            .ok_or_else(|| MarketplaceError::not_found("Customer", customer_id))?;
        let service = state
            .service
            .as_ref()
            .filter(|s| s.id == service_id)
            .ok_or_else(|| MarketplaceError::not_found("Service", service_id))?;
        let vendor = state
            .vendor
            .as_ref()
            .filter(|v| v.id == vendor_id && service.vendor_id == vendor_id)
            .ok_or_else(|| MarketplaceError::not_found("Vendor", vendor_id))?;

        Ok(Parties {
            customer_name: customer.name.clone(),
            vendor_name: vendor.name.clone(),
            service_name: service.organization_name.clone(),
        })
    }

    fn reject(state: &mut FeedbackState, error: MarketplaceError) -> SmallVec<[Effect<FeedbackAction>; 4]> {
        tracing::warn!(%error, "Feedback rejected");
        state.outcome = Some(Err(error));
        SmallVec::new()
    }
}

impl Reducer for FeedbackReducer {
    type State = FeedbackState;
    type Action = FeedbackAction;
    type Environment = MarketplaceEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            FeedbackAction::SubmitRating {
                customer_id,
                service_id,
                vendor_id,
                rating,
            } => {
                let parties = match Self::resolve_parties(state, customer_id, service_id, vendor_id) {
                    Ok(parties) => parties,
                    Err(error) => return Self::reject(state, error),
                };

                let existing = state.existing_rating.as_ref();
                let updated = existing.is_some();
                let rating = Rating {
                    id: existing.map_or_else(RatingId::new, |r| r.id),
                    customer_id,
                    customer_name: parties.customer_name,
                    vendor_id,
                    vendor_name: parties.vendor_name,
                    service_id,
                    service_name: parties.service_name,
                    rating,
                    rating_date: env.clock.now(),
                };

                smallvec![commit(
                    env,
                    UnitOfWork::new().with(Write::UpsertRating(rating.clone())),
                    move || FeedbackAction::FeedbackStored {
                        feedback: Feedback::Rating { rating, updated },
                    },
                    |err| FeedbackAction::FeedbackRejected { error: err.into() },
                )]
            },

            FeedbackAction::SubmitReview {
                customer_id,
                service_id,
                vendor_id,
                comment,
            } => {
                let parties = match Self::resolve_parties(state, customer_id, service_id, vendor_id) {
                    Ok(parties) => parties,
                    Err(error) => return Self::reject(state, error),
                };
                let comment = comment.trim();
                if comment.is_empty() {
                    return Self::reject(state, MarketplaceError::invalid("Comment is required"));
                }
                if state.existing_review.is_some() {
                    return Self::reject(state, MarketplaceError::Duplicate(DUPLICATE_REVIEW_MESSAGE.into()));
                }

                let review = Review {
                    id: ReviewId::new(),
                    customer_id,
                    customer_name: parties.customer_name,
                    vendor_id,
                    vendor_name: parties.vendor_name,
                    service_id,
                    service_name: parties.service_name,
                    comment: comment.to_string(),
                    review_date: env.clock.now(),
                };

                smallvec![commit(
                    env,
                    UnitOfWork::new().with(Write::InsertReview(review.clone())),
                    move || FeedbackAction::FeedbackStored {
                        feedback: Feedback::Review(review),
                    },
                    |err| FeedbackAction::FeedbackRejected {
                        error: match err {
                            StoreError::Duplicate(_) => MarketplaceError::Duplicate(DUPLICATE_REVIEW_MESSAGE.into()),
                            other => other.into(),
                        },
                    },
                )]
            },

            FeedbackAction::FeedbackStored { feedback } => {
                match &feedback {
                    Feedback::Rating { rating, updated } => {
                        tracing::info!(
                            rating_id = %rating.id,
                            vendor_id = %rating.vendor_id,
                            value = rating.rating,
                            updated,
                            "Rating stored"
                        );
                    },
                    Feedback::Review(review) => {
                        tracing::info!(review_id = %review.id, vendor_id = %review.vendor_id, "Review stored");
                    },
                }
                state.outcome = Some(Ok(feedback));
                smallvec![Effect::None]
            },

            FeedbackAction::FeedbackRejected { error } => Self::reject(state, error),
        }
    }
}
