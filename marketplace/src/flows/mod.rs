//! Marketplace flows, each written as a reducer.
//!
//! A flow receives the records it needs preloaded in its state, validates
//! the command, and describes the resulting writes as a single
//! [`UnitOfWork`] committed by an [`Effect::Future`]. The commit result comes
//! back as an event action that settles `state.outcome`.
//!
//! | Flow       | Commands                                         |
//! |------------|--------------------------------------------------|
//! | accounts   | register, remove                                 |
//! | catalog    | list service                                     |
//! | booking    | create, update status, update payment status     |
//! | payment    | process payment                                  |
//! | feedback   | submit rating, submit review                     |

use crate::store::{MarketplaceStore, StoreError, UnitOfWork};
use std::sync::Arc;
use utshob_core::effect::Effect;
use utshob_core::environment::Clock;

pub mod accounts;
pub mod booking;
pub mod catalog;
pub mod feedback;
pub mod payment;

/// Dependencies shared by every flow
#[derive(Clone)]
pub struct MarketplaceEnvironment {
    /// Time source for record timestamps
    pub clock: Arc<dyn Clock>,
    /// Persistence
    pub store: Arc<dyn MarketplaceStore>,
}

impl MarketplaceEnvironment {
    /// Creates a new environment
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, store: Arc<dyn MarketplaceStore>) -> Self {
        Self { clock, store }
    }
}

/// Commit `unit` and turn the result into a feedback action.
pub(crate) fn commit<A, S, F>(
    env: &MarketplaceEnvironment,
    unit: UnitOfWork,
    on_success: S,
    on_failure: F,
) -> Effect<A>
where
    A: Send + 'static,
    S: FnOnce() -> A + Send + 'static,
    F: FnOnce(StoreError) -> A + Send + 'static,
{
    let store = Arc::clone(&env.store);
    Effect::future(async move {
        match store.commit(unit).await {
            Ok(()) => Some(on_success()),
            Err(err) => Some(on_failure(err)),
        }
    })
}

/// Required text field: trimmed, non-empty.
pub(crate) fn required(value: &str, field: &str) -> Result<String, crate::error::MarketplaceError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(crate::error::MarketplaceError::invalid(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}
