//! Application state for the marketplace HTTP server.

use crate::app::Marketplace;
use crate::auth::SessionSealer;
use crate::store::MarketplaceStore;
use axum::extract::FromRef;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use utshob_web::handlers::ReadinessProbe;

/// Application state shared across all HTTP handlers.
///
/// Cloned per request; every field is a shared handle.
#[derive(Clone)]
pub struct AppState {
    /// Commands and queries
    pub marketplace: Arc<Marketplace>,
    /// Issues and opens session tokens
    pub sealer: SessionSealer,
    /// Backs the readiness endpoint
    pub probe: Arc<dyn ReadinessProbe>,
}

impl AppState {
    /// Create the state, probing readiness through the marketplace store.
    #[must_use]
    pub fn new(marketplace: Arc<Marketplace>, sealer: SessionSealer, component: &'static str) -> Self {
        let probe = Arc::new(StoreProbe {
            store: Arc::clone(marketplace.store()),
            component,
        });
        Self {
            marketplace,
            sealer,
            probe,
        }
    }
}

impl FromRef<AppState> for Arc<dyn ReadinessProbe> {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.probe)
    }
}

/// Readiness through [`MarketplaceStore::ping`]
struct StoreProbe {
    store: Arc<dyn MarketplaceStore>,
    component: &'static str,
}

impl ReadinessProbe for StoreProbe {
    fn component(&self) -> &'static str {
        self.component
    }

    fn check(&self) -> Pin<Box<dyn Future<Output = Result<(), String>> + Send + '_>> {
        Box::pin(async move { self.store.ping().await.map_err(|e| e.to_string()) })
    }
}
