//! HTTP server for the marketplace.
//!
//! - Application state shared by handlers
//! - Router with the `/api` surface, health checks and layers
//! - Graceful shutdown on Ctrl+C or SIGTERM

pub mod routes;
pub mod state;

pub use routes::{build_router, cors_layer, metrics_router};
pub use state::AppState;

use tokio::signal;

/// Resolve when the process is asked to stop.
///
/// A signal handler that cannot be installed is logged and treated as never
/// firing, so the other one still works.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            },
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, shutting down gracefully...");
        },
        () = terminate => {
            tracing::info!("Received SIGTERM signal, shutting down gracefully...");
        },
    }
}
