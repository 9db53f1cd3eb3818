//! Graceful Shutdown
//!
//! SIGINT/SIGTERM handling for the API server. The signal future resolves
//! once either signal arrives; the server then stops accepting connections,
//! lets in-flight requests finish and drains the namespace actors, bounded
//! by [`DRAIN_TIMEOUT`].

use std::time::Duration;

/// How long shutdown waits for namespace actors to flush and close.
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Resolves when the process receives SIGINT (Ctrl+C) or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("received SIGINT, initiating graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("received SIGTERM, initiating graceful shutdown");
        },
    }
}
