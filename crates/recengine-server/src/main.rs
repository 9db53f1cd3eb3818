//! RecEngine Server
//!
//! Main entry point for the RecEngine recommendation engine.
//!
//! ## Overview
//! The server loads the namespace catalog, starts one storage actor per
//! namespace and exposes the REST API: namespace management, profile
//! mutations, similar-profile search and item recommendations.
//!
//! ## Configuration
//! All configuration is done via environment variables:
//! - `REC_HOST`: bind host (default: localhost)
//! - `REC_PORT`: bind port (default: 8080)
//! - `REC_PATH`: data directory holding `namespaces.json` and the per-
//!   namespace `.recdb`/`.recidx`/`.recdelta` files (default: current
//!   directory)
//!
//! ## Logging
//! Controlled via the `RUST_LOG` environment variable (default: `info`):
//! ```bash
//! RUST_LOG=debug cargo run -p recengine-server
//! ```
//!
//! ## Shutdown
//! SIGINT and SIGTERM trigger graceful shutdown: the listener stops, every
//! namespace actor drains its inbox, flushes and unlocks its files, bounded
//! by a 5-second drain timeout. The process exits nonzero when the catalog
//! can't be loaded or the listener can't bind.

use std::path::PathBuf;
use std::sync::Arc;

use recengine_api::{create_router, shutdown_signal, AppState, DRAIN_TIMEOUT};
use recengine_metadata::JsonCatalogStore;
use recengine_storage::{NamespaceRegistry, StorageConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let host = std::env::var("REC_HOST").unwrap_or_else(|_| "localhost".to_string());
    let port: u16 = std::env::var("REC_PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse()?;
    let data_dir = PathBuf::from(std::env::var("REC_PATH").unwrap_or_else(|_| ".".to_string()));

    tracing::info!(path = %data_dir.display(), "loading namespace catalog");
    let catalog = Arc::new(JsonCatalogStore::new(&data_dir));
    let registry = Arc::new(
        NamespaceRegistry::load(catalog, data_dir, StorageConfig::default()).await?,
    );

    let router = create_router(AppState {
        registry: registry.clone(),
    });

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "RecEngine server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Drain the namespace actors so every file unlocks cleanly.
    tracing::info!("draining namespaces");
    if tokio::time::timeout(DRAIN_TIMEOUT, registry.shutdown())
        .await
        .is_err()
    {
        tracing::error!("shutdown drain timed out");
    }

    tracing::info!("RecEngine server shut down gracefully");
    Ok(())
}
