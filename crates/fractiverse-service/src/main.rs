//! FractiVerse Service - HTTP API for the token ledger
//!
//! This is the main entry point for the fractiverse service.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fractiverse_service::{create_router, AppState, ServiceConfig};
use fractiverse_store::{MemoryStore, PgStore, Store};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,fractiverse=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting FractiVerse Service");

    let config = ServiceConfig::from_env();

    tracing::info!(
        listen_addr = %config.listen_addr,
        database_configured = %config.database_url.is_some(),
        auth_configured = %config.auth_jwt_secret.is_some(),
        stripe_configured = %config.stripe_api_key.is_some(),
        webhook_configured = %config.stripe_webhook_secret.is_some(),
        "Service configuration loaded"
    );

    // One store handle for the process; the pool lives until shutdown.
    let mut pg_store: Option<Arc<PgStore>> = None;
    let store: Arc<dyn Store> = if let Some(url) = &config.database_url {
        tracing::info!(
            max_connections = config.database_max_connections,
            "Connecting to PostgreSQL"
        );
        let pg = Arc::new(PgStore::connect(url, config.database_max_connections).await?);
        pg_store = Some(Arc::clone(&pg));
        pg
    } else {
        open_fallback_store(&config)?
    };

    let state = AppState::new(store, config.clone());
    let app = create_router(state);

    tracing::info!(listen_addr = %config.listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(pg) = pg_store {
        pg.close().await;
    }
    tracing::info!("Server stopped");

    Ok(())
}

#[cfg(feature = "rocksdb-backend")]
fn open_fallback_store(
    config: &ServiceConfig,
) -> Result<Arc<dyn Store>, Box<dyn std::error::Error>> {
    if let Some(data_dir) = &config.data_dir {
        tracing::info!(path = %data_dir, "Opening RocksDB store");
        return Ok(Arc::new(fractiverse_store::RocksStore::open(data_dir)?));
    }
    Ok(memory_store())
}

#[cfg(not(feature = "rocksdb-backend"))]
#[allow(clippy::unnecessary_wraps)]
fn open_fallback_store(
    _config: &ServiceConfig,
) -> Result<Arc<dyn Store>, Box<dyn std::error::Error>> {
    Ok(memory_store())
}

fn memory_store() -> Arc<dyn Store> {
    tracing::warn!("DATABASE_URL not set - using in-memory store, balances will not survive a restart");
    Arc::new(MemoryStore::new())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}
