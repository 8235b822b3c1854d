// Main entry point - Dependency injection and server setup
mod domain;
mod application;
mod infrastructure;
mod presentation;

use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::application::session::{BackendConnector, ConnectionContext};
use crate::infrastructure::config::{load_settings, Backend};
use crate::infrastructure::config_file::FileConfigSource;
use crate::infrastructure::firebase_store::FirebaseConnector;
use crate::infrastructure::memory_store::MemoryConnector;
use crate::presentation::app_state::AppState;
use crate::presentation::auth::TokenTable;
use crate::presentation::routes::router;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let settings = load_settings()?;

    // Backend sessions (infrastructure layer)
    let connector: Arc<dyn BackendConnector> = match settings.store.backend {
        Backend::Firebase => Arc::new(FirebaseConnector {
            auth_token: settings.store.auth_token.clone(),
            request_timeout: settings.store.request_timeout(),
        }),
        Backend::Memory => Arc::new(MemoryConnector::default()),
    };
    let configs = Arc::new(FileConfigSource::new(settings.store.config_path.clone()));

    // Connection context (application layer)
    let connection = Arc::new(ConnectionContext::new(configs, connector));
    match connection.check_connection().await {
        Ok(()) => tracing::info!("Initial connection check succeeded"),
        Err(e) => tracing::warn!("Starting disconnected: {}", e),
    }

    // Create application state
    let state = Arc::new(AppState {
        connection: connection.clone(),
        tokens: TokenTable::new(settings.auth.tokens.clone()),
    });

    // Build router (presentation layer)
    let app = router()
        .with_state(state)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&settings.server.bind).await?;
    tracing::info!("Starting modbus-dashboard service on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await?;

    connection.disconnect().await;
    Ok(())
}
