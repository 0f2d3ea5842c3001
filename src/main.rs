//! Department site backend binary.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use deptsite_backend::auth::{SessionRegistry, StaticAuthProvider};
use deptsite_backend::config::Config;
use deptsite_backend::store::{LocalBlobStore, SqliteStore};
use deptsite_backend::sync::SiteSync;
use deptsite_backend::{create_router, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting department site backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Storage dir: {:?}", config.storage_dir);
    tracing::info!("Public URL: {}", config.public_url);
    tracing::info!("Bind address: {}", config.bind_addr);

    // Warn if nobody can log in
    let provider = StaticAuthProvider::new(&config.admin_users);
    if provider.is_empty() {
        tracing::warn!("No admin users configured (CMS_ADMIN_USERS). The admin API is unreachable!");
    }
    let sessions = Arc::new(SessionRegistry::new(Arc::new(provider)));

    // Initialize stores
    let store = Arc::new(SqliteStore::open(&config.db_path).await?);
    let blobs = Arc::new(LocalBlobStore::new(&config.storage_dir, &config.public_url));

    // Mount sync hooks
    let site = Arc::new(SiteSync::new(store, blobs));
    for (hook, err) in site.mount().await {
        tracing::error!(hook, error = %err, "Initial load failed");
    }
    tracing::info!("Sync hooks mounted");

    // Create application state
    let state = AppState {
        site,
        sessions,
        config: Arc::new(config.clone()),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
