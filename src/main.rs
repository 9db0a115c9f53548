//! Trips server binary

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use trips::api::{create_router, AppState};
use trips::config::{AppConfig, LogFormat};
use trips::database::TripDatabase;
use trips::ingest::TripIngestor;
use trips::query::WeeklyAverageExecutor;
use trips::storage::{create_storage, StorageBackend, StorageFileStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("failed to load configuration")?;

    init_tracing(&config)?;

    let storage_config = config
        .storage_runtime()
        .context("invalid storage configuration")?;
    let storage: Arc<dyn StorageBackend> = Arc::from(create_storage(storage_config).await?);

    let database = Arc::new(TripDatabase::new(storage.clone(), config.database.table.clone()));
    let manifest = database
        .manifest()
        .await
        .context("failed to read trip table manifest")?;
    tracing::info!(
        table = %database.table(),
        segments = manifest.stats.segment_count,
        trips = manifest.stats.total_trips,
        "Opened trip table"
    );

    let state = AppState::new(
        Arc::new(StorageFileStore::new(storage.clone())),
        Arc::new(TripIngestor::new(storage.clone(), database.clone())),
        Arc::new(WeeklyAverageExecutor::new(database)),
    )
    .with_upload_folder(config.upload.folder.clone())
    .with_max_upload_bytes(config.server.max_upload_bytes);

    let router = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;
    tracing::info!(%addr, "Listening for HTTP traffic");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutting down");
}

fn init_tracing(config: &AppConfig) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.logging.level.clone()))
        .unwrap_or_else(|_| EnvFilter::new("trips=info,tower_http=info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    match config.logging.format {
        LogFormat::Json => {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        LogFormat::Text => {
            registry.with(tracing_subscriber::fmt::layer()).init();
        }
    }

    Ok(())
}
