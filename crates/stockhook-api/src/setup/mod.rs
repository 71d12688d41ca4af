//! Application setup and initialization

pub mod routes;
pub mod server;

use std::sync::Arc;

use anyhow::{Context, Result};
use stockhook_core::Config;
use stockhook_storage::{LocalRecordStore, RecordStore};

use crate::services::IngestionService;
use crate::state::AppState;
use crate::templates::Pages;

/// Build the shared state and the router. Telemetry is initialised by the caller.
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    // Validate configuration first - fail fast on misconfiguration
    config
        .validate()
        .context("Configuration validation failed")?;

    let store = LocalRecordStore::open(&config.data_dir)
        .await
        .with_context(|| format!("Failed to open data directory {}", config.data_dir.display()))?;
    let store: Arc<dyn RecordStore> = Arc::new(store);

    if config.auth_token.is_none() {
        tracing::warn!("No ingestion token configured; webhook deliveries will be refused");
    }

    let pages = Pages::new().context("Failed to compile page templates")?;

    let state = Arc::new(AppState {
        ingestion: IngestionService::new(&config, store.clone()),
        store,
        pages: Arc::new(pages),
        config: Arc::new(config),
    });

    tracing::info!(
        data_dir = %state.config.data_dir.display(),
        max_records = state.config.max_records,
        max_body_bytes = state.config.max_body_bytes,
        "Configuration loaded and validated successfully"
    );

    let router = routes::setup_routes(state.clone());

    Ok((state, router))
}
