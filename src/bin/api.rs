//! Insight API Server
//!
//! Run with: cargo run --bin insight-api
//!
//! # Configuration
//!
//! Reads the config file from `INSIGHT_CONFIG`, `~/.config/insight/config.toml`
//! or `./insight.toml`. Environment variables override it:
//! - `INSIGHT_HOST`: Host to bind to (default: 127.0.0.1)
//! - `INSIGHT_PORT`: Port to listen on (default: 4321)
//! - `INSIGHT_DATA_DIR`: Dataset directory
//! - `INSIGHT_LOG_LEVEL`, `INSIGHT_LOG_FORMAT`: Logging
//! - `RUST_LOG`: Overrides the log filter entirely

use anyhow::{Context, Result};
use insight::api::{serve, AppState};
use insight::config::{init_logging, Config};
use insight::dataset::{DatasetProvider, DatasetStore};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    let loaded = Config::load_default();
    init_logging(&loaded.config.logging);
    loaded.report();
    let config = loaded.config;

    tracing::info!("Starting Insight API server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Data directory: {}", config.storage.data_dir);

    let store = DatasetStore::open(&config.storage.data_dir)
        .await
        .with_context(|| format!("Failed to open data directory {}", config.storage.data_dir))?;
    tracing::info!("Loaded {} datasets", store.list_datasets().await.len());

    let state = AppState::new(Arc::new(store), config.api.clone());
    serve(state, &config.api).await?;

    tracing::info!("Insight API server stopped");
    Ok(())
}
