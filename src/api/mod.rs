//! Insight REST API
//!
//! HTTP API layer for Insight, built with Axum.
//!
//! # Endpoints
//!
//! ## Query
//! - `POST /api/v1/query` - Execute a query
//!
//! ## Datasets
//! - `GET /api/v1/datasets` - List registered datasets
//! - `PUT /api/v1/datasets/:id/:kind` - Register a dataset
//! - `DELETE /api/v1/datasets/:id` - Remove a dataset
//!
//! ## Health
//! - `GET /health/live` - Liveness probe
//! - `GET /health` - Full health status
//!
//! # Example
//!
//! ```rust,ignore
//! use insight::api::{serve, AppState};
//! use insight::config::ApiConfig;
//! use insight::dataset::DatasetStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(DatasetStore::open("./data").await?);
//!     let config = ApiConfig::default();
//!
//!     let state = AppState::new(store, config.clone());
//!     serve(state, &config).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod dto;
pub mod error;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::AppState;

use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::ApiConfig;

/// Build the API router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Query routes
        .route("/query", post(routes::query::execute_query))
        // Dataset routes
        .route("/datasets", get(routes::datasets::list_datasets))
        .route("/datasets/:id/:kind", put(routes::datasets::add_dataset))
        .route(
            "/datasets/:id",
            axum::routing::delete(routes::datasets::remove_dataset),
        );

    let health_routes = Router::new()
        .route("/live", get(routes::health::liveness))
        .route("/", get(routes::health::full_health));

    let cors = if state.config.cors_permissive {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
    };

    let shared_state = Arc::new(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .nest("/health", health_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(shared_state)
}

/// Start the API server
pub async fn serve(state: AppState, config: &ApiConfig) -> Result<(), ApiError> {
    let router = build_router(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to bind {}: {}", addr, e)))?;

    tracing::info!("Insight API listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ApiError::Internal(format!("Server error: {}", e)))?;

    tracing::info!("Insight API shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
