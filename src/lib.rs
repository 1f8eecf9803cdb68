//! # Insight
//!
//! A query engine for a restricted-English language over course section and
//! campus room datasets, with a dataset registry, a CLI and an HTTP API.
//!
//! ## Modules
//!
//! - [`query`]: Clause slicer, parsers, filter compiler and execution engine
//! - [`dataset`]: Record schemas, dataset providers and import
//! - [`config`]: TOML configuration and logging setup
//! - [`api`]: REST API server with Axum
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use insight::dataset::DatasetStore;
//! use insight::query::QueryExecutor;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(DatasetStore::open("./data").await?);
//!     let executor = QueryExecutor::new(store);
//!
//!     let output = executor
//!         .execute_str(
//!             "In courses dataset courses, find entries whose Average is greater than 90; \
//!              show Department and Average; sort in descending order by Average.",
//!         )
//!         .await?;
//!
//!     println!("Found {} sections", output.len());
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod dataset;
pub mod query;

// Re-export top-level types for convenience
pub use query::{parse_query, QueryError, QueryExecutor, QueryOutput, QueryPlan, ResultRow};

pub use dataset::{Dataset, DatasetError, DatasetKind, DatasetProvider, DatasetStore, Records};

pub use api::{build_router, serve, ApiError, AppState};

pub use config::{Config, ConfigError, LoggingConfig};
