//! Application State
//!
//! Shared state accessible by all API handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.

use std::sync::Arc;
use std::time::Instant;

use crate::config::ApiConfig;
use crate::dataset::DatasetStore;
use crate::query::QueryExecutor;

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// Dataset registry
    pub store: Arc<DatasetStore>,
    /// Query executor reading from the same registry
    pub executor: Arc<QueryExecutor>,
    /// API configuration
    pub config: Arc<ApiConfig>,
    /// Server start time for uptime tracking
    pub start_time: Instant,
}

impl AppState {
    /// Create state whose executor queries `store`
    pub fn new(store: Arc<DatasetStore>, config: ApiConfig) -> Self {
        let executor = Arc::new(QueryExecutor::new(store.clone()));
        Self {
            store,
            executor,
            config: Arc::new(config),
            start_time: Instant::now(),
        }
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
