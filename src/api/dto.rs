//! Data Transfer Objects
//!
//! Request and response types for the API endpoints.
//! These types are serialized/deserialized to/from JSON.

use serde::{Deserialize, Serialize};

use crate::query::{QueryOutput, ResultRow};

// ============================================
// QUERY DTOs
// ============================================

/// Query request
#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    /// Query text, e.g. `In courses dataset courses, find all entries; show Average.`
    pub query: String,
    /// Output format: json (default) or csv
    #[serde(default = "default_format")]
    pub format: String,
}

fn default_format() -> String {
    "json".to_string()
}

/// Query response
#[derive(Debug, Serialize)]
pub struct QueryResponse {
    /// Result rows, keys in projection order
    pub result: Vec<ResultRow>,
    /// Query metadata
    pub meta: QueryMeta,
}

/// Query metadata
#[derive(Debug, Serialize)]
pub struct QueryMeta {
    /// Column names in projection order
    pub columns: Vec<String>,
    /// Number of rows returned
    pub row_count: usize,
    /// Number of records in the queried dataset
    pub records_scanned: usize,
    /// Query execution time in milliseconds
    pub execution_time_ms: u64,
}

impl From<QueryOutput> for QueryResponse {
    fn from(output: QueryOutput) -> Self {
        Self {
            meta: QueryMeta {
                columns: output.columns,
                row_count: output.rows.len(),
                records_scanned: output.records_scanned,
                execution_time_ms: output.execution_time_ms,
            },
            result: output.rows,
        }
    }
}

// ============================================
// DATASET DTOs
// ============================================

/// Generic `{"result": ...}` envelope
#[derive(Debug, Serialize)]
pub struct ResultResponse<T> {
    pub result: T,
}

impl<T> ResultResponse<T> {
    pub fn new(result: T) -> Self {
        Self { result }
    }
}

// ============================================
// HEALTH DTOs
// ============================================

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall status: healthy
    pub status: String,
    /// Number of registered datasets
    pub datasets: usize,
    /// Server uptime in seconds
    pub uptime_seconds: u64,
    /// Application version
    pub version: String,
}
