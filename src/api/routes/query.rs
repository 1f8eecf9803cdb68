//! Query Routes
//!
//! - POST /api/v1/query - Compile and execute a query

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use crate::api::dto::{QueryRequest, QueryResponse};
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::query::QueryOutput;

/// POST /api/v1/query
///
/// Execute a query and return its rows.
pub async fn execute_query(
    State(state): State<Arc<AppState>>,
    Json(req): Json<QueryRequest>,
) -> ApiResult<Response> {
    if req.query.trim().is_empty() {
        return Err(ApiError::Validation("query cannot be empty".to_string()));
    }

    let output = state.executor.execute_str(&req.query).await?;

    match req.format.to_lowercase().as_str() {
        "json" => Ok((StatusCode::OK, Json(QueryResponse::from(output))).into_response()),
        "csv" => format_csv_response(&output),
        other => Err(ApiError::Validation(format!(
            "unsupported format '{}', expected json or csv",
            other
        ))),
    }
}

/// Format response as CSV
fn format_csv_response(output: &QueryOutput) -> ApiResult<Response> {
    let mut buf = Vec::new();
    output
        .write_csv(&mut buf)
        .map_err(|e| ApiError::Internal(format!("CSV encoding failed: {}", e)))?;

    Ok((StatusCode::OK, [(header::CONTENT_TYPE, "text/csv")], buf).into_response())
}
