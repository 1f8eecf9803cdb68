//! API Error Types
//!
//! Defines error types for the API layer and implements conversion
//! to HTTP responses with appropriate status codes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::dataset::DatasetError;
use crate::query::QueryError;

/// API error types
#[derive(Error, Debug)]
pub enum ApiError {
    /// Request validation failed
    #[error("Validation error: {0}")]
    Validation(String),

    /// Query compilation or execution error
    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    /// Dataset registry error
    #[error("Dataset error: {0}")]
    Dataset(#[from] DatasetError),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// HTTP status and machine-readable code for this error
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            ApiError::Query(QueryError::DatasetNotFound(_)) => {
                (StatusCode::NOT_FOUND, "DATASET_NOT_FOUND")
            }
            ApiError::Query(e @ (QueryError::Dataset(_) | QueryError::Execution(_))) => {
                (StatusCode::INTERNAL_SERVER_ERROR, e.code())
            }
            ApiError::Query(e) => (StatusCode::BAD_REQUEST, e.code()),
            ApiError::Dataset(e) => dataset_status(e),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

fn dataset_status(err: &DatasetError) -> (StatusCode, &'static str) {
    match err {
        DatasetError::NotFound(_) => (StatusCode::NOT_FOUND, "DATASET_NOT_FOUND"),
        DatasetError::InvalidId { .. } => (StatusCode::BAD_REQUEST, "INVALID_DATASET_ID"),
        DatasetError::UnknownKind(_) => (StatusCode::BAD_REQUEST, "UNKNOWN_DATASET_KIND"),
        DatasetError::AlreadyExists(_) => (StatusCode::BAD_REQUEST, "DATASET_EXISTS"),
        DatasetError::Empty(_) => (StatusCode::BAD_REQUEST, "EMPTY_DATASET"),
        DatasetError::Import(_) | DatasetError::Serialization(_) => {
            (StatusCode::BAD_REQUEST, "INVALID_RECORDS")
        }
        DatasetError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
    }
}

/// Error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
    pub request_id: String,
}

/// Error details
#[derive(Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let request_id = uuid::Uuid::new_v4().to_string();

        tracing::error!(
            request_id = %request_id,
            error_code = %code,
            error_message = %self,
            "API error occurred"
        );

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message: self.to_string(),
            },
            request_id,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;
