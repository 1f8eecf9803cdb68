//! Query error types
//!
//! Defines all error conditions that can occur while compiling or executing a query.
//! The first error aborts the whole query; callers branch on the variant (or its
//! [`QueryError::code`]) to tell a bad query apart from a missing dataset.

use thiserror::Error;

use crate::dataset::{DatasetError, DatasetKind};

/// Errors that can occur during query operations
#[derive(Error, Debug)]
pub enum QueryError {
    /// Clause-shape violation: missing terminator, keyword or clause
    #[error("Invalid syntax: {0}")]
    Syntax(String),

    /// Word is not in the key vocabulary
    #[error("Unknown key: {0}")]
    UnknownKey(String),

    /// Key is valid but belongs to the other dataset kind
    #[error("Key {key} cannot be used with a {kind} dataset")]
    KeyDatasetMismatch { key: String, kind: DatasetKind },

    /// Operator phrase unknown, or not valid for the key's class
    #[error("Invalid operator '{operator}' for key {key}")]
    InvalidOperator { key: String, operator: String },

    /// Operand does not match the key's class or literal grammar
    #[error("Invalid operand: {0}")]
    InvalidOperand(String),

    /// Bad aggregation function, function/key pairing or alias
    #[error("Invalid aggregation: {0}")]
    InvalidAggregation(String),

    /// Sort entry missing from the display list
    #[error("Invalid sort target: {0} is not displayed")]
    InvalidSortTarget(String),

    /// Grouped query displays a key it does not group by
    #[error("Key {0} is displayed but not grouped by")]
    UngroupedKey(String),

    /// Referenced dataset does not exist (for the requested kind)
    #[error("Dataset not found: {0}")]
    DatasetNotFound(String),

    /// Dataset provider failed for another reason
    #[error("Dataset error: {0}")]
    Dataset(DatasetError),

    /// Query execution failed
    #[error("Execution error: {0}")]
    Execution(String),
}

impl QueryError {
    /// Stable machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::Syntax(_) => "SYNTAX_ERROR",
            Self::UnknownKey(_) => "UNKNOWN_KEY",
            Self::KeyDatasetMismatch { .. } => "KEY_DATASET_MISMATCH",
            Self::InvalidOperator { .. } => "INVALID_OPERATOR",
            Self::InvalidOperand(_) => "INVALID_OPERAND",
            Self::InvalidAggregation(_) => "INVALID_AGGREGATION",
            Self::InvalidSortTarget(_) => "INVALID_SORT_TARGET",
            Self::UngroupedKey(_) => "UNGROUPED_KEY",
            Self::DatasetNotFound(_) => "DATASET_NOT_FOUND",
            Self::Dataset(_) => "DATASET_ERROR",
            Self::Execution(_) => "EXECUTION_ERROR",
        }
    }

    pub(crate) fn syntax(message: impl Into<String>) -> Self {
        Self::Syntax(message.into())
    }
}

impl From<DatasetError> for QueryError {
    fn from(err: DatasetError) -> Self {
        match err {
            DatasetError::NotFound(id) => QueryError::DatasetNotFound(id),
            other => QueryError::Dataset(other),
        }
    }
}

/// Result type for query operations
pub type QueryResult<T> = Result<T, QueryError>;
