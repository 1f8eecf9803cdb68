//! Dataset error types
//!
//! Defines all errors that can occur while loading, registering or importing datasets.

use thiserror::Error;

/// Errors that can occur in the dataset layer
#[derive(Error, Debug)]
pub enum DatasetError {
    /// No dataset is registered under this id (for the requested kind)
    #[error("Dataset not found: {0}")]
    NotFound(String),

    /// Dataset id failed validation
    #[error("Invalid dataset id '{id}': {reason}")]
    InvalidId { id: String, reason: String },

    /// Dataset kind is not one of the supported kinds
    #[error("Unknown dataset kind: {0}")]
    UnknownKind(String),

    /// Dataset id is already registered
    #[error("Dataset already exists: {0}")]
    AlreadyExists(String),

    /// Import produced no usable records
    #[error("Dataset {0} has no valid records")]
    Empty(String),

    /// Source file could not be imported
    #[error("Import error: {0}")]
    Import(String),

    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for DatasetError {
    fn from(err: serde_json::Error) -> Self {
        DatasetError::Serialization(err.to_string())
    }
}

impl From<csv::Error> for DatasetError {
    fn from(err: csv::Error) -> Self {
        DatasetError::Import(err.to_string())
    }
}

/// Result type alias for dataset operations
pub type DatasetResult<T> = Result<T, DatasetError>;
