//! Error types for the record store and the collection API.

use crate::types::FieldType;
use thiserror::Error;

/// Main error type for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Invalid collection format: {0}")]
    InvalidFormat(String),

    #[error("Conflict: {0}")]
    Conflict(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        if e.is_io() {
            StoreError::Io(e.into())
        } else if e.is_syntax() || e.is_eof() {
            StoreError::Deserialization(e.to_string())
        } else {
            StoreError::Serialization(e.to_string())
        }
    }
}

impl From<serde_yaml::Error> for StoreError {
    fn from(e: serde_yaml::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

impl From<tempfile::PersistError> for StoreError {
    fn from(e: tempfile::PersistError) -> Self {
        StoreError::Io(e.error)
    }
}

/// A candidate record does not match the inferred schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("field '{field}' expected {expected}, got {found}")]
    TypeMismatch {
        field: String,
        expected: FieldType,
        /// Kind name of the offending value, e.g. `null`.
        found: &'static str,
    },

    #[error("request body must be a JSON object")]
    NotAnObject,
}

/// Errors surfaced by a collection API or the router in front of it.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Item not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    #[error("Unknown collection: {0}")]
    UnknownCollection(String),

    #[error("No route for {0}")]
    UnknownRoute(String),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl ApiError {
    /// HTTP-equivalent status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::NotFound { .. }
            | ApiError::UnknownCollection(_)
            | ApiError::UnknownRoute(_) => 404,
            ApiError::Validation(_) | ApiError::BadRequest(_) => 400,
            ApiError::MethodNotAllowed(_) => 405,
            ApiError::Storage(StoreError::Conflict(_)) => 409,
            ApiError::Storage(_) => 500,
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Result type for collection API operations.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
