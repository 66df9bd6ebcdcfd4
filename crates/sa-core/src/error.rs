//! # AppError
//!
//! Centralized error handling for the shelter-admin core.
//! Maps store and domain failures to the three kinds the UI acts on.

use thiserror::Error;

use crate::traits::StoreError;

/// The primary error type for all sa-core operations.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (e.g., Role, Notification, User)
    #[error("{0} not found with ID {1}")]
    NotFound(String, String),

    /// User-correctable input problem (empty role name, malformed email, ...)
    #[error("validation error: {0}")]
    ValidationError(String),

    /// Caller lacks the capability, or the target is protected
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Query or write failure against the document store
    #[error("persistence error: {0}")]
    Persistence(String),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::ValidationError(msg.into())
    }

    pub fn denied(msg: impl Into<String>) -> Self {
        AppError::PermissionDenied(msg.into())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { collection, id } => AppError::NotFound(collection, id),
            other => {
                log::error!("document store failure: {other}");
                AppError::Persistence(other.to_string())
            }
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        log::error!("record (de)serialization failure: {err}");
        AppError::Persistence(err.to_string())
    }
}

/// A specialized Result type for shelter-admin logic.
pub type Result<T> = std::result::Result<T, AppError>;
