//! Error types for storage operations

use std::error::Error;
use std::fmt;

/// Error type for storage operations
#[derive(Debug)]
pub enum StorageError {
    /// Validation error
    Validation(String),

    /// Data not found
    NotFound(String),

    /// Item already exists
    AlreadyExists(String),

    /// Write based on an outdated version
    Conflict(String),

    /// Tenant quota exceeded
    Capacity(String),

    /// Backend-specific error
    Backend(String),

    /// Serialization/deserialization error
    Serialization(String),

    /// Internal error
    Internal(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Validation(msg) => write!(f, "Validation error: {}", msg),
            StorageError::NotFound(msg) => write!(f, "Not found: {}", msg),
            StorageError::AlreadyExists(msg) => write!(f, "Already exists: {}", msg),
            StorageError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            StorageError::Capacity(msg) => write!(f, "Capacity exceeded: {}", msg),
            StorageError::Backend(msg) => write!(f, "Backend error: {}", msg),
            StorageError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            StorageError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl Error for StorageError {}

/// Convert a JSON error to a storage error
impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

// Keep the error category when lifting storage errors into the crate error
impl From<StorageError> for crate::StrataError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Validation(msg) => crate::StrataError::Validation(msg),
            StorageError::NotFound(msg) => crate::StrataError::NotFound(msg),
            StorageError::AlreadyExists(msg) | StorageError::Conflict(msg) => {
                crate::StrataError::Conflict(msg)
            }
            StorageError::Capacity(msg) => crate::StrataError::Capacity(msg),
            other => crate::StrataError::Storage(other.to_string()),
        }
    }
}
