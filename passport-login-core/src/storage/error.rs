//! Error types for snapshot storage backends.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors raised by snapshot storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The snapshot could not be read.
    #[error("snapshot read error: {0}")]
    Read(String),

    /// The snapshot could not be written.
    #[error("snapshot write error: {0}")]
    Write(String),

    /// The snapshot could not be removed.
    #[error("snapshot delete error: {0}")]
    Delete(String),

    /// A lock guarding the backend was poisoned.
    #[error("storage lock error: {0}")]
    Lock(String),

    /// A state could not be encoded for persistence.
    #[error("serialization error: {0}")]
    Serialization(String),
}
