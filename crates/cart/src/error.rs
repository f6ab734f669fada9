//! Error taxonomy for the cart engine.
//!
//! Three layers, three types:
//!
//! - [`LocalStoreError`] - local durability failures. Treated as an
//!   environment fault; the engine logs and continues.
//! - [`RemoteStoreError`] - remote store failures. Swallowed on the push
//!   path (the next mutation's debounced push retries with current
//!   state); propagated from the merge path so the caller can retry.
//! - [`CartError`] - the engine-level union returned by fallible
//!   engine operations.

use thiserror::Error;

/// Engine-level error type.
#[derive(Debug, Error)]
pub enum CartError {
    /// Remote store operation failed.
    #[error("remote store error: {0}")]
    Remote(#[from] RemoteStoreError),

    /// Local durable store operation failed.
    #[error("local store error: {0}")]
    Local(#[from] LocalStoreError),
}

/// Errors from the remote authoritative store.
#[derive(Debug, Error)]
pub enum RemoteStoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Stored data could not be mapped back into domain types.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Backend unreachable or rejecting requests.
    #[error("remote store unavailable: {0}")]
    Unavailable(String),
}

/// Errors from the local durable store.
#[derive(Debug, Error)]
pub enum LocalStoreError {
    /// Filesystem operation failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Persisted record could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, CartError>;
