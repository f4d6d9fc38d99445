//! Unified error handling for the storefront client.
//!
//! Component-specific taxonomies (`AuthError`, `CartError`, `StorageError`)
//! fold into a single `ApiError` that every async operation returns.

use reqwest::StatusCode;
use thiserror::Error;

use crate::auth::AuthError;
use crate::cart::CartError;
use crate::storage::StorageError;

/// Application-level error type for the storefront client.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Network or protocol failure talking to the backend. Not retried by
    /// this client beyond the single auth-triggered retry.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Cart operation failed.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Local persistence failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// The backend rejected an unauthenticated request (HTTP 401 with no
    /// session to refresh).
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Any other non-success response, surfaced verbatim to the caller.
    #[error("Backend error ({status}): {message}")]
    Status {
        /// HTTP status returned by the backend.
        status: StatusCode,
        /// Message from the backend's `error` body field.
        message: String,
    },

    /// Request body could not be serialized.
    #[error("Encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Result type alias for `ApiError`.
pub type Result<T> = std::result::Result<T, ApiError>;
