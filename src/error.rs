//! Store error types

use thiserror::Error;

use crate::metric::MetricKind;

/// Result alias used throughout the store
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors returned by the repository and the backup manager
#[derive(Debug, Error)]
pub enum StoreError {
    /// Malformed value, unknown kind or empty name
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// A name was already stored under the other kind
    #[error("metric {name:?} is a {stored}, not a {requested}")]
    KindMismatch {
        name: String,
        stored: MetricKind,
        requested: MetricKind,
    },

    /// No metric with this identity
    #[error("{kind} {name:?} not found")]
    NotFound { kind: MetricKind, name: String },

    /// The durable sink could not be read or written
    #[error("persistence unavailable: {0}")]
    PersistenceUnavailable(#[from] std::io::Error),

    /// The observer is already subscribed
    #[error("observer already registered")]
    AlreadyRegistered,
}

impl StoreError {
    /// HTTP status line used by the API layer
    pub fn status(&self) -> &'static str {
        match self {
            StoreError::InvalidValue(_) => "400 Bad Request",
            StoreError::KindMismatch { .. } => "409 Conflict",
            StoreError::NotFound { .. } => "404 Not Found",
            StoreError::PersistenceUnavailable(_) | StoreError::AlreadyRegistered => {
                "500 Internal Server Error"
            }
        }
    }
}
