//! Error types for calcboard-core

use thiserror::Error;

/// Main error type for the calcboard-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Fewer than two inputs, or otherwise malformed inputs
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Operation tag outside the supported set
    #[error("unsupported calculation type: {0}")]
    UnsupportedOperation(String),

    /// A divisor at index >= 1 was exactly zero
    #[error("cannot divide by zero")]
    DivisionByZero,

    /// Page number below 1
    #[error("page number must be >= 1 (got {0})")]
    InvalidPage(i64),

    /// Page size outside 1..=100
    #[error("page size must be between 1 and 100 (got {0})")]
    InvalidPageSize(i64),

    /// Malformed record identifier
    #[error("invalid calculation id format: {0}")]
    InvalidId(String),

    /// Record missing or owned by another user.
    ///
    /// Both cases produce the same error so ownership is never revealed.
    #[error("calculation not found")]
    NotFound,

    /// Bad credentials or an unusable token
    #[error("authentication failed: {0}")]
    AuthFailure(String),

    /// Registration payload failed validation
    #[error("validation error: {0}")]
    Validation(String),

    /// Username or email already registered
    #[error("{0}")]
    Conflict(String),
}

impl Error {
    /// True for failures caused by the caller's request rather than by the
    /// service itself (4xx-equivalent).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidInput(_)
                | Error::UnsupportedOperation(_)
                | Error::DivisionByZero
                | Error::InvalidPage(_)
                | Error::InvalidPageSize(_)
                | Error::InvalidId(_)
                | Error::NotFound
                | Error::AuthFailure(_)
                | Error::Validation(_)
                | Error::Conflict(_)
        )
    }
}

/// Result type alias for calcboard-core
pub type Result<T> = std::result::Result<T, Error>;
