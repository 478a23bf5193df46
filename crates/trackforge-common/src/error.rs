//! Common error types used throughout trackforge.
//!
//! Covers the failure cases shared by every crate: malformed values in policy
//! documents, unknown identifiers, and I/O failures.

/// Common error type for trackforge.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A value could not be parsed or is out of range.
    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    /// A named item was not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON document could not be decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a new InvalidValue error.
    pub fn invalid_value<F: Into<String>, M: Into<String>>(field: F, message: M) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new NotFound error.
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
