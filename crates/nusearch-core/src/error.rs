//! Error types for NuSearch operations.
//!
//! This module provides the common `Error` type and `Result<T>` alias used
//! across all NuSearch crates. Uses `thiserror` for derive macros.
//!
//! Store failures are split in two: [`Error::Transient`] (network or capacity
//! trouble, safe to resubmit) and [`Error::Store`] (auth, configuration or any
//! other failure that must abort the current operation). The retry policy
//! only ever looks at [`Error::is_retryable`].

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors that can occur in NuSearch operations.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// I/O error tied to a specific path.
    #[error("I/O error at {path}: {source}")]
    IoWithPath {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Caller contract violation, rejected before anything reaches the store.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A single document failed validation.
    #[error("Invalid document '{id}': {reason}")]
    InvalidDocument {
        /// Identifier of the offending document (may be empty).
        id: String,
        /// What was wrong with it.
        reason: String,
    },

    /// Retryable store failure (connection, timeout, back-pressure).
    #[error("Transient store error: {0}")]
    Transient(String),

    /// Non-retryable store failure.
    #[error("Store error: {0}")]
    Store(String),

    /// The store answered with something we could not interpret.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// The document source produced an unreadable record.
    #[error("Source error at {location}: {message}")]
    Source {
        /// File and line (or other locator) of the bad record.
        location: String,
        /// Parser or reader message.
        message: String,
    },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Index or document not found.
    #[error("Not found: {0}")]
    NotFound(String),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid request error.
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Create an invalid document error.
    pub fn invalid_document(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDocument {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Create a transient (retryable) store error.
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    /// Create a fatal store error.
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create a malformed response error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResponse(msg.into())
    }

    /// Create a source error for the record at `location`.
    pub fn source_error(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Source {
            location: location.into(),
            message: message.into(),
        }
    }

    /// Create a not found error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Wrap an I/O error with the path that produced it.
    pub fn io_with_path(source: std::io::Error, path: &Path) -> Self {
        Self::IoWithPath {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Whether the failed operation may be resubmitted unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Result type alias using NuSearch's Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::invalid_request("page must be at least 1");
        assert_eq!(err.to_string(), "Invalid request: page must be at least 1");

        let err = Error::source_error("dump.jsonl:3", "expected value");
        assert_eq!(err.to_string(), "Source error at dump.jsonl:3: expected value");
    }

    #[test]
    fn test_retryable_errors() {
        assert!(Error::transient("503 Service Unavailable").is_retryable());
        assert!(!Error::store("401 Unauthorized").is_retryable());
        assert!(!Error::invalid_document("pkg", "blank id").is_retryable());
        assert!(!Error::malformed("missing hits").is_retryable());
    }

    #[test]
    fn test_io_with_path() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = Error::io_with_path(io, Path::new("/data/dump.jsonl"));
        assert!(err.to_string().contains("/data/dump.jsonl"));
    }
}
