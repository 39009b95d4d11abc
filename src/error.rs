//! Error types for the Quiver library.
//!
//! All failures are represented by the [`QuiverError`] enum. Configuration
//! errors are raised at factory build time and are never retried; I/O errors
//! during index mutation are wrapped and surfaced to the caller of the
//! flushing operation.
//!
//! # Examples
//!
//! ```
//! use quiver::error::{QuiverError, Result};
//!
//! fn example_operation() -> Result<()> {
//!     Err(QuiverError::config("missing identifier declaration"))
//! }
//!
//! assert!(example_operation().is_err());
//! ```

use std::io;

use thiserror::Error;

/// The main error type for Quiver operations.
#[derive(Error, Debug)]
pub enum QuiverError {
    /// I/O errors (segment files, directory creation, replication copies).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Startup/build-time configuration errors. Fatal, never retried.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Index mutation errors (cannot open or close a handle, cannot apply
    /// a work item).
    #[error("Index error: {0}")]
    Index(String),

    /// Workspace discipline violations (e.g. read handle requested while a
    /// write handle is open). These indicate a programming error.
    #[error("Workspace assertion failure: {0}")]
    Workspace(String),

    /// Query parsing or execution errors.
    #[error("Query error: {0}")]
    Query(String),

    /// Serialization errors for segment payloads and forwarded work lists.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Errors raised by the remote backend transport.
    #[error("Backend error: {0}")]
    Backend(String),

    /// JSON settings parsing errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Errors surfaced by external collaborators (message transports).
    #[error("Error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Result type alias for operations that may fail with [`QuiverError`].
pub type Result<T> = std::result::Result<T, QuiverError>;

impl QuiverError {
    /// Create a new configuration error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        QuiverError::Config(msg.into())
    }

    /// Create a new index error.
    pub fn index<S: Into<String>>(msg: S) -> Self {
        QuiverError::Index(msg.into())
    }

    /// Create a new workspace assertion failure.
    pub fn workspace<S: Into<String>>(msg: S) -> Self {
        QuiverError::Workspace(msg.into())
    }

    /// Create a new query error.
    pub fn query<S: Into<String>>(msg: S) -> Self {
        QuiverError::Query(msg.into())
    }

    /// Create a new serialization error.
    pub fn serialization<S: Into<String>>(msg: S) -> Self {
        QuiverError::Serialization(msg.into())
    }

    /// Create a new backend error.
    pub fn backend<S: Into<String>>(msg: S) -> Self {
        QuiverError::Backend(msg.into())
    }
}

impl From<bincode::Error> for QuiverError {
    fn from(e: bincode::Error) -> Self {
        QuiverError::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_construction() {
        let error = QuiverError::config("no document id declared");
        assert_eq!(
            error.to_string(),
            "Configuration error: no document id declared"
        );

        let error = QuiverError::workspace("read after write");
        assert_eq!(
            error.to_string(),
            "Workspace assertion failure: read after write"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "segment not found");
        let error = QuiverError::from(io_error);

        match error {
            QuiverError::Io(_) => {}
            _ => panic!("Expected IO error variant"),
        }
    }
}
