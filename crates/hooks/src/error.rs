//! Error types for the steward-hooks crate

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for steward-hooks operations
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// Hook configuration error
    #[error("Configuration error: {message}")]
    #[diagnostic(code(steward_hooks::config::invalid))]
    Configuration {
        /// The error message describing the configuration issue
        message: String,
    },

    /// I/O error with path context
    #[error("I/O error during {operation}: {source}")]
    #[diagnostic(code(steward_hooks::io::error))]
    Io {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
        /// The path where the I/O error occurred, if applicable
        path: Option<Box<std::path::Path>>,
        /// Description of the operation that failed
        operation: String,
    },
}

impl Error {
    /// Create a configuration error with a message
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an I/O error with context
    pub fn io(source: std::io::Error, path: Option<PathBuf>, operation: impl Into<String>) -> Self {
        Self::Io {
            source,
            path: path.map(|p| p.into_boxed_path()),
            operation: operation.into(),
        }
    }
}

/// Result type for steward-hooks operations
pub type Result<T> = std::result::Result<T, Error>;
