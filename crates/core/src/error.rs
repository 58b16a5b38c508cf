//! Error types for steward-core

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for steward-core operations
///
/// These are internal failures. The reconciler never lets them escape: at its
/// boundary every error is folded into a canonical outcome with the message
/// attached for diagnosis.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// Configuration could not be read or was invalid
    #[error("Configuration error: {message}")]
    #[diagnostic(code(steward::config::invalid))]
    Configuration {
        /// The error message describing the configuration issue
        message: String,
        /// File the configuration was read from, if any
        path: Option<Box<std::path::Path>>,
    },

    /// An external process could not be spawned or waited on
    #[error("Process execution failed for {program}: {message}")]
    #[diagnostic(
        code(steward::process),
        help("Check that the program exists and is executable for the current user")
    )]
    Process {
        /// Program that was being invoked
        program: String,
        /// The error message describing the process failure
        message: String,
    },

    /// I/O error with path context
    #[error("I/O error during {operation}: {source}")]
    #[diagnostic(code(steward::io))]
    Io {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
        /// The path where the I/O error occurred, if applicable
        path: Option<Box<std::path::Path>>,
        /// Description of the operation that failed
        operation: String,
    },

    /// Every acquisition strategy ran and the tool is still not operable
    #[error("Managed tool unavailable after {attempted} acquisition strategies")]
    #[diagnostic(
        code(steward::tool_unavailable),
        help("Run with --level debug to see why each strategy failed")
    )]
    ToolUnavailable {
        /// Number of strategies that were attempted
        attempted: usize,
        /// Last reason the readiness probe gave
        reason: String,
    },

    /// A payload download failed
    #[error("Download of {url} failed: {message}")]
    #[diagnostic(code(steward::download))]
    Download {
        /// Source URL
        url: String,
        /// The error message describing the failure
        message: String,
    },
}

impl Error {
    /// Create a configuration error with a message
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            path: None,
        }
    }

    /// Create a configuration error tied to the file it came from
    pub fn configuration_at(message: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::Configuration {
            message: message.into(),
            path: Some(path.into().into_boxed_path()),
        }
    }

    /// Create a process execution error
    pub fn process(program: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Process {
            program: program.into(),
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

    /// Create a download error
    pub fn download(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Download {
            url: url.into(),
            message: message.into(),
        }
    }
}

/// Result type for steward-core operations
pub type Result<T> = std::result::Result<T, Error>;
