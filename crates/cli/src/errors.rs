//! CLI error types
//!
//! Everything here stops the run before an artifact outcome exists, so all of
//! it maps to the usage exit code rather than a canonical outcome.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Exit code for usage and configuration errors.
pub const USAGE_EXIT_CODE: i32 = 64;

/// CLI-specific error types with diagnostics
#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    #[error("Configuration could not be loaded")]
    #[diagnostic(
        code(steward::cli::config),
        help("Check --config, $STEWARD_CONFIG or ./steward.toml")
    )]
    Config {
        #[source]
        #[diagnostic_source]
        source: steward_core::Error,
    },

    #[error("Manifest entry {index} is invalid")]
    #[diagnostic(code(steward::cli::manifest))]
    Manifest {
        index: usize,
        #[source]
        #[diagnostic_source]
        source: steward_core::Error,
    },

    #[error("Invalid command line argument: {message}")]
    #[diagnostic(
        code(steward::cli::invalid_argument),
        help("Run 'steward --help' to see available options")
    )]
    InvalidArgument { message: String },

    #[error("Failed to write output")]
    #[diagnostic(code(steward::cli::output))]
    Output {
        #[source]
        source: std::io::Error,
    },

    #[error("Tracing initialization failed: {message}")]
    #[diagnostic(
        code(steward::cli::tracing_error),
        help("Check RUST_LOG and the --level option")
    )]
    Tracing { message: String },
}

impl CliError {
    pub fn config(source: steward_core::Error) -> Self {
        Self::Config { source }
    }

    pub fn manifest(index: usize, source: steward_core::Error) -> Self {
        Self::Manifest { index, source }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn output(source: std::io::Error) -> Self {
        Self::Output { source }
    }

    pub fn tracing(message: impl Into<String>) -> Self {
        Self::Tracing {
            message: message.into(),
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        USAGE_EXIT_CODE
    }
}

/// Render a diagnostic to stderr.
#[allow(clippy::print_stderr)]
pub fn report_error(error: CliError) {
    eprintln!("{:?}", miette::Report::new(error));
}

/// Path the configuration was read from, for messages.
pub fn describe_config(path: Option<&PathBuf>) -> String {
    path.map_or_else(
        || "defaults".to_string(),
        |p| p.display().to_string(),
    )
}

pub type CliResult<T> = Result<T, CliError>;
