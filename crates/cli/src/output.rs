//! Report rendering
//!
//! Reports are the only thing written to stdout. Text is one line per
//! artifact; JSON is one object per line so `apply` output can be streamed.

use serde::Serialize;
use std::io::Write;
use steward_core::{Report, ToolHandle};
use steward_hooks::HookOutcome;

use crate::cli::OutputFormat;
use crate::errors::{CliError, CliResult};

/// Exit code for a hook that failed after convergence.
pub const HOOK_FAILED_EXIT_CODE: i32 = 8;

/// A report plus what the CLI did with it.
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactResult {
    #[serde(flatten)]
    pub report: Report,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hook: Option<HookOutcome>,
    pub exit_code: i32,
}

impl ArtifactResult {
    pub fn new(report: Report) -> Self {
        let exit_code = report.outcome.exit_code();
        Self {
            report,
            hook: None,
            exit_code,
        }
    }

    /// Record the hook run; a failed hook overrides a zero exit code.
    pub fn with_hook(mut self, hook: HookOutcome) -> Self {
        if hook.is_failure() && self.exit_code == 0 {
            self.exit_code = HOOK_FAILED_EXIT_CODE;
        }
        self.hook = Some(hook);
        self
    }
}

#[derive(Serialize)]
struct ToolStatus<'a> {
    ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool: Option<&'a ToolHandle>,
    exit_code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    strategies: &'a [&'a str],
}

/// Writes reports in the selected format.
#[derive(Debug, Clone, Copy)]
pub struct Renderer {
    format: OutputFormat,
}

impl Renderer {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn artifact(&self, out: &mut impl Write, result: &ArtifactResult) -> CliResult<()> {
        match self.format {
            OutputFormat::Text => {
                write!(out, "{}", result.report).map_err(CliError::output)?;
                let hook = result.hook.as_ref();
                if let Some(hook) = hook.filter(|h| **h != HookOutcome::NotConfigured) {
                    write!(out, " [{hook}]").map_err(CliError::output)?;
                }
                writeln!(out).map_err(CliError::output)
            }
            OutputFormat::Json => write_json(out, result),
        }
    }

    /// `strategies` are the acquisition strategies configured for the run.
    pub fn tool_ready(
        &self,
        out: &mut impl Write,
        handle: &ToolHandle,
        strategies: &[&str],
    ) -> CliResult<()> {
        match self.format {
            OutputFormat::Text => writeln!(out, "tool ready: {handle}").map_err(CliError::output),
            OutputFormat::Json => write_json(
                out,
                &ToolStatus {
                    ready: true,
                    tool: Some(handle),
                    exit_code: 0,
                    message: None,
                    strategies,
                },
            ),
        }
    }

    pub fn tool_unavailable(
        &self,
        out: &mut impl Write,
        exit_code: i32,
        message: &str,
        strategies: &[&str],
    ) -> CliResult<()> {
        match self.format {
            OutputFormat::Text => {
                let tried = if strategies.is_empty() {
                    "none enabled".to_string()
                } else {
                    strategies.join(", ")
                };
                writeln!(out, "tool unavailable: {message} (strategies: {tried})")
                    .map_err(CliError::output)
            }
            OutputFormat::Json => write_json(
                out,
                &ToolStatus {
                    ready: false,
                    tool: None,
                    exit_code,
                    message: Some(message.to_string()),
                    strategies,
                },
            ),
        }
    }

    pub fn text(&self, out: &mut impl Write, text: &str) -> CliResult<()> {
        writeln!(out, "{text}").map_err(CliError::output)
    }
}

fn write_json(out: &mut impl Write, value: &impl Serialize) -> CliResult<()> {
    serde_json::to_writer(&mut *out, value)
        .map_err(|e| CliError::output(std::io::Error::other(e)))?;
    writeln!(out).map_err(CliError::output)
}
