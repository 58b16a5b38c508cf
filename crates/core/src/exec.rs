//! Process invocation adapter.
//!
//! Every external call steward makes (the managed tool, PowerShell, installer
//! commands, hooks) goes through a [`CommandRunner`] and comes back as a
//! structured [`Invocation`]. Nothing downstream reads exit statuses off
//! `std::process` directly, and nothing but the outcome classifier interprets
//! the code.

use async_trait::async_trait;
use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, trace};

use crate::{Error, Result};

/// Exit code recorded when a process terminated without one (killed by a signal).
pub const NO_EXIT_CODE: i32 = -1;

/// Captured result of one finished process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Raw exit code as reported by the platform.
    pub exit_code: i32,
    /// Captured standard output, lossily decoded.
    pub stdout: String,
    /// Captured standard error, lossily decoded.
    pub stderr: String,
}

impl Invocation {
    /// Build an invocation from its parts.
    #[must_use]
    pub fn new(exit_code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    /// Whether the process exited with code zero.
    ///
    /// This is a plain status check for commands that have no sentinel table
    /// (installer scripts, hooks). Managed-tool codes go through the classifier.
    #[must_use]
    pub fn exited_zero(&self) -> bool {
        self.exit_code == 0
    }

    /// Standard output followed by standard error, for diagnostics.
    #[must_use]
    pub fn combined_output(&self) -> String {
        match (self.stdout.trim(), self.stderr.trim()) {
            ("", "") => String::new(),
            (out, "") => out.to_string(),
            ("", err) => err.to_string(),
            (out, err) => format!("{out}\n{err}"),
        }
    }
}

/// Runs an external program to completion.
///
/// Implementations block the calling task until the process exits. No timeout
/// is applied here; callers that need one wrap the future themselves.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args` and capture its output.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Process`] when the program cannot be spawned or waited
    /// on. A process that runs and exits nonzero is *not* an error.
    async fn run(&self, program: &Path, args: &[String]) -> Result<Invocation>;
}

/// [`CommandRunner`] backed by `tokio::process`.
#[derive(Debug, Default, Clone)]
pub struct ProcessRunner;

impl ProcessRunner {
    /// Create a new process runner.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, program: &Path, args: &[String]) -> Result<Invocation> {
        debug!(program = %program.display(), ?args, "Running external command");

        let output = Command::new(program)
            .args(args.iter().map(OsStr::new))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Error::process(program.display().to_string(), e.to_string()))?;

        let invocation = Invocation {
            exit_code: output.status.code().unwrap_or(NO_EXIT_CODE),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        trace!(
            program = %program.display(),
            exit_code = invocation.exit_code,
            stdout_len = invocation.stdout.len(),
            stderr_len = invocation.stderr.len(),
            "External command finished"
        );

        Ok(invocation)
    }
}

/// Split a configured command line into program and arguments.
///
/// Configured commands are stored as argument vectors, so no shell parsing is
/// involved. Returns `None` for an empty vector.
#[must_use]
pub fn split_command(command: &[String]) -> Option<(&Path, &[String])> {
    let (program, args) = command.split_first()?;
    Some((Path::new(program), args))
}

/// Run a configured command line through `runner`.
///
/// # Errors
///
/// Returns a configuration error for an empty command, and whatever the
/// runner returns otherwise.
pub async fn run_configured(runner: &dyn CommandRunner, command: &[String]) -> Result<Invocation> {
    let (program, args) =
        split_command(command).ok_or_else(|| Error::configuration("command must not be empty"))?;
    runner.run(program, args).await
}
