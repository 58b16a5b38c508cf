//! Hook types

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// A resolved hook, ready to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookCommand {
    /// Program to execute
    pub program: PathBuf,
    /// Arguments to pass
    pub args: Vec<String>,
}

impl HookCommand {
    /// Build a hook from a configured argument vector.
    ///
    /// Returns `None` for an empty vector.
    #[must_use]
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self {
            program: PathBuf::from(program),
            args: args.to_vec(),
        })
    }
}

impl fmt::Display for HookCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// What the hook is told about the artifact it runs for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookContext {
    /// Artifact id
    pub artifact_id: String,
    /// Installed version, when known
    pub version: Option<String>,
    /// Id of the steward run
    pub run_id: String,
}

/// Result of running (or not running) a hook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum HookOutcome {
    /// No hook exists for the artifact
    NotConfigured,
    /// The hook exited with code zero
    Succeeded,
    /// The hook exited nonzero or could not be started
    Failed {
        /// Exit code, `-1` when there was none
        exit_code: i32,
    },
    /// The hook was killed after exceeding its timeout
    TimedOut,
}

impl HookOutcome {
    /// Whether the hook result should fail the run.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. } | Self::TimedOut)
    }
}

impl fmt::Display for HookOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConfigured => write!(f, "no hook"),
            Self::Succeeded => write!(f, "hook succeeded"),
            Self::Failed { exit_code } => write!(f, "hook failed with exit code {exit_code}"),
            Self::TimedOut => write!(f, "hook timed out"),
        }
    }
}
