//! Readiness probe for the managed tool.

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::exec::CommandRunner;

/// A located, validated managed tool.
///
/// Only [`ReadinessProbe`] creates these. Immutable for the rest of the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolHandle {
    path: PathBuf,
    version: String,
}

impl ToolHandle {
    pub(crate) fn new(path: impl Into<PathBuf>, version: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            version: version.into(),
        }
    }

    /// Path (or program name) the tool answered at.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Version string the tool reported.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }
}

impl fmt::Display for ToolHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.path.display(), self.version)
    }
}

/// Result of probing one location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// The tool ran and reported a version.
    Ready(ToolHandle),
    /// The tool is not usable at this location.
    NotReady(String),
}

/// Confirms the managed tool executes and reports a version.
#[derive(Clone)]
pub struct ReadinessProbe {
    runner: Arc<dyn CommandRunner>,
}

impl fmt::Debug for ReadinessProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadinessProbe").finish_non_exhaustive()
    }
}

impl ReadinessProbe {
    /// Create a probe that runs commands through `runner`.
    #[must_use]
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    /// Probe one location with `--version`.
    ///
    /// Never fails: a spawn error or a bad exit is `NotReady`.
    pub async fn probe(&self, path: &Path) -> Readiness {
        let args = ["--version".to_string()];
        let invocation = match self.runner.run(path, &args).await {
            Ok(invocation) => invocation,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Tool did not start");
                return Readiness::NotReady(e.to_string());
            }
        };

        if !invocation.exited_zero() {
            debug!(
                path = %path.display(),
                exit_code = invocation.exit_code,
                "Tool version probe exited nonzero"
            );
            return Readiness::NotReady(format!(
                "--version exited with code {}",
                invocation.exit_code
            ));
        }

        let version = invocation
            .stdout
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty());

        match version {
            Some(version) => {
                debug!(path = %path.display(), %version, "Tool is ready");
                Readiness::Ready(ToolHandle::new(path, version))
            }
            None => Readiness::NotReady("--version printed nothing".to_string()),
        }
    }

    /// Probe each candidate in order and return the first ready one.
    ///
    /// The `NotReady` reason is the last candidate's.
    pub async fn probe_any(&self, candidates: &[PathBuf]) -> Readiness {
        let mut last = Readiness::NotReady("no tool locations configured".to_string());
        for candidate in candidates {
            last = self.probe(candidate).await;
            if matches!(last, Readiness::Ready(_)) {
                return last;
            }
        }
        last
    }
}
