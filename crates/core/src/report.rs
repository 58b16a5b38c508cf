//! Remediation actions and per-artifact reports.

use serde::Serialize;
use std::fmt;

use crate::artifact::ArtifactState;
use crate::detector::DetectorError;
use crate::outcome::CanonicalOutcome;

/// One remediation step the convergence engine can take.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "action", content = "version")]
pub enum RemediationAction {
    /// Install whatever version the tool resolves.
    InstallLatest,
    /// Install exactly this version.
    InstallPinned(String),
    /// Upgrade in place.
    Upgrade,
    /// Remove the artifact.
    Uninstall,
    /// Remove, then install exactly this version.
    UninstallThenInstallPinned(String),
}

impl RemediationAction {
    /// Whether the action puts new bits on the machine.
    #[must_use]
    pub fn installs(&self) -> bool {
        matches!(
            self,
            Self::InstallLatest | Self::InstallPinned(_) | Self::UninstallThenInstallPinned(_)
        )
    }
}

impl fmt::Display for RemediationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InstallLatest => write!(f, "install latest"),
            Self::InstallPinned(v) => write!(f, "install {v}"),
            Self::Upgrade => write!(f, "upgrade"),
            Self::Uninstall => write!(f, "uninstall"),
            Self::UninstallThenInstallPinned(v) => write!(f, "uninstall then install {v}"),
        }
    }
}

/// Result of converging or checking one artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    /// Artifact the report is about.
    pub artifact_id: String,
    /// Canonical outcome.
    pub outcome: CanonicalOutcome,
    /// Actions taken, in order.
    pub actions: Vec<RemediationAction>,
    /// Action a check would have taken.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub planned: Option<RemediationAction>,
    /// Last observed state.
    pub final_state: Option<ArtifactState>,
    /// Upgrade offered by the last listing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upgrade_available: Option<String>,
    /// Raw exit code behind the outcome.
    pub raw_exit_code: Option<i32>,
    /// Human-readable detail.
    pub message: String,
}

impl Report {
    /// Empty report for an artifact, outcome to be filled in.
    #[must_use]
    pub fn new(artifact_id: impl Into<String>) -> Self {
        Self {
            artifact_id: artifact_id.into(),
            outcome: CanonicalOutcome::UnknownError,
            actions: Vec::new(),
            planned: None,
            final_state: None,
            upgrade_available: None,
            raw_exit_code: None,
            message: String::new(),
        }
    }

    /// Report for an artifact that was never looked at because the tool is
    /// unavailable.
    #[must_use]
    pub fn tool_unavailable(artifact_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(artifact_id).finish(CanonicalOutcome::ToolUnavailable, message)
    }

    /// Report for a run that failed unexpectedly.
    #[must_use]
    pub fn unknown_error(artifact_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(artifact_id).finish(CanonicalOutcome::UnknownError, message)
    }

    /// Set the outcome and message.
    #[must_use]
    pub fn finish(mut self, outcome: CanonicalOutcome, message: impl Into<String>) -> Self {
        self.outcome = outcome;
        self.message = message.into();
        self
    }

    /// Finish with the outcome of a failed detection.
    #[must_use]
    pub fn detection_failed(mut self, error: &DetectorError) -> Self {
        self.raw_exit_code = Some(error.exit_code());
        let message = match error.output().trim() {
            "" => error.to_string(),
            output => format!("{error}: {output}"),
        };
        self.finish(error.outcome(), message)
    }

    /// Whether any action taken installed something.
    #[must_use]
    pub fn installed(&self) -> bool {
        self.actions.iter().any(RemediationAction::installs)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.artifact_id, self.outcome)?;
        if let Some(state) = &self.final_state {
            write!(f, " ({state})")?;
        }
        if !self.message.is_empty() {
            write!(f, " - {}", self.message)?;
        }
        Ok(())
    }
}
