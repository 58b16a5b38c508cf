//! Installed-state detection for one artifact.

use serde::Serialize;
use tracing::{debug, warn};

use crate::artifact::ArtifactState;
use crate::exec::NO_EXIT_CODE;
use crate::listing::{parse_available_version, parse_listing_row};
use crate::outcome::{CanonicalOutcome, ExitCategory, ExitCodeTable};
use crate::package::PackageTool;

/// Fresh observation of an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Detection {
    /// Installed state.
    pub state: ArtifactState,
    /// Newer version the tool offers, when the listing shows one.
    pub upgrade_available: Option<String>,
}

impl Detection {
    /// A detection without upgrade information.
    #[must_use]
    pub fn of(state: ArtifactState) -> Self {
        Self {
            state,
            upgrade_available: None,
        }
    }
}

/// Listing could not produce a state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, miette::Diagnostic)]
pub enum DetectorError {
    /// The listing failed for a reason other than "not found".
    #[error("listing failed with exit code {exit_code}")]
    #[diagnostic(code(steward::detect::list_failed))]
    ListFailed {
        /// Raw exit code, `-1` when the tool could not be started.
        exit_code: i32,
        /// Raw tool output.
        output: String,
    },

    /// The id matched more than one package.
    #[error("artifact id matched more than one package")]
    #[diagnostic(
        code(steward::detect::ambiguous),
        help("Use the full, exact package id")
    )]
    AmbiguousMatch {
        /// Raw exit code.
        exit_code: i32,
        /// Raw tool output.
        output: String,
    },
}

impl DetectorError {
    /// Canonical outcome for this error.
    #[must_use]
    pub fn outcome(&self) -> CanonicalOutcome {
        match self {
            Self::ListFailed { .. } => CanonicalOutcome::ListFailed,
            Self::AmbiguousMatch { .. } => CanonicalOutcome::AmbiguousMatch,
        }
    }

    /// Raw exit code of the failed listing.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ListFailed { exit_code, .. } | Self::AmbiguousMatch { exit_code, .. } => {
                *exit_code
            }
        }
    }

    /// Raw output of the failed listing.
    #[must_use]
    pub fn output(&self) -> &str {
        match self {
            Self::ListFailed { output, .. } | Self::AmbiguousMatch { output, .. } => output,
        }
    }
}

/// Reads the installed state of an artifact through one exact-id listing.
#[derive(Debug, Clone, Default)]
pub struct StateDetector {
    table: ExitCodeTable,
}

impl StateDetector {
    /// Detector classifying listing codes with `table`.
    #[must_use]
    pub fn new(table: ExitCodeTable) -> Self {
        Self { table }
    }

    /// Query the tool for `id`.
    ///
    /// # Errors
    ///
    /// [`DetectorError::AmbiguousMatch`] when the id is not unique, and
    /// [`DetectorError::ListFailed`] for any other unsuccessful listing,
    /// including a tool that fails to start.
    pub async fn detect(
        &self,
        tool: &dyn PackageTool,
        id: &str,
    ) -> Result<Detection, DetectorError> {
        let invocation = match tool.list(id).await {
            Ok(invocation) => invocation,
            Err(e) => {
                warn!(artifact = %id, error = %e, "Listing could not run");
                return Err(DetectorError::ListFailed {
                    exit_code: NO_EXIT_CODE,
                    output: e.to_string(),
                });
            }
        };

        let category = self.table.classify(invocation.exit_code);
        debug!(
            artifact = %id,
            exit_code = invocation.exit_code,
            %category,
            "Listing finished"
        );

        match category {
            ExitCategory::Success => {
                let state = parse_listing_row(&invocation.stdout, id);
                if state == ArtifactState::PresentUnknownVersion {
                    debug!(artifact = %id, "Listed without a readable version");
                }
                Ok(Detection {
                    state,
                    upgrade_available: parse_available_version(&invocation.stdout, id),
                })
            }
            ExitCategory::NoResultsFound => Ok(Detection::of(ArtifactState::Absent)),
            ExitCategory::MultipleMatches => Err(DetectorError::AmbiguousMatch {
                exit_code: invocation.exit_code,
                output: invocation.combined_output(),
            }),
            _ => Err(DetectorError::ListFailed {
                exit_code: invocation.exit_code,
                output: invocation.combined_output(),
            }),
        }
    }
}
