//! Core of steward: acquisition and convergence for a managed package tool.
//!
//! This crate provides:
//! - A readiness probe and an ordered cascade of acquisition strategies that
//!   make the managed tool operable
//! - A state detector that reads one artifact's installed state
//! - A convergence engine that drives an artifact to its desired state with a
//!   bounded number of remediation attempts
//! - An outcome classifier that maps the tool's raw exit codes to categories
//!
//! # Overview
//!
//! Callers run [`AcquisitionCascade::ensure_tool_ready`] once, wrap the
//! returned [`ToolHandle`] in a [`CliPackageTool`], then hand each artifact to
//! [`Reconciler::reconcile`]. Every run ends in one [`CanonicalOutcome`] with a
//! stable process exit code.

pub mod acquisition;
pub mod artifact;
pub mod config;
pub mod context;
pub mod convergence;
pub mod detector;
pub mod error;
pub mod exec;
pub mod listing;
pub mod outcome;
pub mod package;
pub mod probe;
pub mod report;
pub mod sources;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use acquisition::{AcquisitionCascade, AcquisitionStrategy};
pub use artifact::{ArtifactIdentity, ArtifactState, DesiredState};
pub use config::Config;
pub use context::RunContext;
pub use convergence::{Reconciler, plan};
pub use detector::{Detection, DetectorError, StateDetector};
pub use error::{Error, Result};
pub use exec::{CommandRunner, Invocation, ProcessRunner};
pub use outcome::{CanonicalOutcome, ExitCategory, ExitCodeTable};
pub use package::{CliPackageTool, InstallOptions, PackageTool};
pub use probe::{Readiness, ReadinessProbe, ToolHandle};
pub use report::{RemediationAction, Report};
