//! Per-artifact orchestration
//!
//! The tool is acquired once, then every target is handled strictly in
//! order. A panic inside one target becomes an `UnknownError` report for that
//! target and the run moves on.

use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::io::Write;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use steward_core::config::{Manifest, UpgradePolicy};
use steward_core::exec::NO_EXIT_CODE;
use steward_core::{
    ArtifactIdentity, CanonicalOutcome, CliPackageTool, DesiredState, PackageTool, Reconciler,
    Report,
};
use steward_hooks::{HookContext, HookOutcome, HookRunner};
use tracing::{Instrument, error, info, warn};

use super::CommandExecutor;
use crate::errors::{CliError, CliResult};
use crate::output::ArtifactResult;

/// What to do with a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Detect only
    Check,
    /// Converge, then run the hook
    Reconcile,
    /// Upgrade in place
    Upgrade,
}

/// One artifact to process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub identity: ArtifactIdentity,
    pub desired: DesiredState,
    pub mode: Mode,
}

impl Target {
    pub fn new(identity: ArtifactIdentity, desired: DesiredState, mode: Mode) -> Self {
        Self {
            identity,
            desired,
            mode,
        }
    }
}

impl CommandExecutor {
    /// Targets for `apply`, from `manifest` when given, else the configuration.
    pub(crate) fn manifest_targets(&self, manifest: Option<&Path>) -> CliResult<Vec<Target>> {
        let entries = match manifest {
            Some(path) => Manifest::from_file(path).map_err(CliError::config)?.artifacts,
            None => self.config.artifacts.clone(),
        };
        if entries.is_empty() {
            return Err(CliError::invalid_argument("no artifacts to apply"));
        }
        entries
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                let (identity, desired) =
                    entry.resolve().map_err(|e| CliError::manifest(index, e))?;
                Ok(Target::new(identity, desired, Mode::Reconcile))
            })
            .collect()
    }

    /// Acquire the tool and process `targets` in order.
    ///
    /// Returns the first nonzero exit code, or zero.
    pub(crate) async fn run_targets(
        &self,
        out: &mut impl Write,
        targets: Vec<Target>,
        policy: UpgradePolicy,
    ) -> CliResult<i32> {
        let mut first_failure = 0;
        let handle = match self.cascade().ensure_tool_ready().await {
            Ok(handle) => handle,
            Err(e) => {
                error!(error = %e, "Managed tool unavailable");
                for target in &targets {
                    let report = Report::tool_unavailable(&target.identity.id, e.to_string());
                    let result = ArtifactResult::new(report);
                    self.renderer.artifact(out, &result)?;
                    keep_first(&mut first_failure, result.exit_code);
                }
                return Ok(first_failure);
            }
        };

        let tool = CliPackageTool::new(handle, Arc::clone(&self.runner));
        let reconciler = self.reconciler(policy);
        let hooks = HookRunner::new(&self.config.hooks);

        for target in &targets {
            let report = guarded(&target.identity.id, process(&reconciler, &tool, target)).await;
            let mut result = ArtifactResult::new(report);
            if target.mode == Mode::Reconcile && wants_hook(&result.report) {
                let hook = self
                    .run_hook(&hooks, &result.report)
                    .instrument(self.ctx.artifact_span(&target.identity.id))
                    .await;
                result = result.with_hook(hook);
            }
            self.renderer.artifact(out, &result)?;
            keep_first(&mut first_failure, result.exit_code);
        }
        Ok(first_failure)
    }

    async fn run_hook(&self, hooks: &HookRunner, report: &Report) -> HookOutcome {
        let ctx = HookContext {
            artifact_id: report.artifact_id.clone(),
            version: report
                .final_state
                .as_ref()
                .and_then(|state| state.version())
                .map(String::from),
            run_id: self.ctx.run_id().to_string(),
        };
        match hooks.run(&ctx).await {
            Ok(outcome) => {
                if outcome.is_failure() {
                    warn!(%outcome, "Post-convergence hook failed");
                } else {
                    info!(%outcome, "Post-convergence hook finished");
                }
                outcome
            }
            Err(e) => {
                warn!(error = %e, "Post-convergence hook could not be resolved");
                HookOutcome::Failed {
                    exit_code: NO_EXIT_CODE,
                }
            }
        }
    }
}

fn keep_first(first: &mut i32, code: i32) {
    if *first == 0 {
        *first = code;
    }
}

/// Hooks run only after an install actually converged.
fn wants_hook(report: &Report) -> bool {
    report.outcome == CanonicalOutcome::Converged && report.installed()
}

async fn process(reconciler: &Reconciler, tool: &dyn PackageTool, target: &Target) -> Report {
    match target.mode {
        Mode::Check => reconciler.check(tool, &target.identity, &target.desired).await,
        Mode::Reconcile => {
            reconciler
                .reconcile(tool, &target.identity, &target.desired)
                .await
        }
        Mode::Upgrade => reconciler.upgrade(tool, &target.identity).await,
    }
}

/// Await `future`, turning a panic into an `UnknownError` report.
pub async fn guarded<F>(artifact_id: &str, future: F) -> Report
where
    F: Future<Output = Report>,
{
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(report) => report,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(artifact = %artifact_id, %message, "Processing panicked");
            Report::unknown_error(artifact_id, format!("internal error: {message}"))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
