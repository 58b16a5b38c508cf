//! Convergence engine.
//!
//! Drives one artifact toward its desired state: observe, pick one action,
//! act, observe again. The outcome is decided by what the detector sees after
//! the last action, never by the action's exit code alone.

use tracing::{Instrument, debug, info, warn};

use crate::artifact::{ArtifactIdentity, ArtifactState, DesiredState};
use crate::config::UpgradePolicy;
use crate::context::RunContext;
use crate::detector::{Detection, StateDetector};
use crate::exec::Invocation;
use crate::outcome::{CanonicalOutcome, ExitCategory, ExitCodeTable};
use crate::package::{InstallOptions, PackageTool};
use crate::report::{RemediationAction, Report};

/// Remediation attempts allowed on the pinned path: direct install, then
/// uninstall and install.
pub const PINNED_ATTEMPTS: usize = 2;

/// Choose the next action for `state` given `desired`.
///
/// `prior` is the category of the previous attempt in this run, if any. A
/// pinned install refused as a conflict escalates to uninstall-then-install,
/// but only while the artifact is actually present. Returns `None` when the
/// state already satisfies the target.
#[must_use]
pub fn plan(
    state: &ArtifactState,
    desired: &DesiredState,
    prior: Option<ExitCategory>,
) -> Option<RemediationAction> {
    if desired.is_satisfied_by(state) {
        return None;
    }
    match desired {
        DesiredState::Absent => Some(RemediationAction::Uninstall),
        DesiredState::Present => Some(RemediationAction::InstallLatest),
        DesiredState::Pinned(version) => {
            let conflict = prior.is_some_and(ExitCategory::is_install_conflict);
            if conflict && state.is_present() {
                Some(RemediationAction::UninstallThenInstallPinned(version.clone()))
            } else {
                Some(RemediationAction::InstallPinned(version.clone()))
            }
        }
    }
}

/// Converges artifacts through a [`PackageTool`].
#[derive(Debug, Clone)]
pub struct Reconciler {
    ctx: RunContext,
    detector: StateDetector,
    table: ExitCodeTable,
    policy: UpgradePolicy,
    options: InstallOptions,
}

impl Reconciler {
    /// Build an engine for one run.
    #[must_use]
    pub fn new(
        ctx: RunContext,
        table: ExitCodeTable,
        policy: UpgradePolicy,
        options: InstallOptions,
    ) -> Self {
        Self {
            ctx,
            detector: StateDetector::new(table.clone()),
            table,
            policy,
            options,
        }
    }

    /// Bring `identity` to `desired`.
    ///
    /// Never fails: every problem ends up as a [`CanonicalOutcome`] in the
    /// report.
    pub async fn reconcile(
        &self,
        tool: &dyn PackageTool,
        identity: &ArtifactIdentity,
        desired: &DesiredState,
    ) -> Report {
        let span = self.ctx.artifact_span(&identity.id);
        let report = self
            .converge(tool, identity, desired)
            .instrument(span.clone())
            .await;
        span.in_scope(|| log_report(&report));
        report
    }

    /// Report whether `identity` is at `desired` without changing anything.
    ///
    /// A non-compliant artifact is `NotInstalled`, with the action a
    /// reconcile would start with in [`Report::planned`].
    pub async fn check(
        &self,
        tool: &dyn PackageTool,
        identity: &ArtifactIdentity,
        desired: &DesiredState,
    ) -> Report {
        let span = self.ctx.artifact_span(&identity.id);
        let report = async {
            let report = Report::new(&identity.id);
            let detection = match self.detector.detect(tool, &identity.id).await {
                Ok(detection) => detection,
                Err(e) => return report.detection_failed(&e),
            };
            let report = observed(report, &detection);

            if desired.is_satisfied_by(&detection.state) {
                return self.satisfied(report, desired, &detection);
            }
            let mut report = report;
            report.planned = plan(&detection.state, desired, None);
            report.finish(
                CanonicalOutcome::NotInstalled,
                format!("{} is {}, wanted {desired}", identity.id, detection.state),
            )
        }
        .instrument(span.clone())
        .await;
        span.in_scope(|| log_report(&report));
        report
    }

    /// Upgrade `identity` in place.
    ///
    /// "Nothing to upgrade" counts as success. An artifact that is not
    /// installed is `NotInstalled` and nothing is run.
    pub async fn upgrade(&self, tool: &dyn PackageTool, identity: &ArtifactIdentity) -> Report {
        let span = self.ctx.artifact_span(&identity.id);
        let report = async {
            let report = Report::new(&identity.id);
            let detection = match self.detector.detect(tool, &identity.id).await {
                Ok(detection) => detection,
                Err(e) => return report.detection_failed(&e),
            };
            let mut report = observed(report, &detection);
            if !detection.state.is_present() {
                return report.finish(CanonicalOutcome::NotInstalled, "nothing to upgrade");
            }

            let action = RemediationAction::Upgrade;
            report.actions.push(action.clone());
            let invocation = match self.execute(tool, &identity.id, &action).await {
                Ok(invocation) => invocation,
                Err(e) => return report.finish(CanonicalOutcome::UnknownError, e.to_string()),
            };
            report.raw_exit_code = Some(invocation.exit_code);
            let category = self.table.classify(invocation.exit_code);

            let detection = match self.detector.detect(tool, &identity.id).await {
                Ok(detection) => detection,
                Err(e) => return report.detection_failed(&e),
            };
            let report = observed(report, &detection);

            if !detection.state.is_present() {
                return report.finish(
                    CanonicalOutcome::NotInstalled,
                    "artifact disappeared during upgrade",
                );
            }
            if category.upgrade_succeeded() {
                let message = match category {
                    ExitCategory::UpdateNotApplicable => "already up to date".to_string(),
                    _ => format!("upgraded to {}", detection.state),
                };
                return report.finish(CanonicalOutcome::Converged, message);
            }
            report.finish(
                CanonicalOutcome::UnknownError,
                failure_message(&action, category, &invocation),
            )
        }
        .instrument(span.clone())
        .await;
        span.in_scope(|| log_report(&report));
        report
    }

    async fn converge(
        &self,
        tool: &dyn PackageTool,
        identity: &ArtifactIdentity,
        desired: &DesiredState,
    ) -> Report {
        let id = identity.id.as_str();
        let report = Report::new(id);

        let detection = match self.detector.detect(tool, id).await {
            Ok(detection) => detection,
            Err(e) => return report.detection_failed(&e),
        };
        let mut report = observed(report, &detection);
        debug!(state = %detection.state, %desired, "Observed initial state");

        if desired.is_satisfied_by(&detection.state) {
            return self.satisfied(report, desired, &detection);
        }

        let budget = match desired {
            DesiredState::Pinned(_) => PINNED_ATTEMPTS,
            DesiredState::Absent | DesiredState::Present => 1,
        };
        let mut state = detection.state;
        let mut prior = None;
        let mut last = None;

        for attempt in 1..=budget {
            let Some(action) = plan(&state, desired, prior) else {
                break;
            };
            info!(attempt, %action, "Remediating");
            report.actions.push(action.clone());

            let invocation = match self.execute(tool, id, &action).await {
                Ok(invocation) => invocation,
                Err(e) => {
                    return report.finish(CanonicalOutcome::UnknownError, e.to_string());
                }
            };
            let category = self.table.classify(invocation.exit_code);
            report.raw_exit_code = Some(invocation.exit_code);
            if ExitCodeTable::requires_reboot(invocation.exit_code) {
                warn!(exit_code = invocation.exit_code, "Installer requested a reboot");
            }
            debug!(exit_code = invocation.exit_code, %category, "Action finished");

            let detection = match self.detector.detect(tool, id).await {
                Ok(detection) => detection,
                Err(e) => return report.detection_failed(&e),
            };
            report = observed(report, &detection);
            state = detection.state;

            if desired.is_satisfied_by(&state) {
                if category != ExitCategory::Success {
                    warn!(
                        exit_code = invocation.exit_code,
                        %category,
                        "Action reported failure but the artifact is in the desired state"
                    );
                }
                return report.finish(CanonicalOutcome::Converged, format!("{action} succeeded"));
            }

            let escalate = category.is_install_conflict() && state.is_present();
            last = Some((action, category, invocation));
            if !escalate {
                break;
            }
            warn!(%category, "Install refused, escalating");
            prior = Some(category);
        }

        let Some((action, category, invocation)) = last else {
            return report.finish(CanonicalOutcome::UnknownError, "no action was planned");
        };
        let message = failure_message(&action, category, &invocation);

        let outcome = match (category, desired) {
            (ExitCategory::Unknown(_), _) | (_, DesiredState::Absent) => {
                CanonicalOutcome::UnknownError
            }
            (_, DesiredState::Pinned(_)) => CanonicalOutcome::VersionMismatchUnresolved,
            (_, DesiredState::Present) => CanonicalOutcome::NotInstalled,
        };
        report.finish(outcome, message)
    }

    /// Outcome for a target already met, applying the upgrade policy.
    fn satisfied(&self, report: Report, desired: &DesiredState, detection: &Detection) -> Report {
        match (&detection.upgrade_available, desired) {
            (Some(available), DesiredState::Present) => match self.policy {
                UpgradePolicy::Informational => {
                    info!(%available, "Upgrade available");
                    report.finish(
                        CanonicalOutcome::Converged,
                        format!("upgrade to {available} available"),
                    )
                }
                UpgradePolicy::Fatal => report.finish(
                    CanonicalOutcome::UpgradeAvailable,
                    format!("upgrade to {available} available"),
                ),
            },
            _ => report.finish(CanonicalOutcome::Converged, "already in desired state"),
        }
    }

    async fn execute(
        &self,
        tool: &dyn PackageTool,
        id: &str,
        action: &RemediationAction,
    ) -> crate::Result<Invocation> {
        let silent = self.options.silent;
        match action {
            RemediationAction::InstallLatest => tool.install(id, None, &self.options).await,
            RemediationAction::InstallPinned(version) => {
                tool.install(id, Some(version.as_str()), &self.options).await
            }
            RemediationAction::Upgrade => tool.upgrade(id, silent).await,
            RemediationAction::Uninstall => tool.uninstall(id, silent).await,
            RemediationAction::UninstallThenInstallPinned(version) => {
                let removed = tool.uninstall(id, silent).await?;
                let category = self.table.classify(removed.exit_code);
                if !matches!(category, ExitCategory::Success | ExitCategory::NoResultsFound) {
                    warn!(
                        exit_code = removed.exit_code,
                        %category,
                        "Uninstall before reinstall did not succeed, installing anyway"
                    );
                }
                tool.install(id, Some(version.as_str()), &self.options).await
            }
        }
    }
}

fn observed(mut report: Report, detection: &Detection) -> Report {
    report.final_state = Some(detection.state.clone());
    report.upgrade_available.clone_from(&detection.upgrade_available);
    report
}

fn failure_message(
    action: &RemediationAction,
    category: ExitCategory,
    invocation: &Invocation,
) -> String {
    let output = invocation.combined_output();
    if output.is_empty() {
        format!("{action} ended with {category}")
    } else {
        format!("{action} ended with {category}: {output}")
    }
}

fn log_report(report: &Report) {
    if report.outcome.is_success() {
        info!(
            outcome = %report.outcome,
            actions = report.actions.len(),
            "Artifact converged"
        );
    } else {
        warn!(
            outcome = %report.outcome,
            raw_exit_code = ?report.raw_exit_code,
            message = %report.message,
            "Artifact not converged"
        );
    }
}
