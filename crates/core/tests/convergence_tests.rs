//! Convergence engine scenarios against a scripted package tool.

use steward_core::config::UpgradePolicy;
use steward_core::outcome::{
    INSTALL_DOWNGRADE, MULTIPLE_APPLICATIONS_FOUND, NO_APPLICATIONS_FOUND,
    PACKAGE_ALREADY_INSTALLED, UPDATE_NOT_APPLICABLE,
};
use steward_core::test_utils::{ScriptedTool, install_options};
use steward_core::{
    ArtifactIdentity, ArtifactState, CanonicalOutcome, DesiredState, ExitCodeTable, Invocation,
    Reconciler, RemediationAction, RunContext,
};

const ID: &str = "Contoso.App";

fn reconciler(policy: UpgradePolicy) -> Reconciler {
    Reconciler::new(
        RunContext::detached(),
        ExitCodeTable::new(),
        policy,
        install_options(),
    )
}

async fn reconcile_pinned(tool: &ScriptedTool, version: &str) -> steward_core::Report {
    let identity = ArtifactIdentity::pinned(ID, version);
    reconciler(UpgradePolicy::Informational)
        .reconcile(tool, &identity, &identity.desired())
        .await
}

async fn reconcile_present(tool: &ScriptedTool) -> steward_core::Report {
    reconciler(UpgradePolicy::Informational)
        .reconcile(tool, &ArtifactIdentity::new(ID), &DesiredState::Present)
        .await
}

fn listing_with_upgrade(installed: &str, available: &str) -> String {
    format!(
        "Name   Id            Version  Available  Source\n\
         -----------------------------------------------\n\
         App    {ID}   {installed:<9}{available:<11}winget\n"
    )
}

#[tokio::test]
async fn test_pinned_version_already_installed_takes_no_action() {
    let tool = ScriptedTool::new();
    tool.lists_version(ID, "2.0");

    let report = reconcile_pinned(&tool, "2.0").await;

    assert_eq!(report.outcome, CanonicalOutcome::Converged);
    assert!(report.actions.is_empty());
    assert_eq!(tool.calls(), vec!["list"]);
}

#[tokio::test]
async fn test_perpetual_conflict_stops_after_two_attempts() {
    let tool = ScriptedTool::new();
    tool.lists_version(ID, "1.0");
    tool.exits("install", INSTALL_DOWNGRADE);
    tool.exits("uninstall", 0);

    let report = reconcile_pinned(&tool, "2.0").await;

    assert_eq!(report.outcome, CanonicalOutcome::VersionMismatchUnresolved);
    assert_eq!(
        report.actions,
        vec![
            RemediationAction::InstallPinned("2.0".into()),
            RemediationAction::UninstallThenInstallPinned("2.0".into()),
        ]
    );
    assert_eq!(tool.actions(), vec!["install@2.0", "uninstall", "install@2.0"]);
    assert_eq!(report.raw_exit_code, Some(INSTALL_DOWNGRADE));
}

#[tokio::test]
async fn test_conflict_escalation_reaches_pinned_version() {
    let tool = ScriptedTool::new();
    tool.lists_version(ID, "1.0");
    tool.lists_version(ID, "1.0");
    tool.lists_version(ID, "2.0");
    tool.exits("install@2.0", PACKAGE_ALREADY_INSTALLED);
    tool.exits("install@2.0", 0);
    tool.exits("uninstall", 0);

    let report = reconcile_pinned(&tool, "2.0").await;

    assert_eq!(report.outcome, CanonicalOutcome::Converged);
    assert_eq!(tool.actions(), vec!["install@2.0", "uninstall", "install@2.0"]);
    assert_eq!(
        report.final_state,
        Some(ArtifactState::PresentVersion("2.0".into()))
    );
}

#[tokio::test]
async fn test_conflict_escalation_ending_on_unknown_version_is_unresolved() {
    let tool = ScriptedTool::new();
    tool.lists_version(ID, "1.0");
    tool.lists_version(ID, "1.0");
    tool.respond("list", Invocation::new(0, format!("App  {ID}  Unknown  winget\n"), ""));
    tool.exits("install@2.0", PACKAGE_ALREADY_INSTALLED);
    tool.exits("install@2.0", 0);
    tool.exits("uninstall", 0);

    let report = reconcile_pinned(&tool, "2.0").await;

    assert_eq!(report.outcome, CanonicalOutcome::VersionMismatchUnresolved);
    assert_eq!(
        report.final_state,
        Some(ArtifactState::PresentUnknownVersion)
    );
}

#[tokio::test]
async fn test_pinned_install_accepted_but_version_differs() {
    let tool = ScriptedTool::new();
    tool.lists_version(ID, "1.0");
    tool.exits("install", 0);

    let report = reconcile_pinned(&tool, "2.0").await;

    assert_eq!(report.outcome, CanonicalOutcome::VersionMismatchUnresolved);
    assert_eq!(tool.actions(), vec!["install@2.0"]);
}

#[tokio::test]
async fn test_absent_artifact_is_installed_once() {
    let tool = ScriptedTool::new();
    tool.lists_absent();
    tool.lists_version(ID, "3.1");
    tool.exits("install", 0);

    let report = reconcile_present(&tool).await;

    assert_eq!(report.outcome, CanonicalOutcome::Converged);
    assert_eq!(report.actions, vec![RemediationAction::InstallLatest]);
    assert_eq!(tool.actions(), vec!["install"]);
    assert!(report.installed());
}

#[tokio::test]
async fn test_install_accepted_but_still_absent_is_not_installed() {
    let tool = ScriptedTool::new();
    tool.lists_absent();
    tool.exits("install", 0);

    let report = reconcile_present(&tool).await;

    assert_eq!(report.outcome, CanonicalOutcome::NotInstalled);
    assert_eq!(tool.actions(), vec!["install"]);
}

#[tokio::test]
async fn test_unknown_install_code_is_unknown_error() {
    let tool = ScriptedTool::new();
    tool.lists_absent();
    tool.respond("install", Invocation::new(1603, "", "fatal error during installation"));

    let report = reconcile_present(&tool).await;

    assert_eq!(report.outcome, CanonicalOutcome::UnknownError);
    assert_eq!(report.raw_exit_code, Some(1603));
    assert!(report.message.contains("fatal error during installation"));
}

#[tokio::test]
async fn test_nonzero_code_with_satisfied_state_converges() {
    let tool = ScriptedTool::new();
    tool.lists_absent();
    tool.lists_version(ID, "3.1");
    tool.exits("install", 1603);

    let report = reconcile_present(&tool).await;

    assert_eq!(report.outcome, CanonicalOutcome::Converged);
}

#[tokio::test]
async fn test_install_that_cannot_start_is_unknown_error() {
    let tool = ScriptedTool::new();
    tool.lists_absent();

    let report = reconcile_present(&tool).await;

    assert_eq!(report.outcome, CanonicalOutcome::UnknownError);
    assert_eq!(report.actions, vec![RemediationAction::InstallLatest]);
}

#[tokio::test]
async fn test_unknown_list_code_is_list_failed_without_remediation() {
    let tool = ScriptedTool::new();
    tool.respond("list", Invocation::new(-2_147_024_891, "", "access denied"));

    let report = reconcile_pinned(&tool, "2.0").await;

    assert_eq!(report.outcome, CanonicalOutcome::ListFailed);
    assert_eq!(report.raw_exit_code, Some(-2_147_024_891));
    assert!(tool.actions().is_empty());
}

#[tokio::test]
async fn test_ambiguous_listing_is_not_remediated() {
    let tool = ScriptedTool::new();
    tool.respond(
        "list",
        Invocation::new(
            MULTIPLE_APPLICATIONS_FOUND,
            "Multiple packages found matching input criteria.",
            "",
        ),
    );

    let present = reconcile_present(&tool).await;
    let pinned = reconcile_pinned(&tool, "2.0").await;

    for report in [present, pinned] {
        assert_eq!(report.outcome, CanonicalOutcome::AmbiguousMatch);
        assert_eq!(report.raw_exit_code, Some(MULTIPLE_APPLICATIONS_FOUND));
        assert!(report.actions.is_empty());
    }
    assert!(tool.actions().is_empty());
    assert_eq!(tool.calls(), vec!["list", "list"]);
}

#[tokio::test]
async fn test_unknown_version_conflict_escalates_to_reinstall() {
    let unknown = format!("App  {ID}  Unknown  winget\n");
    let tool = ScriptedTool::new();
    tool.respond("list", Invocation::new(0, unknown.clone(), ""));
    tool.respond("list", Invocation::new(0, unknown, ""));
    tool.lists_version(ID, "2.0");
    tool.exits("install@2.0", PACKAGE_ALREADY_INSTALLED);
    tool.exits("install@2.0", 0);
    tool.exits("uninstall", 0);

    let report = reconcile_pinned(&tool, "2.0").await;

    assert_eq!(report.outcome, CanonicalOutcome::Converged);
    assert_eq!(
        report.actions,
        vec![
            RemediationAction::InstallPinned("2.0".into()),
            RemediationAction::UninstallThenInstallPinned("2.0".into()),
        ]
    );
    assert_eq!(tool.actions(), vec!["install@2.0", "uninstall", "install@2.0"]);
    assert_eq!(
        report.final_state,
        Some(ArtifactState::PresentVersion("2.0".into()))
    );
}

#[tokio::test]
async fn test_list_failure_after_action_is_list_failed() {
    let tool = ScriptedTool::new();
    tool.lists_absent();
    tool.exits("list", 7);
    tool.exits("install", 0);

    let report = reconcile_present(&tool).await;

    assert_eq!(report.outcome, CanonicalOutcome::ListFailed);
    assert_eq!(report.actions.len(), 1);
}

#[tokio::test]
async fn test_absent_target_uninstalls() {
    let tool = ScriptedTool::new();
    tool.lists_version(ID, "1.0");
    tool.lists_absent();
    tool.exits("uninstall", 0);

    let report = reconciler(UpgradePolicy::Informational)
        .reconcile(&tool, &ArtifactIdentity::new(ID), &DesiredState::Absent)
        .await;

    assert_eq!(report.outcome, CanonicalOutcome::Converged);
    assert_eq!(report.actions, vec![RemediationAction::Uninstall]);
    assert!(!report.installed());
}

#[tokio::test]
async fn test_uninstall_accepted_but_still_present_is_unknown_error() {
    let tool = ScriptedTool::new();
    tool.lists_version(ID, "1.0");
    tool.exits("uninstall", 0);

    let report = reconciler(UpgradePolicy::Informational)
        .reconcile(&tool, &ArtifactIdentity::new(ID), &DesiredState::Absent)
        .await;

    assert_eq!(report.outcome, CanonicalOutcome::UnknownError);
    assert_eq!(tool.actions(), vec!["uninstall"]);
}

#[tokio::test]
async fn test_available_upgrade_is_informational_by_default() {
    let tool = ScriptedTool::new();
    tool.respond("list", Invocation::new(0, listing_with_upgrade("1.0", "1.5"), ""));

    let report = reconcile_present(&tool).await;

    assert_eq!(report.outcome, CanonicalOutcome::Converged);
    assert!(report.actions.is_empty());
    assert_eq!(report.upgrade_available.as_deref(), Some("1.5"));
}

#[tokio::test]
async fn test_available_upgrade_under_fatal_policy() {
    let tool = ScriptedTool::new();
    tool.respond("list", Invocation::new(0, listing_with_upgrade("1.0", "1.5"), ""));

    let report = reconciler(UpgradePolicy::Fatal)
        .reconcile(&tool, &ArtifactIdentity::new(ID), &DesiredState::Present)
        .await;

    assert_eq!(report.outcome, CanonicalOutcome::UpgradeAvailable);
    assert!(tool.actions().is_empty());
}

#[tokio::test]
async fn test_fatal_policy_ignores_pinned_targets() {
    let tool = ScriptedTool::new();
    tool.respond("list", Invocation::new(0, listing_with_upgrade("1.0", "1.5"), ""));

    let identity = ArtifactIdentity::pinned(ID, "1.0");
    let report = reconciler(UpgradePolicy::Fatal)
        .reconcile(&tool, &identity, &identity.desired())
        .await;

    assert_eq!(report.outcome, CanonicalOutcome::Converged);
}

#[tokio::test]
async fn test_upgrade_not_applicable_converges() {
    let tool = ScriptedTool::new();
    tool.lists_version(ID, "1.0");
    tool.exits("upgrade", UPDATE_NOT_APPLICABLE);

    let report = reconciler(UpgradePolicy::Informational)
        .upgrade(&tool, &ArtifactIdentity::new(ID))
        .await;

    assert_eq!(report.outcome, CanonicalOutcome::Converged);
    assert_eq!(report.actions, vec![RemediationAction::Upgrade]);
}

#[tokio::test]
async fn test_upgrade_of_absent_artifact_runs_nothing() {
    let tool = ScriptedTool::new();
    tool.exits("list", NO_APPLICATIONS_FOUND);

    let report = reconciler(UpgradePolicy::Informational)
        .upgrade(&tool, &ArtifactIdentity::new(ID))
        .await;

    assert_eq!(report.outcome, CanonicalOutcome::NotInstalled);
    assert!(tool.actions().is_empty());
}

#[tokio::test]
async fn test_upgrade_with_unknown_code() {
    let tool = ScriptedTool::new();
    tool.lists_version(ID, "1.0");
    tool.exits("upgrade", 99);

    let report = reconciler(UpgradePolicy::Informational)
        .upgrade(&tool, &ArtifactIdentity::new(ID))
        .await;

    assert_eq!(report.outcome, CanonicalOutcome::UnknownError);
    assert_eq!(report.raw_exit_code, Some(99));
}

#[tokio::test]
async fn test_check_reports_planned_action_without_acting() {
    let tool = ScriptedTool::new();
    tool.lists_version(ID, "1.0");

    let identity = ArtifactIdentity::pinned(ID, "2.0");
    let report = reconciler(UpgradePolicy::Informational)
        .check(&tool, &identity, &identity.desired())
        .await;

    assert_eq!(report.outcome, CanonicalOutcome::NotInstalled);
    assert_eq!(
        report.planned,
        Some(RemediationAction::InstallPinned("2.0".into()))
    );
    assert!(report.actions.is_empty());
    assert_eq!(tool.calls(), vec!["list"]);
}

#[tokio::test]
async fn test_check_compliant_artifact() {
    let tool = ScriptedTool::new();
    tool.lists_absent();

    let report = reconciler(UpgradePolicy::Informational)
        .check(&tool, &ArtifactIdentity::new(ID), &DesiredState::Absent)
        .await;

    assert_eq!(report.outcome, CanonicalOutcome::Converged);
    assert_eq!(report.planned, None);
}
