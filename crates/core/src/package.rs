//! Command surface of the managed package tool.
//!
//! [`PackageTool`] is the seam the detector and the convergence engine talk
//! to. [`CliPackageTool`] renders each operation as a command line for the
//! located tool and runs it through the process adapter. Exit codes are passed
//! back untouched for the classifier.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use crate::Result;
use crate::config::InstallScope;
use crate::exec::{CommandRunner, Invocation};
use crate::probe::ToolHandle;

/// Options applied to every install.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InstallOptions {
    /// `--scope`, omitted when unset.
    pub scope: Option<InstallScope>,
    /// Pass `--silent`.
    pub silent: bool,
}

/// Operations steward needs from the managed tool.
#[async_trait]
pub trait PackageTool: Send + Sync {
    /// List the installed package with exactly this id.
    async fn list(&self, id: &str) -> Result<Invocation>;

    /// Upgrade the package in place.
    async fn upgrade(&self, id: &str, silent: bool) -> Result<Invocation>;

    /// Install the package, optionally at a specific version.
    async fn install(
        &self,
        id: &str,
        version: Option<&str>,
        options: &InstallOptions,
    ) -> Result<Invocation>;

    /// Remove the package.
    async fn uninstall(&self, id: &str, silent: bool) -> Result<Invocation>;

    /// Reset the configured sources to their defaults.
    async fn source_reset(&self) -> Result<Invocation>;

    /// Refresh source metadata.
    async fn source_update(&self) -> Result<Invocation>;
}

/// [`PackageTool`] driving the real tool binary.
#[derive(Clone)]
pub struct CliPackageTool {
    handle: ToolHandle,
    runner: Arc<dyn CommandRunner>,
}

impl fmt::Debug for CliPackageTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CliPackageTool")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

impl CliPackageTool {
    /// Drive the tool located by `handle`.
    #[must_use]
    pub fn new(handle: ToolHandle, runner: Arc<dyn CommandRunner>) -> Self {
        Self { handle, runner }
    }

    async fn run(&self, args: Vec<String>) -> Result<Invocation> {
        self.runner.run(self.handle.path(), &args).await
    }
}

#[async_trait]
impl PackageTool for CliPackageTool {
    async fn list(&self, id: &str) -> Result<Invocation> {
        self.run(list_args(id)).await
    }

    async fn upgrade(&self, id: &str, silent: bool) -> Result<Invocation> {
        self.run(upgrade_args(id, silent)).await
    }

    async fn install(
        &self,
        id: &str,
        version: Option<&str>,
        options: &InstallOptions,
    ) -> Result<Invocation> {
        self.run(install_args(id, version, options)).await
    }

    async fn uninstall(&self, id: &str, silent: bool) -> Result<Invocation> {
        self.run(uninstall_args(id, silent)).await
    }

    async fn source_reset(&self) -> Result<Invocation> {
        self.run(args(&["source", "reset", "--force"])).await
    }

    async fn source_update(&self) -> Result<Invocation> {
        self.run(args(&["source", "update"])).await
    }
}

fn args(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| (*s).to_string()).collect()
}

fn targeted(verb: &str, id: &str) -> Vec<String> {
    args(&[verb, "--id", id, "--exact"])
}

/// Arguments for `list`.
#[must_use]
pub fn list_args(id: &str) -> Vec<String> {
    let mut a = targeted("list", id);
    a.push("--accept-source-agreements".to_string());
    a
}

/// Arguments for `upgrade`.
#[must_use]
pub fn upgrade_args(id: &str, silent: bool) -> Vec<String> {
    let mut a = targeted("upgrade", id);
    if silent {
        a.push("--silent".to_string());
    }
    a.extend(args(&[
        "--accept-package-agreements",
        "--accept-source-agreements",
    ]));
    a
}

/// Arguments for `install`.
#[must_use]
pub fn install_args(id: &str, version: Option<&str>, options: &InstallOptions) -> Vec<String> {
    let mut a = targeted("install", id);
    if let Some(version) = version {
        a.extend(args(&["--version", version]));
    }
    if let Some(scope) = options.scope {
        a.extend(args(&["--scope", scope.as_arg()]));
    }
    if options.silent {
        a.push("--silent".to_string());
    }
    a.extend(args(&[
        "--accept-package-agreements",
        "--accept-source-agreements",
    ]));
    a
}

/// Arguments for `uninstall`.
#[must_use]
pub fn uninstall_args(id: &str, silent: bool) -> Vec<String> {
    let mut a = targeted("uninstall", id);
    if silent {
        a.push("--silent".to_string());
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{ScriptedRunner, handle};

    #[test]
    fn test_list_args() {
        assert_eq!(
            list_args("Git.Git").join(" "),
            "list --id Git.Git --exact --accept-source-agreements"
        );
    }

    #[test]
    fn test_install_args_full() {
        let options = InstallOptions {
            scope: Some(InstallScope::User),
            silent: true,
        };
        assert_eq!(
            install_args("Git.Git", Some("2.44.0"), &options).join(" "),
            "install --id Git.Git --exact --version 2.44.0 --scope user --silent \
             --accept-package-agreements --accept-source-agreements"
        );
    }

    #[test]
    fn test_install_args_minimal() {
        assert_eq!(
            install_args("Git.Git", None, &InstallOptions::default()).join(" "),
            "install --id Git.Git --exact --accept-package-agreements --accept-source-agreements"
        );
    }

    #[test]
    fn test_uninstall_and_upgrade_args() {
        assert_eq!(
            uninstall_args("A.B", true).join(" "),
            "uninstall --id A.B --exact --silent"
        );
        assert_eq!(uninstall_args("A.B", false).join(" "), "uninstall --id A.B --exact");
        assert_eq!(
            upgrade_args("A.B", false).join(" "),
            "upgrade --id A.B --exact --accept-package-agreements --accept-source-agreements"
        );
    }

    #[tokio::test]
    async fn test_cli_tool_runs_at_handle_path() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.respond(
            "C:/bin/winget.exe source reset --force",
            Invocation::new(0, "", ""),
        );
        runner.respond("C:/bin/winget.exe source update", Invocation::new(0, "", ""));

        let tool = CliPackageTool::new(handle("C:/bin/winget.exe", "v1.8.0"), runner.clone());
        assert!(tool.source_reset().await.unwrap().exited_zero());
        assert!(tool.source_update().await.unwrap().exited_zero());
        assert_eq!(runner.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_cli_tool_passes_codes_through() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.respond(
            "winget list --id X.Y --exact --accept-source-agreements",
            Invocation::new(-1_978_335_212, "No installed package found", ""),
        );
        let tool = CliPackageTool::new(handle("winget", "v1"), runner);
        assert_eq!(tool.list("X.Y").await.unwrap().exit_code, -1_978_335_212);
    }
}
