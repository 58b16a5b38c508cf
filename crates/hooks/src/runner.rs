//! Hook lookup and execution

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use steward_core::config::HooksConfig;
use steward_core::exec::NO_EXIT_CODE;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::types::{HookCommand, HookContext, HookOutcome};
use crate::{Error, Result};

/// Script extensions looked up in the hooks directory, in priority order.
pub const SCRIPT_EXTENSIONS: [&str; 4] = ["ps1", "cmd", "bat", "sh"];

/// Finds and runs the hook for a converged artifact.
#[derive(Debug, Clone)]
pub struct HookRunner {
    dir: Option<PathBuf>,
    commands: BTreeMap<String, Vec<String>>,
    timeout: Duration,
}

impl HookRunner {
    /// Create a runner from the `[hooks]` configuration section.
    #[must_use]
    pub fn new(config: &HooksConfig) -> Self {
        Self {
            dir: config.dir.clone(),
            commands: config.commands.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// Override the timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Find the hook for `artifact_id`.
    ///
    /// An explicit command in the configuration wins over a script in the
    /// hooks directory.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an empty configured command or an id
    /// that would escape the hooks directory, and an I/O error when a
    /// candidate script cannot be inspected.
    pub async fn resolve(&self, artifact_id: &str) -> Result<Option<HookCommand>> {
        if let Some(argv) = self.commands.get(artifact_id) {
            return HookCommand::from_argv(argv).map(Some).ok_or_else(|| {
                Error::configuration(format!("hook command for {artifact_id} is empty"))
            });
        }

        let Some(dir) = &self.dir else {
            return Ok(None);
        };
        if artifact_id.contains(['/', '\\']) || artifact_id.contains("..") {
            return Err(Error::configuration(format!(
                "artifact id {artifact_id} cannot name a hook script"
            )));
        }

        for ext in SCRIPT_EXTENSIONS {
            let path = dir.join(format!("{artifact_id}.{ext}"));
            match tokio::fs::metadata(&path).await {
                Ok(meta) if meta.is_file() => {
                    debug!(hook = %path.display(), "Found hook script");
                    return Ok(Some(script_command(ext, &path)));
                }
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(Error::io(e, Some(path), "inspect hook script")),
            }
        }
        Ok(None)
    }

    /// Run the hook for `ctx.artifact_id`, if there is one.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`HookRunner::resolve`]. A hook that runs and
    /// fails is an `Ok` outcome.
    pub async fn run(&self, ctx: &HookContext) -> Result<HookOutcome> {
        let Some(hook) = self.resolve(&ctx.artifact_id).await? else {
            debug!(artifact = %ctx.artifact_id, "No hook configured");
            return Ok(HookOutcome::NotConfigured);
        };
        Ok(self.execute(&hook, ctx).await)
    }

    async fn execute(&self, hook: &HookCommand, ctx: &HookContext) -> HookOutcome {
        let start_time = Instant::now();
        info!(artifact = %ctx.artifact_id, hook = %hook, "Running hook");

        let mut cmd = Command::new(&hook.program);
        cmd.args(&hook.args)
            .env("STEWARD_ARTIFACT_ID", &ctx.artifact_id)
            .env("STEWARD_RUN_ID", &ctx.run_id)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(version) = &ctx.version {
            cmd.env("STEWARD_ARTIFACT_VERSION", version);
        }

        let execution_result = timeout(self.timeout, cmd.output()).await;
        let duration_ms = start_time.elapsed().as_millis();

        match execution_result {
            Ok(Ok(output)) if output.status.success() => {
                debug!(duration_ms, "Hook completed successfully");
                HookOutcome::Succeeded
            }
            Ok(Ok(output)) => {
                let exit_code = output.status.code().unwrap_or(NO_EXIT_CODE);
                warn!(
                    exit_code,
                    duration_ms,
                    stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                    "Hook failed"
                );
                HookOutcome::Failed { exit_code }
            }
            Ok(Err(io_error)) => {
                warn!(error = %io_error, "Failed to start hook");
                HookOutcome::Failed {
                    exit_code: NO_EXIT_CODE,
                }
            }
            Err(_elapsed) => {
                warn!(timeout = ?self.timeout, "Hook timed out");
                HookOutcome::TimedOut
            }
        }
    }
}

/// Interpreter command line for a hook script.
fn script_command(ext: &str, path: &Path) -> HookCommand {
    let path = path.display().to_string();
    let (program, mut args): (&str, Vec<String>) = match ext {
        "ps1" => (
            "powershell.exe",
            [
                "-NoProfile",
                "-NonInteractive",
                "-ExecutionPolicy",
                "Bypass",
                "-File",
            ]
            .iter()
            .map(|s| (*s).to_string())
            .collect(),
        ),
        "cmd" | "bat" => ("cmd.exe", vec!["/C".to_string()]),
        _ => ("sh", Vec::new()),
    };
    args.push(path);
    HookCommand {
        program: PathBuf::from(program),
        args,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn runner_for(dir: &TempDir) -> HookRunner {
        HookRunner::new(&HooksConfig {
            dir: Some(dir.path().to_path_buf()),
            ..HooksConfig::default()
        })
    }

    fn context(id: &str) -> HookContext {
        HookContext {
            artifact_id: id.to_string(),
            version: Some("1.2.3".to_string()),
            run_id: "run-1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_no_hooks_dir_is_not_configured() {
        let runner = HookRunner::new(&HooksConfig::default());
        let outcome = runner.run(&context("App.Id")).await.unwrap();
        assert_eq!(outcome, HookOutcome::NotConfigured);
    }

    #[tokio::test]
    async fn test_missing_script_is_not_configured() {
        let dir = TempDir::new().unwrap();
        let outcome = runner_for(&dir).run(&context("App.Id")).await.unwrap();
        assert_eq!(outcome, HookOutcome::NotConfigured);
    }

    #[tokio::test]
    async fn test_extension_priority() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("App.Id.sh"), "exit 0\n").unwrap();
        std::fs::write(dir.path().join("App.Id.ps1"), "exit 0\n").unwrap();

        let hook = runner_for(&dir).resolve("App.Id").await.unwrap().unwrap();
        assert_eq!(hook.program, PathBuf::from("powershell.exe"));
        assert!(hook.args.last().unwrap().ends_with("App.Id.ps1"));
    }

    #[tokio::test]
    async fn test_batch_scripts_run_through_cmd() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("App.Id.bat"), "@echo off\n").unwrap();

        let hook = runner_for(&dir).resolve("App.Id").await.unwrap().unwrap();
        assert_eq!(hook.program, PathBuf::from("cmd.exe"));
        assert_eq!(hook.args[0], "/C");
    }

    #[tokio::test]
    async fn test_configured_command_wins() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("App.Id.sh"), "exit 0\n").unwrap();
        let mut config = HooksConfig {
            dir: Some(dir.path().to_path_buf()),
            ..HooksConfig::default()
        };
        config
            .commands
            .insert("App.Id".to_string(), vec!["notify".to_string(), "done".to_string()]);

        let hook = HookRunner::new(&config).resolve("App.Id").await.unwrap().unwrap();
        assert_eq!(hook.to_string(), "notify done");
    }

    #[tokio::test]
    async fn test_empty_configured_command_is_error() {
        let mut config = HooksConfig::default();
        config.commands.insert("App.Id".to_string(), Vec::new());
        let err = HookRunner::new(&config).resolve("App.Id").await.unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[tokio::test]
    async fn test_id_cannot_escape_hooks_dir() {
        let dir = TempDir::new().unwrap();
        let err = runner_for(&dir).resolve("../evil").await.unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[tokio::test]
    async fn test_unstartable_hook_fails() {
        let mut config = HooksConfig::default();
        config.commands.insert(
            "App.Id".to_string(),
            vec!["steward-no-such-hook-binary".to_string()],
        );
        let outcome = HookRunner::new(&config).run(&context("App.Id")).await.unwrap();
        assert_eq!(
            outcome,
            HookOutcome::Failed {
                exit_code: NO_EXIT_CODE
            }
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_successful_script_sees_context() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("App.Id.sh"),
            "test \"$STEWARD_ARTIFACT_ID\" = App.Id && test \"$STEWARD_ARTIFACT_VERSION\" = 1.2.3\n",
        )
        .unwrap();

        let outcome = runner_for(&dir).run(&context("App.Id")).await.unwrap();
        assert_eq!(outcome, HookOutcome::Succeeded);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_script_reports_exit_code() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("App.Id.sh"), "exit 3\n").unwrap();

        let outcome = runner_for(&dir).run(&context("App.Id")).await.unwrap();
        assert_eq!(outcome, HookOutcome::Failed { exit_code: 3 });
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_slow_script_times_out() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("App.Id.sh"), "sleep 5\n").unwrap();

        let outcome = runner_for(&dir)
            .with_timeout(Duration::from_millis(200))
            .run(&context("App.Id"))
            .await
            .unwrap();
        assert_eq!(outcome, HookOutcome::TimedOut);
    }
}
