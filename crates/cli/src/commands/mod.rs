//! Command execution
//!
//! One [`CommandExecutor`] per run. It owns the run context and the loaded
//! configuration and builds the cascade and reconciler from them on demand.

pub mod artifact;
pub mod tool;
pub mod version;

use std::io::Write;
use std::sync::Arc;
use steward_core::config::UpgradePolicy;
use steward_core::{
    AcquisitionCascade, CommandRunner, Config, ExitCodeTable, InstallOptions, Reconciler,
    RunContext,
};

use crate::cli::Commands;
use crate::errors::CliResult;
use crate::output::Renderer;
use artifact::{Mode, Target};

/// Runs one parsed command against the configuration.
pub struct CommandExecutor {
    ctx: RunContext,
    config: Config,
    runner: Arc<dyn CommandRunner>,
    renderer: Renderer,
}

impl CommandExecutor {
    pub fn new(
        ctx: RunContext,
        config: Config,
        runner: Arc<dyn CommandRunner>,
        renderer: Renderer,
    ) -> Self {
        Self {
            ctx,
            config,
            runner,
            renderer,
        }
    }

    /// Execute `command`, writing reports to `out`, and return the process
    /// exit code.
    pub async fn execute(&self, command: Commands, out: &mut impl Write) -> CliResult<i32> {
        let policy = self.config.reconcile.upgrade_policy;
        match command {
            Commands::Version => {
                self.renderer
                    .text(out, &version::get_version_info(&self.ctx))?;
                Ok(0)
            }
            Commands::EnsureTool => self.ensure_tool_command(out).await,
            Commands::Detect { target } => {
                let (identity, desired) = target.resolve();
                let target = Target::new(identity, desired, Mode::Check);
                self.run_targets(out, vec![target], policy).await
            }
            Commands::Reconcile {
                target,
                upgrade_policy,
            } => {
                let (identity, desired) = target.resolve();
                let target = Target::new(identity, desired, Mode::Reconcile);
                let policy = upgrade_policy.map_or(policy, UpgradePolicy::from);
                self.run_targets(out, vec![target], policy).await
            }
            Commands::Upgrade { id } => {
                let identity = steward_core::ArtifactIdentity::new(id);
                let desired = identity.desired();
                let target = Target::new(identity, desired, Mode::Upgrade);
                self.run_targets(out, vec![target], policy).await
            }
            Commands::Apply { manifest } => {
                let targets = self.manifest_targets(manifest.as_deref())?;
                self.run_targets(out, targets, policy).await
            }
        }
    }

    fn table(&self) -> ExitCodeTable {
        ExitCodeTable::with_overrides(&self.config.exit_codes)
    }

    fn cascade(&self) -> AcquisitionCascade {
        AcquisitionCascade::new(
            self.ctx.clone(),
            Arc::clone(&self.runner),
            &self.config.tool,
            self.table(),
            tool::build_strategies(&self.config.acquisition, &self.runner),
        )
    }

    fn reconciler(&self, policy: UpgradePolicy) -> Reconciler {
        let options = InstallOptions {
            scope: self.config.tool.scope,
            silent: self.config.tool.silent,
        };
        Reconciler::new(self.ctx.clone(), self.table(), policy, options)
    }
}
