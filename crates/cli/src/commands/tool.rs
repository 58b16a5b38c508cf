//! Acquisition wiring
//!
//! Turns the `[acquisition]` section into the strategy list the cascade runs.

use std::io::Write;
use std::sync::Arc;
use steward_core::config::AcquisitionConfig;
use steward_core::{AcquisitionStrategy, CanonicalOutcome, CommandRunner};
use steward_tools_bootstrap::BootstrapStrategy;
use steward_tools_register::RegisterStrategy;
use steward_tools_repair::RepairStrategy;
use tracing::warn;

use super::CommandExecutor;
use crate::errors::CliResult;

/// Strategies in cascade order. Disabled ones are never constructed.
pub fn build_strategies(
    config: &AcquisitionConfig,
    runner: &Arc<dyn CommandRunner>,
) -> Vec<Box<dyn AcquisitionStrategy>> {
    let mut strategies: Vec<Box<dyn AcquisitionStrategy>> = Vec::new();
    if config.register.enabled {
        strategies.push(Box::new(RegisterStrategy::new(
            Arc::clone(runner),
            &config.register,
        )));
    }
    if config.repair.enabled {
        strategies.push(Box::new(RepairStrategy::new(
            Arc::clone(runner),
            &config.repair,
        )));
    }
    if config.bootstrap.enabled {
        strategies.push(Box::new(BootstrapStrategy::new(
            Arc::clone(runner),
            &config.bootstrap,
        )));
    }
    if strategies.is_empty() {
        warn!("All acquisition strategies are disabled");
    }
    strategies
}

impl CommandExecutor {
    pub(crate) async fn ensure_tool_command(&self, out: &mut impl Write) -> CliResult<i32> {
        let cascade = self.cascade();
        let strategies = cascade.strategy_names();
        match cascade.ensure_tool_ready().await {
            Ok(handle) => {
                self.renderer.tool_ready(out, &handle, &strategies)?;
                Ok(0)
            }
            Err(e) => {
                let exit_code = CanonicalOutcome::ToolUnavailable.exit_code();
                self.renderer.tool_unavailable(out, exit_code, &e.to_string(), &strategies)?;
                Ok(exit_code)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use steward_core::test_utils::ScriptedRunner;

    fn runner() -> Arc<dyn CommandRunner> {
        Arc::new(ScriptedRunner::new())
    }

    #[test]
    fn test_default_strategy_order() {
        let strategies = build_strategies(&AcquisitionConfig::default(), &runner());
        let names: Vec<_> = strategies.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["register", "repair", "bootstrap"]);
    }

    #[test]
    fn test_disabled_strategies_are_skipped() {
        let mut config = AcquisitionConfig::default();
        config.repair.enabled = false;
        let strategies = build_strategies(&config, &runner());
        let names: Vec<_> = strategies.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["register", "bootstrap"]);

        config.register.enabled = false;
        config.bootstrap.enabled = false;
        assert!(build_strategies(&config, &runner()).is_empty());
    }
}
