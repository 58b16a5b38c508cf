//! Acquisition strategies and the cascade that runs them.
//!
//! A strategy's own verdict is advisory. After each attempt the readiness
//! probe decides whether the tool is usable.

use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{Instrument, info, warn};

use crate::config::ToolConfig;
use crate::context::RunContext;
use crate::exec::CommandRunner;
use crate::outcome::ExitCodeTable;
use crate::package::CliPackageTool;
use crate::probe::{Readiness, ReadinessProbe, ToolHandle};
use crate::sources::initialize_sources;
use crate::{Error, Result};

/// One way of making the managed tool operable.
///
/// Implementations must be safe to run after a partial success of an earlier
/// strategy, and must not fail: internal errors are logged and reported as
/// `false`.
#[async_trait]
pub trait AcquisitionStrategy: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Try to make the tool operable. The result is a hint only.
    async fn attempt(&self) -> bool;
}

/// Runs strategies in order until the tool is ready.
pub struct AcquisitionCascade {
    ctx: RunContext,
    runner: Arc<dyn CommandRunner>,
    probe: ReadinessProbe,
    candidates: Vec<PathBuf>,
    table: ExitCodeTable,
    strategies: Vec<Box<dyn AcquisitionStrategy>>,
}

impl fmt::Debug for AcquisitionCascade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.strategies.iter().map(|s| s.name()).collect();
        f.debug_struct("AcquisitionCascade")
            .field("candidates", &self.candidates)
            .field("strategies", &names)
            .finish_non_exhaustive()
    }
}

impl AcquisitionCascade {
    /// Build a cascade over `strategies`, tried in the given order.
    #[must_use]
    pub fn new(
        ctx: RunContext,
        runner: Arc<dyn CommandRunner>,
        tool: &ToolConfig,
        table: ExitCodeTable,
        strategies: Vec<Box<dyn AcquisitionStrategy>>,
    ) -> Self {
        Self {
            ctx,
            probe: ReadinessProbe::new(Arc::clone(&runner)),
            runner,
            candidates: tool.candidates(),
            table,
            strategies,
        }
    }

    /// Names of the configured strategies, in order.
    #[must_use]
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Make sure the tool is ready, acquiring it if needed.
    ///
    /// Sources are initialized once the tool answers, whether or not a
    /// strategy had to run.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ToolUnavailable`] when every strategy has run and the
    /// probe still fails. Sources are not touched in that case.
    pub async fn ensure_tool_ready(&self) -> Result<ToolHandle> {
        let handle = self.acquire().instrument(self.ctx.span().clone()).await?;
        let tool = CliPackageTool::new(handle.clone(), Arc::clone(&self.runner));
        initialize_sources(&tool, &self.table)
            .instrument(self.ctx.span().clone())
            .await;
        Ok(handle)
    }

    async fn acquire(&self) -> Result<ToolHandle> {
        let mut reason = match self.probe.probe_any(&self.candidates).await {
            Readiness::Ready(handle) => {
                info!(tool = %handle, "Managed tool already ready");
                return Ok(handle);
            }
            Readiness::NotReady(reason) => reason,
        };
        info!(%reason, "Managed tool not ready, starting acquisition");

        for (attempted, strategy) in self.strategies.iter().enumerate() {
            let name = strategy.name();
            info!(strategy = name, "Attempting acquisition strategy");
            let reported = strategy.attempt().await;

            match self.probe.probe_any(&self.candidates).await {
                Readiness::Ready(handle) => {
                    if !reported {
                        info!(strategy = name, "Strategy reported failure but the tool is ready");
                    }
                    info!(strategy = name, tool = %handle, "Managed tool ready");
                    return Ok(handle);
                }
                Readiness::NotReady(why) => {
                    warn!(
                        strategy = name,
                        reported,
                        attempted = attempted + 1,
                        reason = %why,
                        "Managed tool still not ready"
                    );
                    reason = why;
                }
            }
        }

        Err(Error::ToolUnavailable {
            attempted: self.strategies.len(),
            reason,
        })
    }
}
