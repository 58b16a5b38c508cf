//! Source initialization after the tool becomes ready.

use tracing::{info, warn};

use crate::exec::Invocation;
use crate::outcome::{ExitCategory, ExitCodeTable};
use crate::package::PackageTool;

/// Which refresh steps went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceSummary {
    /// `source reset --force` succeeded.
    pub reset_ok: bool,
    /// `source update` succeeded.
    pub update_ok: bool,
}

/// Reset and refresh the tool's sources.
///
/// Each step runs once. Failures are logged as warnings and never stop the
/// caller; a stale catalog surfaces later as a listing or install failure.
pub async fn initialize_sources(tool: &dyn PackageTool, table: &ExitCodeTable) -> SourceSummary {
    let reset_ok = step("source reset", tool.source_reset().await, table);
    let update_ok = step("source update", tool.source_update().await, table);
    info!(reset_ok, update_ok, "Sources initialized");
    SourceSummary {
        reset_ok,
        update_ok,
    }
}

fn step(name: &str, result: crate::Result<Invocation>, table: &ExitCodeTable) -> bool {
    match result {
        Ok(invocation) => match table.classify(invocation.exit_code) {
            ExitCategory::Success => true,
            category => {
                warn!(
                    step = name,
                    exit_code = invocation.exit_code,
                    %category,
                    output = %invocation.combined_output(),
                    "Source refresh step failed"
                );
                false
            }
        },
        Err(e) => {
            warn!(step = name, error = %e, "Source refresh step could not run");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ScriptedTool;

    #[tokio::test]
    async fn test_both_steps_succeed() {
        let tool = ScriptedTool::new();
        tool.exits("source reset", 0);
        tool.exits("source update", 0);
        let summary = initialize_sources(&tool, &ExitCodeTable::new()).await;
        assert!(summary.reset_ok && summary.update_ok);
        assert_eq!(tool.calls(), vec!["source reset", "source update"]);
    }

    #[tokio::test]
    async fn test_failures_are_reported_not_raised() {
        let tool = ScriptedTool::new();
        tool.exits("source reset", 1);
        let summary = initialize_sources(&tool, &ExitCodeTable::new()).await;
        assert_eq!(
            summary,
            SourceSummary {
                reset_ok: false,
                update_ok: false
            }
        );
        assert_eq!(tool.calls().len(), 2);
    }
}
