//! Per-run logging context.
//!
//! Each run creates one [`RunContext`] and hands it to every component it
//! constructs. Components log inside the run's span, so every event carries
//! the run id without any process-wide correlation state.

use tracing::Span;
use uuid::Uuid;

/// Logging context owned by one steward run.
#[derive(Debug, Clone)]
pub struct RunContext {
    run_id: Uuid,
    span: Span,
}

impl RunContext {
    /// Start a new run context with a fresh id.
    #[must_use]
    pub fn new(command: &str) -> Self {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("run", %run_id, command = %command);
        Self { run_id, span }
    }

    /// Context with a disabled span, for tests and embedding.
    #[must_use]
    pub fn detached() -> Self {
        Self {
            run_id: Uuid::nil(),
            span: Span::none(),
        }
    }

    /// Unique id of this run.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Span all of this run's events belong to.
    #[must_use]
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Child span for one artifact.
    #[must_use]
    pub fn artifact_span(&self, artifact: &str) -> Span {
        tracing::info_span!(parent: &self.span, "artifact", artifact = %artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_ids_are_unique() {
        let a = RunContext::new("reconcile");
        let b = RunContext::new("reconcile");
        assert_ne!(a.run_id(), b.run_id());
    }

    #[test]
    fn test_detached_context() {
        let ctx = RunContext::detached();
        assert!(ctx.run_id().is_nil());
        assert!(ctx.span().is_none());
    }
}
