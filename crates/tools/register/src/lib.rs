//! Lightweight registration strategy for steward.
//!
//! Re-registers an already-staged copy of the managed tool for the current
//! user. Fast and offline, so it runs first in the cascade.

use async_trait::async_trait;
use std::sync::Arc;
use steward_core::AcquisitionStrategy;
use steward_core::config::RegisterConfig;
use steward_core::exec::{CommandRunner, run_configured};
use tracing::{debug, warn};

/// Runs the configured registration command.
pub struct RegisterStrategy {
    runner: Arc<dyn CommandRunner>,
    command: Vec<String>,
}

impl RegisterStrategy {
    /// Create the strategy from its configuration section.
    #[must_use]
    pub fn new(runner: Arc<dyn CommandRunner>, config: &RegisterConfig) -> Self {
        Self {
            runner,
            command: config.command.clone(),
        }
    }
}

#[async_trait]
impl AcquisitionStrategy for RegisterStrategy {
    fn name(&self) -> &'static str {
        "register"
    }

    async fn attempt(&self) -> bool {
        match run_configured(self.runner.as_ref(), &self.command).await {
            Ok(invocation) if invocation.exited_zero() => {
                debug!("Registration command succeeded");
                true
            }
            Ok(invocation) => {
                warn!(
                    exit_code = invocation.exit_code,
                    output = %invocation.combined_output(),
                    "Registration command failed"
                );
                false
            }
            Err(e) => {
                warn!(error = %e, "Registration command could not run");
                false
            }
        }
    }
}
