//! Managed-repair strategy for steward.
//!
//! Installs the package manager's client module from a trusted repository and
//! asks it to repair the tool. Needs the network, so the repository is probed
//! once with a short timeout first and the attempt gives up immediately when
//! it is unreachable.

use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use steward_core::AcquisitionStrategy;
use steward_core::config::RepairConfig;
use steward_core::exec::{CommandRunner, run_configured};
use tracing::{debug, info, warn};

/// Repairs the tool through its client module.
pub struct RepairStrategy {
    runner: Arc<dyn CommandRunner>,
    repository_url: String,
    preflight_timeout: Duration,
    command: Vec<String>,
}

impl RepairStrategy {
    /// Create the strategy from its configuration section.
    #[must_use]
    pub fn new(runner: Arc<dyn CommandRunner>, config: &RepairConfig) -> Self {
        Self {
            runner,
            repository_url: config.repository_url.clone(),
            preflight_timeout: Duration::from_secs(config.preflight_timeout_secs),
            command: config.command.clone(),
        }
    }

    /// Whether the repository answers within the timeout.
    ///
    /// One request, no retries.
    async fn repository_reachable(&self) -> bool {
        let client = match Client::builder()
            .user_agent("steward")
            .timeout(self.preflight_timeout)
            .build()
        {
            Ok(client) => client,
            Err(e) => {
                warn!(error = %e, "Could not build HTTP client for preflight");
                return false;
            }
        };

        debug!(
            url = %self.repository_url,
            timeout = ?self.preflight_timeout,
            "Checking repository"
        );
        match client.get(&self.repository_url).send().await {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                warn!(
                    url = %self.repository_url,
                    status = %response.status(),
                    "Repository answered with an error"
                );
                false
            }
            Err(e) => {
                warn!(url = %self.repository_url, error = %e, "Repository unreachable");
                false
            }
        }
    }
}

#[async_trait]
impl AcquisitionStrategy for RepairStrategy {
    fn name(&self) -> &'static str {
        "repair"
    }

    async fn attempt(&self) -> bool {
        if !self.repository_reachable().await {
            info!("Skipping repair, repository unreachable");
            return false;
        }

        match run_configured(self.runner.as_ref(), &self.command).await {
            Ok(invocation) if invocation.exited_zero() => {
                debug!("Repair command succeeded");
                true
            }
            Ok(invocation) => {
                warn!(
                    exit_code = invocation.exit_code,
                    output = %invocation.combined_output(),
                    "Repair command failed"
                );
                false
            }
            Err(e) => {
                warn!(error = %e, "Repair command could not run");
                false
            }
        }
    }
}
