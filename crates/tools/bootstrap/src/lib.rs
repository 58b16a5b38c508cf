//! Manual bootstrap strategy for steward.
//!
//! Last resort of the cascade. Downloads the tool's installer payloads into a
//! local cache and installs them directly:
//! - Dependencies first, in declaration order
//! - The main payload last
//!
//! A cached file is trusted as-is. Downloads land under a temporary name and
//! are renamed into place, so a present cache entry is always complete.

use async_trait::async_trait;
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use steward_core::config::{BootstrapConfig, PATH_PLACEHOLDER, Payload};
use steward_core::exec::{CommandRunner, run_configured};
use steward_core::{AcquisitionStrategy, Error, Result};
use tracing::{debug, info, warn};

/// Downloads and installs the tool's payloads.
pub struct BootstrapStrategy {
    runner: Arc<dyn CommandRunner>,
    cache_dir: PathBuf,
    main: Payload,
    dependencies: Vec<Payload>,
    install_command: Vec<String>,
}

impl BootstrapStrategy {
    /// Create the strategy from its configuration section.
    #[must_use]
    pub fn new(runner: Arc<dyn CommandRunner>, config: &BootstrapConfig) -> Self {
        Self {
            runner,
            cache_dir: config.cache_dir(),
            main: config.main.clone(),
            dependencies: config.dependencies.clone(),
            install_command: config.install_command.clone(),
        }
    }

    /// Cache directory payloads are stored in.
    #[must_use]
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Installer command line for one cached payload.
    #[must_use]
    pub fn install_command_for(&self, payload: &Path) -> Vec<String> {
        let path = payload.display().to_string();
        self.install_command
            .iter()
            .map(|arg| arg.replace(PATH_PLACEHOLDER, &path))
            .collect()
    }

    async fn run(&self) -> Result<bool> {
        let mut dependencies = Vec::with_capacity(self.dependencies.len());
        for payload in &self.dependencies {
            dependencies.push(self.fetch(payload).await?);
        }
        let main = self.fetch(&self.main).await?;

        for path in &dependencies {
            if !self.install(path).await {
                warn!(payload = %path.display(), "Dependency install failed, continuing");
            }
        }
        Ok(self.install(&main).await)
    }

    /// Make sure a payload is in the cache and return its path.
    async fn fetch(&self, payload: &Payload) -> Result<PathBuf> {
        let name = payload.cache_name()?;
        let path = self.cache_dir.join(&name);

        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            debug!(payload = %name, "Payload already cached");
            return Ok(path);
        }

        tokio::fs::create_dir_all(&self.cache_dir)
            .await
            .map_err(|e| Error::io(e, Some(self.cache_dir.clone()), "create bootstrap cache"))?;

        info!(payload = %name, url = %payload.url, "Downloading payload");
        let data = download(&payload.url).await?;

        let partial = self.cache_dir.join(format!("{name}.partial"));
        tokio::fs::write(&partial, &data)
            .await
            .map_err(|e| Error::io(e, Some(partial.clone()), "write payload"))?;
        tokio::fs::rename(&partial, &path)
            .await
            .map_err(|e| Error::io(e, Some(path.clone()), "move payload into cache"))?;

        let sha256 = format!("{:x}", Sha256::digest(&data));
        info!(payload = %name, bytes = data.len(), %sha256, "Payload cached");
        Ok(path)
    }

    async fn install(&self, payload: &Path) -> bool {
        let command = self.install_command_for(payload);
        match run_configured(self.runner.as_ref(), &command).await {
            Ok(invocation) if invocation.exited_zero() => {
                debug!(payload = %payload.display(), "Payload installed");
                true
            }
            Ok(invocation) => {
                warn!(
                    payload = %payload.display(),
                    exit_code = invocation.exit_code,
                    output = %invocation.combined_output(),
                    "Payload install failed"
                );
                false
            }
            Err(e) => {
                warn!(payload = %payload.display(), error = %e, "Installer could not run");
                false
            }
        }
    }
}

#[async_trait]
impl AcquisitionStrategy for BootstrapStrategy {
    fn name(&self) -> &'static str {
        "bootstrap"
    }

    async fn attempt(&self) -> bool {
        match self.run().await {
            Ok(installed) => installed,
            Err(e) => {
                warn!(error = %e, "Bootstrap failed");
                false
            }
        }
    }
}

/// Fetch a URL into memory.
async fn download(url: &str) -> Result<Vec<u8>> {
    let client = Client::builder()
        .user_agent("steward")
        .build()
        .map_err(|e| Error::download(url, e.to_string()))?;

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| Error::download(url, e.to_string()))?;

    if !response.status().is_success() {
        return Err(Error::download(url, format!("HTTP {}", response.status())));
    }

    response
        .bytes()
        .await
        .map(|b| b.to_vec())
        .map_err(|e| Error::download(url, e.to_string()))
}
