//! Configuration types for steward
//!
//! Read from a TOML file. Every section is optional; a missing file yields
//! the defaults, which target `winget` on Windows.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::artifact::{ArtifactIdentity, DesiredState};
use crate::outcome::ExitCodeOverrides;
use crate::{Error, Result};

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "STEWARD_CONFIG";

/// File looked up in the working directory when nothing else is given.
pub const DEFAULT_CONFIG_FILE: &str = "steward.toml";

/// Placeholder replaced with the payload path in installer commands.
pub const PATH_PLACEHOLDER: &str = "{path}";

/// Main configuration structure for steward
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// The managed tool.
    pub tool: ToolConfig,
    /// Acquisition strategies.
    pub acquisition: AcquisitionConfig,
    /// Extra exit codes for the classifier.
    pub exit_codes: ExitCodeOverrides,
    /// Convergence policy.
    pub reconcile: ReconcileConfig,
    /// Post-convergence hooks.
    pub hooks: HooksConfig,
    /// Artifacts converged by `apply`.
    pub artifacts: Vec<ArtifactEntry>,
}

impl Config {
    /// Parse configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the text is not valid TOML or does
    /// not match the schema.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::configuration(e.to_string()))
    }

    /// Read configuration from a file.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::io(e, Some(path.to_path_buf()), "read configuration"))?;
        toml::from_str(&text).map_err(|e| Error::configuration_at(e.to_string(), path))
    }

    /// Resolve and load the configuration.
    ///
    /// Order: `explicit`, then `$STEWARD_CONFIG`, then `./steward.toml`.
    /// An explicit or environment path must exist; the working-directory file
    /// is optional and its absence yields defaults.
    ///
    /// # Errors
    ///
    /// Returns an error when a named file is missing or invalid.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Self::from_file(Path::new(&path));
        }
        let local = Path::new(DEFAULT_CONFIG_FILE);
        if local.is_file() {
            return Self::from_file(local);
        }
        tracing::debug!("No configuration file found, using defaults");
        Ok(Self::default())
    }
}

/// Install scope passed to the managed tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallScope {
    /// Current user only.
    User,
    /// All users.
    Machine,
}

impl InstallScope {
    /// Value for the tool's `--scope` flag.
    #[must_use]
    pub fn as_arg(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Machine => "machine",
        }
    }
}

/// The managed tool itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ToolConfig {
    /// Program name or path probed first.
    pub program: String,
    /// Additional locations probed in order when `program` is not ready.
    pub fallback_paths: Vec<PathBuf>,
    /// Install scope, omitted from the command line when unset.
    pub scope: Option<InstallScope>,
    /// Pass `--silent` to install, upgrade and uninstall.
    pub silent: bool,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            program: "winget".to_string(),
            fallback_paths: Vec::new(),
            scope: None,
            silent: true,
        }
    }
}

impl ToolConfig {
    /// Every location the readiness probe should try, in order.
    #[must_use]
    pub fn candidates(&self) -> Vec<PathBuf> {
        std::iter::once(PathBuf::from(&self.program))
            .chain(self.fallback_paths.iter().cloned())
            .collect()
    }
}

/// All acquisition strategies, in cascade order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default, deny_unknown_fields)]
pub struct AcquisitionConfig {
    /// Lightweight registration.
    pub register: RegisterConfig,
    /// Managed repair.
    pub repair: RepairConfig,
    /// Manual bootstrap.
    pub bootstrap: BootstrapConfig,
}

/// Lightweight registration of an existing install.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RegisterConfig {
    /// Whether the strategy takes part in the cascade.
    pub enabled: bool,
    /// Registration command as an argument vector.
    pub command: Vec<String>,
}

impl Default for RegisterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: powershell(
                "Add-AppxPackage -RegisterByFamilyName -MainPackage Microsoft.DesktopAppInstaller_8wekyb3d8bbwe",
            ),
        }
    }
}

/// Repair through a package-provider client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RepairConfig {
    /// Whether the strategy takes part in the cascade.
    pub enabled: bool,
    /// Repository that must be reachable before the repair is attempted.
    pub repository_url: String,
    /// Upper bound for the reachability check.
    pub preflight_timeout_secs: u64,
    /// Repair command as an argument vector.
    pub command: Vec<String>,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            repository_url: "https://www.powershellgallery.com/api/v2".to_string(),
            preflight_timeout_secs: 10,
            command: powershell(concat!(
                "$ErrorActionPreference = 'Stop'; ",
                "Install-PackageProvider -Name NuGet -Force -Scope AllUsers | Out-Null; ",
                "Install-Module -Name Microsoft.WinGet.Client -Repository PSGallery -Force -Scope AllUsers -AllowClobber; ",
                "Import-Module Microsoft.WinGet.Client; ",
                "Repair-WinGetPackageManager -AllUsers -Force -Latest",
            )),
        }
    }
}

/// One downloadable installer payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Payload {
    /// Download location.
    pub url: String,
    /// Cache file name; defaults to the last URL path segment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

impl Payload {
    /// Create a payload with an explicit cache file name.
    #[must_use]
    pub fn new(url: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            file_name: Some(file_name.into()),
        }
    }

    /// File name the payload is cached under.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when no name is given and the URL has no
    /// usable last segment.
    pub fn cache_name(&self) -> Result<String> {
        if let Some(name) = &self.file_name {
            return Ok(name.clone());
        }
        self.url
            .split(['?', '#'])
            .next()
            .and_then(|path| path.rsplit('/').next())
            .filter(|segment| !segment.is_empty() && !segment.contains(':'))
            .map(String::from)
            .ok_or_else(|| {
                Error::configuration(format!(
                    "payload {} needs an explicit file_name",
                    self.url
                ))
            })
    }
}

/// Manual bootstrap from downloaded payloads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct BootstrapConfig {
    /// Whether the strategy takes part in the cascade.
    pub enabled: bool,
    /// Download cache; defaults to the platform cache directory.
    pub cache_dir: Option<PathBuf>,
    /// Installed last.
    pub main: Payload,
    /// Installed first, in order.
    pub dependencies: Vec<Payload>,
    /// Installer command; `{path}` is replaced with the cached payload path.
    pub install_command: Vec<String>,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cache_dir: None,
            main: Payload::new(
                "https://aka.ms/getwinget",
                "Microsoft.DesktopAppInstaller_8wekyb3d8bbwe.msixbundle",
            ),
            dependencies: vec![
                Payload::new(
                    "https://aka.ms/Microsoft.VCLibs.x64.14.00.Desktop.appx",
                    "Microsoft.VCLibs.x64.14.00.Desktop.appx",
                ),
                Payload::new(
                    "https://github.com/microsoft/microsoft-ui-xaml/releases/download/v2.8.6/Microsoft.UI.Xaml.2.8.x64.appx",
                    "Microsoft.UI.Xaml.2.8.x64.appx",
                ),
            ],
            install_command: powershell("Add-AppxPackage -Path '{path}'"),
        }
    }
}

impl BootstrapConfig {
    /// The cache directory, defaulting to `<cache>/steward/bootstrap`.
    #[must_use]
    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(default_cache_dir)
    }
}

/// Default download cache for bootstrap payloads.
#[must_use]
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("steward")
        .join("bootstrap")
}

/// How an available upgrade affects a present-any target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpgradePolicy {
    /// Logged only; the target stays converged.
    #[default]
    Informational,
    /// Reported as `UpgradeAvailable`; no remediation is attempted.
    Fatal,
}

impl std::str::FromStr for UpgradePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "informational" => Ok(Self::Informational),
            "fatal" => Ok(Self::Fatal),
            other => Err(Error::configuration(format!(
                "unknown upgrade policy '{other}' (expected informational or fatal)"
            ))),
        }
    }
}

/// Convergence policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default, deny_unknown_fields)]
pub struct ReconcileConfig {
    /// Handling of available upgrades for unpinned targets.
    pub upgrade_policy: UpgradePolicy,
}

/// Post-convergence hook settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct HooksConfig {
    /// Directory searched for `<artifact-id>.<ext>` scripts.
    pub dir: Option<PathBuf>,
    /// Hook timeout in seconds.
    pub timeout_secs: u64,
    /// Explicit hook commands by artifact id, taking precedence over `dir`.
    pub commands: BTreeMap<String, Vec<String>>,
}

impl Default for HooksConfig {
    fn default() -> Self {
        Self {
            dir: None,
            timeout_secs: 300,
            commands: BTreeMap::new(),
        }
    }
}

/// Requested presence in a manifest entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ensure {
    /// Installed (pinned when a version is given).
    #[default]
    Present,
    /// Not installed.
    Absent,
}

/// One artifact in a manifest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ArtifactEntry {
    /// Package id.
    pub id: String,
    /// Pinned version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Requested presence.
    #[serde(default)]
    pub ensure: Ensure,
}

impl ArtifactEntry {
    /// Identity and desired state for this entry.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an `absent` entry that also pins a
    /// version, or an empty id.
    pub fn resolve(&self) -> Result<(ArtifactIdentity, DesiredState)> {
        if self.id.trim().is_empty() {
            return Err(Error::configuration("artifact id must not be empty"));
        }
        let identity = ArtifactIdentity {
            id: self.id.clone(),
            version: self.version.clone(),
        };
        match self.ensure {
            Ensure::Present => {
                let desired = identity.desired();
                Ok((identity, desired))
            }
            Ensure::Absent if self.version.is_some() => Err(Error::configuration(format!(
                "artifact {} is ensured absent but pins a version",
                self.id
            ))),
            Ensure::Absent => Ok((identity, DesiredState::Absent)),
        }
    }
}

/// A standalone artifact list, same shape as the `[[artifacts]]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default, deny_unknown_fields)]
pub struct Manifest {
    /// Artifacts, processed in order.
    pub artifacts: Vec<ArtifactEntry>,
}

impl Manifest {
    /// Read a manifest file.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::io(e, Some(path.to_path_buf()), "read manifest"))?;
        toml::from_str(&text).map_err(|e| Error::configuration_at(e.to_string(), path))
    }
}

fn powershell(script: &str) -> Vec<String> {
    vec![
        "powershell.exe".to_string(),
        "-NoProfile".to_string(),
        "-NonInteractive".to_string(),
        "-ExecutionPolicy".to_string(),
        "Bypass".to_string(),
        "-Command".to_string(),
        script.to_string(),
    ]
}
