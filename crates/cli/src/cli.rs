use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use steward_core::config::{CONFIG_ENV, UpgradePolicy};
use steward_core::{ArtifactIdentity, DesiredState};

#[derive(Parser, Debug)]
#[command(name = "steward")]
#[command(about = "Makes a package manager operable and converges artifacts to a desired state")]
#[command(long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(
        long,
        global = true,
        env = CONFIG_ENV,
        help = "Path to the steward.toml configuration file"
    )]
    pub config: Option<PathBuf>,

    #[arg(
        short = 'l',
        long,
        global = true,
        help = "Set logging level",
        default_value = "warn",
        value_enum
    )]
    pub level: crate::tracing::LogLevel,

    #[arg(
        long,
        global = true,
        help = "Report output format",
        default_value = "text",
        value_enum
    )]
    pub format: OutputFormat,

    #[arg(long, global = true, help = "Output logs in JSON format")]
    pub json: bool,
}

/// How reports are written to stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One line per artifact
    Text,
    /// One JSON object per artifact
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(about = "Show version information")]
    Version,
    #[command(about = "Make the package manager operable, acquiring it if needed")]
    EnsureTool,
    #[command(about = "Report whether an artifact is in the desired state without changing it")]
    Detect {
        #[command(flatten)]
        target: TargetArgs,
    },
    #[command(about = "Converge an artifact to the desired state")]
    Reconcile {
        #[command(flatten)]
        target: TargetArgs,
        #[arg(long, value_enum, help = "How an available upgrade is treated")]
        upgrade_policy: Option<PolicyArg>,
    },
    #[command(about = "Upgrade an installed artifact in place")]
    Upgrade {
        #[arg(help = "Package id")]
        id: String,
    },
    #[command(about = "Converge every artifact in the manifest, in order")]
    Apply {
        #[arg(
            long,
            help = "Manifest with [[artifacts]] entries (defaults to the configuration file's)"
        )]
        manifest: Option<PathBuf>,
    },
}

/// Artifact selection shared by `detect` and `reconcile`.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct TargetArgs {
    #[arg(help = "Package id")]
    pub id: String,
    #[arg(long, help = "Pin this exact version")]
    pub version: Option<String>,
    #[arg(long, conflicts_with = "version", help = "Ensure the artifact is not installed")]
    pub absent: bool,
}

impl TargetArgs {
    /// Identity and desired state named by the arguments.
    pub fn resolve(&self) -> (ArtifactIdentity, DesiredState) {
        let identity = ArtifactIdentity {
            id: self.id.clone(),
            version: self.version.clone(),
        };
        let desired = if self.absent {
            DesiredState::Absent
        } else {
            identity.desired()
        };
        (identity, desired)
    }
}

/// Command-line spelling of [`UpgradePolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PolicyArg {
    /// Log available upgrades only
    Informational,
    /// Report available upgrades as non-compliant
    Fatal,
}

impl From<PolicyArg> for UpgradePolicy {
    fn from(policy: PolicyArg) -> Self {
        match policy {
            PolicyArg::Informational => Self::Informational,
            PolicyArg::Fatal => Self::Fatal,
        }
    }
}

impl Commands {
    /// Name used for the run span.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Version => "version",
            Self::EnsureTool => "ensure-tool",
            Self::Detect { .. } => "detect",
            Self::Reconcile { .. } => "reconcile",
            Self::Upgrade { .. } => "upgrade",
            Self::Apply { .. } => "apply",
        }
    }
}
