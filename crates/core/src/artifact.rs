//! Managed artifact identity, desired state and observed state.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which application to converge, and optionally which version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactIdentity {
    /// Opaque package id as the managed tool knows it.
    pub id: String,
    /// Pinned version, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl ArtifactIdentity {
    /// An artifact with no pinned version.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: None,
        }
    }

    /// An artifact pinned to `version`.
    #[must_use]
    pub fn pinned(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: Some(version.into()),
        }
    }

    /// The presence-type desired state implied by this identity.
    ///
    /// `Absent` is never implied; callers request it explicitly.
    #[must_use]
    pub fn desired(&self) -> DesiredState {
        match &self.version {
            Some(version) => DesiredState::Pinned(version.clone()),
            None => DesiredState::Present,
        }
    }
}

impl fmt::Display for ArtifactIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{}@{}", self.id, version),
            None => f.write_str(&self.id),
        }
    }
}

/// Target condition for an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "ensure", content = "version")]
pub enum DesiredState {
    /// Not installed.
    Absent,
    /// Installed, any version.
    Present,
    /// Installed at exactly this version.
    Pinned(String),
}

impl DesiredState {
    /// Whether `state` satisfies this desired state.
    ///
    /// An unknown installed version never satisfies a pin.
    #[must_use]
    pub fn is_satisfied_by(&self, state: &ArtifactState) -> bool {
        match (self, state) {
            (Self::Absent, ArtifactState::Absent) => true,
            (Self::Absent, _) | (Self::Present | Self::Pinned(_), ArtifactState::Absent) => false,
            (Self::Present, _) => true,
            (Self::Pinned(wanted), ArtifactState::PresentVersion(installed)) => wanted == installed,
            (Self::Pinned(_), ArtifactState::PresentUnknownVersion) => false,
        }
    }
}

impl fmt::Display for DesiredState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => write!(f, "absent"),
            Self::Present => write!(f, "present"),
            Self::Pinned(version) => write!(f, "pinned {version}"),
        }
    }
}

/// Installed state as observed by one detector query.
///
/// Never cached: each remediation step re-queries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "version")]
pub enum ArtifactState {
    /// Not installed.
    Absent,
    /// Installed at this version.
    PresentVersion(String),
    /// Installed, but the version could not be read.
    PresentUnknownVersion,
}

impl ArtifactState {
    /// Whether the artifact is installed at all.
    #[must_use]
    pub fn is_present(&self) -> bool {
        !matches!(self, Self::Absent)
    }

    /// Installed version, when known.
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        match self {
            Self::PresentVersion(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for ArtifactState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => write!(f, "absent"),
            Self::PresentVersion(v) => write!(f, "present ({v})"),
            Self::PresentUnknownVersion => write!(f, "present (unknown version)"),
        }
    }
}
