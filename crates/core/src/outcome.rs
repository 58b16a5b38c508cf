//! Outcome classification.
//!
//! The managed tool reports results through process exit codes: a mix of
//! platform installer codes and tool-specific HRESULT sentinels that show up
//! as negative `i32`s. [`ExitCodeTable`] maps the short list of codes with a
//! known meaning to an [`ExitCategory`]. Everything else is
//! [`ExitCategory::Unknown`] and is never treated as success.
//!
//! [`CanonicalOutcome`] is the small, stable result set handed to whatever
//! orchestrates steward. It is the only value automation may branch on.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Reinterpret an HRESULT as the signed exit code the platform reports.
#[allow(clippy::cast_possible_wrap)]
const fn hresult(code: u32) -> i32 {
    code as i32
}

/// Installer finished and a reboot is required to complete.
pub const SUCCESS_REBOOT_REQUIRED: i32 = 3010;
/// Installer finished and initiated a reboot.
pub const SUCCESS_REBOOT_INITIATED: i32 = 1641;
/// No installed package matched the query.
pub const NO_APPLICATIONS_FOUND: i32 = hresult(0x8A15_0014);
/// More than one package matched the query.
pub const MULTIPLE_APPLICATIONS_FOUND: i32 = hresult(0x8A15_0015);
/// No applicable upgrade was found.
pub const UPDATE_NOT_APPLICABLE: i32 = hresult(0x8A15_002B);
/// The package is already installed.
pub const PACKAGE_ALREADY_INSTALLED: i32 = hresult(0x8A15_0061);
/// The installer reported that the application is already installed.
pub const INSTALL_ALREADY_INSTALLED: i32 = hresult(0x8A15_010C);
/// The installer refused because a higher version is installed.
pub const INSTALL_DOWNGRADE: i32 = hresult(0x8A15_010D);

/// Semantic meaning of one raw exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "category", content = "code")]
pub enum ExitCategory {
    /// The operation succeeded.
    Success,
    /// The query matched nothing.
    NoResultsFound,
    /// The query matched several packages.
    MultipleMatches,
    /// An upgrade was requested but there is nothing newer.
    UpdateNotApplicable,
    /// An install was refused because the package is already present.
    AlreadyInstalledConflict,
    /// An install was refused because it would downgrade.
    DowngradeConflict,
    /// Not in the table.
    Unknown(i32),
}

impl ExitCategory {
    /// Whether this is one of the refusals that warrant uninstall-then-install.
    #[must_use]
    pub fn is_install_conflict(self) -> bool {
        matches!(self, Self::AlreadyInstalledConflict | Self::DowngradeConflict)
    }

    /// Whether an `upgrade` invocation with this result counts as done.
    ///
    /// "Nothing to upgrade" is success for an upgrade.
    #[must_use]
    pub fn upgrade_succeeded(self) -> bool {
        matches!(self, Self::Success | Self::UpdateNotApplicable)
    }
}

impl fmt::Display for ExitCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::NoResultsFound => write!(f, "no results found"),
            Self::MultipleMatches => write!(f, "multiple matches"),
            Self::UpdateNotApplicable => write!(f, "update not applicable"),
            Self::AlreadyInstalledConflict => write!(f, "already installed"),
            Self::DowngradeConflict => write!(f, "downgrade refused"),
            Self::Unknown(code) => write!(f, "unknown exit code {code}"),
        }
    }
}

/// Extra codes layered on top of the built-in table.
///
/// Deserialized from the `[exit_codes]` section of the configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExitCodeOverrides {
    /// Codes to treat as success.
    pub success: Vec<i32>,
    /// Codes meaning "no results".
    pub no_results_found: Vec<i32>,
    /// Codes meaning "ambiguous query".
    pub multiple_matches: Vec<i32>,
    /// Codes meaning "no upgrade available".
    pub update_not_applicable: Vec<i32>,
    /// Codes meaning "already installed".
    pub already_installed: Vec<i32>,
    /// Codes meaning "downgrade refused".
    pub downgrade: Vec<i32>,
}

/// Enumerated mapping from raw exit codes to categories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitCodeTable {
    entries: BTreeMap<i32, ExitCategory>,
}

impl Default for ExitCodeTable {
    fn default() -> Self {
        let entries = [
            (0, ExitCategory::Success),
            (SUCCESS_REBOOT_REQUIRED, ExitCategory::Success),
            (SUCCESS_REBOOT_INITIATED, ExitCategory::Success),
            (NO_APPLICATIONS_FOUND, ExitCategory::NoResultsFound),
            (MULTIPLE_APPLICATIONS_FOUND, ExitCategory::MultipleMatches),
            (UPDATE_NOT_APPLICABLE, ExitCategory::UpdateNotApplicable),
            (PACKAGE_ALREADY_INSTALLED, ExitCategory::AlreadyInstalledConflict),
            (INSTALL_ALREADY_INSTALLED, ExitCategory::AlreadyInstalledConflict),
            (INSTALL_DOWNGRADE, ExitCategory::DowngradeConflict),
        ];
        Self {
            entries: entries.into_iter().collect(),
        }
    }
}

impl ExitCodeTable {
    /// The built-in table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in table extended with configured codes.
    ///
    /// Configured codes replace built-in entries with the same value.
    #[must_use]
    pub fn with_overrides(overrides: &ExitCodeOverrides) -> Self {
        let mut table = Self::default();
        let groups = [
            (&overrides.success, ExitCategory::Success),
            (&overrides.no_results_found, ExitCategory::NoResultsFound),
            (&overrides.multiple_matches, ExitCategory::MultipleMatches),
            (
                &overrides.update_not_applicable,
                ExitCategory::UpdateNotApplicable,
            ),
            (
                &overrides.already_installed,
                ExitCategory::AlreadyInstalledConflict,
            ),
            (&overrides.downgrade, ExitCategory::DowngradeConflict),
        ];
        for (codes, category) in groups {
            for &code in codes {
                table.entries.insert(code, category);
            }
        }
        table
    }

    /// Classify a raw exit code.
    #[must_use]
    pub fn classify(&self, code: i32) -> ExitCategory {
        self.entries
            .get(&code)
            .copied()
            .unwrap_or(ExitCategory::Unknown(code))
    }

    /// Whether the code is a success that still needs a reboot.
    #[must_use]
    pub fn requires_reboot(code: i32) -> bool {
        matches!(code, SUCCESS_REBOOT_REQUIRED | SUCCESS_REBOOT_INITIATED)
    }
}

/// The result contract exposed to the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalOutcome {
    /// The artifact is in the desired state.
    Converged,
    /// The artifact should be present and is not.
    NotInstalled,
    /// The installed state could not be queried.
    ListFailed,
    /// The managed tool could not be made operable.
    ToolUnavailable,
    /// The artifact id matched more than one package.
    AmbiguousMatch,
    /// A newer version exists and policy treats that as non-compliant.
    UpgradeAvailable,
    /// A pinned version could not be reached within the remediation budget.
    VersionMismatchUnresolved,
    /// Anything not covered above.
    UnknownError,
}

impl CanonicalOutcome {
    /// Every outcome, in exit-code order.
    pub const ALL: [Self; 8] = [
        Self::Converged,
        Self::NotInstalled,
        Self::ListFailed,
        Self::ToolUnavailable,
        Self::AmbiguousMatch,
        Self::UpgradeAvailable,
        Self::VersionMismatchUnresolved,
        Self::UnknownError,
    ];

    /// Stable process exit code for this outcome.
    #[must_use]
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Converged => 0,
            Self::NotInstalled => 1,
            Self::ListFailed => 2,
            Self::ToolUnavailable => 3,
            Self::AmbiguousMatch => 4,
            Self::UpgradeAvailable => 5,
            Self::VersionMismatchUnresolved => 6,
            Self::UnknownError => 7,
        }
    }

    /// Whether the orchestrator should read this as success.
    #[must_use]
    pub fn is_success(self) -> bool {
        self == Self::Converged
    }

    /// Stable machine-readable name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Converged => "converged",
            Self::NotInstalled => "not_installed",
            Self::ListFailed => "list_failed",
            Self::ToolUnavailable => "tool_unavailable",
            Self::AmbiguousMatch => "ambiguous_match",
            Self::UpgradeAvailable => "upgrade_available",
            Self::VersionMismatchUnresolved => "version_mismatch_unresolved",
            Self::UnknownError => "unknown_error",
        }
    }
}

impl fmt::Display for CanonicalOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_values_match_hresults() {
        assert_eq!(NO_APPLICATIONS_FOUND, -1_978_335_212);
        assert_eq!(MULTIPLE_APPLICATIONS_FOUND, -1_978_335_211);
        assert_eq!(UPDATE_NOT_APPLICABLE, -1_978_335_189);
        assert_eq!(PACKAGE_ALREADY_INSTALLED, -1_978_335_135);
        assert_eq!(INSTALL_ALREADY_INSTALLED, -1_978_334_964);
        assert_eq!(INSTALL_DOWNGRADE, -1_978_334_963);
    }

    #[test]
    fn test_classify_known_codes() {
        let table = ExitCodeTable::new();
        assert_eq!(table.classify(0), ExitCategory::Success);
        assert_eq!(table.classify(3010), ExitCategory::Success);
        assert_eq!(table.classify(1641), ExitCategory::Success);
        assert_eq!(
            table.classify(NO_APPLICATIONS_FOUND),
            ExitCategory::NoResultsFound
        );
        assert_eq!(
            table.classify(MULTIPLE_APPLICATIONS_FOUND),
            ExitCategory::MultipleMatches
        );
        assert_eq!(
            table.classify(UPDATE_NOT_APPLICABLE),
            ExitCategory::UpdateNotApplicable
        );
        assert_eq!(
            table.classify(PACKAGE_ALREADY_INSTALLED),
            ExitCategory::AlreadyInstalledConflict
        );
        assert_eq!(
            table.classify(INSTALL_DOWNGRADE),
            ExitCategory::DowngradeConflict
        );
    }

    #[test]
    fn test_unknown_codes_are_never_success() {
        let table = ExitCodeTable::new();
        for code in [1, -1, 2, 1603, 1618, i32::MIN, i32::MAX] {
            assert_eq!(table.classify(code), ExitCategory::Unknown(code));
        }
    }

    #[test]
    fn test_overrides_extend_and_replace() {
        let overrides = ExitCodeOverrides {
            success: vec![1707],
            downgrade: vec![PACKAGE_ALREADY_INSTALLED],
            ..Default::default()
        };
        let table = ExitCodeTable::with_overrides(&overrides);
        assert_eq!(table.classify(1707), ExitCategory::Success);
        assert_eq!(
            table.classify(PACKAGE_ALREADY_INSTALLED),
            ExitCategory::DowngradeConflict
        );
        assert_eq!(table.entries.len(), ExitCodeTable::new().entries.len() + 1);
    }

    #[test]
    fn test_upgrade_succeeded() {
        assert!(ExitCategory::Success.upgrade_succeeded());
        assert!(ExitCategory::UpdateNotApplicable.upgrade_succeeded());
        assert!(!ExitCategory::NoResultsFound.upgrade_succeeded());
        assert!(!ExitCategory::Unknown(1).upgrade_succeeded());
    }

    #[test]
    fn test_install_conflict() {
        assert!(ExitCategory::AlreadyInstalledConflict.is_install_conflict());
        assert!(ExitCategory::DowngradeConflict.is_install_conflict());
        assert!(!ExitCategory::Success.is_install_conflict());
        assert!(!ExitCategory::Unknown(-5).is_install_conflict());
    }

    #[test]
    fn test_requires_reboot() {
        assert!(ExitCodeTable::requires_reboot(3010));
        assert!(ExitCodeTable::requires_reboot(1641));
        assert!(!ExitCodeTable::requires_reboot(0));
    }

    #[test]
    fn test_outcome_exit_codes_are_distinct() {
        let mut codes: Vec<i32> = CanonicalOutcome::ALL.iter().map(|o| o.exit_code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), CanonicalOutcome::ALL.len());
        assert_eq!(CanonicalOutcome::Converged.exit_code(), 0);
    }

    #[test]
    fn test_only_converged_is_success() {
        for outcome in CanonicalOutcome::ALL {
            assert_eq!(outcome.is_success(), outcome == CanonicalOutcome::Converged);
        }
    }

    #[test]
    fn test_outcome_serialization() {
        let json = serde_json::to_string(&CanonicalOutcome::VersionMismatchUnresolved).unwrap();
        assert_eq!(json, "\"version_mismatch_unresolved\"");
        assert_eq!(
            CanonicalOutcome::VersionMismatchUnresolved.to_string(),
            "version_mismatch_unresolved"
        );
    }
}
