//! Build results and the report generator's verdict.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result of a build as the CI host records it.
///
/// Variants are ordered from best to worst, so `Ord` matches the host's
/// severity ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildResult {
    Success,
    Failure,
    NotBuilt,
    Aborted,
}

impl BuildResult {
    pub fn name(&self) -> &'static str {
        match self {
            BuildResult::Success => "SUCCESS",
            BuildResult::Failure => "FAILURE",
            BuildResult::NotBuilt => "NOT_BUILT",
            BuildResult::Aborted => "ABORTED",
        }
    }

    /// Parse a host result name such as `NOT_BUILT` (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_uppercase().as_str() {
            "SUCCESS" => Some(BuildResult::Success),
            "FAILURE" => Some(BuildResult::Failure),
            "NOT_BUILT" => Some(BuildResult::NotBuilt),
            "ABORTED" => Some(BuildResult::Aborted),
            _ => None,
        }
    }

    pub fn is_worse_than(&self, other: BuildResult) -> bool {
        *self > other
    }

    /// The worse of the two results.
    pub fn combine(self, other: BuildResult) -> BuildResult {
        self.max(other)
    }
}

impl fmt::Display for BuildResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which non-passing scenario states count as failures in the report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FailureSeverity {
    pub skipped: bool,
    pub pending: bool,
    pub undefined: bool,
    pub missing: bool,
}

/// What the report generator reports back after rendering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportConsole {
    #[serde(alias = "buildFailed")]
    pub build_failed: bool,
}

impl ReportConsole {
    pub fn passed() -> Self {
        Self {
            build_failed: false,
        }
    }

    pub fn failed() -> Self {
        Self { build_failed: true }
    }
}
