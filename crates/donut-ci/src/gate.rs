//! Mapping of report verdicts onto build results.

use donut_core::{BuildResult, ReportConsole};

/// Build result gate for the report step.
pub struct ReportGate;

impl ReportGate {
    /// Build result implied by the generator's console.
    ///
    /// A report that failed the build by the configured severity rules maps
    /// to `FAILURE`; anything else to `SUCCESS`.
    pub fn evaluate(console: &ReportConsole) -> BuildResult {
        if console.build_failed {
            BuildResult::Failure
        } else {
            BuildResult::Success
        }
    }

    /// Result the build ends with once the step outcome is applied.
    ///
    /// A step can only make a build worse, never better.
    pub fn settle(prior: Option<BuildResult>, step: BuildResult) -> BuildResult {
        prior.map_or(step, |prior| prior.combine(step))
    }
}
