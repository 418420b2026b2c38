//! Donut CI - the report publishing build step
//!
//! Provides the step a CI host runs after the tests:
//! - Skips aborted builds and builds without JSON results
//! - Resolves custom attributes against the build environment and `pom.xml`
//! - Collects results into the build's report directory and renders them
//! - Maps the report verdict onto the build result

pub mod gate;
pub mod pipeline;
pub mod spec;

// Re-export key types
pub use gate::ReportGate;
pub use pipeline::{ReportStep, StepOutcome};
pub use spec::{
    validate_source_directory, BuildContext, FormValidation, ReportStepConfig, DISPLAY_NAME,
};
