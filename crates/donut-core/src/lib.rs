//! Donut Core Library
//!
//! Build-side building blocks for publishing Donut reports: build results,
//! result-file collection, the report generator seam and the browsing
//! actions that expose a rendered report.

pub mod actions;
pub mod domain;
pub mod fakes;
pub mod generator;
pub mod results;
pub mod telemetry;

pub use actions::{
    report_dir, BrowseTarget, BuildReportAction, ProjectReportAction, ReportAction,
    REPORT_DIR_NAME, REPORT_INDEX_FILE,
};
pub use domain::{BuildResult, DonutError, FailureSeverity, ReportConsole, Result};
pub use generator::{parse_console, CommandGenerator, GenerationRequest, ReportGenerator};
pub use results::{copy_results, has_results, result_files, RESULT_PATTERN};
pub use telemetry::init_tracing;
