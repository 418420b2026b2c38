//! Build-side domain types.

pub mod error;
pub mod result;

pub use error::{DonutError, Result};
pub use result::{BuildResult, FailureSeverity, ReportConsole};
