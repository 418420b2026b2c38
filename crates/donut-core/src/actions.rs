//! Report browsing actions attached to builds and projects.
//!
//! An action knows which directory holds the rendered report and what to do
//! when someone opens it: serve the directory with the report page as index,
//! or redirect to an error page when no report was rendered.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Directory under a build (or project) root that holds the report.
pub const REPORT_DIR_NAME: &str = "donut";
pub const URL_NAME: &str = "donut";
pub const DISPLAY_NAME: &str = "Donut Reporting";
pub const ICON_FILE_NAME: &str = "/plugin/donut-jenkins-plugin/icons/donut.png";
/// Page served as the directory index.
pub const REPORT_INDEX_FILE: &str = "donut-report.html";
/// Where visitors are sent when the report page is missing.
pub const ERROR_PAGE: &str = "/plugin/donut-jenkins-plugin/error.html";

/// `<root>/donut`
pub fn report_dir(root: &Path) -> PathBuf {
    root.join(REPORT_DIR_NAME)
}

/// What to serve when a report action is opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BrowseTarget {
    /// Browse `dir`, using `index_file` as the directory index.
    Index { dir: PathBuf, index_file: String },
    /// No report rendered; redirect to `location`.
    Redirect { location: String },
}

pub trait ReportAction {
    /// Title shown above the directory listing.
    fn title(&self) -> String;

    /// Directory holding the rendered report.
    fn dir(&self) -> PathBuf;

    fn url_name(&self) -> &'static str {
        URL_NAME
    }

    fn display_name(&self) -> &'static str {
        DISPLAY_NAME
    }

    fn icon_file_name(&self) -> &'static str {
        ICON_FILE_NAME
    }

    fn browse(&self) -> BrowseTarget {
        let dir = self.dir();
        if dir.join(REPORT_INDEX_FILE).is_file() {
            BrowseTarget::Index {
                dir,
                index_file: REPORT_INDEX_FILE.to_string(),
            }
        } else {
            debug!(dir = %dir.display(), "No rendered report, redirecting to error page");
            BrowseTarget::Redirect {
                location: ERROR_PAGE.to_string(),
            }
        }
    }
}

/// Report of a single build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildReportAction {
    pub build_display_name: String,
    pub build_root: PathBuf,
}

impl BuildReportAction {
    pub fn new(build_display_name: impl Into<String>, build_root: impl Into<PathBuf>) -> Self {
        Self {
            build_display_name: build_display_name.into(),
            build_root: build_root.into(),
        }
    }
}

impl ReportAction for BuildReportAction {
    fn title(&self) -> String {
        format!("{} html3", self.build_display_name)
    }

    fn dir(&self) -> PathBuf {
        report_dir(&self.build_root)
    }
}

/// Project-level entry point: the latest completed build's report when it
/// has one, otherwise the project's own report directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectReportAction {
    pub project_display_name: String,
    pub project_root: PathBuf,
    pub last_completed_build_root: Option<PathBuf>,
}

impl ProjectReportAction {
    pub fn new(project_display_name: impl Into<String>, project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_display_name: project_display_name.into(),
            project_root: project_root.into(),
            last_completed_build_root: None,
        }
    }

    pub fn with_last_completed_build(mut self, build_root: impl Into<PathBuf>) -> Self {
        self.last_completed_build_root = Some(build_root.into());
        self
    }
}

impl ReportAction for ProjectReportAction {
    fn title(&self) -> String {
        format!("{} html2", self.project_display_name)
    }

    fn dir(&self) -> PathBuf {
        self.last_completed_build_root
            .as_deref()
            .map(report_dir)
            .filter(|dir| dir.exists())
            .unwrap_or_else(|| report_dir(&self.project_root))
    }
}
