//! Report step configuration and build context.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use anyhow::Context;
use donut_core::{BuildResult, FailureSeverity};
use serde::{Deserialize, Serialize};

/// Name the step is listed under in the host.
pub const DISPLAY_NAME: &str = "Generate Donut report from results";

/// User configuration of the report step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportStepConfig {
    /// Directory, relative to the workspace, holding the JSON results.
    pub source_directory: String,

    /// Which scenario states fail the build.
    pub severity: FailureSeverity,

    /// Raw `key=value` block of extra report attributes.
    pub custom_attributes: String,
}

impl ReportStepConfig {
    pub fn new(source_directory: impl Into<String>) -> Self {
        Self {
            source_directory: source_directory.into(),
            ..Default::default()
        }
    }

    pub fn with_severity(mut self, severity: FailureSeverity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_custom_attributes(mut self, raw: impl Into<String>) -> Self {
        self.custom_attributes = raw.into();
        self
    }

    /// Load a step configuration from a JSON file.
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read step config: {:?}", path))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse step config: {:?}", path))
    }
}

/// The build the step runs for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildContext {
    /// Checked-out workspace; holds the result directory and `pom.xml`.
    pub workspace: PathBuf,

    /// Per-build storage directory; the report lands in `<build_root>/donut`.
    pub build_root: PathBuf,

    pub job_name: String,

    pub build_number: u64,

    /// Result of the build so far, if the host has set one.
    pub prior_result: Option<BuildResult>,

    /// Build environment variables.
    pub env: BTreeMap<String, String>,
}

impl BuildContext {
    pub fn new(
        workspace: impl Into<PathBuf>,
        build_root: impl Into<PathBuf>,
        job_name: impl Into<String>,
        build_number: u64,
    ) -> Self {
        Self {
            workspace: workspace.into(),
            build_root: build_root.into(),
            job_name: job_name.into(),
            build_number,
            prior_result: None,
            env: BTreeMap::new(),
        }
    }

    pub fn with_prior_result(mut self, result: BuildResult) -> Self {
        self.prior_result = Some(result);
        self
    }

    pub fn with_env<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// `#<number>`, the way hosts label builds.
    pub fn display_name(&self) -> String {
        format!("#{}", self.build_number)
    }
}

/// Outcome of checking a configured value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum FormValidation {
    Ok,
    Warning(String),
    Error(String),
}

impl FormValidation {
    pub fn is_error(&self) -> bool {
        matches!(self, FormValidation::Error(_))
    }
}

/// Check that `value` names a directory inside `workspace`.
///
/// An empty value means the workspace itself. When the workspace does not
/// exist yet the value cannot be checked and a warning is returned.
pub fn validate_source_directory(workspace: &Path, value: &str) -> FormValidation {
    let value = value.trim();
    if value.is_empty() {
        return FormValidation::Ok;
    }

    let relative = Path::new(value);
    if relative.is_absolute() {
        return FormValidation::Error(format!("Absolute paths are not allowed: {value}"));
    }

    let mut depth = 0i32;
    for component in relative.components() {
        match component {
            Component::ParentDir => depth -= 1,
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::RootDir | Component::Prefix(_) => {
                return FormValidation::Error(format!("Absolute paths are not allowed: {value}"));
            }
        }
        if depth < 0 {
            return FormValidation::Error(format!("Path escapes the workspace: {value}"));
        }
    }

    if !workspace.is_dir() {
        return FormValidation::Warning(format!(
            "Workspace {:?} does not exist yet; cannot check {value}",
            workspace
        ));
    }

    let target = workspace.join(relative);
    if !target.exists() {
        FormValidation::Error(format!("No such directory: {value}"))
    } else if !target.is_dir() {
        FormValidation::Error(format!("Not a directory: {value}"))
    } else {
        FormValidation::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_step_config_from_json_defaults() {
        let config: ReportStepConfig =
            serde_json::from_str(r#"{"source_directory": "target/cucumber"}"#).unwrap();
        assert_eq!(config.source_directory, "target/cucumber");
        assert_eq!(config.severity, FailureSeverity::default());
        assert!(config.custom_attributes.is_empty());
    }

    #[test]
    fn test_step_config_from_json_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("step.json");
        std::fs::write(
            &path,
            r#"{"source_directory": "out", "severity": {"skipped": true}, "custom_attributes": "owner=${TEAM}"}"#,
        )
        .unwrap();

        let config = ReportStepConfig::from_json_file(&path).unwrap();
        assert!(config.severity.skipped);
        assert_eq!(config.custom_attributes, "owner=${TEAM}");
        assert!(ReportStepConfig::from_json_file(&dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_build_context_builders() {
        let ctx = BuildContext::new("/ws", "/builds/3", "checkout", 3)
            .with_prior_result(BuildResult::Success)
            .with_env([("TEAM", "qa")]);
        assert_eq!(ctx.display_name(), "#3");
        assert_eq!(ctx.prior_result, Some(BuildResult::Success));
        assert_eq!(ctx.env["TEAM"], "qa");
    }

    #[test]
    fn test_validate_source_directory() {
        let ws = tempdir().unwrap();
        std::fs::create_dir_all(ws.path().join("target/cucumber")).unwrap();
        std::fs::write(ws.path().join("README"), "").unwrap();

        assert_eq!(validate_source_directory(ws.path(), ""), FormValidation::Ok);
        assert_eq!(
            validate_source_directory(ws.path(), "target/cucumber"),
            FormValidation::Ok
        );
        assert!(validate_source_directory(ws.path(), "target/../target").eq(&FormValidation::Ok));
        assert!(validate_source_directory(ws.path(), "/etc").is_error());
        assert!(validate_source_directory(ws.path(), "../elsewhere").is_error());
        assert!(validate_source_directory(ws.path(), "README").is_error());
        assert!(validate_source_directory(ws.path(), "missing").is_error());
    }

    #[test]
    fn test_validate_without_workspace_warns() {
        let ws = tempdir().unwrap();
        let result = validate_source_directory(&ws.path().join("not-yet"), "results");
        assert!(matches!(result, FormValidation::Warning(_)));
    }
}
