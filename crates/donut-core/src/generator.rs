//! Report generator seam.
//!
//! Rendering happens outside this workspace. [`ReportGenerator`] is the one
//! call the build step makes; [`CommandGenerator`] runs an external generator
//! process and reads its verdict from stdout.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use donut_attributes::Attributes;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::debug;

use crate::domain::{DonutError, FailureSeverity, ReportConsole, Result};

/// Template the generator renders with.
pub const DEFAULT_TEMPLATE: &str = "default";

/// Everything the generator needs to render one report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Directory the result files were collected into.
    pub result_sources: PathBuf,
    /// Directory the rendered report is written to.
    pub output_path: PathBuf,
    pub file_prefix: String,
    pub timestamp: String,
    pub template: String,
    pub severity: FailureSeverity,
    /// Job name.
    pub build_name: String,
    pub build_number: String,
    pub custom_attributes: Attributes,
}

impl GenerationRequest {
    /// Request that reads results from and renders into `output_dir`.
    pub fn new(
        output_dir: PathBuf,
        severity: FailureSeverity,
        build_name: impl Into<String>,
        build_number: impl Into<String>,
        custom_attributes: Attributes,
    ) -> Self {
        Self {
            result_sources: output_dir.clone(),
            output_path: output_dir,
            file_prefix: String::new(),
            timestamp: String::new(),
            template: DEFAULT_TEMPLATE.to_string(),
            severity,
            build_name: build_name.into(),
            build_number: build_number.into(),
            custom_attributes,
        }
    }
}

#[async_trait]
pub trait ReportGenerator: Send + Sync {
    /// Render the report and say whether the build should fail.
    async fn generate(&self, request: &GenerationRequest) -> Result<ReportConsole>;
}

/// Runs an external generator executable.
///
/// The request is passed as flags after the configured command; the
/// generator must print its [`ReportConsole`] as JSON on the last non-empty
/// line of stdout.
#[derive(Debug, Clone)]
pub struct CommandGenerator {
    command: Vec<String>,
    timeout_secs: u64,
}

impl CommandGenerator {
    /// `timeout_secs == 0` waits indefinitely.
    pub fn new(command: Vec<String>, timeout_secs: u64) -> Self {
        Self {
            command,
            timeout_secs,
        }
    }

    /// Flags describing `request`, in a stable order.
    pub fn request_args(request: &GenerationRequest) -> Vec<String> {
        let mut args = vec![
            "--result-sources".to_string(),
            request.result_sources.to_string_lossy().into_owned(),
            "--output-path".to_string(),
            request.output_path.to_string_lossy().into_owned(),
            "--prefix".to_string(),
            request.file_prefix.clone(),
            "--timestamp".to_string(),
            request.timestamp.clone(),
            "--template".to_string(),
            request.template.clone(),
            "--project-name".to_string(),
            request.build_name.clone(),
            "--project-version".to_string(),
            request.build_number.clone(),
        ];

        let severity = request.severity;
        for (enabled, flag) in [
            (severity.skipped, "--count-skipped-as-failure"),
            (severity.pending, "--count-pending-as-failure"),
            (severity.undefined, "--count-undefined-as-failure"),
            (severity.missing, "--count-missing-as-failure"),
        ] {
            if enabled {
                args.push(flag.to_string());
            }
        }

        for (name, value) in &request.custom_attributes {
            args.push("--attribute".to_string());
            args.push(format!("{name}={value}"));
        }

        args
    }
}

/// Read the generator verdict from its stdout.
pub fn parse_console(stdout: &str) -> Result<ReportConsole> {
    let line = stdout
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .ok_or_else(|| DonutError::Generator("generator printed no report console".to_string()))?;

    serde_json::from_str(line)
        .map_err(|e| DonutError::Generator(format!("unreadable report console {line:?}: {e}")))
}

#[async_trait]
impl ReportGenerator for CommandGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<ReportConsole> {
        let (exe, base_args) = self
            .command
            .split_first()
            .ok_or_else(|| DonutError::Generator("generator command is empty".to_string()))?;

        debug!(generator = %exe, "Starting report generator");

        let child = Command::new(exe)
            .args(base_args)
            .args(Self::request_args(request))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DonutError::Generator(format!("failed to start {exe}: {e}")))?;

        let output = if self.timeout_secs > 0 {
            tokio::time::timeout(
                Duration::from_secs(self.timeout_secs),
                child.wait_with_output(),
            )
            .await
            .map_err(|_| {
                DonutError::Generator(format!(
                    "{exe} timed out after {} seconds",
                    self.timeout_secs
                ))
            })??
        } else {
            child.wait_with_output().await?
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DonutError::Generator(format!(
                "{exe} exited with code {}: {}",
                output.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }

        parse_console(&String::from_utf8_lossy(&output.stdout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> GenerationRequest {
        let attributes: Attributes = [("owner".to_string(), "platform".to_string())]
            .into_iter()
            .collect();
        GenerationRequest::new(
            PathBuf::from("/builds/7/donut"),
            FailureSeverity {
                pending: true,
                ..Default::default()
            },
            "checkout",
            "7",
            attributes,
        )
    }

    fn sh(script: &str) -> CommandGenerator {
        CommandGenerator::new(vec!["sh".to_string(), "-c".to_string(), script.to_string()], 30)
    }

    #[test]
    fn test_request_defaults() {
        let request = request();
        assert_eq!(request.result_sources, request.output_path);
        assert_eq!(request.template, "default");
        assert!(request.file_prefix.is_empty());
        assert!(request.timestamp.is_empty());
    }

    #[test]
    fn test_request_args() {
        let args = CommandGenerator::request_args(&request());
        assert_eq!(args[0], "--result-sources");
        assert_eq!(args[1], "/builds/7/donut");
        assert!(args.contains(&"--count-pending-as-failure".to_string()));
        assert!(!args.contains(&"--count-skipped-as-failure".to_string()));
        let attr = args.iter().position(|a| a == "--attribute").unwrap();
        assert_eq!(args[attr + 1], "owner=platform");
    }

    #[test]
    fn test_parse_console_uses_last_line() {
        let console = parse_console("rendering...\n{\"build_failed\": true}\n\n").unwrap();
        assert!(console.build_failed);
        assert!(parse_console("").is_err());
        assert!(parse_console("done").is_err());
    }

    #[tokio::test]
    async fn test_command_generator_reads_console() {
        let console = sh("echo rendering; echo '{\"build_failed\": false}'")
            .generate(&request())
            .await
            .expect("generate failed");
        assert!(!console.build_failed);
    }

    #[tokio::test]
    async fn test_command_generator_non_zero_exit_is_error() {
        let err = sh("echo boom >&2; exit 3")
            .generate(&request())
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("code 3"));
        assert!(msg.contains("boom"));
    }

    #[tokio::test]
    async fn test_command_generator_empty_command() {
        let err = CommandGenerator::new(vec![], 0)
            .generate(&request())
            .await
            .unwrap_err();
        assert!(matches!(err, DonutError::Generator(_)));
    }

    #[tokio::test]
    async fn test_command_generator_timeout() {
        let generator = CommandGenerator::new(
            vec!["sh".to_string(), "-c".to_string(), "sleep 5".to_string()],
            1,
        );
        let err = generator.generate(&request()).await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }
}
