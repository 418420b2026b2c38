//! Donut - publish Donut reports from JSON test results
//!
//! The `donut` command runs the report build step outside a CI host and
//! exposes its building blocks for scripting.
//!
//! ## Commands
//!
//! - `publish`: Collect results, render the report and map the verdict
//! - `attributes`: Resolve a custom attribute block against the environment
//! - `browse`: Show what opening a build or project report would serve
//! - `check-source`: Validate a source directory setting

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use donut_attributes::{resolve, Attributes, Environment, MANIFEST_FILE_NAME};
use donut_ci::{
    validate_source_directory, BuildContext, FormValidation, ReportStep, ReportStepConfig,
    StepOutcome,
};
use donut_core::{
    BrowseTarget, BuildReportAction, BuildResult, CommandGenerator, FailureSeverity,
    ProjectReportAction, ReportAction,
};
use std::path::{Path, PathBuf};
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "donut")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Publish Donut reports from JSON test results", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the report step for one build
    Publish(PublishArgs),

    /// Resolve custom attributes and print them as JSON
    Attributes {
        #[command(flatten)]
        source: AttributeSource,

        /// Workspace whose pom.xml properties are visible to references
        #[arg(long, env = "DONUT_WORKSPACE", default_value = ".")]
        workspace: PathBuf,

        /// Extra environment variable, overriding the process environment
        #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_key_val)]
        env: Vec<(String, String)>,
    },

    /// Show what opening a report serves
    Browse {
        /// Build directory (report of a single build)
        #[arg(
            long,
            env = "DONUT_BUILD_ROOT",
            conflicts_with = "project_root",
            required_unless_present = "project_root"
        )]
        build_root: Option<PathBuf>,

        /// Project directory (project-level report)
        #[arg(long, env = "DONUT_PROJECT_ROOT")]
        project_root: Option<PathBuf>,

        /// Directory of the project's last completed build
        #[arg(long, requires = "project_root")]
        last_build_root: Option<PathBuf>,

        /// Build or project display name
        #[arg(long)]
        name: String,
    },

    /// Validate a source directory setting against a workspace
    CheckSource {
        /// Workspace the directory is relative to
        #[arg(long, env = "DONUT_WORKSPACE", default_value = ".")]
        workspace: PathBuf,

        /// Configured source directory
        #[arg(default_value = "")]
        value: String,
    },
}

/// Where the raw custom attribute block comes from.
#[derive(Args, Debug, Default)]
struct AttributeSource {
    /// Custom attributes as `key=value` lines
    #[arg(
        long,
        env = "DONUT_CUSTOM_ATTRIBUTES",
        conflicts_with = "custom_attributes_file"
    )]
    custom_attributes: Option<String>,

    /// File holding the custom attributes
    #[arg(long, env = "DONUT_CUSTOM_ATTRIBUTES_FILE")]
    custom_attributes_file: Option<PathBuf>,
}

impl AttributeSource {
    fn load(&self) -> Result<String> {
        match (&self.custom_attributes, &self.custom_attributes_file) {
            (Some(raw), _) => Ok(raw.clone()),
            (None, Some(path)) => std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read custom attributes: {:?}", path)),
            (None, None) => Ok(String::new()),
        }
    }
}

#[derive(Args, Debug)]
struct PublishArgs {
    /// Build workspace
    #[arg(long, env = "DONUT_WORKSPACE", default_value = ".")]
    workspace: PathBuf,

    /// Results directory, relative to the workspace
    #[arg(long, env = "DONUT_SOURCE_DIR", default_value = "")]
    source_dir: String,

    /// Build storage directory; the report is written to <build-root>/donut
    #[arg(long, env = "DONUT_BUILD_ROOT")]
    build_root: PathBuf,

    #[arg(long, env = "DONUT_JOB_NAME")]
    job_name: String,

    #[arg(long, env = "DONUT_BUILD_NUMBER")]
    build_number: u64,

    /// Build result so far (SUCCESS, FAILURE, NOT_BUILT, ABORTED)
    #[arg(long, env = "DONUT_PRIOR_RESULT", value_parser = parse_build_result)]
    prior_result: Option<BuildResult>,

    #[arg(long)]
    count_skipped_as_failure: bool,

    #[arg(long)]
    count_pending_as_failure: bool,

    #[arg(long)]
    count_undefined_as_failure: bool,

    #[arg(long)]
    count_missing_as_failure: bool,

    #[command(flatten)]
    attributes: AttributeSource,

    /// Step configuration as JSON, replacing the step flags
    #[arg(
        long,
        env = "DONUT_CONFIG",
        conflicts_with_all = [
            "source_dir",
            "custom_attributes",
            "custom_attributes_file",
            "count_skipped_as_failure",
            "count_pending_as_failure",
            "count_undefined_as_failure",
            "count_missing_as_failure",
        ]
    )]
    config: Option<PathBuf>,

    /// Seconds to wait for the generator (0 waits indefinitely)
    #[arg(long, env = "DONUT_GENERATOR_TIMEOUT", default_value = "600")]
    generator_timeout: u64,

    /// Report generator command, after `--`
    #[arg(last = true, required = true, value_name = "GENERATOR")]
    generator: Vec<String>,
}

impl PublishArgs {
    fn step_config(&self) -> Result<ReportStepConfig> {
        if let Some(path) = &self.config {
            return ReportStepConfig::from_json_file(path);
        }

        Ok(ReportStepConfig::new(self.source_dir.clone())
            .with_severity(FailureSeverity {
                skipped: self.count_skipped_as_failure,
                pending: self.count_pending_as_failure,
                undefined: self.count_undefined_as_failure,
                missing: self.count_missing_as_failure,
            })
            .with_custom_attributes(self.attributes.load()?))
    }

    fn build_context(&self) -> BuildContext {
        let mut ctx = BuildContext::new(
            &self.workspace,
            &self.build_root,
            &self.job_name,
            self.build_number,
        )
        .with_env(Environment::from_process_env().iter());
        ctx.prior_result = self.prior_result;
        ctx
    }
}

fn parse_build_result(s: &str) -> Result<BuildResult, String> {
    BuildResult::from_name(s).ok_or_else(|| format!("unknown build result: {s}"))
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got {s:?}"))?;
    if key.is_empty() {
        return Err(format!("empty key in {s:?}"));
    }
    Ok((key.to_string(), value.to_string()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    donut_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Publish(args) => cmd_publish(&args).await,
        Commands::Attributes {
            source,
            workspace,
            env,
        } => cmd_attributes(&source, &workspace, &env),
        Commands::Browse {
            build_root,
            project_root,
            last_build_root,
            name,
        } => cmd_browse(
            &name,
            build_root.as_deref(),
            project_root.as_deref(),
            last_build_root.as_deref(),
        ),
        Commands::CheckSource { workspace, value } => cmd_check_source(&workspace, &value),
    }
}

/// Run the report step and print its outcome
async fn cmd_publish(args: &PublishArgs) -> Result<()> {
    let outcome = publish(args).await?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    let final_result = outcome.final_result(args.prior_result);
    info!(result = %final_result, "Build result");
    if outcome.result == BuildResult::Failure {
        anyhow::bail!("Donut report step failed");
    }
    Ok(())
}

async fn publish(args: &PublishArgs) -> Result<StepOutcome> {
    let config = args.step_config()?;
    let ctx = args.build_context();
    let generator = CommandGenerator::new(args.generator.clone(), args.generator_timeout);

    info!(
        job = %ctx.job_name,
        build_number = ctx.build_number,
        source = %config.source_directory,
        "Publishing Donut report"
    );

    Ok(ReportStep::perform(&config, &ctx, &generator).await)
}

/// Resolve attributes and print them
fn cmd_attributes(
    source: &AttributeSource,
    workspace: &Path,
    overrides: &[(String, String)],
) -> Result<()> {
    let attributes = resolve_attributes(&source.load()?, workspace, overrides)?;
    println!("{}", serde_json::to_string_pretty(&attributes)?);
    Ok(())
}

fn resolve_attributes(
    raw: &str,
    workspace: &Path,
    overrides: &[(String, String)],
) -> Result<Attributes> {
    let mut env = Environment::from_process_env();
    for (key, value) in overrides {
        env.insert(key.clone(), value.clone());
    }
    let env = env
        .with_manifest(&workspace.join(MANIFEST_FILE_NAME))
        .context("Failed to read build manifest properties")?;

    resolve(raw, &env).context("Failed to resolve custom attributes")
}

/// Print where opening a report leads
fn cmd_browse(
    name: &str,
    build_root: Option<&Path>,
    project_root: Option<&Path>,
    last_build_root: Option<&Path>,
) -> Result<()> {
    let target = browse_target(name, build_root, project_root, last_build_root)?;
    println!("{}", serde_json::to_string_pretty(&target)?);
    Ok(())
}

fn browse_target(
    name: &str,
    build_root: Option<&Path>,
    project_root: Option<&Path>,
    last_build_root: Option<&Path>,
) -> Result<BrowseTarget> {
    let action: Box<dyn ReportAction> = match (build_root, project_root) {
        (Some(root), _) => Box::new(BuildReportAction::new(name, root)),
        (None, Some(project)) => {
            let mut action = ProjectReportAction::new(name, project);
            if let Some(last) = last_build_root {
                action = action.with_last_completed_build(last);
            }
            Box::new(action)
        }
        (None, None) => anyhow::bail!("Either --build-root or --project-root is required"),
    };

    info!(title = %action.title(), dir = %action.dir().display(), "Browsing report");
    Ok(action.browse())
}

/// Validate a source directory setting
fn cmd_check_source(workspace: &Path, value: &str) -> Result<()> {
    let validation = validate_source_directory(workspace, value);
    println!("{}", serde_json::to_string_pretty(&validation)?);

    if let FormValidation::Error(message) = validation {
        anyhow::bail!(message);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use donut_core::REPORT_INDEX_FILE;

    fn publish_args(args: &[&str]) -> PublishArgs {
        let argv = ["donut", "publish"].iter().chain(args.iter()).copied();
        match Cli::try_parse_from(argv).expect("parse publish").command {
            Commands::Publish(args) => args,
            _ => panic!("expected publish"),
        }
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_key_val() {
        assert_eq!(
            parse_key_val("TEAM=platform=core").unwrap(),
            ("TEAM".to_string(), "platform=core".to_string())
        );
        assert_eq!(
            parse_key_val("EMPTY=").unwrap(),
            ("EMPTY".to_string(), String::new())
        );
        assert!(parse_key_val("TEAM").is_err());
        assert!(parse_key_val("=x").is_err());
    }

    #[test]
    fn test_publish_flags_build_step_config() {
        let args = publish_args(&[
            "--build-root",
            "/builds/9",
            "--job-name",
            "checkout",
            "--build-number",
            "9",
            "--source-dir",
            "target/cucumber",
            "--prior-result",
            "success",
            "--count-pending-as-failure",
            "--custom-attributes",
            "owner=${TEAM}",
            "--",
            "render",
            "--fast",
        ]);

        assert_eq!(args.generator, vec!["render", "--fast"]);
        assert_eq!(args.prior_result, Some(BuildResult::Success));
        assert_eq!(args.generator_timeout, 600);

        let config = args.step_config().unwrap();
        assert_eq!(config.source_directory, "target/cucumber");
        assert!(config.severity.pending);
        assert!(!config.severity.skipped);
        assert_eq!(config.custom_attributes, "owner=${TEAM}");
    }

    #[test]
    fn test_publish_requires_generator() {
        let result = Cli::try_parse_from([
            "donut",
            "publish",
            "--build-root",
            "/b",
            "--job-name",
            "j",
            "--build-number",
            "1",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_publish_config_conflicts_with_step_flags() {
        let result = Cli::try_parse_from([
            "donut",
            "publish",
            "--build-root",
            "/b",
            "--job-name",
            "j",
            "--build-number",
            "1",
            "--config",
            "step.json",
            "--source-dir",
            "out",
            "--",
            "render",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_custom_attributes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attributes.properties");
        std::fs::write(&path, "title=Nightly Run\n").unwrap();

        let source = AttributeSource {
            custom_attributes: None,
            custom_attributes_file: Some(path),
        };
        assert_eq!(source.load().unwrap(), "title=Nightly Run\n");
        assert_eq!(AttributeSource::default().load().unwrap(), "");
    }

    #[test]
    fn test_resolve_attributes_with_overrides_and_manifest() {
        let workspace = tempfile::tempdir().unwrap();
        std::fs::write(
            workspace.path().join("pom.xml"),
            "<project><properties><donut.cli.train>autumn</donut.cli.train></properties></project>",
        )
        .unwrap();

        let attributes = resolve_attributes(
            "owner=${DONUT_CLI_TEST_OWNER}\ntrain=donut.cli.train\nmissing=${DONUT_CLI_TEST_UNSET}",
            workspace.path(),
            &[("DONUT_CLI_TEST_OWNER".to_string(), "platform".to_string())],
        )
        .unwrap();

        assert_eq!(attributes["owner"], "platform");
        assert_eq!(attributes["train"], "autumn");
        assert_eq!(attributes["missing"], "");
    }

    #[test]
    fn test_resolve_attributes_malformed() {
        let workspace = tempfile::tempdir().unwrap();
        assert!(resolve_attributes("owner=${TEAM\\", workspace.path(), &[]).is_err());
    }

    #[test]
    fn test_browse_target() {
        let project = tempfile::tempdir().unwrap();
        let build = tempfile::tempdir().unwrap();
        let report = build.path().join("donut");
        std::fs::create_dir_all(&report).unwrap();
        std::fs::write(report.join(REPORT_INDEX_FILE), "<html/>").unwrap();

        let target = browse_target("#3", Some(build.path()), None, None).unwrap();
        assert!(matches!(target, BrowseTarget::Index { .. }));

        let target =
            browse_target("checkout", None, Some(project.path()), Some(build.path())).unwrap();
        assert!(matches!(target, BrowseTarget::Index { .. }));

        let target = browse_target("checkout", None, Some(project.path()), None).unwrap();
        assert!(matches!(target, BrowseTarget::Redirect { .. }));

        assert!(browse_target("x", None, None, None).is_err());
    }

    #[test]
    fn test_check_source_exit_status() {
        let workspace = tempfile::tempdir().unwrap();
        std::fs::create_dir(workspace.path().join("results")).unwrap();

        assert!(cmd_check_source(workspace.path(), "results").is_ok());
        assert!(cmd_check_source(workspace.path(), "../outside").is_err());
    }

    #[tokio::test]
    async fn test_publish_runs_generator_command() {
        let workspace = tempfile::tempdir().unwrap();
        let builds = tempfile::tempdir().unwrap();
        std::fs::create_dir(workspace.path().join("results")).unwrap();
        std::fs::write(workspace.path().join("results/run.json"), "[]").unwrap();

        let workspace_arg = workspace.path().to_string_lossy().into_owned();
        let build_root_arg = builds.path().to_string_lossy().into_owned();
        let args = publish_args(&[
            "--workspace",
            &workspace_arg,
            "--source-dir",
            "results",
            "--build-root",
            &build_root_arg,
            "--job-name",
            "checkout",
            "--build-number",
            "5",
            "--",
            "sh",
            "-c",
            "echo '{\"build_failed\": true}'",
        ]);

        let outcome = publish(&args).await.expect("publish failed");
        assert_eq!(outcome.result, BuildResult::Failure);
        assert_eq!(outcome.copied_files, 1);
        assert!(builds.path().join("donut/run.json").is_file());
    }
}
