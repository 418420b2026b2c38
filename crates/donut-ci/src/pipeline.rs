//! Report step orchestration.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use chrono::{DateTime, Utc};
use donut_attributes::{resolve, Attributes, Environment, MANIFEST_FILE_NAME};
use donut_core::{
    copy_results, has_results, report_dir, BuildReportAction, BuildResult, GenerationRequest,
    ReportGenerator,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::gate::ReportGate;
use crate::spec::{BuildContext, ReportStepConfig};

/// Result of running the report step once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepOutcome {
    /// Result the step assigns to the build.
    pub result: BuildResult,

    /// `<build_root>/donut`
    pub output_dir: PathBuf,

    /// Attributes handed to the generator (empty when generation never ran).
    pub attributes: Attributes,

    /// Browsing action attached to the build.
    pub action: BuildReportAction,

    /// Files collected into the output directory.
    pub copied_files: usize,

    pub duration_ms: u64,

    pub completed_at: DateTime<Utc>,
}

impl StepOutcome {
    /// Build result after applying this outcome to `prior`.
    pub fn final_result(&self, prior: Option<BuildResult>) -> BuildResult {
        ReportGate::settle(prior, self.result)
    }

    pub fn passed(&self) -> bool {
        self.result == BuildResult::Success
    }
}

struct Generated {
    attributes: Attributes,
    copied_files: usize,
    result: BuildResult,
}

impl Generated {
    fn skipped(result: BuildResult) -> Self {
        Self {
            attributes: Attributes::new(),
            copied_files: 0,
            result,
        }
    }
}

/// The "generate Donut report" build step.
pub struct ReportStep;

impl ReportStep {
    /// Run the step for one build.
    ///
    /// Never fails: problems during generation are logged and reported as
    /// `FAILURE`. Aborted builds end `ABORTED` and builds without result
    /// files end `NOT_BUILT`, both without calling the generator.
    pub async fn perform(
        config: &ReportStepConfig,
        ctx: &BuildContext,
        generator: &dyn ReportGenerator,
    ) -> StepOutcome {
        let start = Instant::now();
        let source_dir = ctx.workspace.join(&config.source_directory);
        let output_dir = report_dir(&ctx.build_root);

        let Generated {
            attributes,
            copied_files,
            result,
        } = if ctx.prior_result == Some(BuildResult::Aborted) {
            info!("Skipping Donut report as build was aborted");
            Generated::skipped(BuildResult::Aborted)
        } else if !has_results(&source_dir) {
            info!(source = %source_dir.display(), "Skipping Donut report as no results were found");
            Generated::skipped(BuildResult::NotBuilt)
        } else {
            Self::generate(config, ctx, &source_dir, &output_dir, generator)
                .await
                .unwrap_or_else(|e| {
                    error!(error = ?e, "An error occurred generating the Donut report");
                    Generated::skipped(BuildResult::Failure)
                })
        };

        info!(result = %result, "Donut report step finished");

        StepOutcome {
            result,
            output_dir,
            attributes,
            action: BuildReportAction::new(ctx.display_name(), &ctx.build_root),
            copied_files,
            duration_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            completed_at: Utc::now(),
        }
    }

    async fn generate(
        config: &ReportStepConfig,
        ctx: &BuildContext,
        source_dir: &Path,
        output_dir: &Path,
        generator: &dyn ReportGenerator,
    ) -> anyhow::Result<Generated> {
        let env = Environment::from_vars(ctx.env.clone())
            .with_manifest(&ctx.workspace.join(MANIFEST_FILE_NAME))
            .context("Failed to read build manifest properties")?;
        let attributes = resolve(&config.custom_attributes, &env)
            .context("Failed to resolve custom attributes")?;

        info!(job = %ctx.job_name, build_number = ctx.build_number, "Generating Donut report");
        info!(output = %output_dir.display(), "Donut report output directory");

        tokio::fs::create_dir_all(output_dir)
            .await
            .with_context(|| format!("Failed to create output directory: {:?}", output_dir))?;
        let copied_files = copy_results(source_dir, output_dir)
            .with_context(|| format!("Failed to collect results from {:?}", source_dir))?;

        let request = GenerationRequest::new(
            output_dir.to_path_buf(),
            config.severity,
            &ctx.job_name,
            ctx.build_number.to_string(),
            attributes.clone(),
        );
        let console = generator
            .generate(&request)
            .await
            .context("Report generator failed")?;

        info!(copied_files, build_failed = console.build_failed, "Completed generating Donut report");

        Ok(Generated {
            attributes,
            copied_files,
            result: ReportGate::evaluate(&console),
        })
    }
}
