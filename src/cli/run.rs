//! The `clone` and `backup` commands.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::{Path, PathBuf};

use super::CliConfig;
use crate::core::{CloneError, RunMode};
use crate::pipeline::{
    self, Decompiler, FileDecompiler, PipelineOutput, SnapshotSource, WrittenArtifact,
};
use crate::utils::ProgressBar;

/// Default parent directory of run outputs.
const DEFAULT_OUTPUT_ROOT: &str = "rgclone-output";

/// Arguments shared by both pipelines.
#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// Resource group to process
    #[arg(long, value_name = "GROUP")]
    pub group: String,

    /// Snapshot directory holding `<group>/resources.json`, `template.json`
    /// and `settings/`
    #[arg(long, value_name = "DIR")]
    pub snapshot: PathBuf,

    /// Use an already decompiled template instead of running the decompiler
    #[arg(long, value_name = "FILE")]
    pub decompiled: Option<PathBuf>,

    /// Output directory (default: ./rgclone-output/<group>-<env>-<timestamp>)
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,
}

/// Clone a group into another environment.
#[derive(Args, Debug)]
pub struct CloneCommand {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Environment the group was exported from
    #[arg(long, value_name = "ENV")]
    pub source_env: String,

    /// Environment to deploy into
    #[arg(long, value_name = "ENV")]
    pub target_env: String,
}

impl CloneCommand {
    pub async fn execute(self, config: &CliConfig) -> Result<()> {
        if self.source_env.eq_ignore_ascii_case(&self.target_env) {
            return Err(CloneError::ConfigError {
                message: format!(
                    "source and target environment are both '{}'; use 'rgclone backup' to redeploy into the same environment",
                    self.source_env
                ),
            }
            .into());
        }
        let mode = RunMode::Clone {
            source_env: self.source_env,
            target_env: self.target_env,
        };
        execute_run(&self.source, mode, config).await
    }
}

/// Capture a group for redeployment into the same environment.
#[derive(Args, Debug)]
pub struct BackupCommand {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Environment of the group
    #[arg(long, value_name = "ENV")]
    pub env: String,
}

impl BackupCommand {
    pub async fn execute(self, config: &CliConfig) -> Result<()> {
        let mode = RunMode::Backup {
            env: self.env,
        };
        execute_run(&self.source, mode, config).await
    }
}

fn default_output_dir(group: &str, mode: &RunMode) -> PathBuf {
    let timestamp = chrono::Utc::now().format("%Y%m%dT%H%M%SZ");
    PathBuf::from(DEFAULT_OUTPUT_ROOT).join(format!("{group}-{}-{timestamp}", mode.target_env()))
}

async fn execute_run(args: &SourceArgs, mode: RunMode, config: &CliConfig) -> Result<()> {
    let settings = config.load_config().await?;
    let options = settings.pipeline_options(&args.group, mode)?;

    let source = SnapshotSource::new(&args.snapshot);
    let decompiler: Box<dyn Decompiler> = match &args.decompiled {
        Some(path) => Box::new(FileDecompiler::new(path)),
        None => Box::new(settings.decompiler()),
    };

    let spinner = ProgressBar::new_spinner(!config.no_progress);
    let result = pipeline::run(&source, decompiler.as_ref(), &options, Some(&spinner)).await;
    spinner.finish_and_clear();
    let output = result?;

    let dir = args.output.clone().unwrap_or_else(|| default_output_dir(&args.group, &options.mode));
    let written = output
        .write(&dir)
        .with_context(|| format!("Failed to write artifacts to {}", dir.display()))?;

    print_summary(&args.group, &options.mode, &output, &dir, &written);
    Ok(())
}

fn print_summary(
    group: &str,
    mode: &RunMode,
    output: &PipelineOutput,
    dir: &Path,
    written: &[WrittenArtifact],
) {
    let report = &output.report;
    let actions = &output.manual_actions;

    println!("{} {mode} for {}", "✓".green().bold(), group.bold());
    println!(
        "  Resources:  {} exported, {} excluded, {} dependency edges pruned",
        report.exported, report.excluded, report.pruned_dependencies
    );
    println!(
        "  Template:   {} duplicate declarations removed, {} unused parameters pruned",
        report.removed_declarations.len(),
        report.pruned_parameters.len()
    );
    println!(
        "  Parameters: {} resolved, {} settings blocks bound",
        output.parameters.parameters.len() + 1,
        report.bound_components.len()
    );

    if actions.is_empty() {
        println!("  Manual actions: {}", "none".green());
    } else {
        println!(
            "  Manual actions: {} secrets, {} packages, {} need review, {} renamed",
            actions.secret_count().to_string().yellow(),
            actions.package_count().to_string().yellow(),
            actions.ambiguities.len().to_string().yellow(),
            actions.collisions.len().to_string().yellow()
        );
        for ambiguity in &actions.ambiguities {
            match &ambiguity.suggestion {
                Some(hint) => println!(
                    "    {} {} ({}; closest match: {hint})",
                    "⚠".yellow(),
                    ambiguity.subject,
                    ambiguity.detail
                ),
                None => println!("    {} {} ({})", "⚠".yellow(), ambiguity.subject, ambiguity.detail),
            }
        }
    }

    println!("\nArtifacts in {}:", dir.display().to_string().cyan());
    for artifact in written {
        let name = artifact.path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        println!("  {name:<24} sha256:{}", artifact.sha256.dimmed());
    }
}
