//! The sanitization and parameterization pipeline.
//!
//! A run takes one group from a [`SourceEnvironment`] to four artifacts:
//!
//! 1. discover resources (an empty group aborts the run)
//! 2. export the raw structured template and load the [`ResourceGraph`]
//! 3. drop excluded resources and strip read-only properties
//! 4. list and classify settings of app/function hosts
//! 5. decompile the cleaned export with the [`Decompiler`]
//! 6. sanitize, inject settings, prune unused parameters
//! 7. synthesize parameter values and resolve duplicate values
//!
//! Stages run strictly in order and each consumes the full output of the one
//! before. Failures of the external collaborators abort the run before any
//! file exists; ambiguities and collisions are collected into
//! [`ManualActions`] instead. Nothing is written until [`PipelineOutput::write`]
//! is called on a completed run.

pub mod collaborators;
pub mod decompiler;
pub mod snapshot;

pub use collaborators::{Decompiler, DiscoveredResource, SourceEnvironment};
pub use decompiler::{CommandDecompiler, FileDecompiler};
pub use snapshot::SnapshotSource;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::actions::ManualActions;
use crate::constants::{
    CLEANED_EXPORT_FILE, MANUAL_ACTIONS_FILE, PARAMETERS_FILE, SITE_RESOURCE_TYPE, TEMPLATE_FILE,
};
use crate::core::{CloneError, RunMode};
use crate::graph::ResourceGraph;
use crate::parameters::{ParameterSet, SynthesisOptions, resolve_duplicates, synthesize};
use crate::rules::{RuleSet, filter, strip};
use crate::settings::{ConfigSetting, SettingsPolicy, extract};
use crate::template::{inject, prune, sanitize};
use crate::utils::fs::atomic_write;
use crate::utils::progress::ProgressBar;

/// Everything a run needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Group to clone
    pub group: String,
    /// Clone or backup
    pub mode: RunMode,
    /// Exclusion and strip tables
    pub rules: RuleSet,
    /// Settings classification
    pub settings: SettingsPolicy,
    /// Parameter synthesis. `workspace_id` is filled in by the run.
    pub synthesis: SynthesisOptions,
}

impl PipelineOptions {
    /// Options with built-in rules and defaults.
    ///
    /// # Errors
    ///
    /// Only fails if a built-in rule is broken.
    pub fn new(group: impl Into<String>, mode: RunMode) -> Result<Self, CloneError> {
        Ok(Self {
            group: group.into(),
            mode,
            rules: RuleSet::builtin()?,
            settings: SettingsPolicy::default(),
            synthesis: SynthesisOptions::default(),
        })
    }
}

/// What a run did, for the summary and the logs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    /// Resources reported by discovery
    pub discovered: usize,
    /// Resources in the raw export
    pub exported: usize,
    /// Resources dropped by the exclusion filter (cascades included)
    pub excluded: usize,
    /// `dependsOn` entries removed from the export
    pub pruned_dependencies: usize,
    /// Declarations removed from the template to break cycles
    pub removed_declarations: Vec<String>,
    /// String literals removed from template dependency lists
    pub dropped_literals: usize,
    /// Components whose settings were bound
    pub bound_components: Vec<String>,
    /// Parameters removed because nothing referenced them
    pub pruned_parameters: Vec<String>,
}

/// The result of a completed run.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Export after exclusion and stripping
    pub cleaned_export: Value,
    /// Sanitized, parameterized template text
    pub template: String,
    /// Resolved parameter values
    pub parameters: ParameterSet,
    /// Operator to-do list
    pub manual_actions: ManualActions,
    /// Stage statistics
    pub report: RunReport,
}

/// An artifact written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenArtifact {
    /// Full path of the file
    pub path: PathBuf,
    /// Hex SHA-256 of the content
    pub sha256: String,
}

fn to_json_text<T: Serialize>(value: &T) -> Result<String, CloneError> {
    let mut text = serde_json::to_string_pretty(value)?;
    text.push('\n');
    Ok(text)
}

/// Hex SHA-256 of an artifact's content.
#[must_use]
pub fn sha256_hex(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

impl PipelineOutput {
    /// Artifact file names and their exact content, in write order.
    ///
    /// # Errors
    ///
    /// Fails only if a JSON document cannot be serialized.
    pub fn artifacts(&self) -> Result<Vec<(&'static str, String)>, CloneError> {
        Ok(vec![
            (CLEANED_EXPORT_FILE, to_json_text(&self.cleaned_export)?),
            (TEMPLATE_FILE, self.template.clone()),
            (PARAMETERS_FILE, to_json_text(&self.parameters.to_parameter_file())?),
            (MANUAL_ACTIONS_FILE, to_json_text(&self.manual_actions)?),
        ])
    }

    /// Write every artifact into `dir`, each one atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or a file cannot
    /// be written.
    pub fn write(&self, dir: &Path) -> Result<Vec<WrittenArtifact>> {
        let mut written = Vec::new();
        for (name, content) in self.artifacts()? {
            let path = dir.join(name);
            atomic_write(&path, content.as_bytes())
                .with_context(|| format!("Failed to write artifact {}", path.display()))?;
            let sha256 = sha256_hex(content.as_bytes());
            tracing::info!("Wrote {} (sha256 {sha256})", path.display());
            written.push(WrittenArtifact {
                path,
                sha256,
            });
        }
        Ok(written)
    }
}

fn stage(progress: Option<&ProgressBar>, message: &str) {
    tracing::debug!("{message}");
    if let Some(pb) = progress {
        pb.set_message(message.to_string());
    }
}

/// Run the whole pipeline for one group.
///
/// # Errors
///
/// Returns the [`CloneError`] of the first failing external collaborator, or
/// [`CloneError::ParseError`] if the export is not a usable document.
pub async fn run(
    source: &dyn SourceEnvironment,
    decompiler: &dyn Decompiler,
    options: &PipelineOptions,
    progress: Option<&ProgressBar>,
) -> Result<PipelineOutput, CloneError> {
    let group = options.group.as_str();
    let mode = &options.mode;
    tracing::info!("Starting {mode} for group {group}");
    let mut report = RunReport::default();
    let mut manual_actions = ManualActions::default();

    stage(progress, "Discovering resources");
    let discovered = source.discover_resources(group).await?;
    if discovered.is_empty() {
        return Err(CloneError::DiscoveryError {
            group: group.to_string(),
            reason: "group contains no resources".to_string(),
        });
    }
    report.discovered = discovered.len();

    stage(progress, "Exporting template");
    let raw_export = source.export_raw_template(group).await?;
    if raw_export.trim().is_empty() {
        return Err(CloneError::ExportError {
            group: group.to_string(),
            reason: "export is empty".to_string(),
        });
    }
    let graph = ResourceGraph::load(&raw_export)?;
    report.exported = graph.nodes().len();
    for resource in &discovered {
        let exported = graph.nodes().iter().any(|n| {
            n.resource_type.eq_ignore_ascii_case(&resource.resource_type) && n.name == resource.name
        });
        if !exported {
            tracing::warn!(
                "Discovered {} '{}' is missing from the export",
                resource.resource_type,
                resource.name
            );
        }
    }

    stage(progress, "Cleaning export");
    let filtered = filter(&graph, &options.rules.exclusions);
    report.excluded = filtered.excluded.len();
    report.pruned_dependencies = filtered.pruned_dependencies;
    manual_actions.excluded = filtered.excluded;
    let cleaned = strip(&filtered.graph, &options.rules.strips);
    let cleaned_export = cleaned.to_export();

    stage(progress, "Reading configuration settings");
    let mut settings: BTreeMap<String, Vec<ConfigSetting>> = BTreeMap::new();
    for site in discovered.iter().filter(|r| r.resource_type.eq_ignore_ascii_case(SITE_RESOURCE_TYPE)) {
        let raw = source.list_component_settings(group, &site.name).await?;
        let extracted = extract(&site.name, &raw, &options.settings, mode);
        tracing::debug!("{}: {} settings", site.name, extracted.len());
        manual_actions.record_settings(&extracted);
        settings.insert(site.name.clone(), extracted);
    }

    stage(progress, "Decompiling");
    let decompiled = decompiler.decompile(&serde_json::to_string_pretty(&cleaned_export)?).await?;

    stage(progress, "Sanitizing template");
    let sanitized = sanitize(&decompiled, &cleaned);
    report.removed_declarations = sanitized.removed.iter().map(|r| r.identifier.clone()).collect();
    report.dropped_literals = sanitized.dropped_literals;
    manual_actions.record_ambiguities(sanitized.ambiguities);

    let injected = inject(&sanitized.text, &settings, &options.settings);
    report.bound_components = injected.bound;
    manual_actions.record_ambiguities(injected.ambiguities);

    let pruned = prune(&injected.text, &options.synthesis.environment_parameter);
    report.pruned_parameters = pruned.pruned;

    stage(progress, "Synthesizing parameters");
    let synthesis_options = SynthesisOptions {
        workspace_id: source.lookup_workspace_id(group).await,
        ..options.synthesis.clone()
    };
    let synthesis = synthesize(&pruned.text, &cleaned, mode, &synthesis_options);
    manual_actions.record_ambiguities(synthesis.ambiguities);
    let (parameters, collisions) = resolve_duplicates(synthesis.parameters);
    manual_actions.collisions = collisions;

    tracing::info!(
        "Finished {mode} for group {group}: {} resources kept, {} excluded, {} parameters",
        cleaned.nodes().len(),
        report.excluded,
        parameters.parameters.len() + 1
    );

    Ok(PipelineOutput {
        cleaned_export,
        template: pruned.text,
        parameters,
        manual_actions,
        report,
    })
}
