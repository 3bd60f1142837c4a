//! Parameter synthesizer.
//!
//! Binds each declared parameter to a top-level resource by name: the
//! parameter name, lower-cased, must contain the resource name with its
//! separators normalized to `_` (`sites_app_dev_name` contains `app_dev`).
//! A match on `_` boundaries beats one embedded in a longer word, and a
//! longer resource name beats a shorter one; remaining ties go to the first
//! resource in the graph's stable order.
//!
//! On the clone path the matched name is re-targeted by replacing the source
//! environment token. A globally unique category whose name does not encode
//! the environment gets the target environment as a prefix, with the
//! original name cut from its tail to fit the category's maximum length.
//! On the backup path the original name is kept.

use super::{ParameterSet, Resolution, ResolvedParameter, UniquenessPolicy, UniquenessTable};
use crate::actions::{Ambiguity, AmbiguityKind};
use crate::constants::{
    DEFAULT_ADMIN_LOGIN, DEFAULT_ENVIRONMENT_PARAMETER, DEFAULT_MANUAL_REVIEW_SENTINEL,
    DEFAULT_WORKSPACE_SENTINEL,
};
use crate::core::RunMode;
use crate::core::env_token::{normalize_identifier, replace_env_token};
use crate::graph::{ResourceGraph, ResourceNode};
use crate::template::parameters;

/// Lowest Jaro-Winkler similarity for a resource name to be suggested.
const SUGGESTION_THRESHOLD: f64 = 0.6;

/// Inputs of [`synthesize`] besides the template and the graph.
#[derive(Debug, Clone)]
pub struct SynthesisOptions {
    /// Per-category naming policies
    pub uniqueness: UniquenessTable,
    /// Parameter bound to the target environment
    pub environment_parameter: String,
    /// Literal for administrative principal parameters
    pub admin_login: String,
    /// Value for parameters that match nothing
    pub manual_review_sentinel: String,
    /// Value for workspace parameters when the lookup returned nothing
    pub workspace_sentinel: String,
    /// Result of the live workspace lookup
    pub workspace_id: Option<String>,
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self {
            uniqueness: UniquenessTable::default(),
            environment_parameter: DEFAULT_ENVIRONMENT_PARAMETER.to_string(),
            admin_login: DEFAULT_ADMIN_LOGIN.to_string(),
            manual_review_sentinel: DEFAULT_MANUAL_REVIEW_SENTINEL.to_string(),
            workspace_sentinel: DEFAULT_WORKSPACE_SENTINEL.to_string(),
            workspace_id: None,
        }
    }
}

/// Result of [`synthesize`].
#[derive(Debug, Clone)]
pub struct Synthesis {
    /// Resolved parameters
    pub parameters: ParameterSet,
    /// Parameters that fell back to a sentinel
    pub ambiguities: Vec<Ambiguity>,
}

fn truncate(value: &str, max_length: usize) -> String {
    value.chars().take(max_length).collect()
}

/// Prefix `name` with `prefix`, cutting `name` from its tail to fit.
fn force_unique(name: &str, prefix: &str, max_length: usize) -> String {
    let prefix_len = prefix.chars().count();
    if prefix_len >= max_length {
        return truncate(prefix, max_length);
    }
    format!("{prefix}{}", truncate(name, max_length - prefix_len))
}

fn retarget(name: &str, mode: &RunMode, policy: Option<UniquenessPolicy>) -> String {
    if !mode.is_clone() {
        return name.to_string();
    }
    let candidate = replace_env_token(name, mode.source_env(), mode.target_env());
    match policy {
        Some(p) if p.force_unique && candidate == name => {
            force_unique(name, mode.target_env(), p.max_length)
        }
        Some(p) if p.force_unique => truncate(&candidate, p.max_length),
        _ => candidate,
    }
}

/// How well a normalized resource name fits inside a parameter name: whether
/// some occurrence sits on `_` boundaries, then the matched length.
fn match_score(parameter: &str, normalized: &str) -> Option<(bool, usize)> {
    if normalized.is_empty() || !parameter.contains(normalized) {
        return None;
    }
    let bounded = parameter.match_indices(normalized).any(|(start, _)| {
        let end = start + normalized.len();
        (start == 0 || parameter[..start].ends_with('_'))
            && (end == parameter.len() || parameter[end..].starts_with('_'))
    });
    Some((bounded, normalized.len()))
}

fn find_match<'g>(graph: &'g ResourceGraph, parameter: &str) -> Option<&'g ResourceNode> {
    let parameter = parameter.to_ascii_lowercase();
    let mut best: Option<((bool, usize), &ResourceNode)> = None;
    for node in graph.nodes().iter().filter(|n| n.depth() == 2) {
        let normalized = normalize_identifier(&node.name).to_ascii_lowercase();
        let Some(score) = match_score(&parameter, &normalized) else {
            continue;
        };
        if best.is_none_or(|(b, _)| score > b) {
            best = Some((score, node));
        }
    }
    best.map(|(_, node)| node)
}

fn closest_resource(graph: &ResourceGraph, parameter: &str) -> Option<String> {
    let parameter = parameter.to_ascii_lowercase();
    let mut best: Option<(f64, &str)> = None;
    for node in graph.nodes().iter().filter(|n| n.depth() == 2) {
        let normalized = normalize_identifier(&node.name).to_ascii_lowercase();
        let score = strsim::jaro_winkler(&parameter, &normalized);
        if score >= SUGGESTION_THRESHOLD && best.is_none_or(|(b, _)| score > b) {
            best = Some((score, &node.name));
        }
    }
    best.map(|(_, name)| name.to_string())
}

/// Resolve a value for every parameter declared in `text`.
#[must_use]
pub fn synthesize(
    text: &str,
    graph: &ResourceGraph,
    mode: &RunMode,
    options: &SynthesisOptions,
) -> Synthesis {
    let mut resolved = Vec::new();
    let mut ambiguities = Vec::new();

    for parameter in parameters(text) {
        if parameter.name == options.environment_parameter {
            continue;
        }
        let lower = parameter.name.to_ascii_lowercase();

        let (value, resolution, policy) = if let Some(node) = find_match(graph, &parameter.name) {
            let policy = options.uniqueness.get(&node.resource_type);
            let value = retarget(&node.name, mode, policy);
            tracing::debug!("{} -> '{value}' (from {} '{}')", parameter.name, node.resource_type, node.name);
            let resolution = Resolution::Matched {
                resource_type: node.resource_type.clone(),
                resource_name: node.name.clone(),
            };
            (value, resolution, policy)
        } else if lower.contains("workspace") || lower.contains("loganalytics") {
            let value = options.workspace_id.clone().unwrap_or_else(|| {
                ambiguities.push(Ambiguity::new(
                    AmbiguityKind::Parameter,
                    parameter.name.clone(),
                    "workspace lookup returned nothing; set the workspace resource id",
                ));
                options.workspace_sentinel.clone()
            });
            (value, Resolution::Workspace, None)
        } else if lower.contains("admin") || lower.contains("login") {
            (options.admin_login.clone(), Resolution::AdminLogin, None)
        } else {
            ambiguities.push(
                Ambiguity::new(
                    AmbiguityKind::Parameter,
                    parameter.name.clone(),
                    "no resource name matches this parameter",
                )
                .with_suggestion(closest_resource(graph, &parameter.name)),
            );
            (options.manual_review_sentinel.clone(), Resolution::Sentinel, None)
        };

        let parameter = ResolvedParameter {
            name: parameter.name,
            declared_type: parameter.declared_type,
            value,
            resolution,
            policy,
        };
        if parameter.typed_value().is_none() {
            tracing::warn!(
                "{} is declared {} but resolved to '{}'",
                parameter.name,
                parameter.declared_type,
                parameter.value
            );
            ambiguities.push(Ambiguity::new(
                AmbiguityKind::Parameter,
                parameter.name.clone(),
                format!(
                    "declared type '{}' cannot hold '{}'; set the value by hand",
                    parameter.declared_type, parameter.value
                ),
            ));
        }
        resolved.push(parameter);
    }

    Synthesis {
        parameters: ParameterSet {
            environment_parameter: options.environment_parameter.clone(),
            environment_value: mode.target_env().to_string(),
            parameters: resolved,
        },
        ambiguities,
    }
}
