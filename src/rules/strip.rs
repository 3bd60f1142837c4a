//! Read-only property stripper.
//!
//! Exports carry fields the platform computes or derives (`provisioningState`,
//! inherited `location` on child resources, `sku.tier`, ...). Deploying them
//! back fails validation, so each matching rule removes its listed fields.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::condition::{PropertyCondition, remove_pointer};
use super::exclusion::compile_pattern;
use crate::core::CloneError;
use crate::graph::{ResourceGraph, ResourceNode};

/// Configuration form of a strip rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StripRuleSpec {
    /// Stable identifier
    pub id: String,
    /// Optional regex over the resource type; absent matches every type
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_pattern: Option<String>,
    /// Optional minimum type nesting depth
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_depth: Option<usize>,
    /// JSON pointers of the fields to remove
    pub remove: Vec<String>,
    /// Optional condition, evaluated before any field is removed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<PropertyCondition>,
    /// Why the fields are removed
    #[serde(default)]
    pub description: String,
}

/// A compiled strip rule.
#[derive(Debug, Clone)]
pub struct StripRule {
    spec: StripRuleSpec,
    type_pattern: Option<Regex>,
}

impl StripRule {
    /// Compile a rule.
    ///
    /// # Errors
    ///
    /// Returns [`CloneError::ConfigError`] for an invalid type pattern or a
    /// field path that is not a JSON pointer.
    pub fn compile(spec: StripRuleSpec) -> Result<Self, CloneError> {
        if let Some(bad) = spec.remove.iter().find(|p| !p.starts_with('/')) {
            return Err(CloneError::ConfigError {
                message: format!("rule '{}' field '{bad}' is not a JSON pointer", spec.id),
            });
        }
        let type_pattern =
            spec.type_pattern.as_deref().map(|p| compile_pattern(&spec.id, p)).transpose()?;
        Ok(Self {
            spec,
            type_pattern,
        })
    }

    /// Rule identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.spec.id
    }

    /// Configuration form of the rule.
    #[must_use]
    pub const fn spec(&self) -> &StripRuleSpec {
        &self.spec
    }

    fn applies_to(&self, node: &ResourceNode) -> bool {
        self.type_pattern.as_ref().is_none_or(|p| p.is_match(&node.resource_type))
            && self.spec.min_depth.is_none_or(|d| node.depth() >= d)
            && self.spec.when.as_ref().is_none_or(|c| c.matches(&node.raw))
    }
}

/// Remove read-only and derived fields from every node.
#[must_use]
pub fn strip(graph: &ResourceGraph, rules: &[StripRule]) -> ResourceGraph {
    let mut removed = 0usize;
    let nodes = graph
        .nodes()
        .iter()
        .map(|node| {
            let applicable: Vec<&StripRule> = rules.iter().filter(|r| r.applies_to(node)).collect();
            let mut node = node.clone();
            for rule in applicable {
                for field in &rule.spec.remove {
                    if remove_pointer(&mut node.raw, field).is_some() {
                        tracing::trace!("Stripped {field} from '{}' (rule {})", node.name, rule.id());
                        removed += 1;
                    }
                }
            }
            node
        })
        .collect();

    tracing::debug!("Stripped {removed} read-only fields");
    graph.with_nodes(nodes)
}

fn rule(id: &str, remove: &[&str], description: &str) -> StripRuleSpec {
    StripRuleSpec {
        id: id.to_string(),
        type_pattern: None,
        min_depth: None,
        remove: remove.iter().map(|s| (*s).to_string()).collect(),
        when: None,
        description: description.to_string(),
    }
}

/// The built-in strip table.
#[must_use]
pub fn builtin_strips() -> Vec<StripRuleSpec> {
    vec![
        rule(
            "provisioning-state",
            &["/properties/provisioningState"],
            "Set by the platform on every resource",
        ),
        StripRuleSpec {
            min_depth: Some(3),
            ..rule(
                "child-inherited-fields",
                &["/location", "/tags", "/sku"],
                "Child resources inherit location, tags and sku from their parent",
            )
        },
        StripRuleSpec {
            type_pattern: Some(r"(?i)^microsoft\.(servicebus|eventhub)/namespaces/.+".to_string()),
            ..rule(
                "messaging-child-status",
                &["/properties/status"],
                "Entity status is reported by the broker",
            )
        },
        StripRuleSpec {
            type_pattern: Some(r"(?i)^microsoft\.(storage/storageaccounts|web/serverfarms)$".to_string()),
            ..rule("derived-sku-tier", &["/sku/tier"], "The tier is derived from the sku name")
        },
        StripRuleSpec {
            type_pattern: Some(r"(?i)^microsoft\.documentdb/databaseaccounts$".to_string()),
            when: Some(PropertyCondition::new(
                "/properties/enablePriorityBasedExecution",
                json!(false),
            )),
            ..rule(
                "inactive-priority-level",
                &["/properties/defaultPriorityLevel"],
                "A default priority level is rejected while priority execution is off",
            )
        },
    ]
}
