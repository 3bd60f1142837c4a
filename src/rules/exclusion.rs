//! Exclusion filter: drops resources the target platform rejects as input.
//!
//! Rules are data: a type pattern, an optional name pattern and an optional
//! property condition. A node is dropped when *any* rule matches. Dropping a
//! node also drops its hierarchical descendants, and `dependsOn` entries that
//! point at anything no longer in the graph are removed from the survivors.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashSet;

use super::condition::PropertyCondition;
use crate::core::CloneError;
use crate::graph::{ResourceGraph, ResourceKey, ResourceNode};

/// Configuration form of an exclusion rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExclusionRuleSpec {
    /// Stable identifier reported in the manifest
    pub id: String,
    /// Regex over the resource type
    #[serde(rename = "type")]
    pub type_pattern: String,
    /// Optional regex over the resolved resource name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Optional property condition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<PropertyCondition>,
    /// Why the resource is excluded
    #[serde(default)]
    pub description: String,
}

/// A compiled exclusion rule.
#[derive(Debug, Clone)]
pub struct ExclusionRule {
    spec: ExclusionRuleSpec,
    type_pattern: Regex,
    name_pattern: Option<Regex>,
}

impl ExclusionRule {
    /// Compile a rule.
    ///
    /// # Errors
    ///
    /// Returns [`CloneError::ConfigError`] when a pattern is not a valid regex.
    pub fn compile(spec: ExclusionRuleSpec) -> Result<Self, CloneError> {
        let type_pattern = compile_pattern(&spec.id, &spec.type_pattern)?;
        let name_pattern = spec.name.as_deref().map(|p| compile_pattern(&spec.id, p)).transpose()?;
        Ok(Self {
            spec,
            type_pattern,
            name_pattern,
        })
    }

    /// Rule identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.spec.id
    }

    /// Configuration form of the rule.
    #[must_use]
    pub const fn spec(&self) -> &ExclusionRuleSpec {
        &self.spec
    }

    /// Whether the rule drops this node.
    #[must_use]
    pub fn matches(&self, node: &ResourceNode) -> bool {
        self.type_pattern.is_match(&node.resource_type)
            && self.name_pattern.as_ref().is_none_or(|p| p.is_match(&node.name))
            && self.spec.when.as_ref().is_none_or(|c| c.matches(&node.raw))
    }
}

pub(crate) fn compile_pattern(rule_id: &str, pattern: &str) -> Result<Regex, CloneError> {
    Regex::new(pattern).map_err(|e| CloneError::ConfigError {
        message: format!("rule '{rule_id}' has an invalid pattern '{pattern}': {e}"),
    })
}

/// A resource removed by the filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExcludedResource {
    /// Resource type
    #[serde(rename = "type")]
    pub resource_type: String,
    /// Resource name
    pub name: String,
    /// Rule that matched, or `parent:<rule>` for cascaded children
    pub rule: String,
}

/// Result of [`filter`].
#[derive(Debug, Clone)]
pub struct FilterOutcome {
    /// Surviving resources
    pub graph: ResourceGraph,
    /// Dropped resources in stable order
    pub excluded: Vec<ExcludedResource>,
    /// Number of `dependsOn` entries removed from survivors
    pub pruned_dependencies: usize,
}

/// Apply every rule; drop a node if any rule matches.
#[must_use]
pub fn filter(graph: &ResourceGraph, rules: &[ExclusionRule]) -> FilterOutcome {
    let mut matched: Vec<(usize, &str)> = Vec::new();
    for (i, node) in graph.nodes().iter().enumerate() {
        if let Some(rule) = rules.iter().find(|r| r.matches(node)) {
            tracing::debug!("Excluding {} '{}' (rule {})", node.resource_type, node.name, rule.id());
            matched.push((i, rule.id()));
        }
    }

    let roots: Vec<usize> = matched.iter().map(|(i, _)| *i).collect();
    let dropped = graph.with_descendants(&roots);

    let mut excluded = Vec::new();
    let mut survivors = Vec::new();
    for (i, node) in graph.nodes().iter().enumerate() {
        if !dropped.contains(&i) {
            survivors.push(node.clone());
            continue;
        }
        let rule = match matched.iter().find(|(m, _)| *m == i) {
            Some((_, id)) => (*id).to_string(),
            None => {
                let parent = matched
                    .iter()
                    .find(|(m, _)| child_of(node, &graph.nodes()[*m]))
                    .map_or("excluded", |(_, id)| *id);
                tracing::debug!("Excluding {} '{}' with its parent", node.resource_type, node.name);
                format!("parent:{parent}")
            }
        };
        excluded.push(ExcludedResource {
            resource_type: node.resource_type.clone(),
            name: node.name.clone(),
            rule,
        });
    }

    let present: HashSet<ResourceKey> = survivors.iter().map(ResourceNode::key).collect();
    let mut pruned_dependencies = 0;
    for node in &mut survivors {
        pruned_dependencies += prune_depends_on(node, graph, &present);
    }

    if !excluded.is_empty() {
        tracing::info!(
            "Excluded {} resources, removed {} dangling dependencies",
            excluded.len(),
            pruned_dependencies
        );
    }

    FilterOutcome {
        graph: graph.with_nodes(survivors),
        excluded,
        pruned_dependencies,
    }
}

fn child_of(node: &ResourceNode, ancestor: &ResourceNode) -> bool {
    let type_prefix = format!("{}/", ancestor.resource_type.to_ascii_lowercase());
    let name_prefix = format!("{}/", ancestor.name.to_ascii_lowercase());
    node.resource_type.to_ascii_lowercase().starts_with(&type_prefix)
        && node.name.to_ascii_lowercase().starts_with(&name_prefix)
}

fn prune_depends_on(
    node: &mut ResourceNode,
    graph: &ResourceGraph,
    present: &HashSet<ResourceKey>,
) -> usize {
    let Some(Value::Array(entries)) = node.raw.get_mut("dependsOn") else {
        return 0;
    };
    let before = entries.len();
    entries.retain(|entry| {
        let keep = entry
            .as_str()
            .and_then(|e| graph.resolve_reference(e))
            .is_none_or(|key| present.contains(&key));
        if !keep {
            tracing::debug!("Removing dangling dependency {entry} from '{}'", node.name);
        }
        keep
    });
    before - entries.len()
}

fn rule(id: &str, type_pattern: &str, description: &str) -> ExclusionRuleSpec {
    ExclusionRuleSpec {
        id: id.to_string(),
        type_pattern: type_pattern.to_string(),
        name: None,
        when: None,
        description: description.to_string(),
    }
}

/// The built-in exclusion table.
#[must_use]
pub fn builtin_exclusions() -> Vec<ExclusionRuleSpec> {
    vec![
        rule(
            "monitoring-telemetry",
            r"(?i)^microsoft\.insights/components/(proactivedetectionconfigs|analyticsitems|myanalyticsitems|currentbillingfeatures)$",
            "Telemetry configuration generated by the monitoring service",
        ),
        rule(
            "diagnostic-settings",
            r"(?i)/diagnosticsettings$",
            "Diagnostic settings are bound to the source workspace",
        ),
        rule(
            "site-runtime-history",
            r"(?i)^microsoft\.web/sites(/slots)?/(deployments|functions)$",
            "Deployment history and function definitions are generated at runtime",
        ),
        rule(
            "site-instance-bindings",
            r"(?i)^microsoft\.web/sites(/slots)?/(hostnamebindings|basicpublishingcredentialspolicies)$",
            "Host name bindings and publishing credential policies belong to the running instance",
        ),
        rule(
            "topic-subscription-rules",
            r"(?i)^microsoft\.servicebus/namespaces/topics/subscriptions/rules$",
            "Subscription rules are recreated with their subscriptions",
        ),
        ExclusionRuleSpec {
            name: Some(r"(?i)^[^/]+/(administrators|developers|guests)(/|$)".to_string()),
            ..rule(
                "gateway-system-groups",
                r"(?i)^microsoft\.apimanagement/service/groups(/users)?$",
                "System groups and their built-in members are created by the gateway",
            )
        },
        ExclusionRuleSpec {
            when: Some(PropertyCondition::new("/properties/type", json!("system"))),
            ..rule(
                "gateway-system-group-type",
                r"(?i)^microsoft\.apimanagement/service/groups$",
                "Groups of type 'system' are created by the gateway",
            )
        },
        rule(
            "gateway-legacy-properties",
            r"(?i)^microsoft\.apimanagement/service/properties$",
            "Deprecated property bag superseded by named values",
        ),
        rule(
            "gateway-notifications",
            r"(?i)^microsoft\.apimanagement/service/notifications(/.+)?$",
            "Built-in notifications are created by the gateway",
        ),
        ExclusionRuleSpec {
            name: Some(r"(?i)/master$".to_string()),
            ..rule(
                "gateway-master-subscription",
                r"(?i)^microsoft\.apimanagement/service/subscriptions$",
                "The master subscription key is created by the gateway",
            )
        },
        rule(
            "vault-secret-values",
            r"(?i)^microsoft\.keyvault/vaults/secrets$",
            "Secret values are never exportable and must be provisioned out of band",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn builtin() -> Vec<ExclusionRule> {
        builtin_exclusions().into_iter().map(|s| ExclusionRule::compile(s).unwrap()).collect()
    }

    fn graph(resources: Value) -> ResourceGraph {
        ResourceGraph::load(&json!({ "resources": resources }).to_string()).unwrap()
    }

    fn names(graph: &ResourceGraph) -> Vec<String> {
        graph.nodes().iter().map(|n| n.name.clone()).collect()
    }

    #[test]
    fn test_builtin_rules_drop_runtime_resources() {
        let input = graph(json!([
            { "type": "Microsoft.Web/sites", "name": "app-dev" },
            { "type": "Microsoft.Web/sites/deployments", "name": "app-dev/abc" },
            { "type": "Microsoft.Web/sites/functions", "name": "app-dev/fn" },
            { "type": "Microsoft.Web/sites/hostNameBindings", "name": "app-dev/app-dev.azurewebsites.net" },
            { "type": "Microsoft.KeyVault/vaults", "name": "kv-dev" },
            { "type": "Microsoft.KeyVault/vaults/secrets", "name": "kv-dev/db-password" },
            { "type": "Microsoft.Insights/components/ProactiveDetectionConfigs", "name": "ai-dev/slowpageloadtime" }
        ]));
        let outcome = filter(&input, &builtin());
        assert_eq!(names(&outcome.graph), vec!["kv-dev", "app-dev"]);
        assert_eq!(outcome.excluded.len(), 5);
        assert!(outcome.excluded.iter().any(|e| e.rule == "vault-secret-values"));
    }

    #[test]
    fn test_gateway_reserved_groups_and_members() {
        let input = graph(json!([
            { "type": "Microsoft.ApiManagement/service", "name": "apim-dev" },
            { "type": "Microsoft.ApiManagement/service/groups", "name": "apim-dev/administrators" },
            { "type": "Microsoft.ApiManagement/service/groups/users", "name": "apim-dev/administrators/1" },
            { "type": "Microsoft.ApiManagement/service/groups", "name": "apim-dev/partners" },
            { "type": "Microsoft.ApiManagement/service/subscriptions", "name": "apim-dev/master" },
            { "type": "Microsoft.ApiManagement/service/subscriptions", "name": "apim-dev/team" },
            { "type": "Microsoft.ApiManagement/service/properties", "name": "apim-dev/legacy" },
            { "type": "Microsoft.ApiManagement/service/notifications", "name": "apim-dev/RequestPublisherNotificationMessage" }
        ]));
        let outcome = filter(&input, &builtin());
        assert_eq!(names(&outcome.graph), vec!["apim-dev", "apim-dev/partners", "apim-dev/team"]);
    }

    #[test]
    fn test_cascade_drops_descendants() {
        let custom = ExclusionRule::compile(ExclusionRuleSpec {
            id: "drop-topics".to_string(),
            type_pattern: r"(?i)^microsoft\.servicebus/namespaces/topics$".to_string(),
            name: None,
            when: None,
            description: String::new(),
        })
        .unwrap();
        let input = graph(json!([
            { "type": "Microsoft.ServiceBus/namespaces", "name": "sb-dev" },
            { "type": "Microsoft.ServiceBus/namespaces/topics", "name": "sb-dev/orders" },
            { "type": "Microsoft.ServiceBus/namespaces/topics/subscriptions", "name": "sb-dev/orders/billing" }
        ]));
        let outcome = filter(&input, &[custom]);
        assert_eq!(names(&outcome.graph), vec!["sb-dev"]);
        let cascaded = outcome.excluded.iter().find(|e| e.name == "sb-dev/orders/billing").unwrap();
        assert_eq!(cascaded.rule, "parent:drop-topics");
    }

    #[test]
    fn test_dangling_dependencies_are_removed() {
        let input = graph(json!([
            { "type": "Microsoft.KeyVault/vaults", "name": "kv-dev" },
            { "type": "Microsoft.KeyVault/vaults/secrets", "name": "kv-dev/s1" },
            {
                "type": "Microsoft.Web/sites",
                "name": "app-dev",
                "dependsOn": [
                    "[resourceId('Microsoft.KeyVault/vaults/secrets', 'kv-dev', 's1')]",
                    "[resourceId('Microsoft.KeyVault/vaults', 'kv-dev')]",
                    "[reference('opaque')]"
                ]
            }
        ]));
        let outcome = filter(&input, &builtin());
        assert_eq!(outcome.pruned_dependencies, 1);
        assert!(outcome.graph.dangling_dependencies().is_empty());
        let app = outcome.graph.find_by_name_fragment("app-dev").unwrap();
        assert_eq!(app.depends_on().len(), 2);
    }

    #[test]
    fn test_filter_is_idempotent() {
        let input = graph(json!([
            { "type": "Microsoft.Web/sites", "name": "app-dev" },
            { "type": "Microsoft.Web/sites/deployments", "name": "app-dev/abc" }
        ]));
        let once = filter(&input, &builtin());
        let twice = filter(&once.graph, &builtin());
        assert_eq!(once.graph.to_export(), twice.graph.to_export());
        assert!(twice.excluded.is_empty());
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        let result = ExclusionRule::compile(rule("bad", "(", ""));
        assert!(matches!(result, Err(CloneError::ConfigError { .. })));
    }
}
