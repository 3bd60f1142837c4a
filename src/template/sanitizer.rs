//! Template text sanitizer.
//!
//! Two passes over the decompiled text:
//!
//! - **Cycle breaking.** Some child resources can be declared either inline in
//!   their parent (`subnets: [...]` on a virtual network) or standalone. The
//!   decompiler emits both, and the parent's inline entry then points at the
//!   standalone declaration, which itself names the parent: a cycle the
//!   platform rejects. Standalone duplicates are removed and every reference
//!   to them is repaired or removed.
//! - **Dependency-list cleanup.** Bare string literals inside `dependsOn`
//!   lists are decompilation artifacts and are dropped, as are lists left
//!   empty.
//!
//! After sanitizing, no line references an identifier that was removed.

use serde_json::Value;

use super::scanner::{
    Declaration, DeclarationKind, block_end, block_property, find_identifier, join_lines,
    line_contexts, references_identifier, scan, split_lines,
};
use crate::actions::{Ambiguity, AmbiguityKind};
use crate::graph::ResourceGraph;

/// A child type that can also be expressed inline in its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InlineChild {
    /// Full child resource type
    pub child_type: &'static str,
    /// Property of the parent's `properties` holding the inline entries
    pub inline_property: &'static str,
}

/// Child types the cycle breaker knows about.
pub const INLINE_CHILDREN: &[InlineChild] = &[
    InlineChild {
        child_type: "Microsoft.Network/virtualNetworks/subnets",
        inline_property: "subnets",
    },
    InlineChild {
        child_type: "Microsoft.Network/networkSecurityGroups/securityRules",
        inline_property: "securityRules",
    },
    InlineChild {
        child_type: "Microsoft.Network/routeTables/routes",
        inline_property: "routes",
    },
];

/// A standalone declaration removed by the cycle breaker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedDeclaration {
    /// Symbolic name of the removed declaration
    pub identifier: String,
    /// Resource type without API version
    pub resource_type: String,
    /// Child name (last name segment)
    pub name: String,
    /// Expression naming the parent, used to rebuild `.id` references
    pub parent_name_expr: Option<String>,
}

/// Result of [`sanitize`].
#[derive(Debug, Clone)]
pub struct SanitizeOutcome {
    /// Sanitized text
    pub text: String,
    /// Declarations removed to break cycles
    pub removed: Vec<RemovedDeclaration>,
    /// References that could not be rewritten and were removed
    pub ambiguities: Vec<Ambiguity>,
    /// Number of string literals dropped from dependency lists
    pub dropped_literals: usize,
}

/// Break inline/standalone cycles and clean dependency lists.
#[must_use]
pub fn sanitize(text: &str, graph: &ResourceGraph) -> SanitizeOutcome {
    let mut lines = split_lines(text);
    let (removed, ambiguities) = break_cycles(&mut lines, graph);
    let dropped_literals = drop_literal_dependencies(&mut lines);
    remove_empty_dependency_lists(&mut lines);

    if dropped_literals > 0 {
        tracing::debug!("Dropped {dropped_literals} literal dependsOn entries");
    }

    SanitizeOutcome {
        text: join_lines(&lines),
        removed,
        ambiguities,
        dropped_literals,
    }
}

fn inline_child_for(resource_type: &str) -> Option<&'static InlineChild> {
    INLINE_CHILDREN.iter().find(|c| c.child_type.eq_ignore_ascii_case(resource_type))
}

/// Last name segment of a quoted name such as `'subnetA'` or `'${vnet}/subnetA'`.
fn literal_leaf(expr: &str) -> Option<String> {
    let inner = expr.trim().strip_prefix('\'')?.strip_suffix('\'')?;
    let leaf = inner.rsplit('/').next()?;
    (!leaf.is_empty() && !leaf.contains("${") && !leaf.contains('}')).then(|| leaf.to_string())
}

/// Parent expression of a child named `'${parent}/leaf'`.
fn interpolated_parent(expr: &str) -> Option<String> {
    let inner = expr.trim().strip_prefix('\'')?.strip_suffix('\'')?;
    let (prefix, _) = inner.rsplit_once('/')?;
    let parent = prefix.strip_prefix("${")?.strip_suffix('}')?.trim();
    (!parent.is_empty() && !parent.contains(['{', '}', '$']))
        .then(|| parent.to_string())
}

fn declared_inline_in_text(lines: &[String], parent: &Declaration, leaf: &str) -> bool {
    let entry = format!("name: '{leaf}'");
    lines[parent.header + 1..=parent.end].iter().any(|l| l.trim() == entry)
}

fn listed_inline_in_graph(graph: &ResourceGraph, child: &InlineChild, leaf: &str) -> bool {
    graph
        .nodes()
        .iter()
        .filter(|n| {
            n.resource_type.eq_ignore_ascii_case(child.child_type)
                && n.leaf_name().eq_ignore_ascii_case(leaf)
        })
        .filter_map(|n| n.parent_key().and_then(|key| graph.get(&key)))
        .any(|parent| {
            parent
                .properties()
                .and_then(|p| p.get(child.inline_property))
                .and_then(Value::as_array)
                .is_some_and(|items| {
                    items.iter().any(|item| {
                        item.get("name")
                            .and_then(Value::as_str)
                            .is_some_and(|n| n.eq_ignore_ascii_case(leaf))
                    })
                })
        })
}

fn find_duplicates(lines: &[String], graph: &ResourceGraph) -> Vec<(Declaration, RemovedDeclaration)> {
    let declarations = scan(lines);
    let mut duplicates = Vec::new();

    for decl in declarations.iter().filter(|d| d.kind == DeclarationKind::Resource) {
        let Some(child) = decl.declared_type.as_deref().and_then(inline_child_for) else {
            continue;
        };
        let Some(name_expr) = block_property(lines, decl, "name") else {
            continue;
        };
        let Some(leaf) = literal_leaf(&name_expr) else {
            continue;
        };
        let interpolated = interpolated_parent(&name_expr);
        let parent = match block_property(lines, decl, "parent") {
            Some(ident) => declarations.iter().find(|d| d.identifier == ident),
            None => interpolated.as_deref().and_then(|expr| {
                declarations.iter().find(|d| {
                    d.kind == DeclarationKind::Resource
                        && block_property(lines, d, "name").as_deref() == Some(expr)
                })
            }),
        };

        let inline_in_text = parent.is_some_and(|p| declared_inline_in_text(lines, p, &leaf));
        if !inline_in_text && !listed_inline_in_graph(graph, child, &leaf) {
            continue;
        }

        tracing::info!(
            "Removing standalone {} '{leaf}' ({}) declared inline in its parent",
            child.child_type,
            decl.identifier
        );
        duplicates.push((
            decl.clone(),
            RemovedDeclaration {
                identifier: decl.identifier.clone(),
                resource_type: child.child_type.to_string(),
                name: leaf,
                parent_name_expr: parent
                    .and_then(|p| block_property(lines, p, "name"))
                    .or(interpolated),
            },
        ));
    }
    duplicates
}

/// Replace `ident.member` (whole identifier, whole member) with `replacement`.
fn replace_member(line: &str, ident: &str, member: &str, replacement: &str) -> String {
    let pattern_len = ident.len() + 1 + member.len();
    let mut result = String::with_capacity(line.len());
    let mut cursor = 0;
    for pos in find_identifier(line, ident) {
        if pos < cursor {
            continue;
        }
        let tail = &line[pos + ident.len()..];
        let member_matches = tail.strip_prefix('.').and_then(|t| t.strip_prefix(member)).is_some_and(
            |rest| !rest.starts_with(|c: char| c.is_ascii_alphanumeric() || c == '_'),
        );
        if member_matches {
            result.push_str(&line[cursor..pos]);
            result.push_str(replacement);
            cursor = pos + pattern_len;
        }
    }
    result.push_str(&line[cursor..]);
    result
}

fn break_cycles(lines: &mut Vec<String>, graph: &ResourceGraph) -> (Vec<RemovedDeclaration>, Vec<Ambiguity>) {
    let duplicates = find_duplicates(lines, graph);
    if duplicates.is_empty() {
        return (Vec::new(), Vec::new());
    }

    let contexts = line_contexts(lines.as_slice());
    let mut keep = vec![true; lines.len()];
    for (decl, _) in &duplicates {
        for flag in &mut keep[decl.start..=decl.end] {
            *flag = false;
        }
        // Drop one separating blank line so removals leave no gaps behind.
        if keep.get(decl.end + 1).is_some() && lines[decl.end + 1].trim().is_empty() {
            keep[decl.end + 1] = false;
        }
    }

    let removed: Vec<RemovedDeclaration> = duplicates.into_iter().map(|(_, r)| r).collect();
    let mut ambiguities = Vec::new();

    let mut i = 0;
    while i < lines.len() {
        if !keep[i] {
            i += 1;
            continue;
        }
        for target in &removed {
            let ident = target.identifier.as_str();
            if !references_identifier(&lines[i], ident) {
                continue;
            }
            let trimmed = lines[i].trim();
            let bare = trimmed == ident || trimmed == format!("{ident}.id");
            if bare && contexts[i] == Some('[') {
                tracing::debug!("Removing list reference to {ident}");
                keep[i] = false;
                break;
            }

            let mut rewritten = replace_member(&lines[i], ident, "name", &format!("'{}'", target.name));
            if let Some(parent) = &target.parent_name_expr {
                let id_expr =
                    format!("resourceId('{}', {parent}, '{}')", target.resource_type, target.name);
                rewritten = replace_member(&rewritten, ident, "id", &id_expr);
            }

            if references_identifier(&rewritten, ident) {
                let end = block_end(lines.as_slice(), i);
                ambiguities.push(Ambiguity::new(
                    AmbiguityKind::Reference,
                    ident,
                    format!("removed reference '{trimmed}' to a standalone declaration that was folded into its parent"),
                ));
                for flag in &mut keep[i..=end] {
                    *flag = false;
                }
                break;
            }
            lines[i] = rewritten;
        }
        i += 1;
    }

    let mut index = 0;
    lines.retain(|_| {
        let kept = keep[index];
        index += 1;
        kept
    });
    (removed, ambiguities)
}

fn is_dependency_list_start(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.starts_with("dependsOn:") && trimmed.ends_with('[')
}

fn is_string_literal_entry(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.len() >= 2 && trimmed.starts_with('\'') && trimmed.ends_with('\'')
}

fn drop_literal_dependencies(lines: &mut Vec<String>) -> usize {
    let mut keep = vec![true; lines.len()];
    let mut i = 0;
    while i < lines.len() {
        if is_dependency_list_start(&lines[i]) {
            let end = block_end(lines.as_slice(), i);
            for j in i + 1..end {
                if is_string_literal_entry(&lines[j]) {
                    keep[j] = false;
                }
            }
            i = end;
        }
        i += 1;
    }

    let dropped = keep.iter().filter(|k| !**k).count();
    let mut index = 0;
    lines.retain(|_| {
        let kept = keep[index];
        index += 1;
        kept
    });
    dropped
}

fn remove_empty_dependency_lists(lines: &mut Vec<String>) {
    let mut i = 0;
    while i < lines.len() {
        if is_dependency_list_start(&lines[i]) {
            let end = block_end(lines.as_slice(), i);
            if end > i && lines[i + 1..end].iter().all(|l| l.trim().is_empty()) {
                lines.drain(i..=end);
                continue;
            }
        }
        i += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::fixtures;

    fn graph() -> ResourceGraph {
        ResourceGraph::load(&fixtures::sample_export()).unwrap()
    }

    #[test]
    fn test_standalone_subnet_is_removed_with_its_references() {
        let outcome = sanitize(fixtures::SAMPLE_DECOMPILED, &graph());
        let ident = "virtualNetworks_vnet_dev_name_subnetA";

        assert_eq!(outcome.removed.len(), 1);
        assert_eq!(outcome.removed[0].identifier, ident);
        assert_eq!(outcome.removed[0].name, "subnetA");
        assert!(!outcome.text.contains(&format!("resource {ident}")));
        assert!(outcome.text.lines().all(|l| find_identifier(l, ident).is_empty()));
        // the inline definition survives
        assert!(outcome.text.contains("name: 'subnetA'"));
        assert!(outcome.text.contains("addressPrefix: '10.0.1.0/24'"));
        assert!(outcome.text.contains(
            "resourceId('Microsoft.Network/virtualNetworks/subnets', virtualNetworks_vnet_dev_name, 'subnetA')"
        ));
    }

    #[test]
    fn test_literal_dependencies_are_dropped() {
        let outcome = sanitize(fixtures::SAMPLE_DECOMPILED, &graph());
        assert!(outcome.dropped_literals >= 1);
        assert!(!outcome.text.contains("'Microsoft.Web/serverfarms/plan-dev'"));
        assert!(outcome.text.contains("serverfarms_plan_dev_name_resource\n"));
    }

    #[test]
    fn test_empty_dependency_lists_are_removed() {
        let text = "resource a 'Microsoft.Web/sites@2022-09-01' = {\n  name: 'a'\n  dependsOn: [\n    'literal'\n  ]\n}\n";
        let outcome = sanitize(text, &graph());
        assert_eq!(outcome.text, "resource a 'Microsoft.Web/sites@2022-09-01' = {\n  name: 'a'\n}\n");
    }

    #[test]
    fn test_unrewritable_reference_is_recorded() {
        let text = "\
resource vnet 'Microsoft.Network/virtualNetworks@2023-04-01' = {
  name: 'vnet-dev'
  properties: {
    subnets: [
      {
        name: 'subnetA'
      }
    ]
  }
}

resource vnet_subnetA 'Microsoft.Network/virtualNetworks/subnets@2023-04-01' = {
  parent: vnet
  name: 'subnetA'
}

output prefix string = vnet_subnetA.properties.addressPrefix
";
        let outcome = sanitize(text, &graph());
        assert_eq!(outcome.removed.len(), 1);
        assert_eq!(outcome.ambiguities.len(), 1);
        assert_eq!(outcome.ambiguities[0].kind, AmbiguityKind::Reference);
        assert!(!outcome.text.contains("vnet_subnetA"));
    }

    #[test]
    fn test_interpolated_child_name_keeps_id_references() {
        let text = "\
resource virtualNetworks_vnet_dev_name_resource 'Microsoft.Network/virtualNetworks@2023-04-01' = {
  name: virtualNetworks_vnet_dev_name
  properties: {
    subnets: [
      {
        name: 'subnetA'
      }
    ]
  }
}

resource vnet_subnetA 'Microsoft.Network/virtualNetworks/subnets@2023-04-01' = {
  name: '${virtualNetworks_vnet_dev_name}/subnetA'
  dependsOn: [
    virtualNetworks_vnet_dev_name_resource
  ]
}

resource site 'Microsoft.Web/sites@2022-09-01' = {
  name: 'app'
  properties: {
    virtualNetworkSubnetId: vnet_subnetA.id
  }
}
";
        let outcome = sanitize(text, &graph());
        assert_eq!(outcome.removed.len(), 1);
        assert_eq!(
            outcome.removed[0].parent_name_expr.as_deref(),
            Some("virtualNetworks_vnet_dev_name")
        );
        assert!(outcome.ambiguities.is_empty());
        assert!(outcome.text.contains(
            "virtualNetworkSubnetId: resourceId('Microsoft.Network/virtualNetworks/subnets', virtualNetworks_vnet_dev_name, 'subnetA')"
        ));
        assert!(!outcome.text.contains("vnet_subnetA"));
    }

    #[test]
    fn test_interpolated_parent() {
        assert_eq!(interpolated_parent("'${vnet_name}/subnetA'").as_deref(), Some("vnet_name"));
        assert_eq!(interpolated_parent("'subnetA'"), None);
        assert_eq!(interpolated_parent("'${a}-${b}/subnetA'"), None);
    }

    #[test]
    fn test_standalone_child_without_inline_twin_is_kept() {
        let text = "\
resource nsg 'Microsoft.Network/networkSecurityGroups@2023-04-01' = {
  name: 'nsg-other'
}

resource nsg_rule 'Microsoft.Network/networkSecurityGroups/securityRules@2023-04-01' = {
  parent: nsg
  name: 'allow-https'
}
";
        let outcome = sanitize(text, &graph());
        assert!(outcome.removed.is_empty());
        assert_eq!(outcome.text, text);
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let once = sanitize(fixtures::SAMPLE_DECOMPILED, &graph());
        let twice = sanitize(&once.text, &graph());
        assert_eq!(once.text, twice.text);
        assert!(twice.removed.is_empty());
    }

    #[test]
    fn test_replace_member() {
        assert_eq!(replace_member("x: a.id", "a", "id", "R"), "x: R");
        assert_eq!(replace_member("x: a.identity", "a", "id", "R"), "x: a.identity");
        assert_eq!(replace_member("x: ba.id, a.id", "a", "id", "R"), "x: ba.id, R");
    }
}
