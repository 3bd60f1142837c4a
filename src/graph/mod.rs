//! In-memory model of an exported resource graph.
//!
//! The export is a JSON document with a `resources` array; each entry is a
//! [`ResourceNode`]. A [`ResourceGraph`] keeps the nodes sorted by
//! `(type, name)` so every downstream decision is deterministic across
//! repeated runs on identical input, and keeps the rest of the document
//! (`parameters`, `variables`, ...) so the cleaned export can be written back.
//!
//! Two kinds of edges exist between nodes:
//! - **containment**: `Microsoft.Network/virtualNetworks/subnets` named
//!   `vnet/subnetA` is a child of `Microsoft.Network/virtualNetworks` named `vnet`
//! - **dependency**: explicit `dependsOn` entries
//!
//! The graph is never mutated in place; the filter and strip stages build new
//! graphs with [`ResourceGraph::with_nodes`].

pub mod expression;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

use crate::core::CloneError;
pub use expression::{ExpressionScope, ResourceKey};

/// Number of `/`-separated segments in a resource type.
///
/// `Microsoft.Storage/storageAccounts` has depth 2; anything deeper is a
/// child resource of another resource.
#[must_use]
pub fn nesting_depth(resource_type: &str) -> usize {
    resource_type.split('/').filter(|s| !s.is_empty()).count()
}

/// One deployable unit of the export.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceNode {
    /// Hierarchical type, e.g. `Microsoft.Web/sites/config`
    pub resource_type: String,
    /// Resolved name, slash-segmented for child resources
    pub name: String,
    /// The full exported object, including `properties`, `sku`, `location`,
    /// `tags` and `dependsOn`
    pub raw: Value,
}

impl ResourceNode {
    /// Build a node from an exported resource object.
    pub fn from_export(raw: Value, scope: &ExpressionScope) -> Result<Self, CloneError> {
        let resource_type = raw
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| CloneError::ParseError {
                reason: "resource entry without a 'type'".to_string(),
            })?
            .to_string();
        let raw_name = raw.get("name").and_then(Value::as_str).ok_or_else(|| {
            CloneError::ParseError {
                reason: format!("resource of type '{resource_type}' without a 'name'"),
            }
        })?;
        let name = scope.resolve_string(raw_name).unwrap_or_else(|| raw_name.to_string());

        Ok(Self {
            resource_type,
            name,
            raw,
        })
    }

    /// Case-insensitive identity of this node.
    #[must_use]
    pub fn key(&self) -> ResourceKey {
        ResourceKey::new(&self.resource_type, &self.name)
    }

    /// Type nesting depth, see [`nesting_depth`].
    #[must_use]
    pub fn depth(&self) -> usize {
        nesting_depth(&self.resource_type)
    }

    /// The `properties` object, if present.
    #[must_use]
    pub fn properties(&self) -> Option<&Value> {
        self.raw.get("properties")
    }

    /// Optional `kind` field (`functionapp`, `app,linux`, ...).
    #[must_use]
    pub fn kind(&self) -> Option<&str> {
        self.raw.get("kind").and_then(Value::as_str)
    }

    /// Raw `dependsOn` entries.
    #[must_use]
    pub fn depends_on(&self) -> Vec<&str> {
        self.raw
            .get("dependsOn")
            .and_then(Value::as_array)
            .map(|deps| deps.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// Key of the parent resource for child resources.
    #[must_use]
    pub fn parent_key(&self) -> Option<ResourceKey> {
        let (parent_type, _) = self.resource_type.rsplit_once('/')?;
        let (parent_name, _) = self.name.rsplit_once('/')?;
        (nesting_depth(parent_type) >= 2).then(|| ResourceKey::new(parent_type, parent_name))
    }

    /// Last segment of the name (the child's own name).
    #[must_use]
    pub fn leaf_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }
}

/// The resource graph of one export.
#[derive(Debug, Clone)]
pub struct ResourceGraph {
    nodes: Vec<ResourceNode>,
    /// Export document without its `resources` array.
    document: Value,
    scope: ExpressionScope,
}

impl ResourceGraph {
    /// Parse a raw export.
    ///
    /// # Errors
    ///
    /// Returns [`CloneError::ParseError`] if the export is not JSON, has no
    /// `resources` array, or the array is empty.
    pub fn load(raw_export: &str) -> Result<Self, CloneError> {
        let mut document: Value =
            serde_json::from_str(raw_export).map_err(|e| CloneError::ParseError {
                reason: format!("export is not well-formed JSON: {e}"),
            })?;

        let resources = document
            .as_object_mut()
            .and_then(|doc| doc.remove("resources"))
            .ok_or_else(|| CloneError::ParseError {
                reason: "export has no 'resources' array".to_string(),
            })?;
        let Value::Array(resources) = resources else {
            return Err(CloneError::ParseError {
                reason: "'resources' is not an array".to_string(),
            });
        };
        if resources.is_empty() {
            return Err(CloneError::ParseError {
                reason: "export contains no resources".to_string(),
            });
        }

        let scope = ExpressionScope::from_document(&document);
        let nodes = resources
            .into_iter()
            .map(|raw| ResourceNode::from_export(raw, &scope))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!("Loaded export with {} resources", nodes.len());

        Ok(Self::assemble(nodes, document, scope))
    }

    fn assemble(mut nodes: Vec<ResourceNode>, document: Value, scope: ExpressionScope) -> Self {
        nodes.sort_by(|a, b| {
            (a.resource_type.to_ascii_lowercase(), a.name.to_ascii_lowercase())
                .cmp(&(b.resource_type.to_ascii_lowercase(), b.name.to_ascii_lowercase()))
        });
        Self {
            nodes,
            document,
            scope,
        }
    }

    /// Build a derived graph sharing this graph's document and scope.
    #[must_use]
    pub fn with_nodes(&self, nodes: Vec<ResourceNode>) -> Self {
        Self::assemble(nodes, self.document.clone(), self.scope.clone())
    }

    /// Nodes in stable `(type, name)` order.
    #[must_use]
    pub fn nodes(&self) -> &[ResourceNode] {
        &self.nodes
    }

    /// Expression scope of the export (parameter defaults and variables).
    #[must_use]
    pub const fn scope(&self) -> &ExpressionScope {
        &self.scope
    }

    /// First node (in stable order) whose name contains `fragment`,
    /// compared case-insensitively.
    #[must_use]
    pub fn find_by_name_fragment(&self, fragment: &str) -> Option<&ResourceNode> {
        let fragment = fragment.to_ascii_lowercase();
        self.nodes.iter().find(|n| n.name.to_ascii_lowercase().contains(&fragment))
    }

    /// Node with exactly this key.
    #[must_use]
    pub fn get(&self, key: &ResourceKey) -> Option<&ResourceNode> {
        self.nodes.iter().find(|n| n.key() == *key)
    }

    /// Resolve a `dependsOn` entry to a node key.
    #[must_use]
    pub fn resolve_reference(&self, entry: &str) -> Option<ResourceKey> {
        self.scope.resolve_reference(entry)
    }

    /// Containment graph: an edge `parent -> child` for every child whose
    /// parent is present. Node weights are indices into [`Self::nodes`].
    #[must_use]
    pub fn containment_graph(&self) -> DiGraph<usize, ()> {
        let mut graph = DiGraph::new();
        let indices: Vec<NodeIndex> = (0..self.nodes.len()).map(|i| graph.add_node(i)).collect();
        let by_key: HashMap<ResourceKey, usize> =
            self.nodes.iter().enumerate().map(|(i, n)| (n.key(), i)).collect();

        for (i, node) in self.nodes.iter().enumerate() {
            if let Some(parent) = node.parent_key().and_then(|k| by_key.get(&k)) {
                graph.add_edge(indices[*parent], indices[i], ());
            }
        }
        graph
    }

    /// Indices of every descendant of the given nodes, the nodes included.
    #[must_use]
    pub fn with_descendants(&self, roots: &[usize]) -> HashSet<usize> {
        let graph = self.containment_graph();
        let mut reached = HashSet::new();
        for &root in roots {
            let mut dfs = Dfs::new(&graph, NodeIndex::new(root));
            while let Some(idx) = dfs.next(&graph) {
                reached.insert(graph[idx]);
            }
        }
        reached
    }

    /// Every `(node name, dependsOn entry)` pair whose entry resolves to a
    /// resource that is not in the graph. Unresolvable entries are ignored.
    #[must_use]
    pub fn dangling_dependencies(&self) -> Vec<(String, String)> {
        let present: HashSet<ResourceKey> = self.nodes.iter().map(ResourceNode::key).collect();
        let mut dangling = Vec::new();
        for node in &self.nodes {
            for entry in node.depends_on() {
                if let Some(key) = self.resolve_reference(entry) {
                    if !present.contains(&key) {
                        dangling.push((node.name.clone(), entry.to_string()));
                    }
                }
            }
        }
        dangling
    }

    /// Serialize back into an export document.
    #[must_use]
    pub fn to_export(&self) -> Value {
        let mut document = self.document.clone();
        if let Some(doc) = document.as_object_mut() {
            doc.insert(
                "resources".to_string(),
                Value::Array(self.nodes.iter().map(|n| n.raw.clone()).collect()),
            );
        }
        document
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn export() -> String {
        json!({
            "$schema": "https://schema.management.azure.com/schemas/2019-04-01/deploymentTemplate.json#",
            "parameters": {
                "virtualNetworks_vnet_dev_name": { "type": "String", "defaultValue": "vnet-dev" }
            },
            "resources": [
                {
                    "type": "Microsoft.Network/virtualNetworks/subnets",
                    "name": "[concat(parameters('virtualNetworks_vnet_dev_name'), '/subnetA')]",
                    "dependsOn": [
                        "[resourceId('Microsoft.Network/virtualNetworks', parameters('virtualNetworks_vnet_dev_name'))]"
                    ]
                },
                {
                    "type": "Microsoft.Network/virtualNetworks",
                    "name": "[parameters('virtualNetworks_vnet_dev_name')]",
                    "properties": { "subnets": [ { "name": "subnetA" } ] }
                },
                { "type": "Microsoft.Storage/storageAccounts", "name": "devstorage123" }
            ]
        })
        .to_string()
    }

    #[test]
    fn test_load_sorts_by_type_then_name() {
        let graph = ResourceGraph::load(&export()).unwrap();
        let names: Vec<&str> = graph.nodes().iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["vnet-dev", "vnet-dev/subnetA", "devstorage123"]);
    }

    #[test]
    fn test_load_rejects_bad_input() {
        assert!(matches!(ResourceGraph::load("not json"), Err(CloneError::ParseError { .. })));
        assert!(matches!(ResourceGraph::load("{}"), Err(CloneError::ParseError { .. })));
        assert!(matches!(
            ResourceGraph::load(r#"{"resources": []}"#),
            Err(CloneError::ParseError { .. })
        ));
    }

    #[test]
    fn test_nesting_depth() {
        assert_eq!(nesting_depth("Microsoft.Storage/storageAccounts"), 2);
        assert_eq!(nesting_depth("Microsoft.Network/virtualNetworks/subnets"), 3);
    }

    #[test]
    fn test_find_by_name_fragment_uses_stable_order() {
        let graph = ResourceGraph::load(&export()).unwrap();
        assert_eq!(graph.find_by_name_fragment("VNET").unwrap().name, "vnet-dev");
        assert_eq!(graph.find_by_name_fragment("subneta").unwrap().name, "vnet-dev/subnetA");
        assert!(graph.find_by_name_fragment("missing").is_none());
    }

    #[test]
    fn test_containment_and_descendants() {
        let graph = ResourceGraph::load(&export()).unwrap();
        assert_eq!(graph.containment_graph().edge_count(), 1);
        let reached = graph.with_descendants(&[0]);
        assert_eq!(reached, HashSet::from([0, 1]));
    }

    #[test]
    fn test_dangling_dependencies_after_removal() {
        let graph = ResourceGraph::load(&export()).unwrap();
        assert!(graph.dangling_dependencies().is_empty());

        let without_vnet = graph.with_nodes(graph.nodes()[1..].to_vec());
        let dangling = without_vnet.dangling_dependencies();
        assert_eq!(dangling.len(), 1);
        assert_eq!(dangling[0].0, "vnet-dev/subnetA");
    }

    #[test]
    fn test_to_export_round_trips_document() {
        let graph = ResourceGraph::load(&export()).unwrap();
        let doc = graph.to_export();
        assert!(doc.get("parameters").is_some());
        assert_eq!(doc["resources"].as_array().unwrap().len(), 3);
    }
}
