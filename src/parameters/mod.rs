//! Parameter synthesis and the deployment parameter file.
//!
//! Every parameter left in the template after pruning gets exactly one
//! resolved value. [`synthesizer`] derives the values from the resource
//! graph; [`duplicates`] then re-targets values that would collide at
//! deployment time.

pub mod duplicates;
pub mod synthesizer;

pub use duplicates::resolve_duplicates;
pub use synthesizer::{Synthesis, SynthesisOptions, synthesize};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;

use crate::constants::{PARAMETERS_CONTENT_VERSION, PARAMETERS_SCHEMA};

/// Naming constraints of one resource category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniquenessPolicy {
    /// Names must be unique across the whole platform, not just the group
    #[serde(default)]
    pub force_unique: bool,
    /// Maximum name length
    pub max_length: usize,
}

/// Uniqueness policies keyed by resource type (case-insensitive).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct UniquenessTable {
    policies: BTreeMap<String, UniquenessPolicy>,
}

impl UniquenessTable {
    /// An empty table.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            policies: BTreeMap::new(),
        }
    }

    /// Policy of a resource type.
    #[must_use]
    pub fn get(&self, resource_type: &str) -> Option<UniquenessPolicy> {
        self.policies
            .iter()
            .find(|(t, _)| t.eq_ignore_ascii_case(resource_type))
            .map(|(_, p)| *p)
    }

    /// Insert or replace the policy of a resource type.
    pub fn insert(&mut self, resource_type: &str, policy: UniquenessPolicy) {
        self.policies.retain(|t, _| !t.eq_ignore_ascii_case(resource_type));
        self.policies.insert(resource_type.to_string(), policy);
    }

    /// Policies in type order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &UniquenessPolicy)> {
        self.policies.iter()
    }
}

impl Default for UniquenessTable {
    fn default() -> Self {
        let unique = |max_length| UniquenessPolicy {
            force_unique: true,
            max_length,
        };
        let mut table = Self::empty();
        for (resource_type, policy) in [
            ("Microsoft.Storage/storageAccounts", unique(24)),
            ("Microsoft.KeyVault/vaults", unique(24)),
            ("Microsoft.Web/sites", unique(60)),
            ("Microsoft.DocumentDB/databaseAccounts", unique(44)),
            ("Microsoft.ApiManagement/service", unique(50)),
            ("Microsoft.ContainerRegistry/registries", unique(50)),
            ("Microsoft.Cache/Redis", unique(63)),
            ("Microsoft.ServiceBus/namespaces", unique(50)),
            ("Microsoft.EventHub/namespaces", unique(50)),
            ("Microsoft.Sql/servers", unique(63)),
            ("Microsoft.Search/searchServices", unique(60)),
            ("Microsoft.SignalRService/SignalR", unique(63)),
            (
                "Microsoft.Web/serverfarms",
                UniquenessPolicy {
                    force_unique: false,
                    max_length: 40,
                },
            ),
        ] {
            table.insert(resource_type, policy);
        }
        table
    }
}

/// How a parameter value was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Derived from a resource name
    Matched {
        /// Type of the matched resource
        resource_type: String,
        /// Name of the matched resource in the export
        resource_name: String,
    },
    /// Live workspace lookup
    Workspace,
    /// Fixed administrative literal
    AdminLogin,
    /// Sentinel placed for an operator to fill in
    Sentinel,
}

/// One parameter with its resolved value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedParameter {
    /// Parameter name
    pub name: String,
    /// Declared type
    pub declared_type: String,
    /// Resolved value
    pub value: String,
    /// How the value was obtained
    pub resolution: Resolution,
    /// Naming policy of the matched resource's category
    pub policy: Option<UniquenessPolicy>,
}

impl ResolvedParameter {
    /// Category prefix: the part of the name before its first `_`.
    #[must_use]
    pub fn category(&self) -> &str {
        self.name.split('_').next().unwrap_or(&self.name)
    }

    /// The value as the declared type expects it in the parameter file.
    /// `None` when the resolved text is not a value of that type.
    #[must_use]
    pub fn typed_value(&self) -> Option<Value> {
        match self.declared_type.to_ascii_lowercase().as_str() {
            "int" => self.value.trim().parse::<i64>().ok().map(Value::from),
            "bool" => self.value.trim().parse::<bool>().ok().map(Value::Bool),
            "object" | "secureobject" => {
                serde_json::from_str::<Value>(&self.value).ok().filter(Value::is_object)
            }
            "array" => serde_json::from_str::<Value>(&self.value).ok().filter(Value::is_array),
            _ => Some(Value::String(self.value.clone())),
        }
    }
}

/// Resolved values for every template parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterSet {
    /// Name of the environment parameter
    pub environment_parameter: String,
    /// Value bound to the environment parameter
    pub environment_value: String,
    /// Other parameters in declaration order
    pub parameters: Vec<ResolvedParameter>,
}

impl ParameterSet {
    /// Look up a parameter by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ResolvedParameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Render the deployment parameter file.
    #[must_use]
    pub fn to_parameter_file(&self) -> Value {
        let mut parameters = Map::new();
        for parameter in &self.parameters {
            let value =
                parameter.typed_value().unwrap_or_else(|| Value::String(parameter.value.clone()));
            parameters.insert(parameter.name.clone(), json!({ "value": value }));
        }
        parameters.insert(
            self.environment_parameter.clone(),
            json!({ "value": self.environment_value }),
        );

        json!({
            "$schema": PARAMETERS_SCHEMA,
            "contentVersion": PARAMETERS_CONTENT_VERSION,
            "parameters": parameters,
        })
    }
}
