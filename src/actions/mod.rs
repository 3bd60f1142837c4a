//! Manual-action manifest.
//!
//! Recoverable conditions are accumulated here instead of being raised, so a
//! single ambiguous parameter never blocks a run. Every collection is kept in
//! a deterministic order so the serialized manifest is byte-identical across
//! repeated runs on unchanged input.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::rules::ExcludedResource;
use crate::settings::{ConfigSetting, SettingClass};

/// What could not be bound confidently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AmbiguityKind {
    /// A parameter that matched no resource
    Parameter,
    /// A settings block without a unique site configuration declaration
    Settings,
    /// A reference to a removed declaration that could not be rewritten
    Reference,
}

/// A recoverable binding failure (`MatchAmbiguity`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ambiguity {
    /// What kind of binding failed
    pub kind: AmbiguityKind,
    /// Parameter, component or identifier concerned
    pub subject: String,
    /// Operator-facing explanation
    pub detail: String,
    /// Closest known resource name, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl Ambiguity {
    /// Create an ambiguity record.
    pub fn new(kind: AmbiguityKind, subject: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind,
            subject: subject.into(),
            detail: detail.into(),
            suggestion: None,
        }
    }

    /// Attach a suggestion.
    #[must_use]
    pub fn with_suggestion(mut self, suggestion: Option<String>) -> Self {
        self.suggestion = suggestion;
        self
    }
}

/// Two parameters of one category that resolved to the same value
/// (`CollisionError`). Always auto-resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Collision {
    /// Category prefix shared by the colliding parameters
    pub category: String,
    /// Value both parameters resolved to
    pub value: String,
    /// Parameter that kept the value
    pub kept: String,
    /// Parameter that was renamed
    pub renamed: String,
    /// New value of the renamed parameter
    pub renamed_to: String,
}

/// A deployable artifact the operator must upload after deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageAction {
    /// Setting key
    pub key: String,
    /// Artifact location in the source environment
    pub location: String,
}

/// Everything an operator must still do by hand.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ManualActions {
    /// Secret setting keys per component
    pub secrets: BTreeMap<String, Vec<String>>,
    /// Package locations per component
    pub packages: BTreeMap<String, Vec<PackageAction>>,
    /// Bindings that fell back to a sentinel or were left untouched
    pub ambiguities: Vec<Ambiguity>,
    /// Auto-resolved value collisions
    pub collisions: Vec<Collision>,
    /// Resources dropped from the export
    pub excluded: Vec<ExcludedResource>,
}

impl ManualActions {
    /// Record the secrets and packages among a component's settings.
    ///
    /// Suppressed keys are platform-managed and never listed.
    pub fn record_settings(&mut self, settings: &[ConfigSetting]) {
        for setting in settings.iter().filter(|s| !s.suppressed) {
            match setting.class {
                SettingClass::Secret => {
                    self.secrets.entry(setting.owner.clone()).or_default().push(setting.key.clone());
                }
                SettingClass::PackageReference => {
                    self.packages.entry(setting.owner.clone()).or_default().push(PackageAction {
                        key: setting.key.clone(),
                        location: setting.original.clone(),
                    });
                }
                SettingClass::EnvironmentToken | SettingClass::Passthrough => {}
            }
        }
    }

    /// Record ambiguities, logging each one.
    pub fn record_ambiguities(&mut self, ambiguities: impl IntoIterator<Item = Ambiguity>) {
        for ambiguity in ambiguities {
            tracing::warn!("Needs manual review: {} ({})", ambiguity.subject, ambiguity.detail);
            self.ambiguities.push(ambiguity);
        }
    }

    /// Number of secret keys across all components.
    #[must_use]
    pub fn secret_count(&self) -> usize {
        self.secrets.values().map(Vec::len).sum()
    }

    /// Number of package locations across all components.
    #[must_use]
    pub fn package_count(&self) -> usize {
        self.packages.values().map(Vec::len).sum()
    }

    /// Whether the operator has nothing to do.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
            && self.packages.is_empty()
            && self.ambiguities.is_empty()
            && self.collisions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::RunMode;
    use crate::settings::{RawSetting, SettingsPolicy, extract};

    #[test]
    fn test_record_settings_groups_by_component() {
        let mode = RunMode::Clone {
            source_env: "dev".into(),
            target_env: "sit".into(),
        };
        let raw = vec![
            RawSetting::new("Primary_ConnectionString", "a"),
            RawSetting::new("Secondary_ConnectionString", "b"),
            RawSetting::new("WEBSITE_RUN_FROM_PACKAGE", "https://st/pkg.zip"),
            RawSetting::new("PLAIN", "x"),
        ];
        let settings = extract("app-dev", &raw, &SettingsPolicy::default(), &mode);

        let mut actions = ManualActions::default();
        actions.record_settings(&settings);
        assert_eq!(
            actions.secrets.get("app-dev").unwrap(),
            &vec!["Primary_ConnectionString".to_string(), "Secondary_ConnectionString".to_string()]
        );
        assert_eq!(actions.packages["app-dev"][0].location, "https://st/pkg.zip");
        assert_eq!(actions.secret_count(), 2);
        assert_eq!(actions.package_count(), 1);
    }

    #[test]
    fn test_serialized_shape() {
        let mut actions = ManualActions::default();
        actions.record_ambiguities([Ambiguity::new(AmbiguityKind::Parameter, "p", "no match")
            .with_suggestion(Some("app-dev".to_string()))]);
        let json = serde_json::to_value(&actions).unwrap();
        assert_eq!(json["ambiguities"][0]["kind"], "parameter");
        assert_eq!(json["ambiguities"][0]["suggestion"], "app-dev");
        assert!(json["secrets"].as_object().unwrap().is_empty());
        assert!(!actions.is_empty());
    }
}
