//! The rgclone configuration file.
//!
//! Every table the pipeline is driven by has built-in defaults; the file only
//! needs to carry what differs. A missing default file is not an error.
//!
//! # Location
//!
//! - `--config <path>` when given (`~` is expanded)
//! - otherwise `~/.rgclone/config.toml` (`%LOCALAPPDATA%\rgclone\config.toml` on Windows)
//!
//! # Example
//!
//! ```toml
//! environment_parameter = "environmentName"
//! admin_login = "cloneadmin"
//! replace_builtin_rules = false
//!
//! [sentinels]
//! secret = "__SECRET_REQUIRES_MANUAL_CONFIGURATION__"
//!
//! [settings]
//! secret_patterns = ["(?i)signing_?cert"]
//! suppressed_keys = ["WEBSITE_CONTENTAZUREFILECONNECTIONSTRING"]
//!
//! [[exclusions]]
//! id = "no-dashboards"
//! type = "(?i)^microsoft\\.portal/dashboards$"
//!
//! [[strip]]
//! id = "no-tags-on-children"
//! min_depth = 3
//! remove = ["/tags"]
//!
//! [uniqueness."Microsoft.Storage/storageAccounts"]
//! force_unique = true
//! max_length = 24
//!
//! [decompiler]
//! program = "bicep"
//! args = ["decompile", "--stdout", "{input}"]
//! timeout_secs = 120
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

use crate::constants::{
    DEFAULT_ADMIN_LOGIN, DEFAULT_DECOMPILE_TIMEOUT, DEFAULT_ENVIRONMENT_PARAMETER,
    DEFAULT_MANUAL_REVIEW_SENTINEL, DEFAULT_SECRET_SENTINEL, DEFAULT_WORKSPACE_SENTINEL,
};
use crate::core::{CloneError, RunMode};
use crate::parameters::{SynthesisOptions, UniquenessPolicy, UniquenessTable};
use crate::pipeline::PipelineOptions;
use crate::pipeline::decompiler::{
    CommandDecompiler, DEFAULT_DECOMPILER_PROGRAM, default_decompiler_args,
};
use crate::rules::{ExclusionRuleSpec, RuleSet, StripRuleSpec};
use crate::settings::{
    SettingsPolicy, default_package_patterns, default_secret_patterns, default_suppressed_keys,
};

/// Sentinel values written where an operator must fill something in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SentinelConfig {
    /// Emitted in place of secret setting values when cloning
    pub secret: String,
    /// Assigned to parameters no resource matches
    pub manual_review: String,
    /// Assigned to workspace parameters when the lookup returns nothing
    pub workspace: String,
}

impl Default for SentinelConfig {
    fn default() -> Self {
        Self {
            secret: DEFAULT_SECRET_SENTINEL.to_string(),
            manual_review: DEFAULT_MANUAL_REVIEW_SENTINEL.to_string(),
            workspace: DEFAULT_WORKSPACE_SENTINEL.to_string(),
        }
    }
}

/// Extra settings classification patterns. Appended to the built-in lists
/// unless `replace_builtin_rules` is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SettingsConfig {
    /// Regexes over setting keys that hold secrets
    pub secret_patterns: Vec<String>,
    /// Regexes over setting keys that hold package locations
    pub package_patterns: Vec<String>,
    /// Platform-managed keys that are never emitted
    pub suppressed_keys: Vec<String>,
}

/// External decompiler command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DecompilerConfig {
    /// Program name or path
    pub program: String,
    /// Arguments; `{input}` is replaced by the export file path
    pub args: Vec<String>,
    /// Timeout in seconds; 0 disables it
    pub timeout_secs: u64,
}

impl Default for DecompilerConfig {
    fn default() -> Self {
        Self {
            program: DEFAULT_DECOMPILER_PROGRAM.to_string(),
            args: default_decompiler_args(),
            timeout_secs: DEFAULT_DECOMPILE_TIMEOUT.as_secs(),
        }
    }
}

/// Contents of the configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RgcloneConfig {
    /// Template parameter carrying the target environment
    pub environment_parameter: String,
    /// Literal for administrative principal parameters
    pub admin_login: String,
    /// Use only the configured rules and patterns, not the built-in ones
    pub replace_builtin_rules: bool,
    pub sentinels: SentinelConfig,
    pub settings: SettingsConfig,
    pub exclusions: Vec<ExclusionRuleSpec>,
    #[serde(rename = "strip")]
    pub strips: Vec<StripRuleSpec>,
    /// Per-type naming policies, merged over the built-in table
    pub uniqueness: BTreeMap<String, UniquenessPolicy>,
    pub decompiler: DecompilerConfig,
}

impl Default for RgcloneConfig {
    fn default() -> Self {
        Self {
            environment_parameter: DEFAULT_ENVIRONMENT_PARAMETER.to_string(),
            admin_login: DEFAULT_ADMIN_LOGIN.to_string(),
            replace_builtin_rules: false,
            sentinels: SentinelConfig::default(),
            settings: SettingsConfig::default(),
            exclusions: Vec::new(),
            strips: Vec::new(),
            uniqueness: BTreeMap::new(),
            decompiler: DecompilerConfig::default(),
        }
    }
}

impl RgcloneConfig {
    /// Default location of the configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = if cfg!(target_os = "windows") {
            dirs::data_local_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine local data directory"))?
                .join("rgclone")
        } else {
            dirs::home_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?
                .join(".rgclone")
        };
        Ok(config_dir.join("config.toml"))
    }

    /// Load from an explicit path, or from the default location.
    ///
    /// An explicit path must exist; a missing default file yields the
    /// built-in configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid TOML, or
    /// fails [`RgcloneConfig::validate`].
    pub async fn load_with_optional(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            let expanded = PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned());
            return Self::load_from(&expanded).await;
        }

        let path = Self::default_path()?;
        if path.exists() {
            Self::load_from(&path).await
        } else {
            tracing::debug!("No config file at {}, using built-in defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Load and validate a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid TOML, or
    /// fails [`RgcloneConfig::validate`].
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;
        config.validate()?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Compile every pattern and check the remaining values.
    ///
    /// # Errors
    ///
    /// Returns [`CloneError::ConfigError`] describing the first problem found.
    pub fn validate(&self) -> Result<(), CloneError> {
        if self.environment_parameter.is_empty()
            || !self.environment_parameter.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(CloneError::ConfigError {
                message: format!(
                    "environment_parameter '{}' is not a valid identifier",
                    self.environment_parameter
                ),
            });
        }
        if let Some((resource_type, _)) = self.uniqueness.iter().find(|(_, p)| p.max_length == 0) {
            return Err(CloneError::ConfigError {
                message: format!("uniqueness max_length for '{resource_type}' must be positive"),
            });
        }
        if self.decompiler.program.trim().is_empty() {
            return Err(CloneError::ConfigError {
                message: "decompiler program must not be empty".to_string(),
            });
        }
        self.rule_set()?;
        self.settings_policy()?;
        Ok(())
    }

    /// Effective exclusion and strip tables.
    ///
    /// # Errors
    ///
    /// Returns [`CloneError::ConfigError`] if a rule pattern is invalid.
    pub fn rule_set(&self) -> Result<RuleSet, CloneError> {
        RuleSet::build(&self.exclusions, &self.strips, self.replace_builtin_rules)
    }

    fn with_builtin(&self, builtin: Vec<String>, configured: &[String]) -> Vec<String> {
        let mut patterns = if self.replace_builtin_rules { Vec::new() } else { builtin };
        patterns.extend_from_slice(configured);
        patterns
    }

    /// Effective settings classification.
    ///
    /// # Errors
    ///
    /// Returns [`CloneError::ConfigError`] if a pattern is invalid.
    pub fn settings_policy(&self) -> Result<SettingsPolicy, CloneError> {
        SettingsPolicy::new(
            &self.with_builtin(default_secret_patterns(), &self.settings.secret_patterns),
            &self.with_builtin(default_package_patterns(), &self.settings.package_patterns),
            &self.with_builtin(default_suppressed_keys(), &self.settings.suppressed_keys),
            self.sentinels.secret.clone(),
            self.environment_parameter.clone(),
        )
    }

    /// Effective uniqueness table: configured entries override built-in ones.
    #[must_use]
    pub fn uniqueness_table(&self) -> UniquenessTable {
        let mut table =
            if self.replace_builtin_rules { UniquenessTable::empty() } else { UniquenessTable::default() };
        for (resource_type, policy) in &self.uniqueness {
            table.insert(resource_type, *policy);
        }
        table
    }

    /// Parameter synthesis options.
    #[must_use]
    pub fn synthesis_options(&self) -> SynthesisOptions {
        SynthesisOptions {
            uniqueness: self.uniqueness_table(),
            environment_parameter: self.environment_parameter.clone(),
            admin_login: self.admin_login.clone(),
            manual_review_sentinel: self.sentinels.manual_review.clone(),
            workspace_sentinel: self.sentinels.workspace.clone(),
            workspace_id: None,
        }
    }

    /// The configured external decompiler.
    #[must_use]
    pub fn decompiler(&self) -> CommandDecompiler {
        let timeout = (self.decompiler.timeout_secs > 0)
            .then(|| Duration::from_secs(self.decompiler.timeout_secs));
        CommandDecompiler::new(shellexpand::tilde(&self.decompiler.program).into_owned())
            .args(self.decompiler.args.iter().cloned())
            .with_timeout(timeout)
    }

    /// Options for one pipeline run.
    ///
    /// # Errors
    ///
    /// Returns [`CloneError::ConfigError`] if a rule or pattern is invalid.
    pub fn pipeline_options(&self, group: &str, mode: RunMode) -> Result<PipelineOptions, CloneError> {
        Ok(PipelineOptions {
            group: group.to_string(),
            mode,
            rules: self.rule_set()?,
            settings: self.settings_policy()?,
            synthesis: self.synthesis_options(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_empty_file_is_default() {
        let config: RgcloneConfig = toml::from_str("").unwrap();
        assert_eq!(config, RgcloneConfig::default());
        assert_eq!(config.decompiler.args, vec!["decompile", "--stdout", "{input}"]);
    }

    #[test]
    fn test_full_file_parses() {
        let config: RgcloneConfig = toml::from_str(
            r#"
environment_parameter = "envName"
replace_builtin_rules = false

[sentinels]
secret = "<secret>"

[settings]
secret_patterns = ["(?i)signing_?cert"]

[[exclusions]]
id = "no-dashboards"
type = "(?i)^microsoft\\.portal/dashboards$"

[[strip]]
id = "no-tags"
min_depth = 3
remove = ["/tags"]
when = { path = "/kind", equals = "app" }

[uniqueness."Microsoft.Storage/storageAccounts"]
force_unique = false
max_length = 20

[decompiler]
program = "az"
args = ["bicep", "decompile", "--file", "{input}", "--stdout"]
timeout_secs = 0
"#,
        )
        .unwrap();

        assert_eq!(config.sentinels.secret, "<secret>");
        assert_eq!(config.sentinels.manual_review, DEFAULT_MANUAL_REVIEW_SENTINEL);
        assert_eq!(config.exclusions[0].id, "no-dashboards");
        assert_eq!(config.strips[0].min_depth, Some(3));
        config.validate().unwrap();

        let rules = config.rule_set().unwrap();
        assert!(rules.exclusions.iter().any(|r| r.id() == "no-dashboards"));
        assert!(rules.exclusions.iter().any(|r| r.id() == "vault-secret-values"));

        let table = config.uniqueness_table();
        assert_eq!(table.get("Microsoft.Storage/storageAccounts").unwrap().max_length, 20);
        assert_eq!(table.get("Microsoft.KeyVault/vaults").unwrap().max_length, 24);

        let options = config.pipeline_options("rg", RunMode::Backup { env: "dev".into() }).unwrap();
        assert_eq!(options.synthesis.environment_parameter, "envName");
        assert_eq!(options.settings.placeholder(), "${envName}");
        assert_eq!(config.decompiler().program(), "az");
    }

    #[test]
    fn test_replace_builtin_rules() {
        let config = RgcloneConfig {
            replace_builtin_rules: true,
            ..RgcloneConfig::default()
        };
        let rules = config.rule_set().unwrap();
        assert!(rules.exclusions.is_empty());
        assert!(rules.strips.is_empty());
        assert!(config.uniqueness_table().get("Microsoft.Storage/storageAccounts").is_none());
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        let config = RgcloneConfig {
            settings: SettingsConfig {
                secret_patterns: vec!["(unclosed".to_string()],
                ..SettingsConfig::default()
            },
            ..RgcloneConfig::default()
        };
        assert!(matches!(config.validate(), Err(CloneError::ConfigError { .. })));
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        assert!(toml::from_str::<RgcloneConfig>("unknown_key = 1").is_err());
    }

    #[test]
    fn test_invalid_environment_parameter() {
        let config = RgcloneConfig {
            environment_parameter: "env-name".to_string(),
            ..RgcloneConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_load_from_validates_rules() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "[[exclusions]]\nid = \"bad\"\ntype = \"[\"\n").unwrap();
        let err = RgcloneConfig::load_from(&path).await.unwrap_err();
        assert!(err.downcast_ref::<CloneError>().is_some());
    }

    #[tokio::test]
    async fn test_explicit_missing_path_is_error() {
        let temp = TempDir::new().unwrap();
        assert!(RgcloneConfig::load_with_optional(Some(&temp.path().join("missing.toml"))).await.is_err());
    }
}
