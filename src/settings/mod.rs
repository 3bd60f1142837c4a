//! Settings extractor: classifies a component's configuration key/value pairs.
//!
//! Classification is by key name and runs in a fixed priority:
//!
//! 1. [`SettingClass::Secret`] if any secret pattern matches the key
//! 2. [`SettingClass::PackageReference`] if any package pattern matches
//! 3. [`SettingClass::EnvironmentToken`] if the value contains the source
//!    environment as a whole token
//! 4. [`SettingClass::Passthrough`] otherwise
//!
//! A secret whose value also contains the environment name stays a secret;
//! the token rewrite never runs on it. On the clone path secret values are
//! replaced with the secret sentinel; on the backup path they are preserved.

use regex::RegexSet;
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_ENVIRONMENT_PARAMETER, DEFAULT_SECRET_SENTINEL};
use crate::core::env_token::{contains_env_token, replace_env_token};
use crate::core::{CloneError, RunMode};

/// One `{name, value}` entry as listed by the source environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSetting {
    /// Setting key
    pub name: String,
    /// Setting value; `null` is read as empty
    #[serde(default)]
    pub value: Option<String>,
}

impl RawSetting {
    /// Create a setting entry.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
        }
    }
}

/// Classification of a configuration setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SettingClass {
    /// Masked on the clone path and recorded for manual configuration
    Secret,
    /// Points at a deployable artifact the operator must upload
    PackageReference,
    /// Contains the source environment name, rewritten to a placeholder
    EnvironmentToken,
    /// Copied verbatim
    Passthrough,
}

/// A classified setting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSetting {
    /// Component the setting belongs to
    pub owner: String,
    /// Setting key
    pub key: String,
    /// Value as listed by the source environment
    pub original: String,
    /// Value to emit. For [`SettingClass::EnvironmentToken`] it contains
    /// `${<environment parameter>}` placeholders.
    pub value: String,
    /// Classification
    pub class: SettingClass,
    /// Platform-managed key: classified, but never emitted
    pub suppressed: bool,
}

/// Key patterns and sentinels driving classification.
#[derive(Debug, Clone)]
pub struct SettingsPolicy {
    secret_patterns: RegexSet,
    package_patterns: RegexSet,
    suppressed_keys: Vec<String>,
    secret_sentinel: String,
    environment_parameter: String,
}

impl SettingsPolicy {
    /// Compile a policy.
    ///
    /// # Errors
    ///
    /// Returns [`CloneError::ConfigError`] if any pattern is not a valid regex.
    pub fn new(
        secret_patterns: &[String],
        package_patterns: &[String],
        suppressed_keys: &[String],
        secret_sentinel: impl Into<String>,
        environment_parameter: impl Into<String>,
    ) -> Result<Self, CloneError> {
        let compile = |kind: &str, patterns: &[String]| {
            RegexSet::new(patterns).map_err(|e| CloneError::ConfigError {
                message: format!("invalid {kind} pattern: {e}"),
            })
        };
        Ok(Self {
            secret_patterns: compile("secret", secret_patterns)?,
            package_patterns: compile("package", package_patterns)?,
            suppressed_keys: suppressed_keys.to_vec(),
            secret_sentinel: secret_sentinel.into(),
            environment_parameter: environment_parameter.into(),
        })
    }

    /// The `${param}` placeholder environment tokens are rewritten to.
    #[must_use]
    pub fn placeholder(&self) -> String {
        format!("${{{}}}", self.environment_parameter)
    }

    /// Name of the environment parameter.
    #[must_use]
    pub fn environment_parameter(&self) -> &str {
        &self.environment_parameter
    }

    fn classify(&self, key: &str, value: &str, source_env: &str) -> SettingClass {
        if self.secret_patterns.is_match(key) {
            SettingClass::Secret
        } else if self.package_patterns.is_match(key) {
            SettingClass::PackageReference
        } else if contains_env_token(value, source_env) {
            SettingClass::EnvironmentToken
        } else {
            SettingClass::Passthrough
        }
    }

    fn is_suppressed(&self, key: &str) -> bool {
        self.suppressed_keys.iter().any(|k| k.eq_ignore_ascii_case(key))
    }
}

impl Default for SettingsPolicy {
    fn default() -> Self {
        // Built-in patterns are known to compile.
        Self {
            secret_patterns: RegexSet::new(default_secret_patterns())
                .unwrap_or_else(|_| RegexSet::empty()),
            package_patterns: RegexSet::new(default_package_patterns())
                .unwrap_or_else(|_| RegexSet::empty()),
            suppressed_keys: default_suppressed_keys(),
            secret_sentinel: DEFAULT_SECRET_SENTINEL.to_string(),
            environment_parameter: DEFAULT_ENVIRONMENT_PARAMETER.to_string(),
        }
    }
}

/// Built-in secret key patterns.
#[must_use]
pub fn default_secret_patterns() -> Vec<String> {
    [
        r"(?i)password",
        r"(?i)passwd",
        r"(?i)pwd",
        r"(?i)secret",
        r"(?i)connection_?string",
        r"(?i)connstr",
        r"(?i)api_?key",
        r"(?i)access_?key",
        r"(?i)instrumentation_?key",
        r"(?i)token",
        r"(?i)credential",
        r"(?i)(^|_)sas(_|$)",
        r"(?i)(^|_)key$",
    ]
    .iter()
    .map(|s| (*s).to_string())
    .collect()
}

/// Built-in package-location key patterns.
#[must_use]
pub fn default_package_patterns() -> Vec<String> {
    [r"(?i)^website_run_from_(package|zip)$", r"(?i)package_?ur[il]$"]
        .iter()
        .map(|s| (*s).to_string())
        .collect()
}

/// Built-in platform-managed keys.
#[must_use]
pub fn default_suppressed_keys() -> Vec<String> {
    vec!["WEBSITE_CONTENTSHARE".to_string()]
}

/// Classify one component's settings.
///
/// Output order follows input order.
#[must_use]
pub fn extract(
    component: &str,
    raw: &[RawSetting],
    policy: &SettingsPolicy,
    mode: &RunMode,
) -> Vec<ConfigSetting> {
    raw.iter()
        .map(|setting| {
            let original = setting.value.clone().unwrap_or_default();
            let class = policy.classify(&setting.name, &original, mode.source_env());
            let value = match class {
                SettingClass::Secret if mode.is_clone() => policy.secret_sentinel.clone(),
                SettingClass::EnvironmentToken if mode.is_clone() => {
                    replace_env_token(&original, mode.source_env(), &policy.placeholder())
                }
                _ => original.clone(),
            };
            let suppressed = policy.is_suppressed(&setting.name);
            if suppressed {
                tracing::debug!("Suppressing platform-managed setting {component}/{}", setting.name);
            }
            ConfigSetting {
                owner: component.to_string(),
                key: setting.name.clone(),
                original,
                value,
                class,
                suppressed,
            }
        })
        .collect()
}
