//! The two pipelines: re-targeting a clone, or restoring a backup in place.

use serde::Serialize;
use std::fmt;

/// Which pipeline is running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum RunMode {
    /// Redeploy into another environment: secrets are masked, environment
    /// tokens rewritten and globally unique names re-targeted.
    Clone {
        /// Environment the export was taken from
        source_env: String,
        /// Environment the artifacts deploy into
        target_env: String,
    },
    /// Disaster recovery into the same environment: values are preserved.
    Backup {
        /// Environment being backed up
        env: String,
    },
}

impl RunMode {
    /// Environment the export was taken from.
    #[must_use]
    pub fn source_env(&self) -> &str {
        match self {
            Self::Clone {
                source_env, ..
            } => source_env,
            Self::Backup {
                env,
            } => env,
        }
    }

    /// Environment the artifacts deploy into.
    #[must_use]
    pub fn target_env(&self) -> &str {
        match self {
            Self::Clone {
                target_env, ..
            } => target_env,
            Self::Backup {
                env,
            } => env,
        }
    }

    /// Whether values are re-targeted (clone) rather than preserved (backup).
    #[must_use]
    pub const fn is_clone(&self) -> bool {
        matches!(self, Self::Clone { .. })
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clone {
                source_env,
                target_env,
            } => write!(f, "clone {source_env} -> {target_env}"),
            Self::Backup {
                env,
            } => write!(f, "backup {env}"),
        }
    }
}
