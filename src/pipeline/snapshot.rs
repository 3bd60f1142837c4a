//! Directory-backed source environment.
//!
//! A snapshot holds what a live client would return, one directory per group:
//!
//! ```text
//! <snapshot>/
//! └── rg-app-dev/
//!     ├── resources.json        # [{ "type", "name", "kind"? }]
//!     ├── template.json         # raw structured export
//!     ├── workspace-id.txt      # optional
//!     └── settings/
//!         └── app-dev.json      # [{ "name", "value" }]
//! ```
//!
//! Snapshots make runs reproducible and let the pipeline be exercised without
//! network access.

use futures::FutureExt;
use futures::future::BoxFuture;
use std::path::{Path, PathBuf};

use super::collaborators::{DiscoveredResource, SourceEnvironment};
use crate::core::CloneError;
use crate::settings::RawSetting;

/// File listing the discovered resources of a group.
pub const RESOURCES_FILE: &str = "resources.json";
/// File holding the raw export of a group.
pub const EXPORT_FILE: &str = "template.json";
/// Optional file holding the workspace identifier.
pub const WORKSPACE_FILE: &str = "workspace-id.txt";
/// Directory of per-component settings listings.
pub const SETTINGS_DIR: &str = "settings";

/// [`SourceEnvironment`] over a snapshot directory.
#[derive(Debug, Clone)]
pub struct SnapshotSource {
    root: PathBuf,
}

impl SnapshotSource {
    /// Open a snapshot rooted at `root`. Nothing is read until a call is made.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
        }
    }

    /// Snapshot root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn group_dir(&self, group: &str) -> Result<PathBuf, CloneError> {
        let metadata = tokio::fs::metadata(&self.root).await.map_err(|e| CloneError::AccessError {
            group: group.to_string(),
            reason: format!("cannot read snapshot {}: {e}", self.root.display()),
        })?;
        if !metadata.is_dir() {
            return Err(CloneError::AccessError {
                group: group.to_string(),
                reason: format!("snapshot {} is not a directory", self.root.display()),
            });
        }

        let dir = self.root.join(group);
        if !dir.is_dir() {
            return Err(CloneError::DiscoveryError {
                group: group.to_string(),
                reason: format!("group not found in snapshot {}", self.root.display()),
            });
        }
        Ok(dir)
    }
}

impl SourceEnvironment for SnapshotSource {
    fn discover_resources<'a>(
        &'a self,
        group: &'a str,
    ) -> BoxFuture<'a, Result<Vec<DiscoveredResource>, CloneError>> {
        async move {
            let path = self.group_dir(group).await?.join(RESOURCES_FILE);
            let discovery_error = |reason: String| CloneError::DiscoveryError {
                group: group.to_string(),
                reason,
            };

            let content = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| discovery_error(format!("cannot read {}: {e}", path.display())))?;
            let resources: Vec<DiscoveredResource> = serde_json::from_str(&content)
                .map_err(|e| discovery_error(format!("invalid {}: {e}", path.display())))?;
            if resources.is_empty() {
                return Err(discovery_error("group contains no resources".to_string()));
            }

            tracing::debug!("Discovered {} resources in {group}", resources.len());
            Ok(resources)
        }
        .boxed()
    }

    fn export_raw_template<'a>(&'a self, group: &'a str) -> BoxFuture<'a, Result<String, CloneError>> {
        async move {
            let path = self.group_dir(group).await?.join(EXPORT_FILE);
            let export_error = |reason: String| CloneError::ExportError {
                group: group.to_string(),
                reason,
            };

            let content = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| export_error(format!("cannot read {}: {e}", path.display())))?;
            if content.trim().is_empty() {
                return Err(export_error(format!("{} is empty", path.display())));
            }
            Ok(content)
        }
        .boxed()
    }

    fn list_component_settings<'a>(
        &'a self,
        group: &'a str,
        component: &'a str,
    ) -> BoxFuture<'a, Result<Vec<RawSetting>, CloneError>> {
        async move {
            let path = self.group_dir(group).await?.join(SETTINGS_DIR).join(format!("{component}.json"));
            if !path.exists() {
                tracing::debug!("No settings listed for {component}");
                return Ok(Vec::new());
            }

            let content = tokio::fs::read_to_string(&path).await.map_err(|e| CloneError::AccessError {
                group: group.to_string(),
                reason: format!("cannot read {}: {e}", path.display()),
            })?;
            Ok(serde_json::from_str(&content)?)
        }
        .boxed()
    }

    fn lookup_workspace_id<'a>(&'a self, group: &'a str) -> BoxFuture<'a, Option<String>> {
        async move {
            let path = self.root.join(group).join(WORKSPACE_FILE);
            let id = tokio::fs::read_to_string(&path).await.ok()?;
            let id = id.trim();
            (!id.is_empty()).then(|| id.to_string())
        }
        .boxed()
    }
}
