//! Seams to the systems the pipeline does not own.
//!
//! Live discovery, export, settings listing and decompilation all happen
//! outside this crate. The pipeline only sees these traits, so a run can be
//! driven by a live client, by an on-disk snapshot ([`super::SnapshotSource`])
//! or by an in-memory double in tests. Every call is awaited to completion;
//! retry and timeout policy belong to the implementation.

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::core::CloneError;
use crate::settings::RawSetting;

/// A resource reported by live discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredResource {
    /// Fully qualified resource type
    #[serde(rename = "type")]
    pub resource_type: String,
    /// Resource name
    pub name: String,
    /// Optional kind discriminator (`functionapp`, `app,linux`, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// The environment a group is cloned from.
pub trait SourceEnvironment: Send + Sync {
    /// List the resources of a group.
    ///
    /// An empty or missing group is a [`CloneError::DiscoveryError`].
    fn discover_resources<'a>(
        &'a self,
        group: &'a str,
    ) -> BoxFuture<'a, Result<Vec<DiscoveredResource>, CloneError>>;

    /// Produce the raw structured export of a group.
    fn export_raw_template<'a>(&'a self, group: &'a str) -> BoxFuture<'a, Result<String, CloneError>>;

    /// List the configuration settings of an app/function host.
    fn list_component_settings<'a>(
        &'a self,
        group: &'a str,
        component: &'a str,
    ) -> BoxFuture<'a, Result<Vec<RawSetting>, CloneError>>;

    /// Identifier of the group's log workspace, if one can be found.
    fn lookup_workspace_id<'a>(&'a self, group: &'a str) -> BoxFuture<'a, Option<String>>;
}

/// Turns a cleaned structured export into editable template text.
pub trait Decompiler: Send + Sync {
    /// Decompile `cleaned_export` (JSON text).
    ///
    /// Any failure is a [`CloneError::DecompileError`].
    fn decompile<'a>(&'a self, cleaned_export: &'a str) -> BoxFuture<'a, Result<String, CloneError>>;
}
