//! rgclone - resource-group template cloning
//!
//! rgclone turns the raw template export of a cloud resource group into
//! artifacts that redeploy cleanly: a sanitized, parameterized template, a
//! parameter file for the target environment, and a manifest of everything
//! that still needs a human.
//!
//! # Pipeline
//!
//! ```text
//! discover -> export -> graph -> exclude -> strip -> settings
//!          -> decompile -> sanitize -> inject -> prune -> synthesize -> dedupe
//! ```
//!
//! Two stages talk to the outside world and sit behind traits in
//! [`pipeline::collaborators`]: resource discovery/export (a snapshot
//! directory in the shipped binary) and the JSON-to-DSL decompiler (an
//! external command). Everything else is a pure transformation.
//!
//! # Core Modules
//!
//! - [`graph`] - Resource graph built from the export, with name resolution
//! - [`rules`] - Data-driven exclusion and read-only property stripping
//! - [`settings`] - App configuration extraction and classification
//! - [`template`] - Line-oriented scanner, sanitizer, injector and pruner
//! - [`parameters`] - Parameter synthesis and duplicate resolution
//! - [`actions`] - Manual action manifest
//! - [`pipeline`] - Orchestration and external collaborators
//!
//! # Supporting Modules
//!
//! - [`cli`] - `clone`, `backup` and `rules` commands
//! - [`config`] - `~/.rgclone/config.toml`
//! - [`core`] - Error types, run modes and environment token handling
//! - [`constants`] - Sentinels, schema URLs and limits
//! - [`utils`] - Atomic writes and progress display
//!
//! # Example
//!
//! ```bash
//! # Clone the dev group into sit
//! rgclone clone --group rg-app-dev --source-env dev --target-env sit --snapshot ./snapshot
//!
//! # Disaster-recovery capture of prod
//! rgclone backup --group rg-app-prod --env prod --snapshot ./snapshot
//!
//! # Show the rule tables in effect
//! rgclone rules --format json
//! ```

pub mod actions;
pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod graph;
pub mod parameters;
pub mod pipeline;
pub mod rules;
pub mod settings;
pub mod template;
pub mod utils;

// test_utils module is available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
