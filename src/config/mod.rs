//! Configuration for rgclone.
//!
//! A single optional TOML file tunes the data-driven parts of the pipeline:
//! rule tables, settings patterns, sentinels, uniqueness policies and the
//! external decompiler. See [`global`] for the file format.
//!
//! ```rust,no_run
//! use rgclone::config::RgcloneConfig;
//! use rgclone::core::RunMode;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = RgcloneConfig::load_with_optional(None).await?;
//! let options = config.pipeline_options(
//!     "rg-app-dev",
//!     RunMode::Clone { source_env: "dev".into(), target_env: "sit".into() },
//! )?;
//! # Ok(())
//! # }
//! ```

pub mod global;

pub use global::{DecompilerConfig, RgcloneConfig, SentinelConfig, SettingsConfig};
