//! Command-line interface for rgclone.
//!
//! The CLI is a thin layer over [`crate::pipeline`]: it loads the
//! configuration, wires a snapshot source and a decompiler, runs the
//! pipeline and writes the artifacts.
//!
//! # Commands
//!
//! - `clone` - Re-target a group to another environment
//! - `backup` - Capture a group for redeployment into the same environment
//! - `rules` - Print the effective rule tables
//!
//! # Global Options
//!
//! - `--verbose` / `-v` - Debug logging
//! - `--quiet` / `-q` - Errors only
//! - `--config` / `-c` - Configuration file path
//! - `--no-progress` - Disable the spinner
//!
//! Logs go to stderr; `RUST_LOG` overrides the level chosen by the flags.

mod rules;
mod run;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::config::RgcloneConfig;

/// Runtime settings derived from the global flags.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// Log level used when `RUST_LOG` is not set
    pub log_level: String,
    /// Disable the spinner
    pub no_progress: bool,
    /// Configuration file path
    pub config_path: Option<PathBuf>,
}

impl CliConfig {
    /// Initialize the global tracing subscriber. Later calls are no-ops.
    pub fn init_logging(&self) {
        let filter = if std::env::var_os("RUST_LOG").is_some() {
            EnvFilter::from_default_env()
        } else {
            EnvFilter::new(&self.log_level)
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    }

    /// Load the configuration file this run uses.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is unreadable or invalid.
    pub async fn load_config(&self) -> Result<RgcloneConfig> {
        RgcloneConfig::load_with_optional(self.config_path.as_deref()).await
    }
}

#[derive(Parser)]
#[command(
    name = "rgclone",
    about = "Sanitize and re-parameterize exported resource-group templates",
    version,
    long_about = "rgclone turns the template export of a resource group into a cleaned, \
                  parameterized template, a parameter file for the target environment, and a \
                  list of what must still be done by hand."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Path to the configuration file (default: ~/.rgclone/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Disable progress spinners
    #[arg(long, global = true)]
    no_progress: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Clone a group into another environment
    Clone(run::CloneCommand),

    /// Capture a group for disaster recovery into the same environment
    Backup(run::BackupCommand),

    /// Show the effective exclusion, strip and uniqueness tables
    Rules(rules::RulesCommand),
}

impl Cli {
    /// Run the selected command.
    ///
    /// # Errors
    ///
    /// Returns the first error of the command; `main` renders it.
    pub async fn execute(self) -> Result<()> {
        let config = self.build_config();
        config.init_logging();
        self.execute_with_config(config).await
    }

    /// Runtime settings for the global flags.
    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        let log_level = if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            "info"
        };

        CliConfig {
            log_level: log_level.to_string(),
            no_progress: self.no_progress,
            config_path: self.config.clone(),
        }
    }

    /// Run the selected command with explicit runtime settings.
    ///
    /// # Errors
    ///
    /// Returns the first error of the command.
    pub async fn execute_with_config(self, config: CliConfig) -> Result<()> {
        match self.command {
            Commands::Clone(cmd) => cmd.execute(&config).await,
            Commands::Backup(cmd) => cmd.execute(&config).await,
            Commands::Rules(cmd) => cmd.execute(&config).await,
        }
    }
}
