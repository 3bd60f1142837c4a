//! Error handling for rgclone
//!
//! This module provides the error taxonomy of the cloning pipeline and the
//! user-friendly error reporting used by the CLI. The error system follows two
//! principles:
//! 1. **Strongly-typed errors** for the fatal preconditions of a run
//! 2. **User-friendly messages** with actionable suggestions for operators
//!
//! # Fatal vs. recoverable
//!
//! Only conditions that make the artifact set unsafe are errors. A parameter
//! that cannot be bound to a resource, or two parameters that resolve to the
//! same value, are *recoverable*: they are recorded in the manual-action
//! manifest (see [`crate::actions`]) and never surface as a [`CloneError`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use rgclone::core::{CloneError, ErrorContext, user_friendly_error};
//!
//! fn discover() -> Result<(), CloneError> {
//!     Err(CloneError::DiscoveryError {
//!         group: "rg-app-dev".to_string(),
//!         reason: "group contains no resources".to_string(),
//!     })
//! }
//!
//! if let Err(e) = discover() {
//!     let ctx = user_friendly_error(anyhow::Error::from(e));
//!     ctx.display();
//! }
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for rgclone operations.
///
/// Every variant except [`CloneError::Other`] aborts the run before any
/// artifact is written: a half-cleaned template is unsafe to deploy.
#[derive(Error, Debug)]
pub enum CloneError {
    /// The source environment cannot be reached or authenticated against.
    #[error("Cannot access source environment for group '{group}': {reason}")]
    AccessError {
        /// Group identifier that was being accessed
        group: String,
        /// Why access failed
        reason: String,
    },

    /// The target group is missing or contains no resources.
    #[error("Resource discovery failed for group '{group}': {reason}")]
    DiscoveryError {
        /// Group identifier that was being discovered
        group: String,
        /// Why discovery failed
        reason: String,
    },

    /// The raw template export could not be produced.
    #[error("Template export failed for group '{group}': {reason}")]
    ExportError {
        /// Group identifier that was being exported
        group: String,
        /// Why the export failed
        reason: String,
    },

    /// The external decompiler failed.
    #[error("Decompilation failed: {reason}")]
    DecompileError {
        /// Why decompilation failed
        reason: String,
    },

    /// The raw export is not well-formed or contains no resources.
    #[error("Invalid template export: {reason}")]
    ParseError {
        /// What is wrong with the export
        reason: String,
    },

    /// The configuration file is invalid.
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the configuration error
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON parsing or serialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// Other error
    #[error("{message}")]
    Other {
        /// Generic error message
        message: String,
    },
}

impl CloneError {
    /// Whether this error belongs to the fatal precondition set of a run.
    #[must_use]
    pub const fn is_fatal_precondition(&self) -> bool {
        matches!(
            self,
            Self::AccessError { .. }
                | Self::DiscoveryError { .. }
                | Self::ExportError { .. }
                | Self::DecompileError { .. }
                | Self::ParseError { .. }
        )
    }
}

/// Error wrapper with an operator-facing suggestion and details.
///
/// # Examples
///
/// ```rust,no_run
/// use rgclone::core::{CloneError, ErrorContext};
///
/// let context = ErrorContext::new(CloneError::DecompileError {
///     reason: "exit status 1".to_string(),
/// })
/// .with_suggestion("Install the bicep CLI or pass --decompiled <file>")
/// .with_details("The decompiler turns the cleaned export into editable template text");
///
/// context.display();
/// ```
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: CloneError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context without suggestion or details.
    #[must_use]
    pub const fn new(error: CloneError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Attach a suggestion for resolving the error.
    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Attach additional details explaining the error.
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error to stderr with colors.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error into an [`ErrorContext`] with operator-facing suggestions.
///
/// Known [`CloneError`] variants get tailored suggestions; I/O and JSON errors
/// are mapped to generic file advice; everything else keeps its full cause
/// chain so nothing is lost when printed.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    let error = match error.downcast::<CloneError>() {
        Ok(clone_error) => return create_error_context(clone_error),
        Err(error) => error,
    };

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        match io_error.kind() {
            std::io::ErrorKind::NotFound => {
                return ErrorContext::new(CloneError::Other {
                    message: full_chain(&error),
                })
                .with_suggestion("Check that the snapshot, template and output paths exist")
                .with_details("A file or directory the run depends on could not be found");
            }
            std::io::ErrorKind::PermissionDenied => {
                return ErrorContext::new(CloneError::Other {
                    message: full_chain(&error),
                })
                .with_suggestion("Check file permissions on the snapshot and output directories");
            }
            _ => {}
        }
    }

    if error.downcast_ref::<toml::de::Error>().is_some() {
        return ErrorContext::new(CloneError::ConfigError {
            message: full_chain(&error),
        })
        .with_suggestion("Check the TOML syntax of your rgclone configuration file");
    }

    ErrorContext::new(CloneError::Other {
        message: full_chain(&error),
    })
}

fn full_chain(error: &anyhow::Error) -> String {
    let mut message = error.to_string();
    let chain: Vec<String> = error.chain().skip(1).map(std::string::ToString::to_string).collect();

    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    message
}

fn create_error_context(error: CloneError) -> ErrorContext {
    match &error {
        CloneError::AccessError { .. } => ErrorContext::new(error)
            .with_suggestion("Sign in to the source environment and verify you can read the resource group")
            .with_details("No retry is attempted; authentication and session setup happen outside rgclone"),

        CloneError::DiscoveryError { group, .. } => {
            let suggestion = format!(
                "Verify that group '{group}' exists and contains resources, or that the snapshot holds a '{group}' directory"
            );
            ErrorContext::new(error)
                .with_suggestion(suggestion)
                .with_details("Nothing can be cloned from an empty or missing group")
        }

        CloneError::ExportError { .. } => ErrorContext::new(error)
            .with_suggestion("Re-run the export and check that template.json is non-empty")
            .with_details("No artifacts were written; a partial export is never processed"),

        CloneError::DecompileError { .. } => ErrorContext::new(error)
            .with_suggestion("Install the bicep CLI, configure [decompiler] in the config file, or pass --decompiled <file>")
            .with_details("The decompiler turns the cleaned export into editable template text; no artifacts were written"),

        CloneError::ParseError { .. } => ErrorContext::new(error)
            .with_suggestion("Check that the export is valid JSON with a non-empty 'resources' array"),

        CloneError::ConfigError { .. } | CloneError::TomlError(_) => ErrorContext::new(error)
            .with_suggestion("Fix the configuration file or run 'rgclone rules' to inspect the effective rules"),

        _ => ErrorContext::new(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_preconditions() {
        assert!(
            CloneError::DecompileError {
                reason: "boom".to_string()
            }
            .is_fatal_precondition()
        );
        assert!(
            !CloneError::Other {
                message: "x".to_string()
            }
            .is_fatal_precondition()
        );
    }

    #[test]
    fn test_user_friendly_discovery_error() {
        let err = anyhow::Error::from(CloneError::DiscoveryError {
            group: "rg-app-dev".to_string(),
            reason: "empty".to_string(),
        });
        let ctx = user_friendly_error(err);
        assert!(matches!(ctx.error, CloneError::DiscoveryError { .. }));
        assert!(ctx.suggestion.unwrap().contains("rg-app-dev"));
    }

    #[test]
    fn test_user_friendly_keeps_cause_chain() {
        let err = anyhow::anyhow!("inner failure").context("outer failure");
        let ctx = user_friendly_error(err);
        let rendered = ctx.to_string();
        assert!(rendered.contains("outer failure"));
        assert!(rendered.contains("inner failure"));
    }

    #[test]
    fn test_error_context_display() {
        let ctx = ErrorContext::new(CloneError::ParseError {
            reason: "no resources".to_string(),
        })
        .with_details("d")
        .with_suggestion("s");
        let rendered = format!("{ctx}");
        assert!(rendered.contains("Invalid template export: no resources"));
        assert!(rendered.contains("Details: d"));
        assert!(rendered.contains("Suggestion: s"));
    }
}
