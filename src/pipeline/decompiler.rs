//! Decompiler implementations.
//!
//! [`CommandDecompiler`] shells out to an external tool, by default
//! `bicep decompile --stdout {input}`, the same way the rest of the crate
//! would run any system command: resolve the program on `PATH`, capture
//! output, and bound the call with a timeout. [`FileDecompiler`] returns text
//! decompiled earlier, for offline runs.

use futures::FutureExt;
use futures::future::BoxFuture;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::process::Command;
use tokio::time::timeout;

use super::collaborators::Decompiler;
use crate::constants::DEFAULT_DECOMPILE_TIMEOUT;
use crate::core::CloneError;

/// Placeholder in decompiler arguments replaced by the input file path.
pub const INPUT_PLACEHOLDER: &str = "{input}";

/// Default decompiler program.
pub const DEFAULT_DECOMPILER_PROGRAM: &str = "bicep";

/// Default decompiler arguments.
#[must_use]
pub fn default_decompiler_args() -> Vec<String> {
    ["decompile", "--stdout", INPUT_PLACEHOLDER].into_iter().map(String::from).collect()
}

fn decompile_error(reason: impl Into<String>) -> CloneError {
    CloneError::DecompileError {
        reason: reason.into(),
    }
}

/// Copy the cleaned export into a temporary file under `dir`.
fn write_input(dir: &Path, cleaned_export: &str) -> Result<NamedTempFile, CloneError> {
    let mut input = tempfile::Builder::new()
        .prefix("rgclone-export-")
        .suffix(".json")
        .tempfile_in(dir)
        .map_err(|e| decompile_error(format!("cannot create input file in {}: {e}", dir.display())))?;
    input
        .write_all(cleaned_export.as_bytes())
        .and_then(|()| input.flush())
        .map_err(|e| decompile_error(format!("cannot write input file: {e}")))?;
    Ok(input)
}

/// Runs an external decompiler on a temporary copy of the cleaned export.
///
/// # Examples
///
/// ```rust,no_run
/// use rgclone::pipeline::{CommandDecompiler, Decompiler};
/// use std::time::Duration;
///
/// # async fn example() -> anyhow::Result<()> {
/// let decompiler = CommandDecompiler::new("bicep")
///     .args(["decompile", "--stdout", "{input}"])
///     .with_timeout(Some(Duration::from_secs(60)));
/// let text = decompiler.decompile(r#"{"resources": []}"#).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct CommandDecompiler {
    program: String,
    args: Vec<String>,
    timeout_duration: Option<Duration>,
}

impl Default for CommandDecompiler {
    fn default() -> Self {
        Self::new(DEFAULT_DECOMPILER_PROGRAM).args(default_decompiler_args())
    }
}

impl CommandDecompiler {
    /// Decompiler running `program` with no arguments yet.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout_duration: Some(DEFAULT_DECOMPILE_TIMEOUT),
        }
    }

    /// Append arguments. `{input}` is replaced by the input file path; without
    /// it the path is appended as the last argument.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the timeout. `None` waits forever.
    #[must_use]
    pub const fn with_timeout(mut self, duration: Option<Duration>) -> Self {
        self.timeout_duration = duration;
        self
    }

    /// Program name as configured.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    fn command_args(&self, input: &str) -> Vec<String> {
        let mut args: Vec<String> =
            self.args.iter().map(|a| a.replace(INPUT_PLACEHOLDER, input)).collect();
        if !self.args.iter().any(|a| a.contains(INPUT_PLACEHOLDER)) {
            args.push(input.to_string());
        }
        args
    }

    async fn run(&self, cleaned_export: &str) -> Result<String, CloneError> {
        let program = which::which(&self.program)
            .map_err(|e| decompile_error(format!("'{}' not found on PATH: {e}", self.program)))?;

        let input = write_input(&std::env::temp_dir(), cleaned_export)?;

        let args = self.command_args(&input.path().display().to_string());
        tracing::debug!(target: "decompiler", "Executing command: {} {}", program.display(), args.join(" "));

        let mut cmd = Command::new(&program);
        cmd.args(&args).stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        let output_future = cmd.output();
        let output = if let Some(duration) = self.timeout_duration {
            if let Ok(result) = timeout(duration, output_future).await {
                result.map_err(|e| decompile_error(format!("failed to run {}: {e}", self.program)))?
            } else {
                tracing::warn!(
                    target: "decompiler",
                    "Command timed out after {} seconds: {}",
                    duration.as_secs(),
                    self.program
                );
                return Err(decompile_error(format!(
                    "{} timed out after {} seconds",
                    self.program,
                    duration.as_secs()
                )));
            }
        } else {
            output_future
                .await
                .map_err(|e| decompile_error(format!("failed to run {}: {e}", self.program)))?
        };

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            tracing::debug!(target: "decompiler", "Command failed with exit code: {:?}", output.status.code());
            return Err(decompile_error(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }
        if !stderr.trim().is_empty() {
            // Decompilers report lossy conversions as warnings on stderr.
            tracing::warn!(target: "decompiler", "{}", stderr.trim());
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        if text.trim().is_empty() {
            return Err(decompile_error(format!("{} produced no output", self.program)));
        }
        Ok(text)
    }
}

impl Decompiler for CommandDecompiler {
    fn decompile<'a>(&'a self, cleaned_export: &'a str) -> BoxFuture<'a, Result<String, CloneError>> {
        self.run(cleaned_export).boxed()
    }
}

/// Returns template text decompiled ahead of time.
#[derive(Debug, Clone)]
pub struct FileDecompiler {
    path: PathBuf,
}

impl FileDecompiler {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
        }
    }
}

impl Decompiler for FileDecompiler {
    fn decompile<'a>(&'a self, _cleaned_export: &'a str) -> BoxFuture<'a, Result<String, CloneError>> {
        async move {
            let text = tokio::fs::read_to_string(&self.path)
                .await
                .map_err(|e| decompile_error(format!("cannot read {}: {e}", self.path.display())))?;
            if text.trim().is_empty() {
                return Err(decompile_error(format!("{} is empty", self.path.display())));
            }
            Ok(text)
        }
        .boxed()
    }
}
