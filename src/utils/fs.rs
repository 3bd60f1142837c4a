//! File system helpers for artifact output.
//!
//! Artifacts are written with a write-then-rename strategy so a reader never
//! sees a partially written file, and an interrupted run leaves either the
//! previous file or none at all.

use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::Path;

/// Create a directory and all its parents if missing.
///
/// # Errors
///
/// Fails if the path exists and is not a directory, or cannot be created.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if path.exists() {
        if !path.is_dir() {
            anyhow::bail!("Path exists but is not a directory: {}", path.display());
        }
        return Ok(());
    }
    fs::create_dir_all(path)
        .with_context(|| format!("Failed to create directory: {}", path.display()))
}

/// Atomically write bytes to a file.
///
/// The content goes to a sibling `.tmp` file which is synced and then
/// renamed over `path`. Parent directories are created as needed.
///
/// # Errors
///
/// Fails if any step of the write fails; the target is left untouched.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }

    let temp_path = path.with_extension("tmp");
    {
        let mut file = fs::File::create(&temp_path)
            .with_context(|| format!("Failed to create temp file: {}", temp_path.display()))?;
        file.write_all(content)
            .with_context(|| format!("Failed to write to temp file: {}", temp_path.display()))?;
        file.sync_all().with_context(|| "Failed to sync file to disk")?;
    }

    fs::rename(&temp_path, path)
        .with_context(|| format!("Failed to rename temp file to: {}", path.display()))?;
    Ok(())
}

/// Read a UTF-8 text file.
///
/// # Errors
///
/// Fails if the file cannot be read.
pub fn read_text_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read file: {}", path.display()))
}
