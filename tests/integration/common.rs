//! Shared setup for the integration tests

// Not every helper is used by every test module
#![allow(dead_code)]

use anyhow::{Context, Result};
use assert_cmd::Command;
use regex::Regex;
use rgclone::test_utils::{SAMPLE_DECOMPILED, SnapshotFixture};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A temporary directory holding a snapshot, a decompiled template, a
/// configuration file and the run output.
pub struct TestWorkspace {
    _temp: TempDir,
    pub root: PathBuf,
    pub snapshot: PathBuf,
    pub decompiled: PathBuf,
    pub config: PathBuf,
    pub output: PathBuf,
}

impl TestWorkspace {
    /// Workspace with the sample snapshot and an empty configuration.
    pub fn sample() -> Result<Self> {
        Self::with_fixture(&SnapshotFixture::sample())
    }

    pub fn with_fixture(fixture: &SnapshotFixture) -> Result<Self> {
        let temp = TempDir::new()?;
        let root = temp.path().to_path_buf();
        let snapshot = root.join("snapshot");
        fixture.write_to(&snapshot)?;

        let decompiled = root.join("main.decompiled.bicep");
        fs::write(&decompiled, SAMPLE_DECOMPILED)?;
        let config = root.join("config.toml");
        fs::write(&config, "")?;

        Ok(Self {
            root: root.clone(),
            snapshot,
            decompiled,
            config,
            output: root.join("out"),
            _temp: temp,
        })
    }

    pub fn write_config(&self, content: &str) -> Result<()> {
        fs::write(&self.config, content).context("Failed to write config")
    }

    /// `rgclone` with the global flags every test needs.
    pub fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("rgclone").unwrap();
        cmd.current_dir(&self.root)
            .env_remove("RUST_LOG")
            .arg("--no-progress")
            .arg("--config")
            .arg(&self.config);
        cmd
    }

    /// `rgclone clone` of the sample group into `target`.
    pub fn clone_cmd(&self, target: &str) -> Command {
        let mut cmd = self.command();
        cmd.args(["clone", "--group", "rg-app-dev", "--source-env", "dev", "--target-env", target])
            .arg("--snapshot")
            .arg(&self.snapshot)
            .arg("--decompiled")
            .arg(&self.decompiled)
            .arg("--output")
            .arg(&self.output);
        cmd
    }

    /// `rgclone backup` of the sample group.
    pub fn backup_cmd(&self) -> Command {
        let mut cmd = self.command();
        cmd.args(["backup", "--group", "rg-app-dev", "--env", "dev"])
            .arg("--snapshot")
            .arg(&self.snapshot)
            .arg("--decompiled")
            .arg(&self.decompiled)
            .arg("--output")
            .arg(&self.output);
        cmd
    }

    pub fn read_output(&self, name: &str) -> String {
        fs::read_to_string(self.output.join(name))
            .unwrap_or_else(|e| panic!("missing artifact {name}: {e}"))
    }

    pub fn read_json(&self, name: &str) -> Value {
        serde_json::from_str(&self.read_output(name)).unwrap()
    }

    /// Value of one entry of the parameter file.
    pub fn parameter(&self, name: &str) -> Option<String> {
        self.read_json("main.parameters.json")["parameters"][name]["value"]
            .as_str()
            .map(str::to_string)
    }
}

/// Names of the parameters declared in a template.
pub fn declared_parameters(template: &str) -> BTreeSet<String> {
    let declaration = Regex::new(r"(?m)^param\s+([A-Za-z_][A-Za-z0-9_]*)\s").unwrap();
    declaration.captures_iter(template).map(|c| c[1].to_string()).collect()
}

/// Names of the entries of a parameter file.
pub fn file_parameters(file: &Value) -> BTreeSet<String> {
    file["parameters"].as_object().map(|m| m.keys().cloned().collect()).unwrap_or_default()
}

/// Every artifact file in `dir` with its bytes, sorted by name.
pub fn snapshot_dir(dir: &Path) -> Vec<(String, Vec<u8>)> {
    let mut files: Vec<_> = fs::read_dir(dir)
        .unwrap()
        .map(|e| {
            let e = e.unwrap();
            (e.file_name().to_string_lossy().into_owned(), fs::read(e.path()).unwrap())
        })
        .collect();
    files.sort();
    files
}
