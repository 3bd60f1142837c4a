use predicates::prelude::*;
use std::fs;

use crate::common::TestWorkspace;

/// A group missing from the snapshot is a discovery failure and writes nothing
#[test]
fn test_unknown_group_fails() {
    let ws = TestWorkspace::sample().unwrap();

    ws.command()
        .args(["clone", "--group", "rg-missing", "--source-env", "dev", "--target-env", "sit"])
        .arg("--snapshot")
        .arg(&ws.snapshot)
        .arg("--decompiled")
        .arg(&ws.decompiled)
        .arg("--output")
        .arg(&ws.output)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Resource discovery failed for group 'rg-missing'"));

    assert!(!ws.output.exists());
}

#[test]
fn test_missing_snapshot_root_fails() {
    let ws = TestWorkspace::sample().unwrap();
    fs::remove_dir_all(&ws.snapshot).unwrap();

    ws.clone_cmd("sit")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Cannot access source environment"));
}

#[test]
fn test_empty_export_fails() {
    let ws = TestWorkspace::sample().unwrap();
    fs::write(ws.snapshot.join("rg-app-dev").join("template.json"), "").unwrap();

    ws.clone_cmd("sit")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Template export failed"));
    assert!(!ws.output.exists());
}

#[test]
fn test_missing_decompiled_file_fails() {
    let ws = TestWorkspace::sample().unwrap();
    fs::remove_file(&ws.decompiled).unwrap();

    ws.clone_cmd("sit")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Decompilation failed"));
    assert!(!ws.output.exists());
}

#[test]
fn test_same_environment_clone_is_rejected() {
    let ws = TestWorkspace::sample().unwrap();

    ws.clone_cmd("DEV")
        .assert()
        .failure()
        .stderr(predicate::str::contains("rgclone backup"));
}

#[test]
fn test_invalid_config_fails() {
    let ws = TestWorkspace::sample().unwrap();
    ws.write_config("environment_parameter = \"not valid\"\n").unwrap();

    ws.clone_cmd("sit")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a valid identifier"));
}

#[test]
fn test_unknown_config_key_fails() {
    let ws = TestWorkspace::sample().unwrap();
    ws.write_config("[sentinels]\nsecrets = \"x\"\n").unwrap();

    ws.command().arg("rules").assert().failure().code(1);
}

#[test]
fn test_explicit_config_must_exist() {
    let ws = TestWorkspace::sample().unwrap();
    fs::remove_file(&ws.config).unwrap();

    ws.command().arg("rules").assert().failure().code(1);
}
