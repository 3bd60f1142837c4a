use predicates::prelude::*;
use serde_json::Value;

use crate::common::TestWorkspace;

#[test]
fn test_rules_json_lists_builtins() {
    let ws = TestWorkspace::sample().unwrap();

    let output = ws.command().args(["rules", "--format", "json"]).assert().success();
    let stdout = String::from_utf8_lossy(&output.get_output().stdout).into_owned();
    let document: Value = serde_json::from_str(&stdout).unwrap();

    let ids = |table: &str| -> Vec<String> {
        document[table]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|r| r["id"].as_str().map(str::to_string))
            .collect()
    };
    assert!(ids("exclusions").contains(&"vault-secret-values".to_string()));
    assert!(ids("exclusions").contains(&"gateway-master-subscription".to_string()));
    assert!(ids("strip").contains(&"provisioning-state".to_string()));
    assert_eq!(document["uniqueness"]["Microsoft.KeyVault/vaults"]["max_length"], 24);
}

/// Configured rules are appended to the built-in tables
#[test]
fn test_rules_include_configured_entries() {
    let ws = TestWorkspace::sample().unwrap();
    ws.write_config(
        r#"
[[exclusions]]
id = "no-dashboards"
type = "(?i)^microsoft\\.portal/dashboards$"
"#,
    )
    .unwrap();

    ws.command()
        .args(["rules", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no-dashboards"))
        .stdout(predicate::str::contains("vault-secret-values"));
}

#[test]
fn test_replaced_rules_drop_builtins() {
    let ws = TestWorkspace::sample().unwrap();
    ws.write_config("replace_builtin_rules = true\n").unwrap();

    ws.command()
        .args(["rules", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("vault-secret-values").not());
}

#[test]
fn test_rules_text_output() {
    let ws = TestWorkspace::sample().unwrap();

    ws.command()
        .arg("rules")
        .assert()
        .success()
        .stdout(predicate::str::contains("Exclusions"))
        .stdout(predicate::str::contains("Uniqueness"))
        .stdout(predicate::str::contains("Microsoft.Storage/storageAccounts"));
}
