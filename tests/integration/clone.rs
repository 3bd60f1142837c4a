use predicates::prelude::*;
use rgclone::constants::{DEFAULT_SECRET_SENTINEL, DEFAULT_WORKSPACE_SENTINEL};
use rgclone::test_utils::SnapshotFixture;

use crate::common::{TestWorkspace, declared_parameters, file_parameters, snapshot_dir};

/// A clone writes the four artifacts and reports the run on stdout
#[test]
fn test_clone_writes_artifacts() {
    let ws = TestWorkspace::sample().unwrap();

    ws.clone_cmd("sit")
        .assert()
        .success()
        .stdout(predicate::str::contains("clone dev -> sit"))
        .stdout(predicate::str::contains("main.bicep"))
        .stdout(predicate::str::contains("sha256:"));

    for name in ["cleaned-export.json", "main.bicep", "main.parameters.json", "manual-actions.json"] {
        assert!(ws.output.join(name).is_file(), "{name} was not written");
    }
}

#[test]
fn test_clone_retargets_names() {
    let ws = TestWorkspace::sample().unwrap();
    ws.clone_cmd("sit").assert().success();

    assert_eq!(ws.parameter("environmentName").as_deref(), Some("sit"));
    assert_eq!(ws.parameter("sites_app_dev_name").as_deref(), Some("app-sit"));
    assert_eq!(ws.parameter("serverfarms_plan_dev_name").as_deref(), Some("plan-sit"));
    assert_eq!(ws.parameter("vaults_kv_dev_name").as_deref(), Some("kv-sit"));
    // no environment token in the name, so the target is prefixed
    assert_eq!(ws.parameter("storageAccounts_devstorage123_name").as_deref(), Some("sitdevstorage123"));
    assert_eq!(
        ws.parameter("workspaces_log_dev_externalid").as_deref(),
        Some(DEFAULT_WORKSPACE_SENTINEL)
    );
}

/// Secret values never reach the template on the clone path
#[test]
fn test_clone_masks_secrets() {
    let ws = TestWorkspace::sample().unwrap();
    ws.clone_cmd("sit").assert().success();

    let template = ws.read_output("main.bicep");
    assert!(template.contains(DEFAULT_SECRET_SENTINEL));
    assert!(!template.contains("Sup3rS3cret!"));
    assert!(!template.contains("AccountKey=c2VjcmV0"));
    assert!(template.contains("appSettings: appSettings_app_dev"));
    assert!(template.contains("value: environmentName"));

    let actions = ws.read_json("manual-actions.json");
    let secrets: Vec<&str> = actions["secrets"]["app-dev"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|v| v.as_str())
        .collect();
    assert!(secrets.contains(&"DB_CONNECTIONSTRING"));
    assert!(secrets.contains(&"STORAGE_CONNECTIONSTRING"));
    assert!(!secrets.contains(&"WEBSITE_CONTENTSHARE"));
}

/// Excluded resources are gone from the export and nothing points at them
#[test]
fn test_clone_excludes_and_repairs_references() {
    let ws = TestWorkspace::sample().unwrap();
    ws.clone_cmd("sit").assert().success();

    let export = ws.read_output("cleaned-export.json");
    assert!(!export.contains("Microsoft.KeyVault/vaults/secrets"));
    assert!(!export.contains("Microsoft.Web/sites/deployments"));
    assert!(!export.contains("provisioningState"));

    let actions = ws.read_json("manual-actions.json");
    let excluded = actions["excluded"].as_array().unwrap();
    assert!(excluded.iter().any(|e| e["name"] == "kv-dev/db-password"));

    let template = ws.read_output("main.bicep");
    assert!(!template.contains("param unusedLegacy_name"));
    assert!(!template.contains("virtualNetworks_vnet_dev_name_subnetA"));
}

/// Every declared parameter has exactly one value and nothing else is listed
#[test]
fn test_parameter_file_matches_declarations() {
    let ws = TestWorkspace::sample().unwrap();
    ws.clone_cmd("sit").assert().success();

    let declared = declared_parameters(&ws.read_output("main.bicep"));
    let listed = file_parameters(&ws.read_json("main.parameters.json"));
    assert!(declared.contains("environmentName"));
    assert_eq!(declared, listed);
}

#[test]
fn test_clone_is_deterministic() {
    let first = TestWorkspace::sample().unwrap();
    first.clone_cmd("sit").assert().success();
    let second = TestWorkspace::sample().unwrap();
    second.clone_cmd("sit").assert().success();

    assert_eq!(snapshot_dir(&first.output), snapshot_dir(&second.output));
}

/// Re-running into the same output directory replaces the artifacts
#[test]
fn test_rerun_overwrites_output() {
    let ws = TestWorkspace::sample().unwrap();
    ws.clone_cmd("sit").assert().success();
    let before = snapshot_dir(&ws.output);
    ws.clone_cmd("sit").assert().success();

    assert_eq!(before, snapshot_dir(&ws.output));
}

#[test]
fn test_workspace_lookup_is_used() {
    let fixture = SnapshotFixture {
        workspace_id: Some("/subscriptions/x/workspaces/log-sit".to_string()),
        ..SnapshotFixture::sample()
    };
    let ws = TestWorkspace::with_fixture(&fixture).unwrap();
    ws.clone_cmd("sit").assert().success();

    assert_eq!(
        ws.parameter("workspaces_log_dev_externalid").as_deref(),
        Some("/subscriptions/x/workspaces/log-sit")
    );
}

/// Length limits from the configuration cap globally unique names
#[test]
fn test_configured_length_limit() {
    let ws = TestWorkspace::sample().unwrap();
    ws.write_config(
        r#"
[uniqueness."Microsoft.Storage/storageAccounts"]
force_unique = true
max_length = 10
"#,
    )
    .unwrap();
    ws.clone_cmd("sit").assert().success();

    let storage = ws.parameter("storageAccounts_devstorage123_name").unwrap();
    assert!(storage.chars().count() <= 10, "{storage} is too long");
    assert!(storage.starts_with("sit"));
}

#[test]
fn test_configured_secret_sentinel() {
    let ws = TestWorkspace::sample().unwrap();
    ws.write_config("[sentinels]\nsecret = \"<set me>\"\n").unwrap();
    ws.clone_cmd("sit").assert().success();

    let template = ws.read_output("main.bicep");
    assert!(template.contains("<set me>"));
    assert!(!template.contains(DEFAULT_SECRET_SENTINEL));
}
