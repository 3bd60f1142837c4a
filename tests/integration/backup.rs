use predicates::prelude::*;
use rgclone::constants::DEFAULT_SECRET_SENTINEL;

use crate::common::{TestWorkspace, declared_parameters, file_parameters};

#[test]
fn test_backup_keeps_names() {
    let ws = TestWorkspace::sample().unwrap();

    ws.backup_cmd().assert().success().stdout(predicate::str::contains("backup dev"));

    assert_eq!(ws.parameter("environmentName").as_deref(), Some("dev"));
    assert_eq!(ws.parameter("sites_app_dev_name").as_deref(), Some("app-dev"));
    assert_eq!(ws.parameter("storageAccounts_devstorage123_name").as_deref(), Some("devstorage123"));
}

/// Backup restores in place, so setting values are preserved
#[test]
fn test_backup_preserves_setting_values() {
    let ws = TestWorkspace::sample().unwrap();
    ws.backup_cmd().assert().success();

    let template = ws.read_output("main.bicep");
    assert!(template.contains("Sup3rS3cret!"));
    assert!(!template.contains(DEFAULT_SECRET_SENTINEL));
    assert!(template.contains("appSettings: appSettings_app_dev"));
}

#[test]
fn test_backup_parameter_file_matches_declarations() {
    let ws = TestWorkspace::sample().unwrap();
    ws.backup_cmd().assert().success();

    let declared = declared_parameters(&ws.read_output("main.bicep"));
    let listed = file_parameters(&ws.read_json("main.parameters.json"));
    assert_eq!(declared, listed);
}

/// Exclusion applies regardless of the pipeline
#[test]
fn test_backup_still_excludes() {
    let ws = TestWorkspace::sample().unwrap();
    ws.backup_cmd().assert().success();

    let export = ws.read_output("cleaned-export.json");
    assert!(!export.contains("Microsoft.KeyVault/vaults/secrets"));
}
