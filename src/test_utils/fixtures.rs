//! Test fixtures: a small but complete resource group.
//!
//! The sample group `rg-app-dev` holds a virtual network with one subnet, an
//! app service plan, a web app with its site configuration and a deployment
//! record, a storage account, a key vault with one secret, and a monitoring
//! component. [`SAMPLE_DECOMPILED`] is what a decompiler produces for its
//! cleaned export, including the standalone subnet that duplicates the inline
//! one and a literal `dependsOn` entry.

use anyhow::{Context, Result};
use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};

use crate::pipeline::DiscoveredResource;
use crate::pipeline::snapshot::{EXPORT_FILE, RESOURCES_FILE, SETTINGS_DIR, WORKSPACE_FILE};
use crate::settings::RawSetting;

/// Group name of the sample snapshot.
pub const SAMPLE_GROUP: &str = "rg-app-dev";

/// Raw structured export of the sample group.
#[must_use]
pub fn sample_export() -> String {
    let vnet_id = "[resourceId('Microsoft.Network/virtualNetworks', parameters('virtualNetworks_vnet_dev_name'))]";
    let subnet_id = "[resourceId('Microsoft.Network/virtualNetworks/subnets', parameters('virtualNetworks_vnet_dev_name'), 'subnetA')]";
    let plan_id = "[resourceId('Microsoft.Web/serverfarms', parameters('serverfarms_plan_dev_name'))]";
    let site_id = "[resourceId('Microsoft.Web/sites', parameters('sites_app_dev_name'))]";
    let vault_id = "[resourceId('Microsoft.KeyVault/vaults', parameters('vaults_kv_dev_name'))]";

    let param = |value: &str| json!({ "defaultValue": value, "type": "String" });
    let export = json!({
        "$schema": "https://schema.management.azure.com/schemas/2019-04-01/deploymentTemplate.json#",
        "contentVersion": "1.0.0.0",
        "parameters": {
            "virtualNetworks_vnet_dev_name": param("vnet-dev"),
            "serverfarms_plan_dev_name": param("plan-dev"),
            "sites_app_dev_name": param("app-dev"),
            "storageAccounts_devstorage123_name": param("devstorage123"),
            "vaults_kv_dev_name": param("kv-dev"),
            "components_ai_dev_name": param("ai-dev"),
            "workspaces_log_dev_externalid": param(
                "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/rg-shared-dev/providers/Microsoft.OperationalInsights/workspaces/log-dev"
            )
        },
        "variables": {},
        "resources": [
            {
                "type": "Microsoft.Network/virtualNetworks",
                "apiVersion": "2023-04-01",
                "name": "[parameters('virtualNetworks_vnet_dev_name')]",
                "location": "westeurope",
                "properties": {
                    "provisioningState": "Succeeded",
                    "addressSpace": { "addressPrefixes": ["10.0.0.0/16"] },
                    "subnets": [
                        {
                            "name": "subnetA",
                            "id": subnet_id,
                            "properties": { "addressPrefix": "10.0.1.0/24" },
                            "type": "Microsoft.Network/virtualNetworks/subnets"
                        }
                    ]
                }
            },
            {
                "type": "Microsoft.Network/virtualNetworks/subnets",
                "apiVersion": "2023-04-01",
                "name": "[concat(parameters('virtualNetworks_vnet_dev_name'), '/subnetA')]",
                "dependsOn": [vnet_id],
                "properties": {
                    "provisioningState": "Succeeded",
                    "addressPrefix": "10.0.1.0/24"
                }
            },
            {
                "type": "Microsoft.Web/serverfarms",
                "apiVersion": "2022-09-01",
                "name": "[parameters('serverfarms_plan_dev_name')]",
                "location": "westeurope",
                "sku": { "name": "P1v3", "tier": "PremiumV3", "size": "P1v3", "family": "Pv3", "capacity": 1 },
                "kind": "app",
                "properties": { "reserved": false }
            },
            {
                "type": "Microsoft.Web/sites",
                "apiVersion": "2022-09-01",
                "name": "[parameters('sites_app_dev_name')]",
                "location": "westeurope",
                "kind": "app",
                "dependsOn": [plan_id, subnet_id],
                "properties": {
                    "serverFarmId": plan_id,
                    "virtualNetworkSubnetId": subnet_id,
                    "httpsOnly": true
                }
            },
            {
                "type": "Microsoft.Web/sites/config",
                "apiVersion": "2022-09-01",
                "name": "[concat(parameters('sites_app_dev_name'), '/web')]",
                "location": "westeurope",
                "dependsOn": [site_id],
                "properties": { "alwaysOn": true, "ftpsState": "Disabled" }
            },
            {
                "type": "Microsoft.Web/sites/deployments",
                "apiVersion": "2022-09-01",
                "name": "[concat(parameters('sites_app_dev_name'), '/abc123')]",
                "dependsOn": [site_id],
                "properties": { "status": 4, "author": "N/A", "active": true }
            },
            {
                "type": "Microsoft.Storage/storageAccounts",
                "apiVersion": "2023-01-01",
                "name": "[parameters('storageAccounts_devstorage123_name')]",
                "location": "westeurope",
                "sku": { "name": "Standard_LRS", "tier": "Standard" },
                "kind": "StorageV2",
                "properties": { "minimumTlsVersion": "TLS1_2", "provisioningState": "Succeeded" }
            },
            {
                "type": "Microsoft.KeyVault/vaults",
                "apiVersion": "2023-07-01",
                "name": "[parameters('vaults_kv_dev_name')]",
                "location": "westeurope",
                "properties": {
                    "sku": { "family": "A", "name": "standard" },
                    "tenantId": "00000000-0000-0000-0000-000000000000",
                    "enableSoftDelete": true
                }
            },
            {
                "type": "Microsoft.KeyVault/vaults/secrets",
                "apiVersion": "2023-07-01",
                "name": "[concat(parameters('vaults_kv_dev_name'), '/db-password')]",
                "location": "westeurope",
                "dependsOn": [vault_id],
                "properties": { "attributes": { "enabled": true } }
            },
            {
                "type": "Microsoft.Insights/components",
                "apiVersion": "2020-02-02",
                "name": "[parameters('components_ai_dev_name')]",
                "location": "westeurope",
                "kind": "web",
                "properties": {
                    "Application_Type": "web",
                    "WorkspaceResourceId": "[parameters('workspaces_log_dev_externalid')]"
                }
            }
        ]
    });
    export.to_string()
}

/// Decompiled text of the sample group's cleaned export.
pub const SAMPLE_DECOMPILED: &str = "\
param virtualNetworks_vnet_dev_name string = 'vnet-dev'
param serverfarms_plan_dev_name string = 'plan-dev'
param sites_app_dev_name string = 'app-dev'
param storageAccounts_devstorage123_name string = 'devstorage123'
param vaults_kv_dev_name string = 'kv-dev'
param components_ai_dev_name string = 'ai-dev'
param workspaces_log_dev_externalid string = '/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/rg-shared-dev/providers/Microsoft.OperationalInsights/workspaces/log-dev'
param unusedLegacy_name string = 'legacy'

resource components_ai_dev_name_resource 'Microsoft.Insights/components@2020-02-02' = {
  name: components_ai_dev_name
  location: 'westeurope'
  kind: 'web'
  properties: {
    Application_Type: 'web'
    WorkspaceResourceId: workspaces_log_dev_externalid
  }
}

resource vaults_kv_dev_name_resource 'Microsoft.KeyVault/vaults@2023-07-01' = {
  name: vaults_kv_dev_name
  location: 'westeurope'
  properties: {
    sku: {
      family: 'A'
      name: 'standard'
    }
    tenantId: '00000000-0000-0000-0000-000000000000'
    enableSoftDelete: true
  }
}

resource virtualNetworks_vnet_dev_name_resource 'Microsoft.Network/virtualNetworks@2023-04-01' = {
  name: virtualNetworks_vnet_dev_name
  location: 'westeurope'
  properties: {
    addressSpace: {
      addressPrefixes: [
        '10.0.0.0/16'
      ]
    }
    subnets: [
      {
        name: 'subnetA'
        id: virtualNetworks_vnet_dev_name_subnetA.id
        properties: {
          addressPrefix: '10.0.1.0/24'
        }
      }
    ]
  }
}

resource storageAccounts_devstorage123_name_resource 'Microsoft.Storage/storageAccounts@2023-01-01' = {
  name: storageAccounts_devstorage123_name
  location: 'westeurope'
  sku: {
    name: 'Standard_LRS'
  }
  kind: 'StorageV2'
  properties: {
    minimumTlsVersion: 'TLS1_2'
  }
}

resource serverfarms_plan_dev_name_resource 'Microsoft.Web/serverfarms@2022-09-01' = {
  name: serverfarms_plan_dev_name
  location: 'westeurope'
  sku: {
    name: 'P1v3'
    size: 'P1v3'
    family: 'Pv3'
    capacity: 1
  }
  kind: 'app'
  properties: {
    reserved: false
  }
}

resource virtualNetworks_vnet_dev_name_subnetA 'Microsoft.Network/virtualNetworks/subnets@2023-04-01' = {
  parent: virtualNetworks_vnet_dev_name_resource
  name: 'subnetA'
  properties: {
    addressPrefix: '10.0.1.0/24'
  }
}

resource sites_app_dev_name_resource 'Microsoft.Web/sites@2022-09-01' = {
  name: sites_app_dev_name
  location: 'westeurope'
  kind: 'app'
  properties: {
    serverFarmId: serverfarms_plan_dev_name_resource.id
    virtualNetworkSubnetId: virtualNetworks_vnet_dev_name_subnetA.id
    httpsOnly: true
  }
  dependsOn: [
    virtualNetworks_vnet_dev_name_subnetA
  ]
}

resource sites_app_dev_name_web 'Microsoft.Web/sites/config@2022-09-01' = {
  parent: sites_app_dev_name_resource
  name: 'web'
  properties: {
    alwaysOn: true
    ftpsState: 'Disabled'
  }
  dependsOn: [
    serverfarms_plan_dev_name_resource
    'Microsoft.Web/serverfarms/plan-dev'
  ]
}
";

/// Settings listed for `app-dev`.
#[must_use]
pub fn sample_settings() -> Vec<RawSetting> {
    vec![
        RawSetting::new(
            "DB_CONNECTIONSTRING",
            "Server=tcp:sql-dev.database.windows.net;Database=app;Password=Sup3rS3cret!",
        ),
        RawSetting::new(
            "STORAGE_CONNECTIONSTRING",
            "DefaultEndpointsProtocol=https;AccountName=devstorage123;AccountKey=c2VjcmV0",
        ),
        RawSetting::new(
            "WEBSITE_RUN_FROM_PACKAGE",
            "https://devstorage123.blob.core.windows.net/packages/app-dev.zip",
        ),
        RawSetting::new("ENVIRONMENT", "dev"),
        RawSetting::new("API_BASE_URL", "https://api-dev.example.com"),
        RawSetting::new("WEBSITE_CONTENTSHARE", "app-dev-share"),
        RawSetting::new("FEATURE_FLAGS", "search,export"),
    ]
}

/// Resources reported by discovery for the sample group.
#[must_use]
pub fn sample_resources() -> Vec<DiscoveredResource> {
    let resource = |resource_type: &str, name: &str, kind: Option<&str>| DiscoveredResource {
        resource_type: resource_type.to_string(),
        name: name.to_string(),
        kind: kind.map(str::to_string),
    };
    vec![
        resource("Microsoft.Network/virtualNetworks", "vnet-dev", None),
        resource("Microsoft.Web/serverfarms", "plan-dev", Some("app")),
        resource("Microsoft.Web/sites", "app-dev", Some("app")),
        resource("Microsoft.Storage/storageAccounts", "devstorage123", Some("StorageV2")),
        resource("Microsoft.KeyVault/vaults", "kv-dev", None),
        resource("Microsoft.Insights/components", "ai-dev", Some("web")),
    ]
}

/// An on-disk snapshot of one group.
#[derive(Clone, Debug)]
pub struct SnapshotFixture {
    pub group: String,
    pub resources: Vec<DiscoveredResource>,
    pub export: String,
    pub settings: Vec<(String, Vec<RawSetting>)>,
    pub workspace_id: Option<String>,
}

impl SnapshotFixture {
    /// The sample group.
    pub fn sample() -> Self {
        Self {
            group: SAMPLE_GROUP.to_string(),
            resources: sample_resources(),
            export: sample_export(),
            settings: vec![("app-dev".to_string(), sample_settings())],
            workspace_id: None,
        }
    }

    /// Write the snapshot under `root` and return the group directory.
    pub fn write_to(&self, root: &Path) -> Result<PathBuf> {
        let dir = root.join(&self.group);
        fs::create_dir_all(dir.join(SETTINGS_DIR))
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        fs::write(dir.join(RESOURCES_FILE), serde_json::to_string_pretty(&self.resources)?)?;
        fs::write(dir.join(EXPORT_FILE), &self.export)?;
        for (component, settings) in &self.settings {
            let listing: Vec<Value> =
                settings.iter().map(|s| json!({ "name": s.name, "value": s.value })).collect();
            fs::write(
                dir.join(SETTINGS_DIR).join(format!("{component}.json")),
                serde_json::to_string_pretty(&listing)?,
            )?;
        }
        if let Some(id) = &self.workspace_id {
            fs::write(dir.join(WORKSPACE_FILE), id)?;
        }
        Ok(dir)
    }
}
