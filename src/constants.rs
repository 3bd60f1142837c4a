//! Global constants used throughout the rgclone codebase.
//!
//! Sentinel values, artifact file names, and timeouts shared by the pipeline
//! stages and the CLI. Defining them centrally keeps the emitted artifacts
//! consistent across stages.

use std::time::Duration;

/// Default name of the template parameter that carries the target environment.
pub const DEFAULT_ENVIRONMENT_PARAMETER: &str = "environmentName";

/// Value emitted in place of a secret setting on the cloning path.
pub const DEFAULT_SECRET_SENTINEL: &str = "__SECRET_REQUIRES_MANUAL_CONFIGURATION__";

/// Value assigned to a parameter that could not be bound to any resource.
pub const DEFAULT_MANUAL_REVIEW_SENTINEL: &str = "__NEEDS_MANUAL_REVIEW__";

/// Value assigned to a workspace parameter when the live lookup returned nothing.
pub const DEFAULT_WORKSPACE_SENTINEL: &str = "__LOG_ANALYTICS_WORKSPACE_ID__";

/// Fixed literal for parameters that name an administrative principal.
pub const DEFAULT_ADMIN_LOGIN: &str = "cloneadmin";

/// Cleaned structured export (after exclusion and stripping).
pub const CLEANED_EXPORT_FILE: &str = "cleaned-export.json";

/// Sanitized, parameterized template text.
pub const TEMPLATE_FILE: &str = "main.bicep";

/// Deployment parameter file.
pub const PARAMETERS_FILE: &str = "main.parameters.json";

/// Manual-action manifest.
pub const MANUAL_ACTIONS_FILE: &str = "manual-actions.json";

/// Schema URI written into the parameter file.
pub const PARAMETERS_SCHEMA: &str =
    "https://schema.management.azure.com/schemas/2019-04-01/deploymentParameters.json#";

/// Content version written into the parameter file.
pub const PARAMETERS_CONTENT_VERSION: &str = "1.0.0.0";

/// Default timeout for the external decompiler (120 seconds).
///
/// Large exports with hundreds of resources can take a while to decompile.
pub const DEFAULT_DECOMPILE_TIMEOUT: Duration = Duration::from_secs(120);

/// Resource type of app/function hosts whose configuration settings are cloned.
pub const SITE_RESOURCE_TYPE: &str = "Microsoft.Web/sites";

/// Resource type of the site configuration child resource.
pub const SITE_CONFIG_RESOURCE_TYPE: &str = "Microsoft.Web/sites/config";
