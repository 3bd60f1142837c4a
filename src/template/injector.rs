//! Settings injector.
//!
//! For every component with settings, a `var appSettings_<component>` list of
//! `{ name, value }` items is emitted and the component's site configuration
//! declaration (`Microsoft.Web/sites/config`, name `web`) is bound to it with
//! `appSettings: <var>`. A declaration that already has `appSettings` is left
//! alone, and so is a component whose declaration cannot be found uniquely:
//! nothing is silently dropped or duplicated.

use std::collections::BTreeMap;

use super::scanner::{
    Declaration, DeclarationKind, bicep_string, block_property, escape_string_content, indentation,
    join_lines, scan, split_lines, string_literal_value,
};
use crate::actions::{Ambiguity, AmbiguityKind};
use crate::constants::SITE_CONFIG_RESOURCE_TYPE;
use crate::core::env_token::normalize_identifier;
use crate::settings::{ConfigSetting, SettingClass, SettingsPolicy};

/// Result of [`inject`].
#[derive(Debug, Clone)]
pub struct InjectOutcome {
    /// Text with settings blocks and bindings
    pub text: String,
    /// Components whose configuration declaration was bound
    pub bound: Vec<String>,
    /// Components left unbound
    pub ambiguities: Vec<Ambiguity>,
}

/// Name of the settings variable for a component.
#[must_use]
pub fn settings_variable(component: &str) -> String {
    format!("appSettings_{}", normalize_identifier(component))
}

/// Render a setting value as a template expression.
fn render_value(setting: &ConfigSetting, policy: &SettingsPolicy) -> String {
    let placeholder = policy.placeholder();
    match setting.class {
        SettingClass::EnvironmentToken if setting.value == placeholder => {
            policy.environment_parameter().to_string()
        }
        SettingClass::EnvironmentToken => {
            let escaped: Vec<String> =
                setting.value.split(placeholder.as_str()).map(escape_string_content).collect();
            format!("'{}'", escaped.join(&placeholder))
        }
        _ => bicep_string(&setting.value),
    }
}

fn settings_block(variable: &str, settings: &[&ConfigSetting], policy: &SettingsPolicy) -> Vec<String> {
    let mut block = vec![format!("var {variable} = [")];
    for setting in settings {
        block.push("  {".to_string());
        block.push(format!("    name: {}", bicep_string(&setting.key)));
        block.push(format!("    value: {}", render_value(setting, policy)));
        block.push("  }".to_string());
    }
    block.push("]".to_string());
    block
}

fn ensure_environment_parameter(lines: &mut Vec<String>, parameter: &str) {
    let declared = scan(lines.as_slice())
        .iter()
        .any(|d| d.kind == DeclarationKind::Param && d.identifier == parameter);
    if !declared {
        tracing::debug!("Declaring parameter {parameter}");
        lines.insert(0, format!("param {parameter} string"));
    }
}

fn is_web_config(lines: &[String], decl: &Declaration) -> bool {
    decl.kind == DeclarationKind::Resource
        && decl
            .declared_type
            .as_deref()
            .is_some_and(|t| t.eq_ignore_ascii_case(SITE_CONFIG_RESOURCE_TYPE))
        && block_property(lines, decl, "name")
            .and_then(|n| string_literal_value(&n))
            .is_none_or(|n| n.eq_ignore_ascii_case("web"))
}

fn find_config_declaration(lines: &[String], component: &str) -> Result<Declaration, String> {
    let stem = format!("sites_{}", normalize_identifier(component)).to_ascii_lowercase();
    let candidates: Vec<(Declaration, String)> = scan(lines)
        .into_iter()
        .filter(|d| is_web_config(lines, d))
        .filter_map(|d| {
            let parent = block_property(lines, &d, "parent")?.to_ascii_lowercase();
            parent.contains(&stem).then_some((d, parent))
        })
        .collect();

    match candidates.len() {
        0 => Err(format!("no site configuration declaration with a parent matching '{stem}'")),
        1 => Ok(candidates[0].0.clone()),
        n => {
            let exact = [format!("{stem}_name_resource"), format!("{stem}_resource")];
            let narrowed: Vec<&Declaration> =
                candidates.iter().filter(|(_, p)| exact.contains(p)).map(|(d, _)| d).collect();
            match narrowed.as_slice() {
                [decl] => Ok((*decl).clone()),
                _ => Err(format!("{n} site configuration declarations match '{stem}'")),
            }
        }
    }
}

/// `properties: {` or an empty `properties: {}`.
fn is_properties_opener(line: &str) -> bool {
    let Some(rest) = line.trim().strip_prefix("properties:") else {
        return false;
    };
    let rest: String = rest.chars().filter(|c| !c.is_whitespace()).collect();
    rest == "{" || rest == "{}"
}

/// Splice `appSettings: <variable>` into a declaration. Returns false if the
/// declaration already declares settings.
fn bind(lines: &mut Vec<String>, decl: &Declaration, variable: &str) -> bool {
    let body = &lines[decl.header..=decl.end];
    if body.iter().any(|l| l.trim_start().starts_with("appSettings:")) {
        return false;
    }

    let properties = (decl.header + 1..decl.end).find(|&i| is_properties_opener(&lines[i]));
    match properties {
        Some(i) if lines[i].trim_end().ends_with('}') => {
            let indent = indentation(&lines[i]).to_string();
            lines[i] = format!("{indent}properties: {{");
            lines.insert(i + 1, format!("{indent}  appSettings: {variable}"));
            lines.insert(i + 2, format!("{indent}}}"));
        }
        Some(i) => {
            let indent = format!("{}  ", indentation(&lines[i]));
            lines.insert(i + 1, format!("{indent}appSettings: {variable}"));
        }
        None => {
            let indent = lines
                .get(decl.header + 1)
                .map(|l| indentation(l).to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "  ".to_string());
            let block = [
                format!("{indent}properties: {{"),
                format!("{indent}  appSettings: {variable}"),
                format!("{indent}}}"),
            ];
            for (offset, line) in block.into_iter().enumerate() {
                lines.insert(decl.end + offset, line);
            }
        }
    }
    true
}

/// Emit settings blocks and bind them to their site configuration.
#[must_use]
pub fn inject(
    text: &str,
    settings_by_component: &BTreeMap<String, Vec<ConfigSetting>>,
    policy: &SettingsPolicy,
) -> InjectOutcome {
    let mut lines = split_lines(text);
    ensure_environment_parameter(&mut lines, policy.environment_parameter());

    let mut bound = Vec::new();
    let mut ambiguities = Vec::new();

    for (component, settings) in settings_by_component {
        let emitted: Vec<&ConfigSetting> = settings.iter().filter(|s| !s.suppressed).collect();
        if emitted.is_empty() {
            continue;
        }
        let variable = settings_variable(component);

        let exists = scan(lines.as_slice())
            .iter()
            .any(|d| d.kind == DeclarationKind::Var && d.identifier == variable);
        if !exists {
            while lines.last().is_some_and(|l| l.trim().is_empty()) {
                lines.pop();
            }
            lines.push(String::new());
            lines.extend(settings_block(&variable, &emitted, policy));
        }

        match find_config_declaration(&lines, component) {
            Ok(decl) => {
                if bind(&mut lines, &decl, &variable) {
                    tracing::debug!("Bound {variable} to {}", decl.identifier);
                } else {
                    tracing::debug!("{} already declares appSettings", decl.identifier);
                }
                bound.push(component.clone());
            }
            Err(detail) => {
                ambiguities.push(Ambiguity::new(AmbiguityKind::Settings, component.clone(), detail));
            }
        }
    }

    InjectOutcome {
        text: join_lines(&lines),
        bound,
        ambiguities,
    }
}
