//! The `rules` command: print the tables a run would apply.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use serde_json::json;

use super::CliConfig;
use crate::config::RgcloneConfig;

#[derive(Clone, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable tables
    Text,
    /// One JSON document
    Json,
}

/// Show the effective exclusion, strip and uniqueness tables.
#[derive(Args, Debug)]
pub struct RulesCommand {
    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

impl RulesCommand {
    pub async fn execute(self, config: &CliConfig) -> Result<()> {
        let settings = config.load_config().await?;
        let rendered = match self.format {
            OutputFormat::Text => render_text(&settings)?,
            OutputFormat::Json => render_json(&settings)?,
        };
        print!("{rendered}");
        Ok(())
    }
}

fn render_json(config: &RgcloneConfig) -> Result<String> {
    let rules = config.rule_set()?;
    let exclusions: Vec<_> = rules.exclusions.iter().map(|r| r.spec()).collect();
    let strips: Vec<_> = rules.strips.iter().map(|r| r.spec()).collect();
    let document = json!({
        "exclusions": exclusions,
        "strip": strips,
        "uniqueness": config.uniqueness_table(),
    });
    let mut text = serde_json::to_string_pretty(&document)?;
    text.push('\n');
    Ok(text)
}

fn render_text(config: &RgcloneConfig) -> Result<String> {
    let rules = config.rule_set()?;
    let mut out = String::new();

    out.push_str(&format!("{}\n", "Exclusions".bold()));
    for rule in &rules.exclusions {
        let spec = rule.spec();
        out.push_str(&format!("  {:<28} {}\n", spec.id.cyan(), spec.type_pattern));
        if let Some(name) = &spec.name {
            out.push_str(&format!("  {:<28} name: {name}\n", ""));
        }
        if let Some(when) = &spec.when {
            out.push_str(&format!("  {:<28} when: {} == {}\n", "", when.path, when.equals));
        }
    }

    out.push_str(&format!("\n{}\n", "Strip".bold()));
    for rule in &rules.strips {
        let spec = rule.spec();
        let scope = match (&spec.type_pattern, spec.min_depth) {
            (Some(t), Some(d)) => format!("{t} (depth >= {d})"),
            (Some(t), None) => t.clone(),
            (None, Some(d)) => format!("any type (depth >= {d})"),
            (None, None) => "any type".to_string(),
        };
        out.push_str(&format!("  {:<28} {scope}: {}\n", spec.id.cyan(), spec.remove.join(", ")));
    }

    out.push_str(&format!("\n{}\n", "Uniqueness".bold()));
    for (resource_type, policy) in config.uniqueness_table().iter() {
        let unique = if policy.force_unique { "force unique" } else { "group unique" };
        out.push_str(&format!("  {resource_type:<44} max {:>3}  {unique}\n", policy.max_length));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_lists_builtin_tables() {
        let text = render_json(&RgcloneConfig::default()).unwrap();
        let document: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert!(
            document["exclusions"]
                .as_array()
                .unwrap()
                .iter()
                .any(|r| r["id"] == "vault-secret-values")
        );
        assert!(document["strip"].as_array().unwrap().iter().any(|r| r["id"] == "provisioning-state"));
        assert_eq!(document["uniqueness"]["Microsoft.Storage/storageAccounts"]["max_length"], 24);
    }

    #[test]
    fn test_text_has_all_sections() {
        colored::control::set_override(false);
        let text = render_text(&RgcloneConfig::default()).unwrap();
        assert!(text.contains("Exclusions\n"));
        assert!(text.contains("\nStrip\n"));
        assert!(text.contains("\nUniqueness\n"));
        assert!(text.contains("gateway-master-subscription"));
    }
}
