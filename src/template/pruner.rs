//! Unused-parameter pruner.

use super::scanner::{DeclarationKind, join_lines, references_identifier, scan, split_lines};

/// Result of [`prune`].
#[derive(Debug, Clone)]
pub struct PruneOutcome {
    /// Text without unused parameter declarations
    pub text: String,
    /// Names of the removed parameters, in removal order
    pub pruned: Vec<String>,
}

/// Remove parameter declarations that nothing references.
///
/// A parameter is unused when its name occurs nowhere outside its own
/// declaration (decorators and multi-line defaults included). Removal repeats
/// until nothing changes, since dropping one declaration can orphan a
/// parameter only its default referenced. `keep` is never removed.
#[must_use]
pub fn prune(text: &str, keep: &str) -> PruneOutcome {
    let mut lines = split_lines(text);
    let mut pruned = Vec::new();

    loop {
        let declarations = scan(lines.as_slice());
        let unused = declarations.iter().filter(|d| d.kind == DeclarationKind::Param).find(|d| {
            d.identifier != keep
                && !lines
                    .iter()
                    .enumerate()
                    .any(|(i, line)| !d.contains(i) && references_identifier(line, &d.identifier))
        });
        let Some(decl) = unused else {
            break;
        };

        tracing::debug!("Pruning unused parameter {}", decl.identifier);
        pruned.push(decl.identifier.clone());
        let mut end = decl.end;
        let previous_blank = decl.start == 0 || lines[decl.start - 1].trim().is_empty();
        if previous_blank && lines.get(end + 1).is_some_and(|l| l.trim().is_empty()) {
            end += 1;
        }
        lines.drain(decl.start..=end);
    }

    if !pruned.is_empty() {
        tracing::info!("Pruned {} unused parameters", pruned.len());
    }

    PruneOutcome {
        text: join_lines(&lines),
        pruned,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prune_removes_unused_with_decorators() {
        let text = "\
@description('unused')
@allowed([
  'a'
])
param unused string = 'a'
param used string
param environmentName string

resource r 'Microsoft.Storage/storageAccounts@2023-01-01' = {
  name: used
  location: 'eastus'
}
";
        let outcome = prune(text, "environmentName");
        assert_eq!(outcome.pruned, vec!["unused".to_string()]);
        assert!(outcome.text.starts_with("param used string\nparam environmentName string\n"));
    }

    #[test]
    fn test_prune_ignores_object_keys() {
        let text = "param location string\n\nresource r 'T@1' = {\n  location: 'eastus'\n}\n";
        let outcome = prune(text, "environmentName");
        assert_eq!(outcome.pruned, vec!["location".to_string()]);
        assert_eq!(outcome.text, "resource r 'T@1' = {\n  location: 'eastus'\n}\n");
    }

    #[test]
    fn test_prune_cascades_through_defaults() {
        let text = "param base string = 'x'\nparam derived string = '${base}-y'\n";
        let outcome = prune(text, "environmentName");
        assert_eq!(outcome.pruned, vec!["derived".to_string(), "base".to_string()]);
    }

    #[test]
    fn test_prune_keeps_environment_parameter() {
        let text = "param environmentName string\n";
        let outcome = prune(text, "environmentName");
        assert!(outcome.pruned.is_empty());
        assert_eq!(outcome.text, text);
    }
}
