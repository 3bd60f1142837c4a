//! Duplicate value resolver.
//!
//! Two parameters of the same category (name prefix before the first `_`)
//! that resolve to the same value would be rejected at deployment time. The
//! first one in declaration order keeps its value; every other one gets a
//! value derived from the distinguishing part of its own name. A derived
//! value that is already taken in the category gets a numeric suffix.

use std::collections::HashSet;

use super::{ParameterSet, ResolvedParameter};
use crate::actions::Collision;

fn separator_free(text: &str) -> String {
    text.chars().filter(char::is_ascii_alphanumeric).flat_map(|c| c.to_lowercase()).collect()
}

/// Distinguishing suffix of a parameter name: the part after the category
/// prefix, without a trailing `_name`, lower-cased and separator-free.
fn derived_value(parameter: &ResolvedParameter) -> String {
    let name = parameter.name.as_str();
    let rest = name.split_once('_').map_or("", |(_, rest)| rest);
    let rest = if rest.to_ascii_lowercase().ends_with("_name") {
        &rest[..rest.len() - "_name".len()]
    } else {
        rest
    };
    let derived = separator_free(rest);
    if derived.is_empty() { separator_free(name) } else { derived }
}

fn fit(base: &str, suffix: &str, max_length: Option<usize>) -> String {
    match max_length {
        Some(max) => {
            let keep = max.saturating_sub(suffix.chars().count());
            format!("{}{suffix}", base.chars().take(keep).collect::<String>())
        }
        None => format!("{base}{suffix}"),
    }
}

fn unique_value(base: &str, taken: &HashSet<String>, max_length: Option<usize>) -> String {
    let candidate = fit(base, "", max_length);
    if !taken.contains(&candidate) {
        return candidate;
    }
    (2..)
        .map(|n| fit(base, &n.to_string(), max_length))
        .find(|c| !taken.contains(c))
        .unwrap_or(candidate)
}

/// Rename colliding values so no two parameters of one category share a value.
#[must_use]
pub fn resolve_duplicates(mut set: ParameterSet) -> (ParameterSet, Vec<Collision>) {
    let mut collisions = Vec::new();
    let parameters = &mut set.parameters;

    // Colliding groups in order of first appearance.
    let mut groups: Vec<(String, String, Vec<usize>)> = Vec::new();
    for (i, parameter) in parameters.iter().enumerate() {
        let category = parameter.category().to_string();
        match groups.iter_mut().find(|(v, c, _)| *v == parameter.value && *c == category) {
            Some((_, _, members)) => members.push(i),
            None => groups.push((parameter.value.clone(), category, vec![i])),
        }
    }

    for (value, category, members) in groups.into_iter().filter(|(_, _, m)| m.len() > 1) {
        let kept = parameters[members[0]].name.clone();
        for &index in &members[1..] {
            let taken: HashSet<String> = parameters
                .iter()
                .filter(|p| p.category() == category)
                .map(|p| p.value.clone())
                .collect();
            let max_length = parameters[index].policy.map(|p| p.max_length);
            let renamed_to = unique_value(&derived_value(&parameters[index]), &taken, max_length);

            tracing::warn!(
                "Collision in {category}: {} and {kept} both resolve to '{value}', renaming to '{renamed_to}'",
                parameters[index].name
            );
            collisions.push(Collision {
                category: category.clone(),
                value: value.clone(),
                kept: kept.clone(),
                renamed: parameters[index].name.clone(),
                renamed_to: renamed_to.clone(),
            });
            parameters[index].value = renamed_to;
        }
    }

    (set, collisions)
}
