//! Environment-name tokens inside resource names and setting values.
//!
//! An environment name counts as present only when it forms a whole token:
//! bounded on both sides by a non-alphanumeric character or the string edge.
//! `app-dev-api` contains the token `dev`; `devstorage123` and `devops` do not.
//! Matching is ASCII case-insensitive.

/// Byte ranges of every whole-token occurrence of `env` in `value`.
fn token_ranges(value: &str, env: &str) -> Vec<(usize, usize)> {
    if env.is_empty() || env.len() > value.len() {
        return Vec::new();
    }

    let haystack = value.to_ascii_lowercase();
    let needle = env.to_ascii_lowercase();
    let bytes = haystack.as_bytes();
    let mut ranges = Vec::new();
    let mut start = 0;

    while let Some(offset) = haystack[start..].find(&needle) {
        let begin = start + offset;
        let end = begin + needle.len();
        let bounded_left = begin == 0 || !bytes[begin - 1].is_ascii_alphanumeric();
        let bounded_right = end == bytes.len() || !bytes[end].is_ascii_alphanumeric();

        if bounded_left && bounded_right {
            ranges.push((begin, end));
            start = end;
        } else {
            start = begin + 1;
        }

        while start < haystack.len() && !haystack.is_char_boundary(start) {
            start += 1;
        }
        if start >= haystack.len() {
            break;
        }
    }

    ranges
}

/// Whether `value` contains `env` as a whole token.
#[must_use]
pub fn contains_env_token(value: &str, env: &str) -> bool {
    !token_ranges(value, env).is_empty()
}

/// Replace every whole-token occurrence of `env` in `value` with `replacement`.
///
/// # Examples
///
/// ```rust
/// use rgclone::core::env_token::replace_env_token;
///
/// assert_eq!(replace_env_token("app-dev-api", "dev", "sit"), "app-sit-api");
/// assert_eq!(replace_env_token("devstorage123", "dev", "sit"), "devstorage123");
/// ```
#[must_use]
pub fn replace_env_token(value: &str, env: &str, replacement: &str) -> String {
    let ranges = token_ranges(value, env);
    if ranges.is_empty() {
        return value.to_string();
    }

    let mut result = String::with_capacity(value.len());
    let mut cursor = 0;
    for (begin, end) in ranges {
        result.push_str(&value[cursor..begin]);
        result.push_str(replacement);
        cursor = end;
    }
    result.push_str(&value[cursor..]);
    result
}

/// Normalize a resource name into the identifier form the decompiler uses.
///
/// Every character that is not ASCII alphanumeric or `_` becomes `_`.
/// `app-dev.api` becomes `app_dev_api`.
#[must_use]
pub fn normalize_identifier(name: &str) -> String {
    name.chars().map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' }).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_replacement_respects_boundaries() {
        assert_eq!(replace_env_token("app-dev-api", "dev", "sit"), "app-sit-api");
        assert_eq!(replace_env_token("dev", "dev", "sit"), "sit");
        assert_eq!(replace_env_token("kv_dev", "dev", "sit"), "kv_sit");
        assert_eq!(replace_env_token("devops-dev", "dev", "sit"), "devops-sit");
        assert_eq!(replace_env_token("devstorage123", "dev", "sit"), "devstorage123");
    }

    #[test]
    fn test_token_replacement_is_case_insensitive() {
        assert_eq!(replace_env_token("App-DEV-Api", "dev", "sit"), "App-sit-Api");
        assert!(contains_env_token("https://api-Dev.example.com", "dev"));
    }

    #[test]
    fn test_multiple_occurrences() {
        assert_eq!(
            replace_env_token("https://dev.app-dev.net/dev", "dev", "sit"),
            "https://sit.app-sit.net/sit"
        );
    }

    #[test]
    fn test_empty_env_is_noop() {
        assert_eq!(replace_env_token("app-dev", "", "sit"), "app-dev");
        assert!(!contains_env_token("app-dev", ""));
    }

    #[test]
    fn test_non_ascii_values() {
        assert_eq!(replace_env_token("naïve-dev", "dev", "sit"), "naïve-sit");
        assert!(!contains_env_token("développement", "dev"));
    }

    #[test]
    fn test_normalize_identifier() {
        assert_eq!(normalize_identifier("app-dev.api"), "app_dev_api");
        assert_eq!(normalize_identifier("vnet/subnetA"), "vnet_subnetA");
    }
}
