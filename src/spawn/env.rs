// src/spawn/env.rs

use std::collections::BTreeMap;

use regex::Regex;
use tracing::trace;

/// Copy of `env` without the ignored keys.
///
/// Windows environment keys are case-insensitive, so there the comparison
/// is too.
pub fn filter_environment(
    env: &BTreeMap<String, String>,
    ignored: &[String],
) -> BTreeMap<String, String> {
    env.iter()
        .filter(|(key, _)| {
            let skip = is_ignored(key, ignored);
            if skip {
                trace!(key = %key, "dropping ignored environment variable");
            }
            !skip
        })
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn is_ignored(key: &str, ignored: &[String]) -> bool {
    ignored.iter().any(|ignored| {
        if cfg!(windows) {
            ignored.eq_ignore_ascii_case(key)
        } else {
            ignored == key
        }
    })
}

/// Expand `{NAME}` placeholders in `value` from `env`.
///
/// Unknown names expand to an empty string, so `"/opt/bin:{PATH}"` works
/// whether or not `PATH` is already set.
pub fn expand_placeholders(value: &str, env: &BTreeMap<String, String>) -> String {
    let Ok(placeholder) = Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}") else {
        return value.to_string();
    };
    placeholder
        .replace_all(value, |caps: &regex::Captures<'_>| {
            env.get(&caps[1]).cloned().unwrap_or_default()
        })
        .into_owned()
}

/// Snapshot of the current process environment, skipping entries that are
/// not valid Unicode.
pub fn current_environment() -> BTreeMap<String, String> {
    std::env::vars_os()
        .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ignored_keys_are_dropped() {
        let env = BTreeMap::from([
            ("QT_API".to_string(), "pyside2".to_string()),
            ("PATH".to_string(), "/usr/bin".to_string()),
        ]);
        let filtered = filter_environment(&env, &["QT_API".to_string()]);
        assert_eq!(filtered.len(), 1);
        assert!(filtered.contains_key("PATH"));
    }

    #[test]
    fn placeholders_expand_from_env() {
        let env = BTreeMap::from([("PATH".to_string(), "/usr/bin".to_string())]);
        assert_eq!(expand_placeholders("/opt/maya/bin:{PATH}", &env), "/opt/maya/bin:/usr/bin");
        assert_eq!(expand_placeholders("{MISSING}x", &env), "x");
        assert_eq!(expand_placeholders("no braces", &env), "no braces");
    }
}
