use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

fn env_var_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\$\{([^}]+)\}").ok())
        .as_ref()
}

/// Expand `${VAR_NAME}` references using `lookup`. Unknown variables are
/// left as written.
pub fn expand_env_var_in_string_with<F>(value: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let Some(pattern) = env_var_pattern() else {
        return value.to_string();
    };

    pattern
        .replace_all(value, |caps: &regex::Captures<'_>| {
            lookup(&caps[1]).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Expand environment variables in a string using ${VAR_NAME} syntax
pub fn expand_env_var_in_string(value: &str) -> String {
    expand_env_var_in_string_with(value, |name| std::env::var(name).ok())
}

/// Expand environment variables in every value of a HashMap
pub fn expand_env_vars<F>(env: &HashMap<String, String>, lookup: F) -> HashMap<String, String>
where
    F: Fn(&str) -> Option<String>,
{
    env.iter()
        .map(|(key, value)| (key.clone(), expand_env_var_in_string_with(value, &lookup)))
        .collect()
}
