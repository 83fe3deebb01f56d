//! A small `FromStr`/`Deserialize` wrapper that expands `{{ env.VAR_NAME }}`
//! placeholders against the process environment, so configuration files can
//! reference secrets without inlining them.

use std::{fmt, str::FromStr, sync::LazyLock};

use itertools::Itertools;
use regex::Regex;
use serde_with::DeserializeFromStr;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{\{\s*env\.([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").unwrap());

/// Wraps a value parsed via [`FromStr`] after expanding any `{{ env.VAR }}`
/// placeholders found in the source string.
#[derive(Debug, Clone, DeserializeFromStr)]
pub struct DynamicString<T>(T);

impl<T> DynamicString<T> {
    /// Unwraps the expanded inner value.
    pub fn into_inner(self) -> T {
        self.0
    }
}

/// Error returned when a placeholder references a variable that is not set.
#[derive(Debug, thiserror::Error)]
pub enum ExpandError {
    /// A `{{ env.VAR }}` placeholder referenced a variable that isn't set.
    #[error("environment variable '{0}' is not set")]
    MissingVar(String),
}

impl<T> FromStr for DynamicString<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let expanded = expand(s).map_err(|e| e.to_string())?;

        expanded
            .parse::<T>()
            .map(DynamicString)
            .map_err(|e| format!("failed to parse expanded value: {e}"))
    }
}

fn expand(input: &str) -> Result<String, ExpandError> {
    if !input.contains("{{") {
        return Ok(input.to_string());
    }

    let mut missing = None;

    let expanded = PLACEHOLDER
        .replace_all(input, |caps: &regex::Captures<'_>| {
            let var = &caps[1];

            match std::env::var(var) {
                Ok(value) => value,
                Err(_) => {
                    missing.get_or_insert_with(|| var.to_string());
                    String::new()
                }
            }
        })
        .into_owned();

    if let Some(var) = missing {
        return Err(ExpandError::MissingVar(var));
    }

    Ok(expanded)
}

/// Like [`expand`] but joins an iterator of fragments, kept for parity with
/// call sites that build up templated strings piecewise.
pub fn expand_joined<I: IntoIterator<Item = String>>(fragments: I) -> Result<String, ExpandError> {
    expand(&fragments.into_iter().join(""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_known_variable() {
        temp_env::with_var("DYNAMIC_STRING_TEST_VAR", Some("secret-value"), || {
            let parsed: DynamicString<String> = "{{ env.DYNAMIC_STRING_TEST_VAR }}".parse().unwrap();
            assert_eq!(parsed.into_inner(), "secret-value");
        });
    }

    #[test]
    fn passes_through_plain_strings() {
        let parsed: DynamicString<String> = "plain-value".parse().unwrap();
        assert_eq!(parsed.into_inner(), "plain-value");
    }

    #[test]
    fn fails_on_missing_variable() {
        temp_env::with_var_unset("DYNAMIC_STRING_MISSING_VAR", || {
            let result: Result<DynamicString<String>, _> = "{{ env.DYNAMIC_STRING_MISSING_VAR }}".parse();
            assert!(result.is_err());
        });
    }

    #[test]
    fn expands_inside_a_larger_string() {
        temp_env::with_var("DYNAMIC_STRING_HOST_VAR", Some("example.com"), || {
            let parsed: DynamicString<String> = "https://{{ env.DYNAMIC_STRING_HOST_VAR }}/v1".parse().unwrap();
            assert_eq!(parsed.into_inner(), "https://example.com/v1");
        });
    }
}
