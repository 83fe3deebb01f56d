use std::fmt::Write;
use std::{path::Path, str::FromStr};

use anyhow::bail;
use indoc::indoc;
use serde::Deserialize;
use serde_dynamic_string::DynamicString;
use toml::Value;

use crate::Config;

const MAX_TOOL_CALLS_ENV: &str = "MASAIC_MAX_TOOL_CALLS";
const MAX_STREAMING_TIMEOUT_ENV: &str = "MASAIC_MAX_STREAMING_TIMEOUT";

/// Reads a TOML file, expands `{{ env.VAR }}` secret placeholders, and
/// deserializes + validates the result into a [`Config`].
pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
    let path = path.as_ref().to_path_buf();
    let content = std::fs::read_to_string(&path)?;
    let mut raw_config: Value = toml::from_str(&content)?;

    expand_dynamic_strings(&mut Vec::new(), &mut raw_config)?;

    let mut config = Config::deserialize(raw_config)?;
    apply_env_overrides(&mut config)?;
    validate_has_providers(&config)?;

    Ok(config)
}

/// Applies the `MASAIC_*` environment overrides documented on
/// [`crate::ResponsesConfig`] on top of whatever the TOML file specified.
pub(crate) fn apply_env_overrides(config: &mut Config) -> anyhow::Result<()> {
    if let Ok(raw) = std::env::var(MAX_TOOL_CALLS_ENV) {
        config.responses.max_tool_calls = raw
            .parse()
            .map_err(|_| anyhow::anyhow!("{MAX_TOOL_CALLS_ENV} must be a non-negative integer, got '{raw}'"))?;
    }

    if let Ok(raw) = std::env::var(MAX_STREAMING_TIMEOUT_ENV) {
        config.responses.max_streaming_timeout_ms = raw
            .parse()
            .map_err(|_| anyhow::anyhow!("{MAX_STREAMING_TIMEOUT_ENV} must be a non-negative integer, got '{raw}'"))?;
    }

    Ok(())
}

pub(crate) fn validate_has_providers(config: &Config) -> anyhow::Result<()> {
    if config.responses.providers.is_empty() {
        bail!(indoc! {r#"
            No upstream providers configured. Meridian requires at least one Chat
            Completions provider to function.

            Example configuration:

              [responses.providers.openai]
              base_url = "https://api.openai.com/v1"
              api_key = "{{ env.OPENAI_API_KEY }}"
        "#});
    }

    Ok(())
}

fn expand_dynamic_strings<'a>(path: &mut Vec<Result<&'a str, usize>>, value: &'a mut Value) -> anyhow::Result<()> {
    match value {
        Value::String(s) => match DynamicString::<String>::from_str(s) {
            Ok(out) => *s = out.into_inner(),
            Err(err) => {
                let mut p = String::new();

                for segment in path.iter() {
                    match segment {
                        Ok(s) => {
                            p.push_str(s);
                            p.push('.');
                        }
                        Err(i) => write!(p, "[{i}]").unwrap(),
                    }
                }

                if p.ends_with('.') {
                    p.pop();
                }

                bail!("Failed to expand dynamic string at path '{p}': {err}");
            }
        },
        Value::Array(values) => {
            for (i, value) in values.iter_mut().enumerate() {
                path.push(Err(i));
                expand_dynamic_strings(path, value)?;
                path.pop();
            }
        }
        Value::Table(map) => {
            for (key, value) in map {
                path.push(Ok(key.as_str()));
                expand_dynamic_strings(path, value)?;
                path.pop();
            }
        }
        Value::Integer(_) | Value::Float(_) | Value::Boolean(_) | Value::Datetime(_) => (),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use insta::assert_snapshot;

    use super::*;

    #[test]
    fn rejects_config_with_no_providers() {
        let config: Config = toml::from_str("").unwrap();
        let err = validate_has_providers(&config).unwrap_err();
        assert!(err.to_string().contains("No upstream providers configured"));
    }

    #[test]
    fn accepts_config_with_a_provider() {
        let config: Config = toml::from_str(indoc! {r#"
            [responses.providers.openai]
            base_url = "https://api.openai.com/v1"
        "#})
        .unwrap();

        assert!(validate_has_providers(&config).is_ok());
    }

    #[test]
    fn expands_env_var_inside_a_table() {
        temp_env::with_var("MERIDIAN_TEST_LOADER_KEY", Some("sk-test-123"), || {
            let mut value: Value = toml::from_str(indoc! {r#"
                [responses.providers.openai]
                base_url = "https://api.openai.com/v1"
                api_key = "{{ env.MERIDIAN_TEST_LOADER_KEY }}"
            "#})
            .unwrap();

            expand_dynamic_strings(&mut Vec::new(), &mut value).unwrap();

            let expanded = value["responses"]["providers"]["openai"]["api_key"].as_str().unwrap();
            assert_snapshot!(expanded, @"sk-test-123");
        });
    }

    #[test]
    fn env_overrides_max_tool_calls_and_streaming_timeout() {
        temp_env::with_vars(
            [(MAX_TOOL_CALLS_ENV, Some("25")), (MAX_STREAMING_TIMEOUT_ENV, Some("120000"))],
            || {
                let mut config: Config = toml::from_str("").unwrap();
                apply_env_overrides(&mut config).unwrap();

                assert_eq!(config.responses.max_tool_calls, 25);
                assert_eq!(config.responses.max_streaming_timeout_ms, 120_000);
            },
        );
    }

    #[test]
    fn invalid_env_override_is_rejected() {
        temp_env::with_var(MAX_TOOL_CALLS_ENV, Some("not-a-number"), || {
            let mut config: Config = toml::from_str("").unwrap();
            let err = apply_env_overrides(&mut config).unwrap_err();
            assert!(err.to_string().contains(MAX_TOOL_CALLS_ENV));
        });
    }

    #[test]
    fn fails_on_missing_env_var_with_a_path() {
        temp_env::with_var_unset("MERIDIAN_TEST_LOADER_MISSING", || {
            let mut value: Value = toml::from_str(indoc! {r#"
                [responses.providers.openai]
                base_url = "https://api.openai.com/v1"
                api_key = "{{ env.MERIDIAN_TEST_LOADER_MISSING }}"
            "#})
            .unwrap();

            let err = expand_dynamic_strings(&mut Vec::new(), &mut value).unwrap_err();
            assert!(err.to_string().contains("responses.providers.openai.api_key"));
        });
    }
}
