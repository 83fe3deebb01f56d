//! Provider Router (C1) + the single generic Chat-Completions HTTP client
//! every configured upstream speaks.

use std::time::Duration;

use config::ProviderConfig;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::error::{GatewayError, Result};
use crate::wire::chat::{ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse, ModelsResponse};

/// Recognised provider tags and their default base URLs (§4.1).
const BUILTIN_PROVIDERS: &[(&str, &str)] = &[
    ("openai", "https://api.openai.com/v1"),
    ("anthropic", "https://api.anthropic.com/v1"),
    ("claude", "https://api.anthropic.com/v1"),
    ("groq", "https://api.groq.com/openai/v1"),
    ("togetherai", "https://api.together.xyz/v1"),
    ("cohere", "https://api.cohere.ai/compatibility/v1"),
];

const DEFAULT_PROVIDER: &str = "openai";

/// The resolved upstream for one request: where to send it, under what
/// model name, and which credential to use.
pub(crate) struct ResolvedProvider {
    pub tag: String,
    pub base_url: Url,
    pub model: String,
    pub api_key: SecretString,
}

/// Derives `(base_url, provider_tag, model)` per §4.1's priority order:
/// `provider@model` prefix, then full URL prefix, then `x-model-provider`
/// header, then the built-in default. The API key resolves in order:
/// server-side `ProviderConfig.api_key`, then `forward_key` (the inbound
/// `Authorization: Bearer` value), then the provider's `{TAG}_API_KEY`
/// environment variable, consulted only when neither of the above is set.
pub(crate) fn resolve(
    model: &str,
    header_provider: Option<&str>,
    configured: &indexmap::IndexMap<String, ProviderConfig>,
    forward_key: Option<SecretString>,
) -> Result<ResolvedProvider> {
    let (tag, model) = split_provider_prefix(model)
        .or_else(|| header_provider.map(|tag| (tag.to_lowercase(), model.to_string())))
        .unwrap_or_else(|| (DEFAULT_PROVIDER.to_string(), model.to_string()));

    let base_url = match configured.get(&tag) {
        Some(provider_config) => provider_config.base_url.clone(),
        None => default_base_url(&tag)?,
    };

    let api_key = configured
        .get(&tag)
        .and_then(ProviderConfig::api_key)
        .or(forward_key)
        .or_else(|| provider_api_key_env_var(&tag).and_then(|var| std::env::var(var).ok()).map(SecretString::from))
        .ok_or_else(|| GatewayError::InvalidConfiguration("no Authorization header and no server-side api_key configured".to_string()))?;

    Ok(ResolvedProvider { tag, base_url, model, api_key })
}

/// Per-provider API key env var, consulted only when neither a server-side
/// `ProviderConfig.api_key` nor a forwarded `Authorization: Bearer` header
/// supplied one (e.g. `openai` -> `OPENAI_API_KEY`).
fn provider_api_key_env_var(tag: &str) -> Option<String> {
    if tag.starts_with("http://") || tag.starts_with("https://") {
        return None;
    }

    Some(format!("{}_API_KEY", tag.to_uppercase()))
}

/// `http(s)://host/path@model` or `provider@model`; an `@` with a preceding
/// scheme is treated as a full URL prefix (base_url embedded directly),
/// otherwise as a `provider@model` tag.
fn split_provider_prefix(model: &str) -> Option<(String, String)> {
    let (prefix, rest) = model.split_once('@')?;
    if prefix.starts_with("http://") || prefix.starts_with("https://") {
        // The prefix is itself a full base URL; the provider tag is synthesised
        // from its host so existing ProviderConfig entries still resolve by tag.
        Some((prefix.to_string(), rest.to_string()))
    } else {
        Some((prefix.to_lowercase(), rest.to_string()))
    }
}

fn default_base_url(tag: &str) -> Result<Url> {
    if tag.starts_with("http://") || tag.starts_with("https://") {
        return Url::parse(tag).map_err(|e| GatewayError::InvalidConfiguration(format!("invalid provider URL prefix '{tag}': {e}")));
    }

    BUILTIN_PROVIDERS
        .iter()
        .find(|(name, _)| *name == tag)
        .map(|(_, url)| Url::parse(url).expect("builtin provider URL is valid"))
        .or_else(|| BUILTIN_PROVIDERS.iter().find(|(name, _)| *name == DEFAULT_PROVIDER).map(|(_, url)| Url::parse(url).unwrap()))
        .ok_or_else(|| GatewayError::InvalidConfiguration(format!("unknown provider '{tag}'")))
}

/// Thin HTTP client over one upstream's `/chat/completions` and `/models`
/// endpoints. Every configured provider speaks the same OpenAI-compatible
/// wire dialect, so one implementation suffices.
pub(crate) struct ChatCompletionsProvider {
    client: Client,
}

impl ChatCompletionsProvider {
    pub fn new() -> Self {
        Self { client: Client::builder().timeout(Duration::from_secs(120)).build().expect("reqwest client should build") }
    }

    pub async fn chat_completion(&self, provider: &ResolvedProvider, mut request: ChatCompletionRequest) -> Result<ChatCompletionResponse> {
        request.model = provider.model.clone();
        request.stream = Some(false);

        let url = join_path(&provider.base_url, "chat/completions");
        let response = self
            .client
            .post(url)
            .bearer_auth(provider.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| GatewayError::GenerationError(format!("upstream request failed: {e}")))?;

        map_http_error(response.status())?;

        response
            .json::<ChatCompletionResponse>()
            .await
            .map_err(|e| GatewayError::GenerationError(format!("failed to parse upstream response: {e}")))
    }

    pub async fn chat_completion_stream(
        &self,
        provider: &ResolvedProvider,
        mut request: ChatCompletionRequest,
    ) -> Result<impl futures::Stream<Item = Result<ChatCompletionChunk>> + use<>> {
        use eventsource_stream::Eventsource;
        use futures::StreamExt;

        request.model = provider.model.clone();
        request.stream = Some(true);

        let url = join_path(&provider.base_url, "chat/completions");
        let response = self
            .client
            .post(url)
            .bearer_auth(provider.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| GatewayError::GenerationError(format!("upstream request failed: {e}")))?;

        map_http_error(response.status())?;

        let stream = response.bytes_stream().eventsource().filter_map(|event| async move {
            match event {
                Ok(event) if event.data == "[DONE]" => None,
                Ok(event) => Some(
                    serde_json::from_str::<ChatCompletionChunk>(&event.data)
                        .map_err(|e| GatewayError::GenerationError(format!("malformed upstream chunk: {e}"))),
                ),
                Err(e) => Some(Err(GatewayError::GenerationError(format!("upstream stream error: {e}")))),
            }
        });

        Ok(stream)
    }

    pub async fn list_models(&self, provider: &ResolvedProvider) -> Result<ModelsResponse> {
        let url = join_path(&provider.base_url, "models");
        let response = self
            .client
            .get(url)
            .bearer_auth(provider.api_key.expose_secret())
            .send()
            .await
            .map_err(|e| GatewayError::GenerationError(format!("upstream request failed: {e}")))?;

        map_http_error(response.status())?;

        response
            .json::<ModelsResponse>()
            .await
            .map_err(|e| GatewayError::GenerationError(format!("failed to parse upstream models response: {e}")))
    }
}

impl Default for ChatCompletionsProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn join_path(base: &Url, path: &str) -> Url {
    let mut url = base.clone();
    let joined = format!("{}/{path}", url.path().trim_end_matches('/'));
    url.set_path(&joined);
    url
}

fn map_http_error(status: reqwest::StatusCode) -> Result<()> {
    match status.as_u16() {
        200..=299 => Ok(()),
        401 | 403 => Err(GatewayError::InvalidConfiguration(format!("upstream rejected credentials (status {status})"))),
        404 => Err(GatewayError::NotFound(format!("upstream endpoint not found (status {status})"))),
        429 => Err(GatewayError::RateLimitExceeded(format!("upstream rate limit (status {status})"))),
        400 | 422 => Err(GatewayError::InvalidRequest(format!("upstream rejected request (status {status})"))),
        500..=599 => Err(GatewayError::GenerationError(format!("upstream server error (status {status})"))),
        _ => Err(GatewayError::GenerationError(format!("unexpected upstream status {status}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    #[test]
    fn provider_at_model_prefix_is_split() {
        assert_eq!(split_provider_prefix("groq@llama-3"), Some(("groq".to_string(), "llama-3".to_string())));
    }

    #[test]
    fn no_prefix_yields_none() {
        assert_eq!(split_provider_prefix("gpt-4o"), None);
    }

    #[test]
    fn unconfigured_known_provider_resolves_default_url() {
        let configured = IndexMap::new();
        let resolved = resolve("groq@llama-3", None, &configured, Some(SecretString::from("sk-test"))).unwrap();
        assert_eq!(resolved.tag, "groq");
        assert_eq!(resolved.base_url.as_str(), "https://api.groq.com/openai/v1");
        assert_eq!(resolved.model, "llama-3");
    }

    #[test]
    fn missing_auth_is_invalid_configuration() {
        temp_env::with_var_unset("OPENAI_API_KEY", || {
            let configured = IndexMap::new();
            let result = resolve("gpt-4o", None, &configured, None);
            assert!(matches!(result, Err(GatewayError::InvalidConfiguration(_))));
        });
    }

    #[test]
    fn header_hint_selects_provider() {
        let configured = IndexMap::new();
        let resolved = resolve("llama-3", Some("groq"), &configured, Some(SecretString::from("sk-test"))).unwrap();
        assert_eq!(resolved.tag, "groq");
    }

    #[test]
    fn falls_back_to_provider_env_var_when_no_auth_header() {
        temp_env::with_var("OPENAI_API_KEY", Some("sk-from-env"), || {
            let configured = IndexMap::new();
            let resolved = resolve("gpt-4o", None, &configured, None).unwrap();
            assert_eq!(resolved.api_key.expose_secret(), "sk-from-env");
        });
    }

    #[test]
    fn forwarded_header_takes_priority_over_env_var() {
        temp_env::with_var("OPENAI_API_KEY", Some("sk-from-env"), || {
            let configured = IndexMap::new();
            let resolved = resolve("gpt-4o", None, &configured, Some(SecretString::from("sk-from-header"))).unwrap();
            assert_eq!(resolved.api_key.expose_secret(), "sk-from-header");
        });
    }
}
