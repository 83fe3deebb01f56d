//! Responses API and upstream provider configuration.

use indexmap::IndexMap;
use secrecy::SecretString;
use serde::Deserialize;
use serde_dynamic_string::DynamicString;
use url::Url;

/// Configuration for the Responses API surface and the providers it drives.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResponsesConfig {
    /// Maximum number of tool-calling turns allowed in a single request.
    ///
    /// Overridable with `MASAIC_MAX_TOOL_CALLS`.
    pub max_tool_calls: u32,
    /// Wall-clock budget, in milliseconds, for a single streaming response.
    ///
    /// Overridable with `MASAIC_MAX_STREAMING_TIMEOUT`.
    pub max_streaming_timeout_ms: u64,
    /// Upstream providers, keyed by the tag used in `provider@model` routing.
    pub providers: IndexMap<String, ProviderConfig>,
}

impl Default for ResponsesConfig {
    fn default() -> Self {
        Self {
            max_tool_calls: 10,
            max_streaming_timeout_ms: 60_000,
            providers: IndexMap::new(),
        }
    }
}

/// A single upstream, OpenAI-wire-compatible Chat Completions provider.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderConfig {
    /// Base URL of the provider's Chat Completions endpoint.
    pub base_url: Url,
    /// API key sent as a bearer token, expanded from `{{ env.VAR }}` if templated.
    pub api_key: Option<DynamicString<String>>,
    /// Static headers injected into every outbound request to this provider.
    pub headers: Vec<HeaderRule>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse("http://localhost").expect("default URL should be valid"),
            api_key: None,
            headers: Vec::new(),
        }
    }
}

impl ProviderConfig {
    /// The API key as a secret, ready to use as a bearer token.
    pub fn api_key(&self) -> Option<SecretString> {
        self.api_key.clone().map(|key| SecretString::from(key.into_inner()))
    }
}

/// A static header to attach to outbound provider requests.
#[derive(Debug, Clone, Deserialize)]
pub struct HeaderRule {
    /// Header name.
    pub name: String,
    /// Header value, expanded from `{{ env.VAR }}` if templated.
    pub value: DynamicString<String>,
}
