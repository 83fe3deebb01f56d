//! Per-request context threaded through the orchestrator and telemetry layers.

use axum::http::HeaderMap;
use fastrace::{Span, collector::SpanContext};
use secrecy::SecretString;

use crate::error::{GatewayError, Result};

/// Extra, explicit override for the BYOK key, distinct from the gateway's
/// own `Authorization` header. Rarely needed; kept for parity with the
/// `x-model-provider` header's "hint, not requirement" role.
const PROVIDER_API_KEY_HEADER: &str = "X-Provider-API-Key";

/// BYOK override, propagated trace context, and raw headers for one request.
#[derive(Debug, Clone, Default)]
pub(crate) struct RequestContext {
    pub api_key: Option<SecretString>,
    pub headers: HeaderMap,
    pub span_context: Option<SpanContext>,
}

impl RequestContext {
    pub fn new_span(&self, name: &'static str) -> Span {
        match self.span_context {
            Some(parent) => Span::root(name, parent),
            None => Span::root(name, SpanContext::random()),
        }
    }
}

/// The inbound `Authorization: Bearer <key>` doubles as gateway auth and, in
/// the absence of a server-side `ProviderConfig.api_key`, the forwarded
/// upstream credential (§4.1 BYOK). `X-Provider-API-Key` overrides it when a
/// caller wants to authenticate to the gateway and the upstream differently.
pub(super) fn extract_context(headers: &HeaderMap, span_context: Option<SpanContext>) -> RequestContext {
    let bearer = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|key| SecretString::from(key.to_string()));

    let override_key = headers
        .get(PROVIDER_API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|key| SecretString::from(key.to_string()));

    RequestContext {
        api_key: override_key.or(bearer),
        headers: headers.clone(),
        span_context,
    }
}

/// Response and file endpoints require `Authorization: Bearer <key>` (§6).
pub(super) fn require_bearer_token(headers: &HeaderMap) -> Result<()> {
    let has_bearer = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("Bearer "));

    if has_bearer {
        Ok(())
    } else {
        Err(GatewayError::InvalidConfiguration("missing or malformed Authorization: Bearer header".to_string()))
    }
}
