//! Orchestrator (C7, non-streaming): drives translate → call → reconcile
//! until a terminal output or limit, per §4.7.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use store::ResponseStore;

use crate::error::{GatewayError, Result};
use crate::provider::{self, ChatCompletionsProvider};
use crate::reconciler;
use crate::request::RequestContext;
use crate::telemetry;
use crate::tools::ToolRegistry;
use crate::translator;
use crate::wire::responses_api::{InputItem, Response, ResponseObject, ResponseRequest, ResponseStatus, ResponseUsage};

/// Internal bookkeeping key stashed in `Response.metadata` so chained
/// responses can be walked back to their parent; stripped before the
/// response is returned to a client (§9 cycle-risk note).
pub(crate) const PREVIOUS_RESPONSE_ID_KEY: &str = "_previous_response_id";

pub(crate) struct Orchestrator {
    pub config: Arc<config::Config>,
    pub response_store: Arc<dyn ResponseStore>,
    pub tool_registry: Arc<ToolRegistry>,
    pub provider_client: Arc<ChatCompletionsProvider>,
}

impl Orchestrator {
    pub async fn handle(&self, request: ResponseRequest, context: &RequestContext) -> Result<Response> {
        translator::validate_request(&request)?;

        let history = resolve_history(self.response_store.as_ref(), request.previous_response_id.as_deref(), self.config.store.max_chain_depth).await?;

        let mut items: Vec<InputItem> = history;
        items.extend(request.input.clone().into_items());
        let this_turn_input = request.input.clone().into_items();

        let resolved = provider::resolve(
            &request.model,
            context.headers.get("x-model-provider").and_then(|v| v.to_str().ok()),
            &self.config.responses.providers,
            context.api_key.clone(),
        )?;

        let response_id = format!("resp_{}", uuid::Uuid::new_v4());
        let created_at = now_unix();
        let deadline = Instant::now() + Duration::from_millis(self.config.responses.max_streaming_timeout_ms);

        let max_tool_calls = self.config.responses.max_tool_calls as usize;
        let mut next_item_counter: u32 = 0;
        let mut next_item_id = move || {
            next_item_counter += 1;
            format!("msg_{next_item_counter}")
        };

        let mut current_items = items;
        let final_turn;

        loop {
            if Instant::now() >= deadline {
                return Err(GatewayError::Timeout);
            }

            let chat_request = translator::to_chat_request(&request, &current_items, resolved.model.clone())?;

            let labels = telemetry::CallLabels {
                provider: &resolved.tag,
                request_model: &resolved.model,
                server_address: resolved.base_url.host_str().unwrap_or("unknown"),
            };
            let mut recorder = telemetry::start(context, &labels);

            let chat_response = match self.provider_client.chat_completion(&resolved, chat_request).await {
                Ok(response) => response,
                Err(error) => {
                    recorder.record_error(error.error_type());
                    return Err(error);
                }
            };

            if let Some(usage) = &chat_response.usage {
                recorder.record_usage(usage.prompt_tokens, usage.completion_tokens);
            }
            recorder.record_response_model(&chat_response.model);

            let choice = chat_response
                .choices
                .into_iter()
                .next()
                .ok_or_else(|| GatewayError::GenerationError("upstream returned no choices".to_string()))?;

            if let Some(reason) = &choice.finish_reason {
                recorder.record_finish_reason(&format!("{reason:?}"));
            }

            let decoded = translator::decode_chat_choice(&choice.message, choice.finish_reason, &mut next_item_id)?;

            if !decoded.has_tool_calls || decoded.status != ResponseStatus::Completed {
                final_turn = decoded;
                break;
            }

            let reconciliation = reconciler::reconcile(&current_items, &decoded.output, &self.tool_registry, max_tool_calls).await?;

            if !reconciliation.has_external_calls {
                current_items = reconciliation.next_items;
                continue;
            }

            final_turn = translator::DecodedTurn {
                output: reconciliation.next_items[current_items.len()..].to_vec(),
                status: ResponseStatus::Completed,
                incomplete_details: None,
                has_tool_calls: true,
            };
            break;
        }

        let response = Response {
            id: response_id,
            object: ResponseObject::Response,
            created_at,
            model: resolved.model.clone(),
            status: final_turn.status,
            output: final_turn.output,
            usage: None::<ResponseUsage>,
            incomplete_details: final_turn.incomplete_details,
            metadata: request.metadata.clone(),
        };

        if request.store.unwrap_or(true) {
            persist(self.response_store.as_ref(), &response, &this_turn_input, request.previous_response_id.as_deref()).await?;
        }

        Ok(response)
    }
}

async fn persist(store: &dyn ResponseStore, response: &Response, input_items: &[InputItem], previous_response_id: Option<&str>) -> Result<()> {
    let mut stored_response = response.clone();
    if let Some(previous_id) = previous_response_id {
        stored_response
            .metadata
            .get_or_insert_with(indexmap::IndexMap::new)
            .insert(PREVIOUS_RESPONSE_ID_KEY.to_string(), previous_id.to_string());
    }

    let response_value = serde_json::to_value(&stored_response).map_err(|e| GatewayError::InternalError.tap_log(e))?;
    let input_values = input_items
        .iter()
        .map(serde_json::to_value)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| GatewayError::InternalError.tap_log(e))?;

    store.put(stored_response.id.clone(), response_value, input_values).await?;
    Ok(())
}

/// Walks the `previous_response_id` chain, oldest-first, bounded and
/// cycle-safe (§9). Each hop contributes its own incremental input items
/// plus the output it produced.
pub(crate) async fn resolve_history(store: &dyn ResponseStore, previous_response_id: Option<&str>, max_depth: u32) -> Result<Vec<InputItem>> {
    let Some(start_id) = previous_response_id else {
        return Ok(Vec::new());
    };

    let mut visited = HashSet::new();
    let mut hops = Vec::new();
    let mut current_id = Some(start_id.to_string());
    let mut depth = 0u32;

    while let Some(id) = current_id {
        if !visited.insert(id.clone()) {
            return Err(GatewayError::InvalidConfiguration(format!("previous_response_id chain contains a cycle at '{id}'")));
        }
        depth += 1;
        if depth > max_depth {
            return Err(GatewayError::InvalidConfiguration("previous_response_id chain exceeds the maximum walk depth".to_string()));
        }

        let stored = store.get(&id).await?;
        let response: Response = serde_json::from_value(stored.response)
            .map_err(|e| GatewayError::InternalError.tap_log(e))?;
        let items: Vec<InputItem> = stored
            .input_items
            .into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| GatewayError::InternalError.tap_log(e))?;

        current_id = response.metadata.as_ref().and_then(|metadata| metadata.get(PREVIOUS_RESPONSE_ID_KEY)).cloned();

        let mut hop_items = items;
        hop_items.extend(response.output);
        hops.push(hop_items);
    }

    hops.reverse();
    Ok(hops.into_iter().flatten().collect())
}

trait TapLog {
    fn tap_log(self, error: impl std::fmt::Display) -> Self;
}

impl TapLog for GatewayError {
    fn tap_log(self, error: impl std::fmt::Display) -> Self {
        log::error!("{self}: {error}");
        self
    }
}

fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
