//! Streaming Orchestrator (C8): runs the tool-call loop as an SSE producer,
//! reassembling higher-level Response semantics from chat-completion chunks
//! while preserving strict event ordering (§4.8, §5).

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::{Stream, StreamExt};
use indexmap::IndexMap;
use tokio::sync::mpsc;

use crate::events::{self, ChunkSignal};
use crate::handlers::strip_internal_metadata;
use crate::orchestrator::PREVIOUS_RESPONSE_ID_KEY;
use crate::provider::{self, ChatCompletionsProvider};
use crate::reconciler;
use crate::request::RequestContext;
use crate::telemetry;
use crate::tools::ToolRegistry;
use crate::translator;
use crate::wire::chat::{ChatCompletionChunk, FinishReason};
use crate::wire::responses_api::{
    IncompleteDetails, InputItem, MessageContent, OutputStatus, Response, ResponseEvent, ResponseObject,
    ResponseRequest, ResponseStatus, Role,
};

/// Explicit three-state machine per §9; keeps the loop/reconcile/done
/// transitions legible instead of folding them into nested `if`s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TurnState {
    AwaitingModel,
    ReconcilingTools,
    Done,
}

/// Per-turn accumulators (§4.8), cleared at the start of every turn. Owned
/// by the streaming orchestrator for the lifetime of one SSE connection —
/// never a global map.
#[derive(Default)]
struct TurnAccumulators {
    text_deltas: IndexMap<u32, String>,
    tool_arg_deltas: IndexMap<u32, String>,
    /// chat tool-call index -> (name, call_id), filled in as deltas arrive.
    tool_name_by_index: IndexMap<u32, (String, String)>,
    /// chat tool-call index -> assigned output_index.
    tool_output_index: IndexMap<u32, u32>,
    /// chat tool-call index -> assigned item_id.
    tool_item_id: IndexMap<u32, String>,
    /// item_ids whose tool name resolved to a registered (internal) executor;
    /// their delta/done events are never forwarded to the client.
    internal_tool_item_ids: HashSet<String>,
    text_output_index: Option<u32>,
    text_item_id: Option<String>,
    text_started_before_tool_calls: bool,
    saw_tool_call_delta: bool,
}

pub(crate) struct StreamingOrchestrator {
    pub config: Arc<config::Config>,
    pub response_store: Arc<dyn store::ResponseStore>,
    pub tool_registry: Arc<ToolRegistry>,
    pub provider_client: Arc<ChatCompletionsProvider>,
}

impl StreamingOrchestrator {
    /// Spawns the producer task and returns the consumer-facing stream. The
    /// bounded channel is the backpressure mechanism: a slow consumer stalls
    /// the producer's `send`, which pauses upstream consumption in turn.
    pub fn handle(self: Arc<Self>, request: ResponseRequest, context: RequestContext) -> impl Stream<Item = ResponseEvent> {
        let (tx, rx) = mpsc::channel(32);

        tokio::spawn(async move {
            run(self, request, context, tx).await;
        });

        receiver_stream(rx)
    }
}

fn receiver_stream(rx: mpsc::Receiver<ResponseEvent>) -> impl Stream<Item = ResponseEvent> {
    futures::stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|event| (event, rx)) })
}

async fn run(orchestrator: Arc<StreamingOrchestrator>, request: ResponseRequest, context: RequestContext, tx: mpsc::Sender<ResponseEvent>) {
    if let Err(error) = translator::validate_request(&request) {
        send_error(&tx, &error).await;
        return;
    }

    let history = match crate::orchestrator::resolve_history(
        orchestrator.response_store.as_ref(),
        request.previous_response_id.as_deref(),
        orchestrator.config.store.max_chain_depth,
    )
    .await
    {
        Ok(history) => history,
        Err(error) => {
            send_error(&tx, &error).await;
            return;
        }
    };

    let resolved = match provider::resolve(
        &request.model,
        context.headers.get("x-model-provider").and_then(|v| v.to_str().ok()),
        &orchestrator.config.responses.providers,
        context.api_key.clone(),
    ) {
        Ok(resolved) => resolved,
        Err(error) => {
            send_error(&tx, &error).await;
            return;
        }
    };

    let response_id = format!("resp_{}", uuid::Uuid::new_v4());
    let created_at = now_unix();
    let deadline = Instant::now() + Duration::from_millis(orchestrator.config.responses.max_streaming_timeout_ms);
    let max_tool_calls = orchestrator.config.responses.max_tool_calls as usize;

    let shell = Response {
        id: response_id.clone(),
        object: ResponseObject::Response,
        created_at,
        model: resolved.model.clone(),
        status: ResponseStatus::InProgress,
        output: Vec::new(),
        usage: None,
        incomplete_details: None,
        metadata: request.metadata.clone(),
    };
    // Exactly one `response.created` per request, regardless of how many turns follow (§8 invariant 2).
    let _ = tx.send(ResponseEvent::Created { response: shell.clone() }).await;

    let mut current_items = history;
    current_items.extend(request.input.clone().into_items());
    let this_turn_input = request.input.clone().into_items();

    let mut next_output_index: u32 = 0;
    let mut accumulated_output: Vec<InputItem> = Vec::new();
    let mut state = TurnState::AwaitingModel;

    let outcome = loop {
        if Instant::now() >= deadline {
            break TerminalOutcome::Timeout;
        }

        match state {
            TurnState::Done => break TerminalOutcome::Completed,
            TurnState::ReconcilingTools => {
                let turn_calls: Vec<InputItem> = accumulated_output
                    .iter()
                    .rev()
                    .take_while(|item| item.is_function_call())
                    .cloned()
                    .collect::<Vec<_>>()
                    .into_iter()
                    .rev()
                    .collect();

                let reconciliation = match reconciler::reconcile(&current_items, &turn_calls, &orchestrator.tool_registry, max_tool_calls).await {
                    Ok(reconciliation) => reconciliation,
                    Err(error) => break TerminalOutcome::Error(error),
                };

                if reconciliation.has_external_calls {
                    // A dangling, unanswered external tool_call can't be sent back to
                    // a chat-completions upstream, so the turn ends here even though
                    // internal calls in this same turn were already resolved.
                    state = TurnState::Done;
                    continue;
                }

                current_items = reconciliation.next_items;
                state = TurnState::AwaitingModel;
                // `response.in_progress` is re-sent once per upstream call below; no
                // additional `response.created` is emitted for this next turn.
            }
            TurnState::AwaitingModel => {
                let chat_request = match translator::to_chat_request(&request, &current_items, resolved.model.clone()) {
                    Ok(request) => request,
                    Err(error) => break TerminalOutcome::Error(error),
                };

                let labels = telemetry::CallLabels {
                    provider: &resolved.tag,
                    request_model: &resolved.model,
                    server_address: resolved.base_url.host_str().unwrap_or("unknown"),
                };
                let mut recorder = telemetry::start(&context, &labels);

                let chunk_stream = match orchestrator.provider_client.chat_completion_stream(&resolved, chat_request).await {
                    Ok(stream) => stream,
                    Err(error) => {
                        recorder.record_error(error.error_type());
                        break TerminalOutcome::Error(error);
                    }
                };
                tokio::pin!(chunk_stream);

                let mut accumulators = TurnAccumulators::default();
                let mut sent_in_progress = false;
                let mut turn_result = None;

                while let Some(chunk) = chunk_stream.next().await {
                    if Instant::now() >= deadline {
                        turn_result = Some(TurnOutcome::TimedOut);
                        break;
                    }

                    let chunk: ChatCompletionChunk = match chunk {
                        Ok(chunk) => chunk,
                        Err(error) => {
                            recorder.record_error(error.error_type());
                            turn_result = Some(TurnOutcome::Failed(error));
                            break;
                        }
                    };

                    if !sent_in_progress {
                        // Once per upstream call (§4.8 step 2, §9(b)).
                        let _ = tx.send(ResponseEvent::InProgress { response: progress_shell(&shell, &accumulated_output) }).await;
                        sent_in_progress = true;
                    }

                    if let Some(usage) = &chunk.usage {
                        recorder.record_usage(usage.prompt_tokens, usage.completion_tokens);
                    }
                    if !chunk.model.is_empty() {
                        recorder.record_response_model(&chunk.model);
                    }

                    let Some(choice) = chunk.choices.first() else { continue };
                    let finish_reason = choice.finish_reason;

                    for signal in events::convert(choice) {
                        emit_signal(&tx, &mut accumulators, &mut next_output_index, signal, &orchestrator.tool_registry).await;
                    }

                    if let Some(reason) = finish_reason {
                        recorder.record_finish_reason(&format!("{reason:?}"));

                        // Tie-break: a provider may emit full tool-call arguments in the
                        // same chunk as `finish_reason=tool_calls` with no separate
                        // `.delta`/`.done` boundary having fired yet.
                        if matches!(reason, FinishReason::ToolCalls) && !accumulators.tool_arg_deltas.is_empty() {
                            send_tool_done_events(&tx, &accumulators).await;
                        }

                        turn_result = Some(TurnOutcome::Finished(reason));
                        break;
                    }
                }

                match turn_result {
                    Some(TurnOutcome::TimedOut) => break TerminalOutcome::Timeout,
                    Some(TurnOutcome::Failed(error)) => break TerminalOutcome::Error(error),
                    None => {
                        break TerminalOutcome::Error(crate::error::GatewayError::GenerationError(
                            "upstream stream ended without a finish reason".to_string(),
                        ));
                    }
                    Some(TurnOutcome::Finished(reason)) => {
                        let turn_items = finalize_turn_items(&accumulators, accumulators.text_started_before_tool_calls);
                        accumulated_output.extend(turn_items);

                        match reason {
                            FinishReason::Stop | FinishReason::Other => {
                                state = TurnState::Done;
                            }
                            FinishReason::Length => break TerminalOutcome::Incomplete("max_output_tokens"),
                            FinishReason::ContentFilter => break TerminalOutcome::Incomplete("content_filter"),
                            FinishReason::ToolCalls => {
                                if accumulators.tool_name_by_index.is_empty() {
                                    // Boundary behaviour: tool_calls with zero tool calls ⇒ treat as stop.
                                    state = TurnState::Done;
                                } else {
                                    state = TurnState::ReconcilingTools;
                                }
                            }
                        }
                    }
                }
            }
        }
    };

    let final_response = Response {
        id: response_id.clone(),
        object: ResponseObject::Response,
        created_at,
        model: resolved.model.clone(),
        status: ResponseStatus::Completed,
        output: accumulated_output.clone(),
        usage: None,
        incomplete_details: None,
        metadata: request.metadata.clone(),
    };

    match outcome {
        TerminalOutcome::Completed => {
            let response = Response { status: ResponseStatus::Completed, ..final_response };
            persist_if_requested(&orchestrator, &request, &response, &this_turn_input).await;
            let _ = tx.send(ResponseEvent::Completed { response: strip_internal_metadata(response) }).await;
        }
        TerminalOutcome::Incomplete(reason) => {
            let response = Response {
                status: ResponseStatus::Incomplete,
                incomplete_details: Some(IncompleteDetails { reason: reason.to_string() }),
                ..final_response
            };
            persist_if_requested(&orchestrator, &request, &response, &this_turn_input).await;
            let _ = tx.send(ResponseEvent::Incomplete { response: strip_internal_metadata(response) }).await;
        }
        TerminalOutcome::Timeout => {
            let _ = tx
                .send(ResponseEvent::Error { message: "request exceeded the configured streaming timeout".to_string(), code: "timeout".to_string() })
                .await;
        }
        TerminalOutcome::Error(error) => send_error(&tx, &error).await,
    }
}

async fn send_error(tx: &mpsc::Sender<ResponseEvent>, error: &crate::error::GatewayError) {
    let _ = tx.send(ResponseEvent::Error { message: error.to_string(), code: error.error_type().to_string() }).await;
}

enum TurnOutcome {
    Finished(FinishReason),
    TimedOut,
    Failed(crate::error::GatewayError),
}

enum TerminalOutcome {
    Completed,
    Incomplete(&'static str),
    Timeout,
    Error(crate::error::GatewayError),
}

async fn persist_if_requested(orchestrator: &StreamingOrchestrator, request: &ResponseRequest, response: &Response, input_items: &[InputItem]) {
    if !request.store.unwrap_or(true) {
        return;
    }

    let mut stored_response = response.clone();
    if let Some(previous_id) = &request.previous_response_id {
        stored_response
            .metadata
            .get_or_insert_with(indexmap::IndexMap::new)
            .insert(PREVIOUS_RESPONSE_ID_KEY.to_string(), previous_id.clone());
    }

    let Ok(response_value) = serde_json::to_value(&stored_response) else {
        log::error!("failed to serialize response '{}' for persistence", stored_response.id);
        return;
    };
    let Ok(input_values) = input_items.iter().map(serde_json::to_value).collect::<std::result::Result<Vec<_>, _>>() else {
        log::error!("failed to serialize input items for response '{}'", stored_response.id);
        return;
    };

    // Persistence failures are logged and swallowed; they never mask a stream already sent to the client.
    if let Err(error) = orchestrator.response_store.put(stored_response.id.clone(), response_value, input_values).await {
        log::error!("failed to persist response '{}': {error}", stored_response.id);
    }
}

fn progress_shell(shell: &Response, accumulated_output: &[InputItem]) -> Response {
    Response { output: accumulated_output.to_vec(), ..shell.clone() }
}

async fn emit_signal(
    tx: &mpsc::Sender<ResponseEvent>,
    accumulators: &mut TurnAccumulators,
    next_output_index: &mut u32,
    signal: ChunkSignal,
    tool_registry: &ToolRegistry,
) {
    match signal {
        ChunkSignal::TextDelta { delta } => {
            if !accumulators.saw_tool_call_delta {
                accumulators.text_started_before_tool_calls = true;
            }
            let output_index = *accumulators.text_output_index.get_or_insert_with(|| {
                let index = *next_output_index;
                *next_output_index += 1;
                index
            });
            let item_id = accumulators.text_item_id.get_or_insert_with(|| format!("item_{output_index}")).clone();

            accumulators.text_deltas.entry(output_index).or_default().push_str(&delta);

            let _ = tx.send(ResponseEvent::OutputTextDelta { item_id, output_index, content_index: 0, delta }).await;
        }
        ChunkSignal::ToolCallDelta { index, call_id, name, arguments_delta } => {
            accumulators.saw_tool_call_delta = true;

            let output_index = *accumulators.tool_output_index.entry(index).or_insert_with(|| {
                let assigned = *next_output_index;
                *next_output_index += 1;
                assigned
            });
            let item_id = accumulators.tool_item_id.entry(index).or_insert_with(|| format!("item_{output_index}")).clone();

            if let Some(call_id) = call_id {
                accumulators.tool_name_by_index.entry(index).or_default().1 = call_id;
            }
            if let Some(name) = &name {
                accumulators.tool_name_by_index.entry(index).or_default().0 = name.clone();
                if tool_registry.lookup(name).is_some() {
                    accumulators.internal_tool_item_ids.insert(item_id.clone());
                }
            }

            if let Some(delta) = arguments_delta {
                accumulators.tool_arg_deltas.entry(output_index).or_default().push_str(&delta);

                if !accumulators.internal_tool_item_ids.contains(&item_id) {
                    let _ = tx.send(ResponseEvent::FunctionCallArgumentsDelta { item_id, output_index, delta }).await;
                }
            }
        }
        ChunkSignal::TextDone => {
            if let Some(output_index) = accumulators.text_output_index {
                let text = accumulators.text_deltas.get(&output_index).cloned().unwrap_or_default();
                let item_id = accumulators.text_item_id.clone().unwrap_or_else(|| format!("item_{output_index}"));
                let _ = tx.send(ResponseEvent::OutputTextDone { item_id, output_index, content_index: 0, text }).await;
            }
        }
        ChunkSignal::ToolCallsDone => {
            send_tool_done_events(tx, accumulators).await;
        }
        ChunkSignal::Incomplete { .. } => {
            if let Some(output_index) = accumulators.text_output_index {
                let text = accumulators.text_deltas.get(&output_index).cloned().unwrap_or_default();
                let item_id = accumulators.text_item_id.clone().unwrap_or_else(|| format!("item_{output_index}"));
                let _ = tx.send(ResponseEvent::OutputTextDone { item_id, output_index, content_index: 0, text }).await;
            }
        }
    }
}

/// Emits one `function_call_arguments.done` per known tool call, skipping
/// internal ones. Also covers the tie-break where a provider sends full
/// arguments without a distinct delta/done boundary: by the time this runs,
/// `tool_arg_deltas` already holds whatever arrived.
async fn send_tool_done_events(tx: &mpsc::Sender<ResponseEvent>, accumulators: &TurnAccumulators) {
    for (chat_index, output_index) in &accumulators.tool_output_index {
        let Some(item_id) = accumulators.tool_item_id.get(chat_index).cloned() else { continue };
        if accumulators.internal_tool_item_ids.contains(&item_id) {
            continue;
        }
        let arguments = accumulators.tool_arg_deltas.get(output_index).cloned().unwrap_or_default();
        let _ = tx.send(ResponseEvent::FunctionCallArgumentsDone { item_id, output_index: *output_index, arguments }).await;
    }
}

/// Materialises the turn's accumulated text (if any) and tool-call items,
/// honouring the `prepend` rule: if text preceded the first tool-call delta,
/// the assembled `OutputMessage` goes first in `response.output`; otherwise
/// it's appended last.
fn finalize_turn_items(accumulators: &TurnAccumulators, prepend: bool) -> Vec<InputItem> {
    let text_item = accumulators.text_output_index.map(|output_index| InputItem::Message {
        role: Role::Assistant,
        content: MessageContent::Text(accumulators.text_deltas.get(&output_index).cloned().unwrap_or_default()),
        id: Some(accumulators.text_item_id.clone().unwrap_or_else(|| format!("item_{output_index}"))),
        status: Some(OutputStatus::Completed),
    });

    let mut tool_items: Vec<InputItem> = accumulators
        .tool_output_index
        .iter()
        .map(|(chat_index, output_index)| {
            let (name, call_id) = accumulators.tool_name_by_index.get(chat_index).cloned().unwrap_or_default();
            let arguments = accumulators.tool_arg_deltas.get(output_index).cloned().unwrap_or_default();
            InputItem::FunctionCall { call_id, name, arguments }
        })
        .collect();

    let mut items = Vec::new();
    match (text_item, prepend) {
        (Some(text_item), true) => {
            items.push(text_item);
            items.append(&mut tool_items);
        }
        (Some(text_item), false) => {
            items.append(&mut tool_items);
            items.push(text_item);
        }
        (None, _) => items.append(&mut tool_items),
    }
    items
}

fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finalize_with_no_text_emits_only_tool_calls() {
        let mut accumulators = TurnAccumulators::default();
        accumulators.tool_output_index.insert(0, 0);
        accumulators.tool_item_id.insert(0, "item_0".to_string());
        accumulators.tool_name_by_index.insert(0, ("get_weather".to_string(), "call_1".to_string()));
        accumulators.tool_arg_deltas.insert(0, "{\"city\":\"nyc\"}".to_string());

        let items = finalize_turn_items(&accumulators, false);
        assert_eq!(items.len(), 1);
        assert!(matches!(&items[0], InputItem::FunctionCall { name, .. } if name == "get_weather"));
    }

    #[test]
    fn finalize_prepends_text_when_it_preceded_tool_calls() {
        let mut accumulators = TurnAccumulators::default();
        accumulators.text_output_index = Some(0);
        accumulators.text_item_id = Some("item_0".to_string());
        accumulators.text_deltas.insert(0, "thinking...".to_string());
        accumulators.tool_output_index.insert(0, 1);
        accumulators.tool_item_id.insert(0, "item_1".to_string());
        accumulators.tool_name_by_index.insert(0, ("get_weather".to_string(), "call_1".to_string()));

        let items = finalize_turn_items(&accumulators, true);
        assert!(matches!(&items[0], InputItem::Message { .. }));
        assert!(matches!(&items[1], InputItem::FunctionCall { .. }));
    }

    #[test]
    fn finalize_appends_text_when_it_followed_tool_calls() {
        let mut accumulators = TurnAccumulators::default();
        accumulators.text_output_index = Some(1);
        accumulators.text_item_id = Some("item_1".to_string());
        accumulators.text_deltas.insert(1, "done".to_string());
        accumulators.tool_output_index.insert(0, 0);
        accumulators.tool_item_id.insert(0, "item_0".to_string());
        accumulators.tool_name_by_index.insert(0, ("get_weather".to_string(), "call_1".to_string()));

        let items = finalize_turn_items(&accumulators, false);
        assert!(matches!(&items[0], InputItem::FunctionCall { .. }));
        assert!(matches!(&items[1], InputItem::Message { .. }));
    }
}
