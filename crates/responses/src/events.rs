//! Event Converter: maps a single chat-completion chunk's `choices[0]` to
//! zero or more stateless signals. Item-id assignment and ordering belong to
//! the streaming orchestrator, not here.

use crate::wire::chat::{ChatChoiceDelta, FinishReason};

/// A stateless signal derived from one chunk. The streaming orchestrator
/// assigns `output_index`/`item_id` and turns these into [`crate::wire::responses_api::ResponseEvent`]s.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ChunkSignal {
    TextDelta { delta: String },
    ToolCallDelta { index: u32, call_id: Option<String>, name: Option<String>, arguments_delta: Option<String> },
    TextDone,
    ToolCallsDone,
    /// `finish_reason=length|content_filter`: the turn ended short.
    Incomplete { reason: &'static str },
}

/// Converts one chunk choice into its signals, in emission order
/// (text-delta before tool-arg-delta, per §4.8 tie-break rule).
pub(crate) fn convert(choice: &ChatChoiceDelta) -> Vec<ChunkSignal> {
    let mut signals = Vec::new();

    if let Some(content) = &choice.delta.content {
        if !content.is_empty() {
            signals.push(ChunkSignal::TextDelta { delta: content.clone() });
        }
    }

    if let Some(tool_calls) = &choice.delta.tool_calls {
        for call in tool_calls {
            signals.push(ChunkSignal::ToolCallDelta {
                index: call.index,
                call_id: call.id.clone(),
                name: call.function.as_ref().and_then(|f| f.name.clone()),
                arguments_delta: call.function.as_ref().and_then(|f| f.arguments.clone()),
            });
        }
    }

    match choice.finish_reason {
        Some(FinishReason::Stop) => signals.push(ChunkSignal::TextDone),
        Some(FinishReason::ToolCalls) => signals.push(ChunkSignal::ToolCallsDone),
        Some(FinishReason::Length) => signals.push(ChunkSignal::Incomplete { reason: "max_output_tokens" }),
        Some(FinishReason::ContentFilter) => signals.push(ChunkSignal::Incomplete { reason: "content_filter" }),
        Some(FinishReason::Other) | None => {}
    }

    signals
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::chat::ChatMessageDelta;

    fn choice(content: Option<&str>, finish_reason: Option<FinishReason>) -> ChatChoiceDelta {
        ChatChoiceDelta {
            index: 0,
            delta: ChatMessageDelta { role: None, content: content.map(str::to_string), tool_calls: None },
            finish_reason,
        }
    }

    #[test]
    fn non_empty_text_delta_yields_signal() {
        let signals = convert(&choice(Some("hello"), None));
        assert_eq!(signals, vec![ChunkSignal::TextDelta { delta: "hello".to_string() }]);
    }

    #[test]
    fn empty_text_delta_yields_nothing() {
        assert!(convert(&choice(Some(""), None)).is_empty());
    }

    #[test]
    fn stop_yields_text_done() {
        let signals = convert(&choice(None, Some(FinishReason::Stop)));
        assert_eq!(signals, vec![ChunkSignal::TextDone]);
    }

    #[test]
    fn tool_calls_finish_yields_tool_calls_done() {
        let signals = convert(&choice(None, Some(FinishReason::ToolCalls)));
        assert_eq!(signals, vec![ChunkSignal::ToolCallsDone]);
    }

    #[test]
    fn other_finish_reason_yields_no_signal() {
        assert!(convert(&choice(None, Some(FinishReason::Other))).is_empty());
    }
}
