//! Parameter Translator: a pure, bidirectional mapper between the Responses
//! schema and the Chat-Completions schema.

use crate::error::{GatewayError, Result};
use crate::wire::chat::{
    ChatCompletionRequest, ChatFunctionCall, ChatFunctionDef, ChatMessage, ChatRole, ChatTool,
    ChatToolCall, ChatToolCallType, ChatToolChoice, ChatToolChoiceFunction, ChatToolChoiceMode,
    FinishReason, JsonSchemaFormat, ResponseFormat,
};
use crate::wire::responses_api::{
    ContentPart, IncompleteDetails, InputItem, MessageContent, OutputStatus, ResponseRequest,
    ResponseStatus, Role, TextFormat, Tool, ToolChoice, ToolChoiceMode,
};

/// `request.input` flattened to history items, plus everything else the
/// upstream call needs, translated into a [`ChatCompletionRequest`].
pub(crate) fn to_chat_request(
    request: &ResponseRequest,
    items: &[InputItem],
    model: String,
) -> Result<ChatCompletionRequest> {
    let mut messages = Vec::new();

    if let Some(instructions) = &request.instructions {
        messages.push(ChatMessage {
            role: ChatRole::System,
            content: Some(instructions.clone()),
            tool_calls: None,
            tool_call_id: None,
        });
    }

    for item in items {
        messages.push(item_to_chat_message(item)?);
    }

    let tools = request
        .tools
        .as_ref()
        .map(|tools| tools.iter().map(tool_to_chat_tool).collect::<Result<Vec<_>>>())
        .transpose()?
        .filter(|tools: &Vec<_>| !tools.is_empty());

    let tool_choice = request.tool_choice.as_ref().map(tool_choice_to_chat);

    let response_format = request
        .text
        .as_ref()
        .and_then(|text| text.format.as_ref())
        .map(text_format_to_response_format);

    Ok(ChatCompletionRequest {
        model,
        messages,
        tools,
        tool_choice,
        temperature: request.temperature,
        top_p: request.top_p,
        max_tokens: request.max_output_tokens,
        parallel_tool_calls: request.parallel_tool_calls,
        stream: request.stream,
        response_format,
        reasoning_effort: request.reasoning.as_ref().and_then(|reasoning| reasoning.effort.clone()),
    })
}

fn item_to_chat_message(item: &InputItem) -> Result<ChatMessage> {
    match item {
        InputItem::Message { role, content, .. } => Ok(ChatMessage {
            role: role_to_chat_role(*role),
            content: Some(content_to_chat_text(content)),
            tool_calls: None,
            tool_call_id: None,
        }),
        InputItem::FunctionCall { call_id, name, arguments } => Ok(ChatMessage {
            role: ChatRole::Assistant,
            content: None,
            tool_calls: Some(vec![ChatToolCall {
                id: call_id.clone(),
                kind: ChatToolCallType::Function,
                function: ChatFunctionCall { name: name.clone(), arguments: arguments.clone() },
            }]),
            tool_call_id: None,
        }),
        InputItem::FunctionCallOutput { call_id, output } => Ok(ChatMessage {
            role: ChatRole::Tool,
            content: Some(output.clone()),
            tool_calls: None,
            tool_call_id: Some(call_id.clone()),
        }),
    }
}

fn role_to_chat_role(role: Role) -> ChatRole {
    match role {
        Role::System => ChatRole::System,
        Role::User => ChatRole::User,
        Role::Assistant => ChatRole::Assistant,
    }
}

/// Flattens `content[]` to plain text; non-text parts (image/file) are
/// summarised by their presence rather than dropped silently, since the
/// upstream Chat Completions dialect here carries only string content.
fn content_to_chat_text(content: &MessageContent) -> String {
    match content {
        MessageContent::Text(text) => text.clone(),
        MessageContent::Parts(parts) => parts
            .iter()
            .map(|part| match part {
                ContentPart::Text { text } => text.clone(),
                ContentPart::ImageUrl { image_url, .. } => format!("[image: {image_url}]"),
                ContentPart::File { filename, file_id, .. } => {
                    format!("[file: {}]", filename.as_deref().or(file_id.as_deref()).unwrap_or("unnamed"))
                }
            })
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

fn tool_to_chat_tool(tool: &Tool) -> Result<ChatTool> {
    match tool {
        Tool::Function { name, description, parameters } => Ok(ChatTool {
            kind: ChatToolCallType::Function,
            function: ChatFunctionDef {
                name: name.clone(),
                description: description.clone(),
                parameters: parameters.clone(),
            },
        }),
        Tool::FileSearch => Ok(ChatTool {
            kind: ChatToolCallType::Function,
            function: ChatFunctionDef {
                name: "file_search".to_string(),
                description: Some("Search indexed files for relevant passages.".to_string()),
                parameters: serde_json::json!({
                    "type": "object",
                    "properties": { "query": { "type": "string" } },
                    "required": ["query"],
                }),
            },
        }),
    }
}

fn tool_choice_to_chat(choice: &ToolChoice) -> ChatToolChoice {
    match choice {
        ToolChoice::Mode(ToolChoiceMode::Auto) => ChatToolChoice::Mode(ChatToolChoiceMode::Auto),
        ToolChoice::Mode(ToolChoiceMode::None) => ChatToolChoice::Mode(ChatToolChoiceMode::None),
        ToolChoice::Mode(ToolChoiceMode::Required) => ChatToolChoice::Mode(ChatToolChoiceMode::Required),
        ToolChoice::Specific { name, .. } => ChatToolChoice::Specific {
            r#type: ChatToolCallType::Function,
            function: ChatToolChoiceFunction { name: name.clone() },
        },
    }
}

fn text_format_to_response_format(format: &TextFormat) -> ResponseFormat {
    match format {
        TextFormat::Text => ResponseFormat::Text,
        TextFormat::JsonObject => ResponseFormat::JsonObject,
        TextFormat::JsonSchema { name, schema } => {
            ResponseFormat::JsonSchema { json_schema: JsonSchemaFormat { name: name.clone(), schema: schema.clone() } }
        }
    }
}

/// A decoded non-streaming chat-completion turn: the output items produced
/// and the status they imply, prior to reconciliation.
pub(crate) struct DecodedTurn {
    pub output: Vec<InputItem>,
    pub status: ResponseStatus,
    pub incomplete_details: Option<IncompleteDetails>,
    pub has_tool_calls: bool,
}

/// Converts a non-streaming `ChatCompletionResponse`'s first choice into
/// Responses-API output items, per §4.2 response-side mapping.
pub(crate) fn decode_chat_choice(
    message: &ChatMessage,
    finish_reason: Option<FinishReason>,
    mut next_item_id: impl FnMut() -> String,
) -> Result<DecodedTurn> {
    let mut output = Vec::new();

    if let Some(content) = &message.content {
        if !content.is_empty() {
            output.push(InputItem::Message {
                role: Role::Assistant,
                content: MessageContent::Text(content.clone()),
                id: Some(next_item_id()),
                status: Some(OutputStatus::Completed),
            });
        }
    }

    let tool_calls = message.tool_calls.clone().unwrap_or_default();
    for call in &tool_calls {
        output.push(InputItem::FunctionCall {
            call_id: call.id.clone(),
            name: call.function.name.clone(),
            arguments: call.function.arguments.clone(),
        });
    }

    // Boundary behaviour: finish_reason=tool_calls with zero tool calls ⇒ treat as stop.
    let effective_reason = match finish_reason {
        Some(FinishReason::ToolCalls) if tool_calls.is_empty() => FinishReason::Stop,
        Some(reason) => reason,
        None => FinishReason::Stop,
    };

    let (status, incomplete_details) = match effective_reason {
        FinishReason::Stop | FinishReason::ToolCalls => (ResponseStatus::Completed, None),
        FinishReason::Length => {
            (ResponseStatus::Incomplete, Some(IncompleteDetails { reason: "max_output_tokens".to_string() }))
        }
        FinishReason::ContentFilter => {
            (ResponseStatus::Incomplete, Some(IncompleteDetails { reason: "content_filter".to_string() }))
        }
        FinishReason::Other => {
            log::warn!("upstream returned a non-standard finish_reason; treating as completed");
            (ResponseStatus::Completed, None)
        }
    };

    Ok(DecodedTurn { output, status, incomplete_details, has_tool_calls: !tool_calls.is_empty() })
}

pub(crate) fn model_without_provider_prefix(model: &str) -> String {
    model.rsplit('@').next().unwrap_or(model).to_string()
}

pub(crate) fn validate_request(request: &ResponseRequest) -> Result<()> {
    let is_empty_text = matches!(&request.input, crate::wire::responses_api::InputField::Text(text) if text.trim().is_empty());
    if is_empty_text {
        return Err(GatewayError::InvalidRequest("input must not be empty".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::responses_api::InputField;

    fn base_request(input: &str) -> ResponseRequest {
        ResponseRequest {
            model: "gpt-4o".to_string(),
            input: InputField::Text(input.to_string()),
            instructions: None,
            tools: None,
            tool_choice: None,
            temperature: None,
            top_p: None,
            max_output_tokens: None,
            parallel_tool_calls: None,
            stream: None,
            store: None,
            previous_response_id: None,
            text: None,
            reasoning: None,
            metadata: None,
        }
    }

    #[test]
    fn empty_input_text_is_invalid() {
        let request = base_request("   ");
        assert!(matches!(validate_request(&request), Err(GatewayError::InvalidRequest(_))));
    }

    #[test]
    fn instructions_become_leading_system_message() {
        let mut request = base_request("Explain AI.");
        request.instructions = Some("Answer concisely.".to_string());
        let items = request.input.clone().into_items();
        let chat = to_chat_request(&request, &items, "gpt-4o".to_string()).unwrap();

        assert!(matches!(chat.messages[0].role, ChatRole::System));
        assert_eq!(chat.messages[0].content.as_deref(), Some("Answer concisely."));
        assert!(matches!(chat.messages[1].role, ChatRole::User));
    }

    #[test]
    fn json_schema_format_translates() {
        let mut request = base_request("x");
        request.text = Some(crate::wire::responses_api::TextConfig {
            format: Some(TextFormat::JsonSchema {
                name: "S".to_string(),
                schema: serde_json::json!({"type": "object"}),
            }),
        });
        let items = request.input.clone().into_items();
        let chat = to_chat_request(&request, &items, "gpt-4o".to_string()).unwrap();

        match chat.response_format {
            Some(ResponseFormat::JsonSchema { json_schema }) => {
                assert_eq!(json_schema.name, "S");
                assert_eq!(json_schema.schema, serde_json::json!({"type": "object"}));
            }
            other => panic!("expected JsonSchema response_format, got {other:?}"),
        }
    }

    #[test]
    fn tool_calls_finish_reason_with_zero_calls_is_treated_as_stop() {
        let message = ChatMessage {
            role: ChatRole::Assistant,
            content: Some("hi".to_string()),
            tool_calls: None,
            tool_call_id: None,
        };
        let decoded = decode_chat_choice(&message, Some(FinishReason::ToolCalls), || "item_1".to_string()).unwrap();
        assert_eq!(decoded.status, ResponseStatus::Completed);
        assert!(!decoded.has_tool_calls);
    }

    #[test]
    fn length_finish_reason_is_incomplete() {
        let message = ChatMessage {
            role: ChatRole::Assistant,
            content: Some("partial".to_string()),
            tool_calls: None,
            tool_call_id: None,
        };
        let decoded = decode_chat_choice(&message, Some(FinishReason::Length), || "item_1".to_string()).unwrap();
        assert_eq!(decoded.status, ResponseStatus::Incomplete);
        assert_eq!(decoded.incomplete_details.unwrap().reason, "max_output_tokens");
    }
}
