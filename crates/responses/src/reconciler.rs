//! Tool-Call Reconciler: given accumulated input-item history and a model
//! turn's output, produces the next turn's history, executing internal tools
//! and parking external ones.

use crate::error::{GatewayError, Result};
use crate::tools::ToolRegistry;
use crate::wire::responses_api::InputItem;

pub(crate) const DEFAULT_MAX_TOOL_CALLS: usize = 10;

/// Outcome of reconciling one turn's output against the tool registry.
pub(crate) struct Reconciliation {
    /// Prior history, with this turn's items appended per the reconciler algorithm.
    pub next_items: Vec<InputItem>,
    /// `true` if at least one `FunctionCall` in this turn had no registered executor.
    pub has_external_calls: bool,
}

/// Implements §4.5 exactly: internal tool calls are resolved in place
/// (`FunctionCall` then its `FunctionCallOutput` appended to the main
/// history); external calls are parked at the end for the client to answer.
pub(crate) async fn reconcile(
    history: &[InputItem],
    turn_output: &[InputItem],
    registry: &ToolRegistry,
    max_tool_calls: usize,
) -> Result<Reconciliation> {
    let mut main = history.to_vec();
    let mut parked = Vec::new();
    let mut has_external_calls = false;

    for item in turn_output {
        match item {
            InputItem::Message { .. } => parked.push(item.clone()),
            InputItem::FunctionCall { call_id, name, arguments } => {
                if let Some(executor) = registry.lookup(name) {
                    main.push(item.clone());
                    let output = match executor.execute(arguments).await {
                        Ok(Some(output)) => output,
                        Ok(None) => {
                            parked.push(item.clone());
                            has_external_calls = true;
                            continue;
                        }
                        Err(error) => {
                            log::warn!("tool '{name}' execution failed: {error}");
                            return Err(error);
                        }
                    };
                    main.push(InputItem::FunctionCallOutput { call_id: call_id.clone(), output });
                } else {
                    parked.push(item.clone());
                    has_external_calls = true;
                }
            }
            InputItem::FunctionCallOutput { .. } => parked.push(item.clone()),
        }
    }

    main.extend(parked);

    let call_count = main.iter().filter(|item| item.is_function_call()).count();
    if call_count > max_tool_calls {
        return Err(GatewayError::TooManyToolCalls);
    }

    Ok(Reconciliation { next_items: main, has_external_calls })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolExecutor;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct AlwaysAnswers;

    #[async_trait]
    impl ToolExecutor for AlwaysAnswers {
        async fn execute(&self, _arguments_json: &str) -> Result<Option<String>> {
            Ok(Some("42".to_string()))
        }
    }

    struct AlwaysThrows;

    #[async_trait]
    impl ToolExecutor for AlwaysThrows {
        async fn execute(&self, _arguments_json: &str) -> Result<Option<String>> {
            Err(GatewayError::ToolExecutionError("connection refused".to_string()))
        }
    }

    fn call(name: &str, call_id: &str) -> InputItem {
        InputItem::FunctionCall { call_id: call_id.to_string(), name: name.to_string(), arguments: "{}".to_string() }
    }

    #[tokio::test]
    async fn internal_tool_call_is_resolved_inline() {
        let mut registry = ToolRegistry::new();
        registry.register("file_search", Arc::new(AlwaysAnswers));

        let turn = vec![call("file_search", "call_1")];
        let reconciliation = reconcile(&[], &turn, &registry, DEFAULT_MAX_TOOL_CALLS).await.unwrap();

        assert!(!reconciliation.has_external_calls);
        assert!(matches!(reconciliation.next_items[0], InputItem::FunctionCall { .. }));
        assert!(matches!(reconciliation.next_items[1], InputItem::FunctionCallOutput { .. }));
    }

    #[tokio::test]
    async fn external_tool_call_is_parked() {
        let registry = ToolRegistry::new();
        let turn = vec![call("get_weather", "call_1")];
        let reconciliation = reconcile(&[], &turn, &registry, DEFAULT_MAX_TOOL_CALLS).await.unwrap();

        assert!(reconciliation.has_external_calls);
        assert_eq!(reconciliation.next_items.len(), 1);
        assert!(matches!(reconciliation.next_items[0], InputItem::FunctionCall { .. }));
    }

    #[tokio::test]
    async fn executor_error_fails_the_turn_instead_of_producing_output() {
        let mut registry = ToolRegistry::new();
        registry.register("file_search", Arc::new(AlwaysThrows));

        let turn = vec![call("file_search", "call_1")];
        let result = reconcile(&[], &turn, &registry, DEFAULT_MAX_TOOL_CALLS).await;

        assert!(matches!(result, Err(GatewayError::ToolExecutionError(_))));
    }

    #[tokio::test]
    async fn exceeding_max_tool_calls_fails() {
        let registry = ToolRegistry::new();
        let history: Vec<InputItem> = (0..10).map(|i| call("get_weather", &format!("call_{i}"))).collect();
        let turn = vec![call("get_weather", "call_11")];

        let result = reconcile(&history, &turn, &registry, DEFAULT_MAX_TOOL_CALLS).await;
        assert!(matches!(result, Err(GatewayError::TooManyToolCalls)));
    }
}
