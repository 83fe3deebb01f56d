//! Tool Registry & Executor: a process-wide catalog mapping tool names to
//! their executors.

pub(crate) mod file_search;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

/// One built-in or MCP-proxied tool. `execute` returns `Ok(None)` when the
/// tool declines to act on these arguments; the caller treats that the same
/// as "not registered" — park the call for the client.
#[async_trait]
pub(crate) trait ToolExecutor: Send + Sync {
    async fn execute(&self, arguments_json: &str) -> crate::error::Result<Option<String>>;
}

/// Read-mostly, populated at startup, thereafter read concurrently without
/// locking (§5).
#[derive(Default, Clone)]
pub(crate) struct ToolRegistry {
    executors: HashMap<String, Arc<dyn ToolExecutor>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, executor: Arc<dyn ToolExecutor>) {
        self.executors.insert(name.into(), executor);
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<dyn ToolExecutor>> {
        self.executors.get(name).cloned()
    }

    /// Arguments are opaque JSON strings passed through verbatim. `None`
    /// means "tool not available — park the call for the client".
    pub async fn execute(&self, name: &str, arguments_json: &str) -> crate::error::Result<Option<String>> {
        match self.lookup(name) {
            Some(executor) => executor.execute(arguments_json).await,
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl ToolExecutor for EchoTool {
        async fn execute(&self, arguments_json: &str) -> crate::error::Result<Option<String>> {
            Ok(Some(arguments_json.to_string()))
        }
    }

    #[tokio::test]
    async fn unregistered_tool_returns_none() {
        let registry = ToolRegistry::new();
        assert_eq!(registry.execute("missing", "{}").await.unwrap(), None);
    }

    #[tokio::test]
    async fn registered_tool_executes() {
        let mut registry = ToolRegistry::new();
        registry.register("echo", Arc::new(EchoTool));
        assert_eq!(registry.execute("echo", "{\"a\":1}").await.unwrap(), Some("{\"a\":1}".to_string()));
    }
}
