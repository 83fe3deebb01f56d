//! Built-in `file_search` tool (§4.10), backed by the vector crate's index.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use vector::VectorIndex;

use crate::error::Result;
use crate::tools::ToolExecutor;

const DEFAULT_MAX_RESULTS: usize = 5;

#[derive(Debug, Deserialize)]
struct FileSearchArguments {
    query: String,
    #[serde(default)]
    max_results: Option<usize>,
}

pub(crate) struct FileSearchExecutor {
    index: Arc<VectorIndex>,
}

impl FileSearchExecutor {
    pub fn new(index: Arc<VectorIndex>) -> Self {
        Self { index }
    }
}

#[async_trait]
impl ToolExecutor for FileSearchExecutor {
    async fn execute(&self, arguments_json: &str) -> Result<Option<String>> {
        let arguments: FileSearchArguments = serde_json::from_str(arguments_json)
            .map_err(|e| crate::error::GatewayError::ToolExecutionError(format!("invalid file_search arguments: {e}")))?;

        let hits = self
            .index
            .search(&arguments.query, arguments.max_results.unwrap_or(DEFAULT_MAX_RESULTS), &[])
            .await?;

        let payload = serde_json::json!({
            "results": hits.into_iter().map(|hit| serde_json::json!({
                "file_id": hit.file_id,
                "score": hit.score,
                "content": hit.content,
                "metadata": hit.metadata,
            })).collect::<Vec<_>>(),
        });

        Ok(Some(payload.to_string()))
    }
}
