//! Responses API gateway: translates an OpenAI-compatible Responses surface
//! onto heterogeneous Chat-Completions upstreams (§1-§2).

mod error;
mod events;
mod handlers;
mod orchestrator;
mod provider;
mod reconciler;
mod request;
mod streaming;
mod telemetry;
mod tools;
mod translator;
mod wire;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use store::{FileStore, ResponseStore};
use vector::VectorIndex;

use crate::orchestrator::Orchestrator;
use crate::provider::ChatCompletionsProvider;
use crate::streaming::StreamingOrchestrator;
use crate::tools::ToolRegistry;
use crate::tools::file_search::FileSearchExecutor;

/// Shared, read-mostly state handed to every handler via axum's `State` extractor.
pub(crate) struct GatewayState {
    pub config: Arc<config::Config>,
    pub response_store: Arc<dyn ResponseStore>,
    pub file_store: Arc<dyn FileStore>,
    pub vector_index: Arc<VectorIndex>,
    pub provider_client: Arc<ChatCompletionsProvider>,
    pub orchestrator: Arc<Orchestrator>,
    pub streaming_orchestrator: Arc<StreamingOrchestrator>,
}

/// Builds the Responses API router: store, vector index, tool registry, and
/// both orchestrators, wired onto the HTTP surface in §6.
pub async fn router(config: &config::Config) -> anyhow::Result<Router> {
    let config = Arc::new(config.clone());

    let response_store = store::build_response_store(&config.store)?;
    let file_store = store::build_file_store(&config.store);
    let vector_index = Arc::new(VectorIndex::new(&config.vector).await?);

    let mut tool_registry = ToolRegistry::new();
    tool_registry.register("file_search", Arc::new(FileSearchExecutor::new(vector_index.clone())));
    let tool_registry = Arc::new(tool_registry);

    let provider_client = Arc::new(ChatCompletionsProvider::new());

    let orchestrator = Arc::new(Orchestrator {
        config: config.clone(),
        response_store: response_store.clone(),
        tool_registry: tool_registry.clone(),
        provider_client: provider_client.clone(),
    });

    let streaming_orchestrator = Arc::new(StreamingOrchestrator {
        config: config.clone(),
        response_store: response_store.clone(),
        tool_registry: tool_registry.clone(),
        provider_client: provider_client.clone(),
    });

    let state = Arc::new(GatewayState {
        config,
        response_store,
        file_store,
        vector_index,
        provider_client,
        orchestrator,
        streaming_orchestrator,
    });

    Ok(Router::new()
        .route("/v1/responses", post(handlers::create_response))
        .route("/v1/responses/{id}", get(handlers::get_response).delete(handlers::delete_response))
        .route("/v1/responses/{id}/input_items", get(handlers::list_input_items))
        .route("/v1/files", post(handlers::upload_file).get(handlers::list_files))
        .route("/v1/files/{id}", get(handlers::get_file).delete(handlers::delete_file))
        .route("/v1/files/{id}/content", get(handlers::get_file_content))
        .route("/v1/models", get(handlers::list_models))
        .with_state(state))
}
