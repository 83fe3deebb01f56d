//! HTTP handlers for the Responses API surface (§6).

use std::sync::Arc;

use axum::extract::{Multipart, Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response as HttpResponse};
use axum::Json;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{GatewayError, Result};
use crate::orchestrator::PREVIOUS_RESPONSE_ID_KEY;
use crate::provider;
use crate::request;
use crate::wire::chat::ModelsResponse;
use crate::wire::responses_api::{Response, ResponseEvent, ResponseRequest};
use crate::GatewayState;

const DEFAULT_INPUT_ITEMS_LIMIT: usize = 20;
const MAX_INPUT_ITEMS_LIMIT: usize = 1000;

pub(crate) async fn create_response(State(state): State<Arc<GatewayState>>, headers: HeaderMap, Json(body): Json<ResponseRequest>) -> Result<HttpResponse> {
    request::require_bearer_token(&headers)?;
    let context = request::extract_context(&headers, None);

    if body.stream.unwrap_or(false) {
        let stream = state.streaming_orchestrator.clone().handle(body, context);
        let sse_stream = stream.map(|event| Ok::<_, std::convert::Infallible>(to_sse_event(&event)));
        Ok(Sse::new(sse_stream).keep_alive(KeepAlive::default()).into_response())
    } else {
        let response = state.orchestrator.handle(body, &context).await?;
        Ok(Json(strip_internal_metadata(response)).into_response())
    }
}

fn to_sse_event(event: &ResponseEvent) -> Event {
    Event::default().event(event.event_name()).json_data(event).unwrap_or_else(|error| {
        log::error!("failed to serialize SSE event: {error}");
        Event::default().event("response.error").data(r#"{"message":"internal_error","code":"internal_error"}"#)
    })
}

/// Strips the chain-walking bookkeeping key before a [`Response`] reaches a client (§9 cycle-risk note).
pub(crate) fn strip_internal_metadata(mut response: Response) -> Response {
    if let Some(metadata) = &mut response.metadata {
        metadata.shift_remove(PREVIOUS_RESPONSE_ID_KEY);
        if metadata.is_empty() {
            response.metadata = None;
        }
    }
    response
}

pub(crate) async fn get_response(State(state): State<Arc<GatewayState>>, headers: HeaderMap, Path(id): Path<String>) -> Result<Json<Response>> {
    request::require_bearer_token(&headers)?;
    let stored = state.response_store.get(&id).await?;
    let response: Response = serde_json::from_value(stored.response).map_err(|_| GatewayError::InternalError)?;
    Ok(Json(strip_internal_metadata(response)))
}

pub(crate) async fn delete_response(State(state): State<Arc<GatewayState>>, headers: HeaderMap, Path(id): Path<String>) -> Result<StatusCode> {
    request::require_bearer_token(&headers)?;
    state.response_store.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub(crate) struct InputItemsQuery {
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    order: Option<String>,
}

pub(crate) async fn list_input_items(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(query): Query<InputItemsQuery>,
) -> Result<Json<Vec<Value>>> {
    request::require_bearer_token(&headers)?;

    let mut items = state.response_store.get_input_items(&id).await?;
    if query.order.as_deref() == Some("desc") {
        items.reverse();
    }

    let limit = query.limit.unwrap_or(DEFAULT_INPUT_ITEMS_LIMIT).min(MAX_INPUT_ITEMS_LIMIT);
    items.truncate(limit);

    Ok(Json(items))
}

const ALLOWED_PURPOSES: &[&str] = &["assistants", "batch", "fine_tune", "vision", "user_data", "evals"];

#[derive(Debug, Serialize)]
pub(crate) struct FileObject {
    id: String,
    object: &'static str,
    bytes: usize,
    created_at: i64,
    filename: String,
    purpose: String,
}

impl From<store::StoredFile> for FileObject {
    fn from(file: store::StoredFile) -> Self {
        Self { id: file.id, object: "file", bytes: file.bytes.len(), created_at: file.created_at, filename: file.filename, purpose: file.purpose }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct FileListResponse {
    object: &'static str,
    data: Vec<FileObject>,
}

pub(crate) async fn upload_file(State(state): State<Arc<GatewayState>>, headers: HeaderMap, mut multipart: Multipart) -> Result<Json<FileObject>> {
    request::require_bearer_token(&headers)?;

    let mut filename = None;
    let mut bytes = None;
    let mut purpose = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| GatewayError::InvalidRequest(format!("malformed multipart body: {e}")))? {
        match field.name() {
            Some("file") => {
                filename = field.file_name().map(str::to_string);
                bytes = Some(field.bytes().await.map_err(|e| GatewayError::InvalidRequest(format!("failed to read file field: {e}")))?.to_vec());
            }
            Some("purpose") => {
                purpose = Some(field.text().await.map_err(|e| GatewayError::InvalidRequest(format!("failed to read purpose field: {e}")))?);
            }
            _ => {}
        }
    }

    let filename = filename.ok_or_else(|| GatewayError::InvalidRequest("multipart body missing 'file' field".to_string()))?;
    let bytes = bytes.ok_or_else(|| GatewayError::InvalidRequest("multipart body missing 'file' field".to_string()))?;
    let purpose = purpose.ok_or_else(|| GatewayError::InvalidRequest("multipart body missing 'purpose' field".to_string()))?;

    if !ALLOWED_PURPOSES.contains(&purpose.as_str()) {
        return Err(GatewayError::InvalidRequest(format!("unknown purpose '{purpose}'")));
    }

    let stored = store::StoredFile { id: format!("file-{}", uuid::Uuid::new_v4()), filename: filename.clone(), purpose, bytes: bytes.clone(), created_at: now_unix() };
    let stored = state.file_store.put(stored).await?;

    // Only text content is indexable for `file_search`; binary uploads simply aren't searchable.
    if let Ok(text) = String::from_utf8(bytes) {
        if let Err(error) = state.vector_index.index(&stored.id, &text, &filename, serde_json::json!({}), None).await {
            log::warn!("failed to index uploaded file '{}' for file_search: {error}", stored.id);
        }
    }

    Ok(Json(FileObject::from(stored)))
}

pub(crate) async fn list_files(State(state): State<Arc<GatewayState>>, headers: HeaderMap) -> Result<Json<FileListResponse>> {
    request::require_bearer_token(&headers)?;
    let files = state.file_store.list().await?;
    Ok(Json(FileListResponse { object: "list", data: files.into_iter().map(FileObject::from).collect() }))
}

pub(crate) async fn get_file(State(state): State<Arc<GatewayState>>, headers: HeaderMap, Path(id): Path<String>) -> Result<Json<FileObject>> {
    request::require_bearer_token(&headers)?;
    let file = state.file_store.get(&id).await?;
    Ok(Json(FileObject::from(file)))
}

pub(crate) async fn get_file_content(State(state): State<Arc<GatewayState>>, headers: HeaderMap, Path(id): Path<String>) -> Result<impl IntoResponse> {
    request::require_bearer_token(&headers)?;
    let file = state.file_store.get(&id).await?;
    Ok(([(header::CONTENT_TYPE, "application/octet-stream")], file.bytes))
}

pub(crate) async fn delete_file(State(state): State<Arc<GatewayState>>, headers: HeaderMap, Path(id): Path<String>) -> Result<StatusCode> {
    request::require_bearer_token(&headers)?;
    state.file_store.delete(&id).await?;
    // Binary files were never indexed; a missing vector entry is not an error here.
    let _ = state.vector_index.delete(&id).await;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn list_models(State(state): State<Arc<GatewayState>>, headers: HeaderMap) -> Result<Json<ModelsResponse>> {
    request::require_bearer_token(&headers)?;
    let context = request::extract_context(&headers, None);
    let provider_hint = headers.get("x-model-provider").and_then(|v| v.to_str().ok());
    let resolved = provider::resolve("*", provider_hint, &state.config.responses.providers, context.api_key)?;
    Ok(Json(state.provider_client.list_models(&resolved).await?))
}

fn now_unix() -> i64 {
    std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0)
}
