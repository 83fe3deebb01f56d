use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response as HttpResponse},
};
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GatewayError>;

/// Gateway errors with an HTTP status code and a stable `type` kind, shared
/// between the JSON error body (non-streaming) and the terminal SSE event
/// (streaming).
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{0}")]
    InvalidRequest(String),
    #[error("{0}")]
    InvalidConfiguration(String),
    #[error("{0}")]
    NotFound(String),
    #[error("rate limit exceeded: {0}")]
    RateLimitExceeded(String),
    #[error("request exceeded the configured timeout")]
    Timeout,
    #[error("tool call budget exceeded")]
    TooManyToolCalls,
    #[error("{0}")]
    GenerationError(String),
    #[error("{0}")]
    ToolExecutionError(String),
    #[error("internal error")]
    InternalError,
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::InvalidConfiguration(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::RateLimitExceeded(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::Timeout => StatusCode::GATEWAY_TIMEOUT,
            Self::TooManyToolCalls => StatusCode::BAD_REQUEST,
            Self::GenerationError(_) => StatusCode::BAD_GATEWAY,
            Self::ToolExecutionError(_) => StatusCode::BAD_GATEWAY,
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::InvalidConfiguration(_) => "invalid_configuration",
            Self::NotFound(_) => "not_found",
            Self::RateLimitExceeded(_) => "rate_limit_exceeded",
            Self::Timeout => "timeout",
            Self::TooManyToolCalls => "too_many_tool_calls",
            Self::GenerationError(_) => "generation_error",
            Self::ToolExecutionError(_) => "tool_execution_error",
            Self::InternalError => "internal_error",
        }
    }

    /// `param` named in the JSON error body, when the error pinpoints a single request field.
    pub fn param(&self) -> Option<&str> {
        None
    }
}

impl From<store::Error> for GatewayError {
    fn from(error: store::Error) -> Self {
        match error {
            store::Error::NotFound(id) => Self::NotFound(format!("no stored response with id '{id}'")),
            store::Error::Conflict(id) => Self::InvalidRequest(format!("response '{id}' already exists with different content")),
            store::Error::Backend(message) => {
                log::error!("store backend error: {message}");
                Self::InternalError
            }
        }
    }
}

impl From<vector::Error> for GatewayError {
    fn from(error: vector::Error) -> Self {
        match error {
            vector::Error::NotFound(id) => Self::NotFound(format!("file '{id}' is not indexed")),
            other => Self::ToolExecutionError(other.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    r#type: String,
    message: String,
    param: Option<String>,
    code: String,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> HttpResponse {
        let status = self.status_code();
        let body = ErrorBody {
            r#type: self.error_type().to_string(),
            message: self.to_string(),
            param: self.param().map(ToString::to_string),
            code: status.as_str().to_string(),
        };

        (status, Json(body)).into_response()
    }
}
