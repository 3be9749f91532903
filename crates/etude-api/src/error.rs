//! API error type with structured JSON bodies.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{error, warn};

use etude_types::api::ErrorBody;
use etude_types::chat::ValidationError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{message}")]
    Invalid { field: &'static str, message: String },

    /// A body, query string or path segment that could not be decoded.
    #[error("{message}")]
    Malformed { field: Option<String>, message: String },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            message: message.into(),
        }
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::Invalid { .. } | Self::Malformed { .. } => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) | Self::Invalid { .. } | Self::Malformed { .. } => "VALIDATION_ERROR",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn field(&self) -> Option<String> {
        match self {
            Self::Validation(e) => Some(e.field().to_string()),
            Self::Invalid { field, .. } => Some(field.to_string()),
            Self::Malformed { field, .. } => field.clone(),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        error!("Internal error: {:#}", err);
        Self::Internal("internal error".into())
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        error!("spawn_blocking join error: {}", err);
        Self::Internal("internal error".into())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        malformed(rejection.status(), rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        malformed(rejection.status(), rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        malformed(rejection.status(), rejection.body_text())
    }
}

/// Turn an extractor rejection into a 400, keeping the offending field when
/// the decoder reported one. Rejections that signal a server bug stay 500.
fn malformed(status: StatusCode, text: String) -> ApiError {
    if status.is_server_error() {
        return anyhow::anyhow!("extractor rejected request: {}", text).into();
    }

    // Rejection text is "<context>: <detail>"
    let detail = text.split_once(": ").map_or(text.as_str(), |(_, detail)| detail);
    let field = rejected_field(detail);
    ApiError::Malformed { field, message: text }
}

/// Field path from a serde error: either a `path: message` prefix or a
/// "missing field `name`" message.
fn rejected_field(detail: &str) -> Option<String> {
    if let Some(rest) = detail.strip_prefix("missing field `") {
        return rest.split_once('`').map(|(name, _)| name.to_string());
    }

    let (path, _) = detail.split_once(": ")?;
    let is_path = !path.is_empty()
        && path
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '[' | ']'));
    is_path.then(|| path.to_string())
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_client_error() {
            warn!("{} {}", status.as_u16(), self);
        }

        let body = ErrorBody {
            error: self.error_code().to_string(),
            message: self.to_string(),
            field: self.field(),
        };

        (status, Json(body)).into_response()
    }
}
