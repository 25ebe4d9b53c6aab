use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// User-facing messages, in the order they should be shown.
    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("Recording unavailable for hotspot {hotspot_id}: {reason}")]
    ResourceUnavailable { hotspot_id: String, reason: String },

    #[error("Conflicting operation: {0}")]
    ConflictingOperation(String),

    #[error("Playback failed: {0}")]
    PlaybackFailed(String),

    #[error("Draft persistence failed: {0}")]
    Persistence(String),

    #[error("Network failure: {message}")]
    Network { message: String, retryable: bool },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Invalid handle: {0}")]
    InvalidHandle(String),

    #[error("Invalid editor state: {0}")]
    InvalidState(String),

    #[error("Draft codec error: {0}")]
    Codec(String),
}

impl EngineError {
    pub fn validation(message: impl Into<String>) -> Self {
        EngineError::Validation(vec![message.into()])
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        EngineError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn network(message: impl Into<String>, retryable: bool) -> Self {
        EngineError::Network {
            message: message.into(),
            retryable,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::Network {
                retryable: true,
                ..
            }
        )
    }

    /// Messages to surface to the author or learner.
    pub fn messages(&self) -> Vec<String> {
        match self {
            EngineError::Validation(messages) => messages.clone(),
            other => vec![other.to_string()],
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            EngineError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            EngineError::ResourceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            EngineError::ConflictingOperation(_) => StatusCode::CONFLICT,
            EngineError::PlaybackFailed(_) => StatusCode::SERVICE_UNAVAILABLE,
            EngineError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
            EngineError::Network { .. } => StatusCode::BAD_GATEWAY,
            EngineError::NotFound { .. } => StatusCode::NOT_FOUND,
            EngineError::InvalidHandle(_) | EngineError::InvalidState(_) => StatusCode::CONFLICT,
            EngineError::Codec(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<validator::ValidationErrors> for EngineError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, field_errors)| {
                field_errors.iter().map(move |error| {
                    error
                        .message
                        .as_ref()
                        .map(|message| message.to_string())
                        .unwrap_or_else(|| format!("{} is invalid", field))
                })
            })
            .collect();
        messages.sort();
        EngineError::Validation(messages)
    }
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = json!({
            "errors": self.messages(),
            "retryable": self.is_retryable(),
        });
        (status, Json(body)).into_response()
    }
}
