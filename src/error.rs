use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Main application error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Unsupported TTS engine: {0}")]
    UnsupportedEngine(String),

    #[error("Missing X-Session-ID header")]
    MissingSessionId,

    #[error("Invalid input: {0}")]
    BadRequest(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Text too large: {0}")]
    PayloadTooLarge(String),

    #[error("Speech generation failed: {message}")]
    GenerationFailed {
        message: String,
        failed_words: Vec<String>,
    },

    #[error("Audio assembly failed: {0}")]
    Assembly(String),

    #[error("Service busy: {0}")]
    ServiceBusy(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Error response structure: message plus the words to retry, when relevant
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_words: Option<Vec<String>>,
}

impl AppError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::UnsupportedEngine(_) | Self::MissingSessionId | Self::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::GenerationFailed { .. } => StatusCode::BAD_GATEWAY,
            Self::ServiceBusy(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Database(_) | Self::Assembly(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Convert to error response body
    pub fn to_response(&self) -> ErrorResponse {
        let failed_words = match self {
            Self::GenerationFailed { failed_words, .. } => Some(failed_words.clone()),
            _ => None,
        };

        ErrorResponse {
            message: self.to_string(),
            failed_words,
        }
    }
}

/// Implement IntoResponse for automatic conversion in handlers
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(
                error = %self,
                status = %status.as_u16(),
                "Request failed"
            );
        } else {
            tracing::warn!(
                error = %self,
                status = %status.as_u16(),
                "Request rejected"
            );
        }

        let error_response = self.to_response();

        (status, Json(error_response)).into_response()
    }
}

/// Custom result type for the application
pub type AppResult<T> = Result<T, AppError>;
