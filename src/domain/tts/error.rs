use crate::error::AppError;

#[derive(Debug, thiserror::Error)]
pub enum TtsServiceError {
    #[error("unsupported TTS engine: {0}")]
    UnsupportedEngine(String),
    #[error("invalid input: {0}")]
    Invalid(String),
    #[error("generation failed: {message}")]
    GenerationFailed {
        message: String,
        failed_words: Vec<String>,
    },
    #[error("assembly failed: {0}")]
    Assembly(String),
    #[error("speech backend unavailable: {0}")]
    Backend(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<TtsServiceError> for AppError {
    fn from(err: TtsServiceError) -> Self {
        match err {
            TtsServiceError::UnsupportedEngine(engine) => AppError::UnsupportedEngine(engine),
            TtsServiceError::Invalid(msg) => AppError::BadRequest(msg),
            TtsServiceError::GenerationFailed {
                message,
                failed_words,
            } => AppError::GenerationFailed {
                message,
                failed_words,
            },
            TtsServiceError::Assembly(msg) => AppError::Assembly(msg),
            TtsServiceError::Backend(message) => AppError::GenerationFailed {
                message,
                failed_words: Vec::new(),
            },
            TtsServiceError::Other(e) => AppError::Internal(e.to_string()),
        }
    }
}
