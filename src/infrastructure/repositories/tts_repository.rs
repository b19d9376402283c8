use crate::domain::tts::{SpeechRate, VoiceInfo};
use async_trait::async_trait;

/// Failure reported by a speech provider.
///
/// The split decides the retry policy: transient failures (network, throttling,
/// provider-side 5xx) are worth another attempt, rejected requests are not.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("transient backend failure: {0}")]
    Transient(String),
    #[error("backend rejected request: {0}")]
    Rejected(String),
}

impl BackendError {
    pub fn is_transient(&self) -> bool {
        matches!(self, BackendError::Transient(_))
    }
}

/// Repository for TTS synthesis operations.
/// Abstracts the underlying TTS provider (AWS Polly, OpenAI, ...)
///
/// Implementations only speak the provider's protocol. Caching, retries and
/// concurrency limits live in the synthesis gate wrapped around them.
#[async_trait]
pub trait TtsRepository: Send + Sync {
    /// Synthesize one short text to MP3 audio
    ///
    /// # Arguments
    /// * `text` - Normalized text (trimmed, single spaces)
    /// * `voice` - Provider voice identifier
    /// * `rate` - Clamped speaking rate; providers derive their own rate
    ///   parameter from it
    async fn synthesize(
        &self,
        text: &str,
        voice: &str,
        rate: SpeechRate,
    ) -> Result<Vec<u8>, BackendError>;

    /// Fetch the provider's voice catalog
    async fn list_voices(&self) -> Result<Vec<VoiceInfo>, BackendError>;
}
