use super::tts_repository::{BackendError, TtsRepository};
use crate::domain::tts::{SpeechRate, VoiceInfo};
use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{CreateSpeechRequest, SpeechModel, Voice},
    Client,
};
use async_trait::async_trait;
use std::sync::Arc;

/// Voices offered by the OpenAI speech endpoint: (name, gender)
const OPENAI_VOICES: &[(&str, &str)] = &[
    ("alloy", "Neutral"),
    ("echo", "Male"),
    ("fable", "Neutral"),
    ("onyx", "Male"),
    ("nova", "Female"),
    ("shimmer", "Female"),
];

/// OpenAI TTS implementation of TTS repository
pub struct OpenAiTtsRepository {
    client: Arc<Client<OpenAIConfig>>,
    model: String,
}

impl OpenAiTtsRepository {
    pub fn new(client: Arc<Client<OpenAIConfig>>, model: String) -> Self {
        Self { client, model }
    }

    fn speech_model(&self) -> SpeechModel {
        match self.model.as_str() {
            "tts-1" => SpeechModel::Tts1,
            "tts-1-hd" => SpeechModel::Tts1Hd,
            other => SpeechModel::Other(other.to_string()),
        }
    }

    fn parse_voice(voice: &str) -> Result<Voice, BackendError> {
        match voice.to_lowercase().as_str() {
            "alloy" => Ok(Voice::Alloy),
            "echo" => Ok(Voice::Echo),
            "fable" => Ok(Voice::Fable),
            "onyx" => Ok(Voice::Onyx),
            "nova" => Ok(Voice::Nova),
            "shimmer" => Ok(Voice::Shimmer),
            other => Err(BackendError::Rejected(format!("unknown OpenAI voice: {}", other))),
        }
    }
}

/// Connection-level failures are retryable; API errors are answers, not outages
fn classify_openai_error(err: OpenAIError) -> BackendError {
    match err {
        OpenAIError::Reqwest(e) => BackendError::Transient(format!("OpenAI TTS error: {}", e)),
        other => BackendError::Rejected(format!("OpenAI TTS error: {}", other)),
    }
}

#[async_trait]
impl TtsRepository for OpenAiTtsRepository {
    async fn synthesize(
        &self,
        text: &str,
        voice: &str,
        rate: SpeechRate,
    ) -> Result<Vec<u8>, BackendError> {
        let start_time = std::time::Instant::now();

        let request = CreateSpeechRequest {
            model: self.speech_model(),
            input: text.to_string(),
            voice: Self::parse_voice(voice)?,
            response_format: None, // Defaults to MP3
            speed: Some(rate.multiplier()),
        };

        let response = self.client.audio().speech(request).await.map_err(|e| {
            let err = classify_openai_error(e);
            tracing::warn!(
                error = %err,
                model = %self.model,
                voice = voice,
                text_length = text.len(),
                "OpenAI TTS API call failed"
            );
            err
        })?;

        let audio_bytes = response.bytes.to_vec();

        tracing::info!(
            provider = "openai",
            model = %self.model,
            latency_ms = start_time.elapsed().as_millis(),
            characters_count = text.len(),
            audio_size_bytes = audio_bytes.len(),
            "TTS synthesis completed"
        );

        Ok(audio_bytes)
    }

    async fn list_voices(&self) -> Result<Vec<VoiceInfo>, BackendError> {
        Ok(OPENAI_VOICES
            .iter()
            .map(|(name, gender)| VoiceInfo {
                name: name.to_string(),
                locale: "multilingual".to_string(),
                gender: gender.to_string(),
            })
            .collect())
    }
}
