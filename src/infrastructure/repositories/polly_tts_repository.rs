use super::tts_repository::{BackendError, TtsRepository};
use crate::domain::tts::{SpeechRate, VoiceInfo};
use async_trait::async_trait;
use aws_sdk_polly::{
    config::http::HttpResponse,
    error::SdkError,
    operation::synthesize_speech::builders::SynthesizeSpeechFluentBuilder,
    types::{Engine, OutputFormat, TextType, VoiceId},
    Client as PollyClient,
};
use std::sync::Arc;

/// Voices that support the neural engine, per the AWS Polly documentation
const NEURAL_VOICES: &[&str] = &[
    // English
    "Joanna", "Matthew", "Ivy", "Kendra", "Kimberly", "Salli", "Joey", "Justin", "Kevin",
    // Spanish
    "Lupe", "Pedro", "Sergio", // French
    "Lea", "Remi", // German
    "Vicki", "Daniel", // Italian
    "Bianca", "Adriano", // Portuguese
    "Ines", "Camila", "Vitoria", "Thiago", // Japanese
    "Takumi", "Kazuha", "Tomoko", // Korean
    "Seoyeon", // Mandarin Chinese
    "Zhiyu", // Arabic
    "Hala", "Zayd",
];

/// Every voice is asked for 24 kHz MP3, the rate of the in-process silence
/// frames; standard voices would otherwise answer at 22.05 kHz.
pub const MP3_SAMPLE_RATE: &str = "24000";

/// Check if a voice supports the neural engine
pub fn is_voice_neural_compatible(voice: &str) -> bool {
    NEURAL_VOICES.contains(&voice)
}

/// Wrap text in SSML that carries the speaking rate.
///
/// Polly expresses prosody rate as a percentage of the default speed
pub fn build_ssml(text: &str, rate: SpeechRate) -> String {
    format!(
        "<speak><prosody rate=\"{}%\">{}</prosody></speak>",
        rate.percent_of_default(),
        escape_xml(text)
    )
}

fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Throttling and provider-side faults are retryable, client faults are not
fn classify_sdk_error<E: std::fmt::Debug>(err: &SdkError<E, HttpResponse>) -> BackendError {
    let message = format!("AWS Polly error: {:?}", err);
    match err {
        SdkError::ServiceError(service_err) => {
            let status = service_err.raw().status().as_u16();
            if status == 429 || status >= 500 {
                BackendError::Transient(message)
            } else {
                BackendError::Rejected(message)
            }
        }
        SdkError::ConstructionFailure(_) => BackendError::Rejected(message),
        _ => BackendError::Transient(message),
    }
}

/// AWS Polly implementation of TTS repository
pub struct PollyTtsRepository {
    polly_client: Arc<PollyClient>,
}

impl PollyTtsRepository {
    pub fn new(polly_client: Arc<PollyClient>) -> Self {
        Self { polly_client }
    }

    fn speech_request(
        &self,
        text: &str,
        voice: &str,
        rate: SpeechRate,
    ) -> SynthesizeSpeechFluentBuilder {
        self.polly_client
            .synthesize_speech()
            .text(build_ssml(text, rate))
            .text_type(TextType::Ssml)
            .voice_id(VoiceId::from(voice))
            .output_format(OutputFormat::Mp3)
            .sample_rate(MP3_SAMPLE_RATE)
            .engine(engine_for(voice))
    }
}

fn engine_for(voice: &str) -> Engine {
    if is_voice_neural_compatible(voice) {
        Engine::Neural
    } else {
        Engine::Standard
    }
}

#[async_trait]
impl TtsRepository for PollyTtsRepository {
    async fn synthesize(
        &self,
        text: &str,
        voice: &str,
        rate: SpeechRate,
    ) -> Result<Vec<u8>, BackendError> {
        let start_time = std::time::Instant::now();
        let engine = engine_for(voice);

        tracing::debug!(
            voice = voice,
            engine = ?engine,
            rate = %rate,
            text_length = text.len(),
            "Calling AWS Polly synthesize_speech"
        );

        let result = self
            .speech_request(text, voice, rate)
            .send()
            .await
            .map_err(|e| {
                let err = classify_sdk_error(&e);
                tracing::warn!(
                    error = %err,
                    voice = voice,
                    engine = ?engine,
                    text_length = text.len(),
                    "AWS Polly synthesize_speech failed"
                );
                err
            })?;

        let audio_stream = result.audio_stream.collect().await.map_err(|e| {
            tracing::warn!(error = %e, "Failed to collect audio stream from Polly response");
            BackendError::Transient(format!("Failed to read audio stream: {}", e))
        })?;

        let audio_bytes = audio_stream.into_bytes().to_vec();

        tracing::info!(
            provider = "polly",
            latency_ms = start_time.elapsed().as_millis(),
            characters_count = text.len(),
            audio_size_bytes = audio_bytes.len(),
            "TTS synthesis completed"
        );

        Ok(audio_bytes)
    }

    async fn list_voices(&self) -> Result<Vec<VoiceInfo>, BackendError> {
        let mut voices = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let output = self
                .polly_client
                .describe_voices()
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| classify_sdk_error(&e))?;

            voices.extend(output.voices().iter().filter_map(|voice| {
                Some(VoiceInfo {
                    name: voice.id()?.as_str().to_string(),
                    locale: voice
                        .language_code()
                        .map(|code| code.as_str().to_string())
                        .unwrap_or_default(),
                    gender: voice
                        .gender()
                        .map(|gender| gender.as_str().to_string())
                        .unwrap_or_default(),
                })
            }));

            match output.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }

        tracing::info!(provider = "polly", voice_count = voices.len(), "Voice catalog fetched");
        Ok(voices)
    }
}
