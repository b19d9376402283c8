use super::batch::{BatchJob, BatchOrchestrator, BatchOutcome};
use super::cache_key::CacheKey;
use super::dto::{BatchTtsRequest, CheckCacheRequest, TtsRequest, VoiceInfo};
use super::engine::Engine;
use super::error::TtsServiceError;
use super::gate::{GateError, SynthesisGate, SynthesisRequest};
use super::progress::{ProgressReporter, ProgressUpdate};
use crate::infrastructure::cache::StaleCache;
use crate::infrastructure::repositories::TtsRepository;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const MAX_REPEAT_COUNT: u32 = 10;
const MAX_REPEAT_INTERVAL_SECS: f32 = 60.0;

/// Everything needed to serve one server-side engine
pub struct EngineHandle {
    gate: SynthesisGate,
    backend: Arc<dyn TtsRepository>,
    default_voice: String,
    voices: StaleCache<Vec<VoiceInfo>>,
}

impl EngineHandle {
    pub fn new(
        gate: SynthesisGate,
        backend: Arc<dyn TtsRepository>,
        default_voice: impl Into<String>,
        voices_ttl: Duration,
    ) -> Self {
        Self {
            gate,
            backend,
            default_voice: default_voice.into(),
            voices: StaleCache::new(voices_ttl),
        }
    }

    pub fn engine(&self) -> Engine {
        self.gate.engine()
    }

    pub fn gate(&self) -> &SynthesisGate {
        &self.gate
    }

    pub fn default_voice(&self) -> &str {
        &self.default_voice
    }

    fn voice_or_default(&self, voice: Option<&str>) -> String {
        match voice.map(str::trim) {
            Some(voice) if !voice.is_empty() => voice.to_string(),
            _ => self.default_voice.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SynthesisOutcome {
    pub cache_key: CacheKey,
    pub audio: Bytes,
}

pub struct TtsService {
    engines: HashMap<Engine, EngineHandle>,
    default_engine: Engine,
    orchestrator: Arc<BatchOrchestrator>,
}

impl TtsService {
    pub fn new(
        engines: Vec<EngineHandle>,
        default_engine: Engine,
        orchestrator: BatchOrchestrator,
    ) -> Self {
        Self {
            engines: engines
                .into_iter()
                .map(|handle| (handle.engine(), handle))
                .collect(),
            default_engine,
            orchestrator: Arc::new(orchestrator),
        }
    }

    pub fn default_engine(&self) -> Engine {
        self.default_engine
    }

    /// Parse an engine name, falling back to the default when absent
    pub fn resolve_engine(&self, name: Option<&str>) -> Result<Engine, TtsServiceError> {
        match name.map(str::trim) {
            Some(name) if !name.is_empty() => name.parse(),
            _ => Ok(self.default_engine),
        }
    }

    fn handle(&self, name: Option<&str>) -> Result<&EngineHandle, TtsServiceError> {
        let engine = self.resolve_engine(name)?;
        if engine.is_client_resident() {
            return Err(TtsServiceError::UnsupportedEngine(format!(
                "{} is synthesized by the browser",
                engine
            )));
        }

        self.engines
            .get(&engine)
            .ok_or_else(|| TtsServiceError::UnsupportedEngine(format!("{} is not configured", engine)))
    }
}

#[async_trait]
pub trait TtsServiceApi: Send + Sync {
    /// Synthesize a single text, served from cache when possible
    async fn synthesize_one(&self, request: TtsRequest)
        -> Result<SynthesisOutcome, TtsServiceError>;

    /// Produce the full dictation recording for a word list.
    ///
    /// Words that fail are left out and listed in the outcome; the call only
    /// fails when no word could be synthesized or assembly fails.
    async fn synthesize_batch(
        &self,
        request: BatchTtsRequest,
    ) -> Result<BatchOutcome, TtsServiceError>;

    /// Warm the cache for a word list in the background.
    ///
    /// Progress arrives on the returned channel, which closes after the final
    /// record. Validation errors are returned before any work starts.
    async fn check_cache(
        &self,
        request: CheckCacheRequest,
    ) -> Result<mpsc::UnboundedReceiver<ProgressUpdate>, TtsServiceError>;

    /// Voice catalog of an engine; empty for client-resident engines
    async fn list_voices(&self, engine: Option<&str>) -> Result<Vec<VoiceInfo>, TtsServiceError>;
}

#[async_trait]
impl TtsServiceApi for TtsService {
    async fn synthesize_one(
        &self,
        request: TtsRequest,
    ) -> Result<SynthesisOutcome, TtsServiceError> {
        if request.text.trim().is_empty() {
            return Err(TtsServiceError::Invalid("Text cannot be empty".to_string()));
        }

        let handle = self.handle(request.engine.as_deref())?;
        let voice = handle.voice_or_default(request.voice.as_deref());
        let synthesis = SynthesisRequest::new(&request.text, voice, request.rate);
        let cache_key = handle.gate.key_for(&synthesis);

        tracing::info!(
            engine = %handle.engine(),
            voice = %synthesis.voice,
            rate = %synthesis.rate,
            text_length = synthesis.text.chars().count(),
            cache_key = %cache_key,
            "TTS synthesis request"
        );

        let audio = handle
            .gate
            .synthesize(synthesis)
            .await
            .map_err(|err| gate_failure(err, &request.text))?;

        Ok(SynthesisOutcome { cache_key, audio })
    }

    async fn synthesize_batch(
        &self,
        request: BatchTtsRequest,
    ) -> Result<BatchOutcome, TtsServiceError> {
        let words = clean_words(&request.words);
        if words.is_empty() {
            return Err(TtsServiceError::Invalid("Word list cannot be empty".to_string()));
        }
        if request.repeat_count == 0 || request.repeat_count > MAX_REPEAT_COUNT {
            return Err(TtsServiceError::Invalid(format!(
                "repeatCount must be between 1 and {}",
                MAX_REPEAT_COUNT
            )));
        }
        if !(0.0..=MAX_REPEAT_INTERVAL_SECS).contains(&request.repeat_interval) {
            return Err(TtsServiceError::Invalid(format!(
                "repeatInterval must be between 0 and {} seconds",
                MAX_REPEAT_INTERVAL_SECS
            )));
        }

        let handle = self.handle(request.engine.as_deref())?;
        let job = BatchJob {
            voice: handle.voice_or_default(request.voice.as_deref()),
            rate: request.rate,
            repeat_count: request.repeat_count,
            repeat_interval: Duration::from_secs_f32(request.repeat_interval),
            grade: request.grade,
            lesson: request.lesson,
            words,
        };

        tracing::info!(
            engine = %handle.engine(),
            voice = %job.voice,
            word_count = job.words.len(),
            repeat_count = job.repeat_count,
            repeat_interval_secs = request.repeat_interval,
            "Batch synthesis request"
        );

        let progress = ProgressReporter::silent(job.words.len());
        let outcome = self.orchestrator.run(&handle.gate, &job, &progress).await?;
        if !outcome.failed_words.is_empty() {
            tracing::warn!(
                failed_words = ?outcome.failed_words,
                "Batch assembled without some words"
            );
        }
        Ok(outcome)
    }

    async fn check_cache(
        &self,
        request: CheckCacheRequest,
    ) -> Result<mpsc::UnboundedReceiver<ProgressUpdate>, TtsServiceError> {
        let handle = self.handle(request.engine.as_deref())?;
        let words = clean_words(&request.words);
        let voice = handle.voice_or_default(request.voice.as_deref());
        let (reporter, rx) = ProgressReporter::channel(words.len());

        tracing::info!(
            engine = %handle.engine(),
            voice = %voice,
            word_count = words.len(),
            "Cache warm-up requested"
        );

        let gate = handle.gate.clone();
        let orchestrator = self.orchestrator.clone();
        let rate = request.rate;
        tokio::spawn(async move {
            orchestrator
                .prefetch(&gate, &words, &voice, rate, &reporter)
                .await;
        });

        Ok(rx)
    }

    async fn list_voices(&self, engine: Option<&str>) -> Result<Vec<VoiceInfo>, TtsServiceError> {
        let engine = self.resolve_engine(engine)?;
        if engine.is_client_resident() {
            return Ok(Vec::new());
        }

        let handle = self.handle(Some(engine.as_str()))?;
        handle
            .voices
            .get_or_refresh(|| handle.backend.list_voices())
            .await
            .map_err(|err| TtsServiceError::Backend(err.to_string()))
    }
}

/// Trim every word and drop blank ones, keeping order and duplicates
fn clean_words(words: &[String]) -> Vec<String> {
    words
        .iter()
        .map(|word| word.trim())
        .filter(|word| !word.is_empty())
        .map(str::to_string)
        .collect()
}

fn gate_failure(err: GateError, text: &str) -> TtsServiceError {
    match err {
        GateError::Backend { message, .. } => TtsServiceError::GenerationFailed {
            message,
            failed_words: vec![text.trim().to_string()],
        },
        GateError::Cancelled => TtsServiceError::Other(anyhow::anyhow!("synthesis was cancelled")),
    }
}
