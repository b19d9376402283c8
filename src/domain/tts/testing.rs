use crate::domain::tts::{SpeechRate, VoiceInfo};
use crate::infrastructure::repositories::{BackendError, TtsRepository};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Instrumented in-memory backend. Audio for `text` is `<text>`.
#[derive(Default)]
pub struct FakeBackend {
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    delay: Option<Duration>,
    rejected: Mutex<HashSet<String>>,
    transient_failures: AtomicUsize,
    spoken: Mutex<Vec<String>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call sleeps for `delay` before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Calls for `word` always fail with a non-transient error
    pub fn reject(self, word: &str) -> Self {
        self.rejected.lock().insert(word.to_string());
        self
    }

    /// The next `count` calls fail with a transient error
    pub fn fail_transiently(self, count: usize) -> Self {
        self.transient_failures.store(count, Ordering::SeqCst);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Texts passed to the backend, in call order
    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().clone()
    }

    pub fn audio_for(text: &str) -> Vec<u8> {
        format!("<{}>", text).into_bytes()
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl TtsRepository for FakeBackend {
    async fn synthesize(
        &self,
        text: &str,
        _voice: &str,
        _rate: SpeechRate,
    ) -> Result<Vec<u8>, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.spoken.lock().push(text.to_string());

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _in_flight = InFlight(&self.in_flight);
        self.peak.fetch_max(current, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.rejected.lock().contains(text) {
            return Err(BackendError::Rejected(format!("cannot speak {}", text)));
        }

        let failing = self
            .transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(BackendError::Transient("throttled".to_string()));
        }

        Ok(Self::audio_for(text))
    }

    async fn list_voices(&self) -> Result<Vec<VoiceInfo>, BackendError> {
        Ok(vec![VoiceInfo {
            name: "Fake".to_string(),
            locale: "cmn-CN".to_string(),
            gender: "Female".to_string(),
        }])
    }
}
