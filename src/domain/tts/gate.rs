use super::cache_key::{normalize_text, CacheKey, SpeechRate};
use super::engine::Engine;
use crate::infrastructure::cache::AudioStore;
use crate::infrastructure::repositories::{BackendError, TtsRepository};
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Semaphore};
use tokio::task::AbortHandle;

/// One segment to synthesize, already normalized
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisRequest {
    pub text: String,
    pub voice: String,
    pub rate: SpeechRate,
}

impl SynthesisRequest {
    pub fn new(text: &str, voice: impl Into<String>, rate: f32) -> Self {
        Self {
            text: normalize_text(text),
            voice: voice.into(),
            rate: SpeechRate::new(rate),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Sleep before retry number `attempt` (1-based): `base * 2^(attempt-1)`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GateError {
    #[error("synthesis failed after {attempts} attempt(s): {message}")]
    Backend { message: String, attempts: u32 },
    #[error("synthesis was cancelled")]
    Cancelled,
}

type Outcome = Option<Result<Bytes, GateError>>;

struct InFlight {
    id: u64,
    rx: watch::Receiver<Outcome>,
    waiters: usize,
    abort: Option<AbortHandle>,
}

struct GateInner {
    engine: Engine,
    backend: Arc<dyn TtsRepository>,
    store: Arc<AudioStore>,
    permits: Semaphore,
    retry: RetryPolicy,
    in_flight: Mutex<HashMap<CacheKey, InFlight>>,
    next_id: AtomicU64,
}

/// Cache-first, deduplicated, bounded and retried access to one engine's
/// backend.
///
/// Concurrent requests for the same key share a single spawned synthesis.
/// Callers that go away only stop waiting; the shared work is aborted once
/// nobody is left to receive it.
#[derive(Clone)]
pub struct SynthesisGate {
    inner: Arc<GateInner>,
}

impl SynthesisGate {
    pub fn new(
        engine: Engine,
        backend: Arc<dyn TtsRepository>,
        store: Arc<AudioStore>,
        concurrency: usize,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            inner: Arc::new(GateInner {
                engine,
                backend,
                store,
                permits: Semaphore::new(concurrency.max(1)),
                retry,
                in_flight: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    pub fn engine(&self) -> Engine {
        self.inner.engine
    }

    pub fn key_for(&self, request: &SynthesisRequest) -> CacheKey {
        CacheKey::new(self.inner.engine, &request.voice, request.rate, &request.text)
    }

    pub async fn synthesize(&self, request: SynthesisRequest) -> Result<Bytes, GateError> {
        let key = self.key_for(&request);
        if let Some(hit) = self.inner.cached(&key).await {
            return Ok(hit);
        }

        let (id, mut rx) = self.join_or_start(key.clone(), request);
        let _waiter = Waiter {
            inner: self.inner.clone(),
            key,
            id,
        };

        let outcome = match rx.wait_for(Option::is_some).await {
            Ok(outcome) => outcome.clone().unwrap_or(Err(GateError::Cancelled)),
            Err(_) => Err(GateError::Cancelled),
        };
        outcome
    }

    fn join_or_start(
        &self,
        key: CacheKey,
        request: SynthesisRequest,
    ) -> (u64, watch::Receiver<Outcome>) {
        let mut registry = self.inner.in_flight.lock();

        if let Some(entry) = registry.get_mut(&key) {
            entry.waiters += 1;
            tracing::debug!(cache_key = %key, waiters = entry.waiters, "Joined in-flight synthesis");
            return (entry.id, entry.rx.clone());
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = watch::channel(None);
        registry.insert(
            key.clone(),
            InFlight {
                id,
                rx: rx.clone(),
                waiters: 1,
                abort: None,
            },
        );

        let inner = self.inner.clone();
        let task_key = key.clone();
        let handle = tokio::spawn(async move {
            let _registration = Registration {
                inner: inner.clone(),
                key: task_key.clone(),
                id,
            };
            let outcome = inner.generate(&task_key, &request).await;

            let mut registry = inner.in_flight.lock();
            if registry.get(&task_key).is_some_and(|entry| entry.id == id) {
                registry.remove(&task_key);
            }
            let _ = tx.send(Some(outcome));
        });

        if let Some(entry) = registry.get_mut(&key) {
            entry.abort = Some(handle.abort_handle());
        }
        (id, rx)
    }

    #[cfg(test)]
    fn in_flight_len(&self) -> usize {
        self.inner.in_flight.lock().len()
    }
}

impl GateInner {
    async fn cached(&self, key: &CacheKey) -> Option<Bytes> {
        match self.store.get(key).await {
            Ok(hit) => hit,
            Err(err) => {
                tracing::warn!(cache_key = %key, error = %err, "Cache read failed; treating as miss");
                None
            }
        }
    }

    async fn generate(&self, key: &CacheKey, request: &SynthesisRequest) -> Result<Bytes, GateError> {
        // A flight for this key may have finished between the caller's cache
        // check and registration.
        if let Some(hit) = self.cached(key).await {
            return Ok(hit);
        }

        let started_at = Instant::now();
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = {
                let _permit = self
                    .permits
                    .acquire()
                    .await
                    .map_err(|_| GateError::Cancelled)?;
                self.backend
                    .synthesize(&request.text, &request.voice, request.rate)
                    .await
            };

            let err = match result {
                Ok(audio) if !audio.is_empty() => {
                    let audio = Bytes::from(audio);
                    if let Err(err) = self.store.put(key, audio.clone()).await {
                        tracing::warn!(cache_key = %key, error = %err, "Failed to cache synthesized audio");
                    }
                    tracing::info!(
                        engine = %self.engine,
                        cache_key = %key,
                        attempts = attempt,
                        audio_size = audio.len(),
                        elapsed_ms = started_at.elapsed().as_millis() as u64,
                        "Segment synthesized"
                    );
                    return Ok(audio);
                }
                Ok(_) => BackendError::Transient("backend returned empty audio".to_string()),
                Err(err) => err,
            };

            if !err.is_transient() || attempt > self.retry.max_retries {
                tracing::error!(
                    engine = %self.engine,
                    cache_key = %key,
                    attempts = attempt,
                    error = %err,
                    "Synthesis failed"
                );
                return Err(GateError::Backend {
                    message: err.to_string(),
                    attempts: attempt,
                });
            }

            let delay = self.retry.delay_for(attempt);
            tracing::warn!(
                engine = %self.engine,
                cache_key = %key,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Transient synthesis failure; retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

/// Held by the spawned synthesis; clears its registration if the task is
/// aborted or panics before publishing an outcome.
struct Registration {
    inner: Arc<GateInner>,
    key: CacheKey,
    id: u64,
}

impl Drop for Registration {
    fn drop(&mut self) {
        let mut registry = self.inner.in_flight.lock();
        if registry.get(&self.key).is_some_and(|entry| entry.id == self.id) {
            registry.remove(&self.key);
        }
    }
}

/// Held by each caller while it waits on a flight
struct Waiter {
    inner: Arc<GateInner>,
    key: CacheKey,
    id: u64,
}

impl Drop for Waiter {
    fn drop(&mut self) {
        let abort = {
            let mut registry = self.inner.in_flight.lock();
            let Some(entry) = registry.get_mut(&self.key) else {
                return;
            };
            if entry.id != self.id {
                return;
            }
            entry.waiters = entry.waiters.saturating_sub(1);
            if entry.waiters > 0 {
                return;
            }
            registry.remove(&self.key).and_then(|entry| entry.abort)
        };

        if let Some(abort) = abort {
            tracing::debug!(cache_key = %self.key, "Last waiter left; aborting synthesis");
            abort.abort();
        }
    }
}
