use async_trait::async_trait;
use bytes::Bytes;
use dictation_backend::controllers::{lessons::LessonController, tts::TtsController};
use dictation_backend::domain::lesson::{LessonService, LessonSummary};
use dictation_backend::domain::tts::{
    BatchOrchestrator, Engine, EngineHandle, PromptAssets, RetryPolicy, SpeechRate,
    SynthesisGate, TtsService, VoiceInfo,
};
use dictation_backend::error::AppResult;
use dictation_backend::infrastructure::admission::{AdmissionConfig, SessionAdmission};
use dictation_backend::infrastructure::audio::StreamConcatMuxer;
use dictation_backend::infrastructure::cache::AudioStore;
use dictation_backend::infrastructure::http::{build_router, HttpComponents};
use dictation_backend::infrastructure::repositories::{
    BackendError, LessonRepository, TtsRepository,
};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use test_context::AsyncTestContext;
use tokio::net::TcpListener;

pub mod api_client;

use api_client::TestClient;

/// Words the scripted backend refuses to speak
pub const REJECTED_WORD: &str = "explode";

pub const MAX_SESSIONS: usize = 2;

/// Speech backend answering `<text>` for every text
#[derive(Default)]
pub struct ScriptedBackend {
    calls: AtomicUsize,
}

impl ScriptedBackend {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn audio_for(text: &str) -> Vec<u8> {
        format!("<{}>", text).into_bytes()
    }
}

#[async_trait]
impl TtsRepository for ScriptedBackend {
    async fn synthesize(
        &self,
        text: &str,
        _voice: &str,
        _rate: SpeechRate,
    ) -> Result<Vec<u8>, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if text == REJECTED_WORD {
            return Err(BackendError::Rejected(format!("cannot speak '{}'", text)));
        }
        Ok(Self::audio_for(text))
    }

    async fn list_voices(&self) -> Result<Vec<VoiceInfo>, BackendError> {
        Ok(vec![VoiceInfo {
            name: "Joanna".to_string(),
            locale: "en-US".to_string(),
            gender: "Female".to_string(),
        }])
    }
}

#[derive(Default)]
pub struct InMemoryLessons {
    lessons: Mutex<BTreeMap<(String, String), Vec<String>>>,
}

#[async_trait]
impl LessonRepository for InMemoryLessons {
    async fn list_lessons(&self) -> AppResult<Vec<LessonSummary>> {
        Ok(self
            .lessons
            .lock()
            .iter()
            .map(|((grade, lesson), words)| LessonSummary {
                grade: grade.clone(),
                lesson: lesson.clone(),
                word_count: words.len() as i64,
            })
            .collect())
    }

    async fn find_words(&self, grade: &str, lesson: &str) -> AppResult<Option<Vec<String>>> {
        Ok(self
            .lessons
            .lock()
            .get(&(grade.to_string(), lesson.to_string()))
            .cloned())
    }

    async fn upsert_words(&self, grade: &str, lesson: &str, words: &[String]) -> AppResult<()> {
        self.lessons
            .lock()
            .insert((grade.to_string(), lesson.to_string()), words.to_vec());
        Ok(())
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}

pub struct TestContext {
    pub client: TestClient,
    pub backend: Arc<ScriptedBackend>,
    pub admission: Arc<SessionAdmission>,
    _cache_dir: TempDir,
}

impl AsyncTestContext for TestContext {
    fn setup() -> impl std::future::Future<Output = Self> + Send {
        async {
            let cache_dir = TempDir::new().expect("Failed to create cache dir");
            let store = Arc::new(
                AudioStore::new(cache_dir.path(), 64).expect("Failed to create audio store"),
            );

            let backend = Arc::new(ScriptedBackend::default());
            let gate = SynthesisGate::new(
                Engine::Polly,
                backend.clone(),
                store,
                3,
                RetryPolicy {
                    max_retries: 0,
                    base_delay: Duration::from_millis(1),
                },
            );
            let engine = EngineHandle::new(gate, backend.clone(), "Joanna", Duration::from_secs(60));

            let assets = PromptAssets::from_parts(
                Bytes::from_static(b"[intro]"),
                Bytes::from_static(b"[outro]"),
                Bytes::from_static(b"_"),
            );
            let orchestrator =
                BatchOrchestrator::new(Arc::new(StreamConcatMuxer), Arc::new(assets), 4);
            let tts_service = Arc::new(TtsService::new(vec![engine], Engine::Polly, orchestrator));

            let lesson_repo: Arc<dyn LessonRepository> = Arc::new(InMemoryLessons::default());
            let lesson_service = Arc::new(LessonService::new(lesson_repo.clone()));

            let admission = Arc::new(SessionAdmission::new(AdmissionConfig {
                max_sessions: MAX_SESSIONS,
                session_timeout: Duration::from_secs(300),
                sweep_interval: Duration::from_secs(30),
                wait_timeout: Duration::from_millis(300),
            }));

            let app = build_router(HttpComponents {
                tts_controller: Arc::new(TtsController::new(tts_service)),
                lesson_controller: Arc::new(LessonController::new(lesson_service)),
                lesson_repo,
                admission: admission.clone(),
                static_dir: None,
            });

            // Start server
            let listener = TcpListener::bind("127.0.0.1:0")
                .await
                .expect("Failed to bind listener");
            let addr = listener.local_addr().expect("Failed to get local addr");
            let base_url = format!("http://{}", addr);

            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });

            Self {
                client: TestClient::new(&base_url),
                backend,
                admission,
                _cache_dir: cache_dir,
            }
        }
    }

    fn teardown(self) -> impl std::future::Future<Output = ()> + Send {
        async {
            // Cache directory is removed when the TempDir drops
        }
    }
}
