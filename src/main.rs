use async_openai::{config::OpenAIConfig, Client as OpenAiClient};
use dictation_backend::controllers::{lessons::LessonController, tts::TtsController};
use dictation_backend::domain::lesson::LessonService;
use dictation_backend::domain::tts::{
    BatchOrchestrator, Engine, EngineHandle, PromptAssets, SynthesisGate, TtsService,
};
use dictation_backend::infrastructure::admission::SessionAdmission;
use dictation_backend::infrastructure::audio::{AudioMuxer, FfmpegMuxer, StreamConcatMuxer};
use dictation_backend::infrastructure::cache::AudioStore;
use dictation_backend::infrastructure::config::{Config, LogFormat};
use dictation_backend::infrastructure::db::{check_connection, create_pool};
use dictation_backend::infrastructure::http::{start_http_server, HttpComponents};
use dictation_backend::infrastructure::repositories::{
    LessonRepository, OpenAiTtsRepository, PgLessonRepository, PollyTtsRepository, TtsRepository,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    init_logging(&config);

    tracing::info!(
        development = config.is_development(),
        "Starting Dictation Backend on {}:{}",
        config.host,
        config.port
    );

    // Create database connection pool
    let pool = create_pool(&config.database_url).await?;
    tracing::info!("Database connection pool created");

    check_connection(&pool).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database connection verified and migrations applied");

    let pool = Arc::new(pool);
    let config = Arc::new(config);

    // === DEPENDENCY INJECTION SETUP ===
    // 1. Audio cache, shared by every engine
    let store = Arc::new(AudioStore::new(
        &config.cache_dir,
        config.memory_cache_capacity,
    )?);
    tracing::info!(cache_dir = %config.cache_dir.display(), "Audio cache ready");

    // 2. Speech backends, one gate per engine
    tracing::info!("Initializing AWS Polly client with region: {}", config.aws_region);
    let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(aws_config::Region::new(config.aws_region.clone()))
        .load()
        .await;
    let polly_client = Arc::new(aws_sdk_polly::Client::new(&aws_config));

    let mut engines = Vec::new();
    let polly: Arc<dyn TtsRepository> = Arc::new(PollyTtsRepository::new(polly_client));
    engines.push(engine_handle(&config, Engine::Polly, polly, &store, &config.polly_default_voice));

    match &config.openai_api_key {
        Some(api_key) => {
            let client = OpenAiClient::with_config(OpenAIConfig::new().with_api_key(api_key));
            let openai: Arc<dyn TtsRepository> = Arc::new(OpenAiTtsRepository::new(
                Arc::new(client),
                config.openai_tts_model.clone(),
            ));
            engines.push(engine_handle(&config, Engine::OpenAi, openai, &store, &config.openai_default_voice));
            tracing::info!(model = %config.openai_tts_model, "OpenAI speech engine enabled");
        }
        None => tracing::info!("OPENAI_API_KEY not set; OpenAI speech engine disabled"),
    }

    // 3. Prompt assets, synthesized through the default engine
    let default_handle = engines
        .iter()
        .find(|handle| handle.engine() == config.default_engine)
        .ok_or_else(|| format!("default engine {} is not configured", config.default_engine))?;
    let assets = PromptAssets::load_or_create(
        &config.cache_dir,
        default_handle.gate(),
        default_handle.default_voice(),
        &config.intro_text,
        &config.outro_text,
    )
    .await?;

    let muxer: Arc<dyn AudioMuxer> = match &config.ffmpeg_path {
        Some(path) => {
            tracing::info!(ffmpeg = %path.display(), "Using ffmpeg for assembly");
            Arc::new(FfmpegMuxer::new(path.clone()))
        }
        None => Arc::new(StreamConcatMuxer),
    };
    let orchestrator = BatchOrchestrator::new(muxer, Arc::new(assets), config.batch_chunk_size);

    // 4. Services
    tracing::info!("Instantiating services...");
    let tts_service = Arc::new(TtsService::new(engines, config.default_engine, orchestrator));
    let lesson_repo: Arc<dyn LessonRepository> = Arc::new(PgLessonRepository::new(pool.clone()));
    let lesson_service = Arc::new(LessonService::new(lesson_repo.clone()));

    // 5. Admission control
    let admission = Arc::new(SessionAdmission::new(config.admission()));
    admission.spawn_sweeper();

    // 6. Controllers
    tracing::info!("Instantiating controllers...");
    let components = HttpComponents {
        tts_controller: Arc::new(TtsController::new(tts_service)),
        lesson_controller: Arc::new(LessonController::new(lesson_service)),
        lesson_repo,
        admission,
        static_dir: config.static_dir.clone(),
    };

    start_http_server(config, components).await?;

    Ok(())
}

fn engine_handle(
    config: &Config,
    engine: Engine,
    backend: Arc<dyn TtsRepository>,
    store: &Arc<AudioStore>,
    default_voice: &str,
) -> EngineHandle {
    let gate = SynthesisGate::new(
        engine,
        backend.clone(),
        store.clone(),
        config.synthesis_concurrency,
        config.retry_policy(),
    );
    EngineHandle::new(gate, backend, default_voice, config.voices_cache_ttl())
}

fn init_logging(config: &Config) {
    if config.log_format == LogFormat::Json {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "dictation_backend=debug,tower_http=debug".into()),
            )
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "dictation_backend=debug,tower_http=debug".into()),
            )
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }
}
