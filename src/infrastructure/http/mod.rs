pub mod request_id;

pub use request_id::{request_id_middleware, RequestId, X_REQUEST_ID};

use axum::{
    http::{header, HeaderName},
    middleware,
    routing::{get, post},
    Router,
};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::controllers::{
    health,
    lessons::LessonController,
    tts::{TtsController, CACHE_KEY_HEADER, FAILED_WORDS_HEADER},
};
use crate::infrastructure::admission::{admission_middleware, SessionAdmission};
use crate::infrastructure::config::Config;
use crate::infrastructure::repositories::LessonRepository;

/// Everything the router needs, wired by the caller
#[derive(Clone)]
pub struct HttpComponents {
    pub tts_controller: Arc<TtsController>,
    pub lesson_controller: Arc<LessonController>,
    pub lesson_repo: Arc<dyn LessonRepository>,
    pub admission: Arc<SessionAdmission>,
    /// Frontend files served for unmatched paths
    pub static_dir: Option<PathBuf>,
}

/// Build the application router with all routes and layers
pub fn build_router(components: HttpComponents) -> Router {
    // Generation routes pass through admission control
    let tts_routes = Router::new()
        .route("/api/tts", post(TtsController::synthesize))
        .route("/api/tts/batch", post(TtsController::synthesize_batch))
        .route("/api/tts/check-cache", post(TtsController::check_cache))
        .route("/api/tts/voices", get(TtsController::list_voices))
        .with_state(components.tts_controller.clone());

    let lesson_routes = Router::new()
        .route("/api/lessons", get(LessonController::list_lessons))
        .route(
            "/api/lessons/:grade/:lesson/words",
            get(LessonController::get_words).post(LessonController::add_words),
        )
        .with_state(components.lesson_controller.clone());

    let status_routes = Router::new()
        .route("/api/status", get(health::status))
        .with_state(components.admission.clone());

    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::health_ready))
        .with_state(components.lesson_repo.clone());

    let mut app = Router::new()
        .merge(health_routes)
        .merge(status_routes)
        .merge(lesson_routes)
        .merge(tts_routes);

    if let Some(dir) = &components.static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([
            header::CONTENT_DISPOSITION,
            HeaderName::from_static(FAILED_WORDS_HEADER),
            HeaderName::from_static(CACHE_KEY_HEADER),
            HeaderName::from_static(X_REQUEST_ID),
        ]);

    app.layer(middleware::from_fn_with_state(
        components.admission.clone(),
        admission_middleware,
    ))
    .layer(middleware::from_fn(request_id_middleware))
    .layer(cors)
    .layer(TraceLayer::new_for_http())
}

/// Start the HTTP server with all routes configured
pub async fn start_http_server(
    config: Arc<Config>,
    components: HttpComponents,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = build_router(components);

    let listener =
        tokio::net::TcpListener::bind(format!("{}:{}", config.host, config.port)).await?;

    tracing::info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
