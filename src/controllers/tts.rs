use async_stream::stream;
use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::sse::{Event, KeepAlive, Sse},
    response::IntoResponse,
    Json,
};
use std::convert::Infallible;
use std::sync::Arc;

use crate::{
    controllers::ApiResponse,
    domain::tts::{
        BatchTtsRequest, CheckCacheRequest, TtsRequest, TtsServiceApi, VoiceInfo, VoicesQuery,
    },
    error::{AppError, AppResult},
};

/// Longest text accepted by POST /api/tts
pub const MAX_TEXT_CHARS: usize = 10_000;

/// Words left out of a partially assembled batch, as URL-encoded JSON
pub const FAILED_WORDS_HEADER: &str = "x-failed-words";
pub const CACHE_KEY_HEADER: &str = "x-cache-key";

pub struct TtsController {
    tts_service: Arc<dyn TtsServiceApi>,
}

fn header_value(value: &str) -> AppResult<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| AppError::Internal(format!("invalid header value: {}", e)))
}

fn audio_headers(file_name: &str) -> AppResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("audio/mpeg"));
    headers.insert(
        header::CONTENT_DISPOSITION,
        header_value(&format!("attachment; filename=\"{}\"", file_name))?,
    );
    Ok(headers)
}

impl TtsController {
    pub fn new(tts_service: Arc<dyn TtsServiceApi>) -> Self {
        Self { tts_service }
    }

    /// POST /api/tts - Speak one text
    pub async fn synthesize(
        State(controller): State<Arc<TtsController>>,
        Json(request): Json<TtsRequest>,
    ) -> AppResult<(StatusCode, HeaderMap, Body)> {
        if request.text.trim().is_empty() {
            return Err(AppError::BadRequest("Text cannot be empty".to_string()));
        }
        if request.text.chars().count() > MAX_TEXT_CHARS {
            return Err(AppError::PayloadTooLarge(format!(
                "Text must be {} characters or less",
                MAX_TEXT_CHARS
            )));
        }

        let outcome = controller.tts_service.synthesize_one(request).await?;

        let mut headers = audio_headers(&outcome.cache_key.file_name())?;
        headers.insert(CACHE_KEY_HEADER, header_value(outcome.cache_key.as_str())?);

        Ok((StatusCode::OK, headers, Body::from(outcome.audio)))
    }

    /// POST /api/tts/batch - Assemble a dictation recording
    pub async fn synthesize_batch(
        State(controller): State<Arc<TtsController>>,
        Json(request): Json<BatchTtsRequest>,
    ) -> AppResult<(StatusCode, HeaderMap, Body)> {
        let outcome = controller.tts_service.synthesize_batch(request).await?;

        let mut headers = audio_headers(&outcome.file_name)?;
        if !outcome.failed_words.is_empty() {
            let failed = serde_json::to_string(&outcome.failed_words)
                .map_err(|e| AppError::Internal(e.to_string()))?;
            headers.insert(
                FAILED_WORDS_HEADER,
                header_value(&urlencoding::encode(&failed))?,
            );
        }

        Ok((StatusCode::OK, headers, Body::from(outcome.audio)))
    }

    /// POST /api/tts/check-cache - Warm the cache, streaming progress as SSE
    pub async fn check_cache(
        State(controller): State<Arc<TtsController>>,
        Json(request): Json<CheckCacheRequest>,
    ) -> AppResult<impl IntoResponse> {
        let mut updates = controller.tts_service.check_cache(request).await?;

        let events = stream! {
            while let Some(update) = updates.recv().await {
                match Event::default().event("progress").json_data(&update) {
                    Ok(event) => yield Ok::<Event, Infallible>(event),
                    Err(err) => tracing::error!(error = %err, "Failed to encode progress event"),
                }
            }
        };

        Ok(Sse::new(events).keep_alive(KeepAlive::default()))
    }

    /// GET /api/tts/voices?engine= - Voice catalog of an engine
    pub async fn list_voices(
        State(controller): State<Arc<TtsController>>,
        Query(query): Query<VoicesQuery>,
    ) -> AppResult<Json<ApiResponse<Vec<VoiceInfo>>>> {
        let voices = controller
            .tts_service
            .list_voices(query.engine.as_deref())
            .await?;

        Ok(Json(ApiResponse::data(voices)))
    }
}
