use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;

use crate::controllers::ApiResponse;
use crate::infrastructure::admission::{AdmissionStatus, SessionAdmission};
use crate::infrastructure::repositories::LessonRepository;

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

pub async fn health_ready(State(lessons): State<Arc<dyn LessonRepository>>) -> impl IntoResponse {
    match lessons.ping().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "status": "ready",
                "database": "connected"
            })),
        ),
        Err(err) => {
            tracing::warn!(error = %err, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "not_ready",
                    "database": "disconnected"
                })),
            )
        }
    }
}

/// GET /api/status - Admission slots in use
pub async fn status(
    State(admission): State<Arc<SessionAdmission>>,
) -> Json<ApiResponse<AdmissionStatus>> {
    Json(ApiResponse::data(admission.status()))
}
