use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use crate::{
    controllers::ApiResponse,
    domain::lesson::{LessonService, LessonSummary, LessonWords},
    error::AppResult,
};

pub struct LessonController {
    lesson_service: Arc<LessonService>,
}

impl LessonController {
    pub fn new(lesson_service: Arc<LessonService>) -> Self {
        Self { lesson_service }
    }

    /// GET /api/lessons
    pub async fn list_lessons(
        State(controller): State<Arc<LessonController>>,
    ) -> AppResult<Json<ApiResponse<Vec<LessonSummary>>>> {
        let lessons = controller.lesson_service.list_lessons().await?;
        Ok(Json(ApiResponse::data(lessons)))
    }

    /// GET /api/lessons/:grade/:lesson/words
    pub async fn get_words(
        State(controller): State<Arc<LessonController>>,
        Path((grade, lesson)): Path<(String, String)>,
    ) -> AppResult<Json<ApiResponse<LessonWords>>> {
        let words = controller.lesson_service.get_words(&grade, &lesson).await?;
        Ok(Json(ApiResponse::data(words)))
    }

    /// POST /api/lessons/:grade/:lesson/words - body is a JSON array of words
    pub async fn add_words(
        State(controller): State<Arc<LessonController>>,
        Path((grade, lesson)): Path<(String, String)>,
        Json(words): Json<Vec<String>>,
    ) -> AppResult<Json<ApiResponse<()>>> {
        controller
            .lesson_service
            .add_words(&grade, &lesson, &words)
            .await?;
        Ok(Json(ApiResponse::message("Words saved")))
    }
}
