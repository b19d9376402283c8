use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One (grade, lesson) pair with the size of its word list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct LessonSummary {
    pub grade: String,
    pub lesson: String,
    pub word_count: i64,
}

/// Response body for GET /api/lessons/{grade}/{lesson}/words
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonWords {
    pub words: Vec<String>,
    pub total: usize,
}
