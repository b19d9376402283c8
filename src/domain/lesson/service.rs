use super::model::{LessonSummary, LessonWords};
use crate::error::{AppError, AppResult};
use crate::infrastructure::repositories::LessonRepository;
use std::collections::BTreeSet;
use std::sync::Arc;

pub struct LessonService {
    lesson_repo: Arc<dyn LessonRepository>,
}

impl LessonService {
    pub fn new(lesson_repo: Arc<dyn LessonRepository>) -> Self {
        Self { lesson_repo }
    }

    pub async fn list_lessons(&self) -> AppResult<Vec<LessonSummary>> {
        self.lesson_repo.list_lessons().await
    }

    /// Words of a lesson, deduplicated and sorted
    pub async fn get_words(&self, grade: &str, lesson: &str) -> AppResult<LessonWords> {
        let (grade, lesson) = (grade.trim(), lesson.trim());
        let words = self
            .lesson_repo
            .find_words(grade, lesson)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("lesson {} / {}", grade, lesson)))?;

        let words = normalize_words(&words);
        tracing::debug!(grade, lesson, word_count = words.len(), "Lesson words loaded");

        Ok(LessonWords {
            total: words.len(),
            words,
        })
    }

    pub async fn add_words(&self, grade: &str, lesson: &str, words: &[String]) -> AppResult<()> {
        let (grade, lesson) = (grade.trim(), lesson.trim());
        if grade.is_empty() || lesson.is_empty() {
            return Err(AppError::BadRequest(
                "Grade and lesson cannot be empty".to_string(),
            ));
        }

        let words = normalize_words(words);
        if words.is_empty() {
            return Err(AppError::BadRequest("Word list cannot be empty".to_string()));
        }

        self.lesson_repo.upsert_words(grade, lesson, &words).await?;
        tracing::info!(grade, lesson, word_count = words.len(), "Lesson words saved");
        Ok(())
    }
}

/// Entries may hold comma-separated lists; split, trim, drop blanks, dedupe and sort
fn normalize_words(words: &[String]) -> Vec<String> {
    words
        .iter()
        .flat_map(|entry| entry.split([',', '，']))
        .map(str::trim)
        .filter(|word| !word.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
