use crate::domain::lesson::LessonSummary;
use crate::error::AppResult;
use crate::infrastructure::db::{check_connection, DbPool};
use async_trait::async_trait;
use std::sync::Arc;

/// Word lists keyed by (grade, lesson)
#[async_trait]
pub trait LessonRepository: Send + Sync {
    /// All lessons, ordered by grade then lesson
    async fn list_lessons(&self) -> AppResult<Vec<LessonSummary>>;

    /// Words of one lesson, or `None` when the lesson does not exist
    async fn find_words(&self, grade: &str, lesson: &str) -> AppResult<Option<Vec<String>>>;

    /// Replace the word list of a lesson, creating it when missing
    async fn upsert_words(&self, grade: &str, lesson: &str, words: &[String]) -> AppResult<()>;

    /// Verify the backing store is reachable
    async fn ping(&self) -> AppResult<()>;
}

pub struct PgLessonRepository {
    pool: Arc<DbPool>,
}

impl PgLessonRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LessonRepository for PgLessonRepository {
    async fn list_lessons(&self) -> AppResult<Vec<LessonSummary>> {
        let lessons = sqlx::query_as::<_, LessonSummary>(
            r#"
            SELECT grade, lesson, cardinality(words)::BIGINT AS word_count
            FROM lessons
            ORDER BY grade, lesson
            "#,
        )
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(lessons)
    }

    async fn find_words(&self, grade: &str, lesson: &str) -> AppResult<Option<Vec<String>>> {
        let words = sqlx::query_scalar::<_, Vec<String>>(
            r#"
            SELECT words
            FROM lessons
            WHERE grade = $1 AND lesson = $2
            "#,
        )
        .bind(grade)
        .bind(lesson)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(words)
    }

    async fn upsert_words(&self, grade: &str, lesson: &str, words: &[String]) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO lessons (grade, lesson, words, created_at, updated_at)
            VALUES ($1, $2, $3, NOW(), NOW())
            ON CONFLICT (grade, lesson)
            DO UPDATE SET words = EXCLUDED.words, updated_at = NOW()
            "#,
        )
        .bind(grade)
        .bind(lesson)
        .bind(words)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn ping(&self) -> AppResult<()> {
        check_connection(&self.pool).await?;
        Ok(())
    }
}
