use academy_core::model::{LearnerId, LessonCompletion, LessonId};
use async_trait::async_trait;

use super::SqliteRepository;
use super::mapping::{conn, lesson_id_from_row};
use crate::repository::{ProgressRepository, StorageError};

#[async_trait]
impl ProgressRepository for SqliteRepository {
    async fn fetch_completions(
        &self,
        learner_id: &LearnerId,
    ) -> Result<Vec<LessonId>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT lesson_id
                FROM user_progress
                WHERE user_id = ?1 AND completed = 1
                ORDER BY last_watched_at ASC, lesson_id ASC
            ",
        )
        .bind(learner_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter()
            .map(|row| lesson_id_from_row(row, "lesson_id"))
            .collect()
    }

    async fn upsert_completion(&self, completion: &LessonCompletion) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO user_progress (user_id, lesson_id, course_id, completed, last_watched_at)
            VALUES (?1, ?2, ?3, 1, ?4)
            ON CONFLICT(user_id, lesson_id) DO UPDATE SET
                course_id = COALESCE(excluded.course_id, user_progress.course_id),
                completed = 1,
                last_watched_at = excluded.last_watched_at
            ",
        )
        .bind(completion.learner_id.as_str())
        .bind(completion.lesson_id.as_str())
        .bind(completion.course_id.as_ref().map(|c| c.as_str().to_owned()))
        .bind(completion.completed_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }
}
