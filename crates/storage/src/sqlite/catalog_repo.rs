use academy_core::model::{Course, CourseId};
use async_trait::async_trait;

use super::SqliteRepository;
use super::mapping::{assemble, conn, map_course_row, map_lesson_row, map_module_row};
use crate::repository::{CatalogRepository, StorageError};

const COURSE_COLUMNS: &str = "id, title, description, category, price_fcfa, rating, \
     instructor_name, duration, level, thumbnail_url";

#[async_trait]
impl CatalogRepository for SqliteRepository {
    async fn list_courses(&self) -> Result<Vec<Course>, StorageError> {
        let course_rows = sqlx::query(&format!(
            "SELECT {COURSE_COLUMNS} FROM courses ORDER BY rowid DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;
        let module_rows = sqlx::query(
            "SELECT id, course_id, title, position FROM modules ORDER BY position ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;
        let lesson_rows = sqlx::query(
            r"
                SELECT id, module_id, title, duration, video_url, content, position
                FROM lessons
                ORDER BY position ASC, id ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let courses = course_rows
            .iter()
            .map(map_course_row)
            .collect::<Result<Vec<_>, _>>()?;
        let modules = module_rows
            .iter()
            .map(map_module_row)
            .collect::<Result<Vec<_>, _>>()?;
        let lessons = lesson_rows
            .iter()
            .map(map_lesson_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(assemble(courses, modules, lessons))
    }

    async fn get_course(&self, id: &CourseId) -> Result<Option<Course>, StorageError> {
        let Some(course_row) = sqlx::query(&format!(
            "SELECT {COURSE_COLUMNS} FROM courses WHERE id = ?1"
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?
        else {
            return Ok(None);
        };

        let module_rows = sqlx::query(
            r"
                SELECT id, course_id, title, position
                FROM modules
                WHERE course_id = ?1
                ORDER BY position ASC, id ASC
            ",
        )
        .bind(id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;
        let lesson_rows = sqlx::query(
            r"
                SELECT l.id, l.module_id, l.title, l.duration, l.video_url, l.content, l.position
                FROM lessons l
                JOIN modules m ON m.id = l.module_id
                WHERE m.course_id = ?1
                ORDER BY l.position ASC, l.id ASC
            ",
        )
        .bind(id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let course = map_course_row(&course_row)?;
        let modules = module_rows
            .iter()
            .map(map_module_row)
            .collect::<Result<Vec<_>, _>>()?;
        let lessons = lesson_rows
            .iter()
            .map(map_lesson_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(assemble(vec![course], modules, lessons).into_iter().next())
    }

    async fn upsert_course(&self, course: &Course) -> Result<(), StorageError> {
        course
            .validate()
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        let mut tx = self.pool.begin().await.map_err(conn)?;

        sqlx::query(
            r"
            INSERT INTO courses (
                id, title, description, category, price_fcfa, rating,
                instructor_name, duration, level, thumbnail_url
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                description = excluded.description,
                category = excluded.category,
                price_fcfa = excluded.price_fcfa,
                rating = excluded.rating,
                instructor_name = excluded.instructor_name,
                duration = excluded.duration,
                level = excluded.level,
                thumbnail_url = excluded.thumbnail_url
            ",
        )
        .bind(course.id.as_str())
        .bind(&course.title)
        .bind(&course.description)
        .bind(&course.category)
        .bind(course.price_fcfa)
        .bind(f64::from(course.rating))
        .bind(&course.instructor_name)
        .bind(&course.duration)
        .bind(&course.level)
        .bind(course.thumbnail_url.as_deref())
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        // the tree is replaced wholesale; lessons go with their modules
        sqlx::query("DELETE FROM modules WHERE course_id = ?1")
            .bind(course.id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        for module in &course.modules {
            sqlx::query(
                "INSERT INTO modules (id, course_id, title, position) VALUES (?1, ?2, ?3, ?4)",
            )
            .bind(module.id.as_str())
            .bind(course.id.as_str())
            .bind(&module.title)
            .bind(module.position)
            .execute(&mut *tx)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(db) if db.is_unique_violation() => StorageError::Conflict,
                other => conn(other),
            })?;

            for lesson in &module.lessons {
                sqlx::query(
                    r"
                    INSERT INTO lessons (
                        id, module_id, title, duration, video_url, content, position
                    )
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                    ",
                )
                .bind(lesson.id.as_str())
                .bind(module.id.as_str())
                .bind(&lesson.title)
                .bind(&lesson.duration)
                .bind(lesson.video_url.as_deref())
                .bind(lesson.content.as_deref())
                .bind(lesson.position)
                .execute(&mut *tx)
                .await
                .map_err(|e| match e {
                    sqlx::Error::Database(db) if db.is_unique_violation() => {
                        StorageError::Conflict
                    }
                    other => conn(other),
                })?;
            }
        }

        tx.commit().await.map_err(conn)?;
        Ok(())
    }
}
