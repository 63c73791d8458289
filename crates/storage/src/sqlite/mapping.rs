use academy_core::model::{Course, CourseId, Lesson, LessonId, Module, ModuleId};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn lesson_id_from_row(row: &SqliteRow, column: &str) -> Result<LessonId, StorageError> {
    LessonId::new(row.try_get::<String, _>(column).map_err(ser)?).map_err(ser)
}

/// Course columns only; modules are attached by the caller.
pub(crate) fn map_course_row(row: &SqliteRow) -> Result<Course, StorageError> {
    let rating: f64 = row.try_get("rating").map_err(ser)?;
    #[allow(clippy::cast_possible_truncation)]
    let rating = rating as f32;
    Ok(Course {
        id: CourseId::new(row.try_get::<String, _>("id").map_err(ser)?).map_err(ser)?,
        title: row.try_get("title").map_err(ser)?,
        description: row.try_get("description").map_err(ser)?,
        category: row.try_get("category").map_err(ser)?,
        price_fcfa: row.try_get("price_fcfa").map_err(ser)?,
        rating,
        instructor_name: row.try_get("instructor_name").map_err(ser)?,
        duration: row.try_get("duration").map_err(ser)?,
        level: row.try_get("level").map_err(ser)?,
        thumbnail_url: row.try_get("thumbnail_url").map_err(ser)?,
        modules: Vec::new(),
    })
}

pub(crate) fn map_module_row(row: &SqliteRow) -> Result<Module, StorageError> {
    Ok(Module {
        id: ModuleId::new(row.try_get::<String, _>("id").map_err(ser)?).map_err(ser)?,
        course_id: CourseId::new(row.try_get::<String, _>("course_id").map_err(ser)?)
            .map_err(ser)?,
        title: row.try_get("title").map_err(ser)?,
        position: row.try_get("position").map_err(ser)?,
        lessons: Vec::new(),
    })
}

pub(crate) fn map_lesson_row(row: &SqliteRow) -> Result<Lesson, StorageError> {
    Ok(Lesson {
        id: lesson_id_from_row(row, "id")?,
        module_id: ModuleId::new(row.try_get::<String, _>("module_id").map_err(ser)?)
            .map_err(ser)?,
        title: row.try_get("title").map_err(ser)?,
        duration: row.try_get("duration").map_err(ser)?,
        video_url: row.try_get("video_url").map_err(ser)?,
        content: row.try_get("content").map_err(ser)?,
        position: row.try_get("position").map_err(ser)?,
    })
}

/// Hangs lessons under their modules and modules under their courses.
///
/// Rows must already be ordered by position; orphans are dropped with a warning.
pub(crate) fn assemble(
    mut courses: Vec<Course>,
    mut modules: Vec<Module>,
    lessons: Vec<Lesson>,
) -> Vec<Course> {
    for lesson in lessons {
        match modules.iter_mut().find(|m| m.id == lesson.module_id) {
            Some(module) => module.lessons.push(lesson),
            None => tracing::warn!(lesson = %lesson.id, "lesson without module skipped"),
        }
    }
    for module in modules {
        match courses.iter_mut().find(|c| c.id == module.course_id) {
            Some(course) => course.modules.push(module),
            None => tracing::warn!(module = %module.id, "module without course skipped"),
        }
    }
    courses
}
