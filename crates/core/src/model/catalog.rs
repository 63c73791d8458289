use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{CourseId, LessonId, ModuleId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("course title cannot be empty")]
    EmptyTitle,

    #[error("module {module} belongs to course {found}, expected {expected}")]
    ForeignModule {
        module: ModuleId,
        expected: CourseId,
        found: CourseId,
    },

    #[error("lesson {lesson} belongs to module {found}, expected {expected}")]
    ForeignLesson {
        lesson: LessonId,
        expected: ModuleId,
        found: ModuleId,
    },

    #[error("lesson {0} appears more than once in the course")]
    DuplicateLesson(LessonId),
}

//
// ─── LESSON ────────────────────────────────────────────────────────────────────
//

/// A single playable lesson.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub id: LessonId,
    pub module_id: ModuleId,
    pub title: String,
    pub duration: String,
    pub video_url: Option<String>,
    pub content: Option<String>,
    pub position: i64,
}

//
// ─── MODULE ────────────────────────────────────────────────────────────────────
//

/// Ordered group of lessons inside a course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub id: ModuleId,
    pub course_id: CourseId,
    pub title: String,
    pub position: i64,
    pub lessons: Vec<Lesson>,
}

//
// ─── COURSE ────────────────────────────────────────────────────────────────────
//

/// Catalog entry with its module and lesson tree.
///
/// The structure is read-only to progress tracking; callers use
/// [`Course::lesson_ids`] to build the per-course id list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: CourseId,
    pub title: String,
    pub description: String,
    pub category: String,
    pub price_fcfa: i64,
    pub rating: f32,
    pub instructor_name: String,
    pub duration: String,
    pub level: String,
    pub thumbnail_url: Option<String>,
    pub modules: Vec<Module>,
}

impl Course {
    /// Checks the tree is internally consistent.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` for a blank title, a module or lesson attached to
    /// the wrong parent, or a lesson id used twice.
    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.title.trim().is_empty() {
            return Err(CatalogError::EmptyTitle);
        }
        let mut seen = std::collections::HashSet::new();
        for module in &self.modules {
            if module.course_id != self.id {
                return Err(CatalogError::ForeignModule {
                    module: module.id.clone(),
                    expected: self.id.clone(),
                    found: module.course_id.clone(),
                });
            }
            for lesson in &module.lessons {
                if lesson.module_id != module.id {
                    return Err(CatalogError::ForeignLesson {
                        lesson: lesson.id.clone(),
                        expected: module.id.clone(),
                        found: lesson.module_id.clone(),
                    });
                }
                if !seen.insert(&lesson.id) {
                    return Err(CatalogError::DuplicateLesson(lesson.id.clone()));
                }
            }
        }
        Ok(())
    }

    /// Orders modules, and lessons within each module, by `position`.
    pub fn sort_structure(&mut self) {
        self.modules.sort_by_key(|m| m.position);
        for module in &mut self.modules {
            module.lessons.sort_by_key(|l| l.position);
        }
    }

    /// Lessons in display order.
    pub fn lessons(&self) -> impl Iterator<Item = &Lesson> {
        self.modules.iter().flat_map(|m| m.lessons.iter())
    }

    /// Lesson ids in display order.
    #[must_use]
    pub fn lesson_ids(&self) -> Vec<LessonId> {
        self.lessons().map(|l| l.id.clone()).collect()
    }

    #[must_use]
    pub fn lesson_count(&self) -> usize {
        self.modules.iter().map(|m| m.lessons.len()).sum()
    }

    #[must_use]
    pub fn first_lesson(&self) -> Option<&Lesson> {
        self.lessons().next()
    }

    /// Finds a lesson together with the module that holds it.
    #[must_use]
    pub fn find_lesson(&self, lesson_id: &LessonId) -> Option<(&Module, &Lesson)> {
        self.modules.iter().find_map(|module| {
            module
                .lessons
                .iter()
                .find(|l| &l.id == lesson_id)
                .map(|lesson| (module, lesson))
        })
    }

    /// The lesson played after `lesson_id`, crossing module boundaries.
    #[must_use]
    pub fn next_lesson(&self, lesson_id: &LessonId) -> Option<&Lesson> {
        let mut lessons = self.lessons();
        lessons.by_ref().find(|l| &l.id == lesson_id)?;
        lessons.next()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
