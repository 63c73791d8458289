use std::sync::Arc;

use academy_core::model::{Course, CourseId, Lesson, LessonId};
use storage::repository::CatalogRepository;

use crate::error::CatalogServiceError;
use crate::progress::ProgressTracker;

/// Everything the lesson player needs to render one lesson.
#[derive(Debug, Clone, PartialEq)]
pub struct LessonContext {
    pub course_id: CourseId,
    pub course_title: String,
    pub module_title: String,
    pub lesson: Lesson,
    pub next_lesson_id: Option<LessonId>,
    pub completed: bool,
    pub course_percentage: u8,
}

/// Read access to the course catalog, plus publishing for seed data.
#[derive(Clone)]
pub struct CatalogService {
    catalog: Arc<dyn CatalogRepository>,
}

impl CatalogService {
    #[must_use]
    pub fn new(catalog: Arc<dyn CatalogRepository>) -> Self {
        Self { catalog }
    }

    /// All courses, newest first, with modules and lessons in position order.
    ///
    /// # Errors
    ///
    /// Returns `CatalogServiceError::Storage` if repository access fails.
    pub async fn list_courses(&self) -> Result<Vec<Course>, CatalogServiceError> {
        let mut courses = self.catalog.list_courses().await?;
        for course in &mut courses {
            course.sort_structure();
        }
        Ok(courses)
    }

    /// Fetch one course tree.
    ///
    /// # Errors
    ///
    /// Returns `CatalogServiceError::CourseNotFound` for an unknown id.
    /// Returns `CatalogServiceError::Storage` if repository access fails.
    pub async fn course(&self, course_id: &CourseId) -> Result<Course, CatalogServiceError> {
        let mut course = self
            .catalog
            .get_course(course_id)
            .await?
            .ok_or_else(|| CatalogServiceError::CourseNotFound(course_id.clone()))?;
        course.sort_structure();
        Ok(course)
    }

    /// The course's lesson ids in play order, for per-course progress.
    ///
    /// # Errors
    ///
    /// Same as [`CatalogService::course`].
    pub async fn lesson_ids(&self, course_id: &CourseId) -> Result<Vec<LessonId>, CatalogServiceError> {
        Ok(self.course(course_id).await?.lesson_ids())
    }

    /// Resolve a lesson inside its course together with the learner's state.
    ///
    /// # Errors
    ///
    /// Returns `CatalogServiceError::LessonNotFound` if the lesson is not part
    /// of the course, otherwise the same errors as [`CatalogService::course`].
    pub async fn lesson_context(
        &self,
        course_id: &CourseId,
        lesson_id: &LessonId,
        tracker: &ProgressTracker,
    ) -> Result<LessonContext, CatalogServiceError> {
        let course = self.course(course_id).await?;
        let (module, lesson) = course.find_lesson(lesson_id).ok_or_else(|| {
            CatalogServiceError::LessonNotFound {
                course_id: course_id.clone(),
                lesson_id: lesson_id.clone(),
            }
        })?;
        let ids = course.lesson_ids();

        Ok(LessonContext {
            course_id: course.id.clone(),
            course_title: course.title.clone(),
            module_title: module.title.clone(),
            lesson: lesson.clone(),
            next_lesson_id: course.next_lesson(lesson_id).map(|l| l.id.clone()),
            completed: tracker.is_lesson_completed(lesson_id),
            course_percentage: tracker.get_progress(course_id, ids.len(), Some(ids.as_slice())),
        })
    }

    /// Insert or replace a course tree.
    ///
    /// # Errors
    ///
    /// Returns `CatalogServiceError::Storage` if the tree is invalid or the
    /// write fails.
    pub async fn publish(&self, course: &Course) -> Result<(), CatalogServiceError> {
        self.catalog.upsert_course(course).await?;
        tracing::info!(course = %course.id, lessons = course.lesson_count(), "course published");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProgressConfig;
    use academy_core::model::{Module, ModuleId};
    use academy_core::time::fixed_clock;
    use storage::repository::{InMemoryCache, InMemoryRepository};

    fn lesson(module: &str, id: &str, position: i64) -> Lesson {
        Lesson {
            id: LessonId::new(id).unwrap(),
            module_id: ModuleId::new(module).unwrap(),
            title: format!("Lesson {id}"),
            duration: "10:00".into(),
            video_url: None,
            content: None,
            position,
        }
    }

    fn course() -> Course {
        Course {
            id: CourseId::new("C1").unwrap(),
            title: "Montage video".into(),
            description: String::new(),
            category: "Video".into(),
            price_fcfa: 15_000,
            rating: 4.5,
            instructor_name: "Awa".into(),
            duration: "2h".into(),
            level: "Beginner".into(),
            thumbnail_url: None,
            modules: vec![
                Module {
                    id: ModuleId::new("M2").unwrap(),
                    course_id: CourseId::new("C1").unwrap(),
                    title: "Export".into(),
                    position: 2,
                    lessons: vec![lesson("M2", "L3", 1)],
                },
                Module {
                    id: ModuleId::new("M1").unwrap(),
                    course_id: CourseId::new("C1").unwrap(),
                    title: "Timeline".into(),
                    position: 1,
                    lessons: vec![lesson("M1", "L2", 2), lesson("M1", "L1", 1)],
                },
            ],
        }
    }

    async fn service() -> CatalogService {
        let repo = InMemoryRepository::new();
        let service = CatalogService::new(Arc::new(repo));
        service.publish(&course()).await.unwrap();
        service
    }

    #[tokio::test]
    async fn lesson_ids_follow_module_then_lesson_position() {
        let service = service().await;
        let ids = service.lesson_ids(&CourseId::new("C1").unwrap()).await.unwrap();
        let ids: Vec<_> = ids.iter().map(LessonId::as_str).collect();
        assert_eq!(ids, ["L1", "L2", "L3"]);
    }

    #[tokio::test]
    async fn unknown_course_is_not_found() {
        let service = service().await;
        let err = service.course(&CourseId::new("nope").unwrap()).await.unwrap_err();
        assert!(matches!(err, CatalogServiceError::CourseNotFound(_)));
    }

    #[tokio::test]
    async fn lesson_context_reports_next_lesson_and_completion() {
        let service = service().await;
        let tracker = ProgressTracker::mount(
            &ProgressConfig::default(),
            Arc::new(InMemoryCache::new()),
            Arc::new(InMemoryRepository::new()),
            fixed_clock(),
        );
        tracker.complete_lesson(LessonId::new("L2").unwrap(), None);

        let ctx = service
            .lesson_context(
                &CourseId::new("C1").unwrap(),
                &LessonId::new("L2").unwrap(),
                &tracker,
            )
            .await
            .unwrap();

        assert_eq!(ctx.module_title, "Timeline");
        assert_eq!(ctx.next_lesson_id, Some(LessonId::new("L3").unwrap()));
        assert!(ctx.completed);
        assert_eq!(ctx.course_percentage, 33);

        let missing = service
            .lesson_context(
                &CourseId::new("C1").unwrap(),
                &LessonId::new("L9").unwrap(),
                &tracker,
            )
            .await
            .unwrap_err();
        assert!(matches!(missing, CatalogServiceError::LessonNotFound { .. }));
    }
}
