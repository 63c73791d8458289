use academy_core::model::{Course, CourseId, CourseProgress, Identity, LessonId};
use chrono::{DateTime, Utc};

use crate::Clock;
use crate::catalog_service::CatalogService;
use crate::error::CatalogServiceError;
use crate::progress::ProgressTracker;

/// Name printed on a certificate when the learner has not set one.
pub const DEFAULT_HOLDER_NAME: &str = "Student";

/// Progress line for one course on the dashboard.
#[derive(Debug, Clone, PartialEq)]
pub struct CourseCard {
    pub course_id: CourseId,
    pub title: String,
    pub instructor_name: String,
    pub progress: CourseProgress,
    /// Where "continue" should land: the first lesson not yet completed,
    /// or the first lesson when everything is done.
    pub resume_lesson_id: Option<LessonId>,
}

/// Everything the learner dashboard shows.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSummary {
    pub courses: Vec<CourseCard>,
    /// Completed lessons over every lesson in the catalog.
    pub global_percentage: u8,
    pub completed_lessons: usize,
    pub total_lessons: usize,
}

/// Builds the dashboard from the catalog and the tracker snapshot.
#[derive(Clone)]
pub struct DashboardService {
    catalog: CatalogService,
}

impl DashboardService {
    #[must_use]
    pub fn new(catalog: CatalogService) -> Self {
        Self { catalog }
    }

    /// Summarize progress over the whole catalog.
    ///
    /// # Errors
    ///
    /// Returns `CatalogServiceError::Storage` if the catalog cannot be read.
    pub async fn summary(
        &self,
        tracker: &ProgressTracker,
    ) -> Result<DashboardSummary, CatalogServiceError> {
        let courses = self.catalog.list_courses().await?;
        let total_lessons: usize = courses.iter().map(Course::lesson_count).sum();

        let cards = courses
            .iter()
            .map(|course| course_card(course, tracker))
            .collect();
        let global_percentage = tracker.global_progress(total_lessons);

        Ok(DashboardSummary {
            courses: cards,
            global_percentage,
            completed_lessons: tracker.completed_lessons().len(),
            total_lessons,
        })
    }
}

fn course_card(course: &Course, tracker: &ProgressTracker) -> CourseCard {
    let ids = course.lesson_ids();
    let progress = tracker.course_progress(&ids);
    let resume_lesson_id = ids
        .iter()
        .find(|id| !tracker.is_lesson_completed(id))
        .or_else(|| ids.first())
        .cloned();
    CourseCard {
        course_id: course.id.clone(),
        title: course.title.clone(),
        instructor_name: course.instructor_name.clone(),
        progress,
        resume_lesson_id,
    }
}

//
// ─── CERTIFICATES ──────────────────────────────────────────────────────────────
//

/// A certificate for a fully completed course.
#[derive(Debug, Clone, PartialEq)]
pub struct Certificate {
    pub course_id: CourseId,
    pub course_title: String,
    pub instructor_name: String,
    pub holder_name: String,
    pub issued_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CertificateOverview {
    pub earned: Vec<Certificate>,
    /// Started but unfinished courses.
    pub in_progress: Vec<CourseCard>,
}

/// Derives certificates from completion state. Nothing is persisted.
#[derive(Clone)]
pub struct CertificateService {
    catalog: CatalogService,
    clock: Clock,
}

impl CertificateService {
    #[must_use]
    pub fn new(catalog: CatalogService, clock: Clock) -> Self {
        Self { catalog, clock }
    }

    /// Split the catalog into earned certificates and courses in progress.
    ///
    /// # Errors
    ///
    /// Returns `CatalogServiceError::Storage` if the catalog cannot be read.
    pub async fn overview(
        &self,
        tracker: &ProgressTracker,
        identity: Option<&Identity>,
    ) -> Result<CertificateOverview, CatalogServiceError> {
        let holder_name = identity
            .and_then(|i| i.display_name.clone())
            .unwrap_or_else(|| DEFAULT_HOLDER_NAME.to_owned());
        let issued_at = self.clock.now();

        let mut earned = Vec::new();
        let mut in_progress = Vec::new();
        for course in self.catalog.list_courses().await? {
            let card = course_card(&course, tracker);
            if card.progress.is_complete() {
                earned.push(Certificate {
                    course_id: card.course_id,
                    course_title: card.title,
                    instructor_name: card.instructor_name,
                    holder_name: holder_name.clone(),
                    issued_at,
                });
            } else if card.progress.is_started() {
                in_progress.push(card);
            }
        }

        tracing::debug!(earned = earned.len(), in_progress = in_progress.len(), "certificates derived");
        Ok(CertificateOverview {
            earned,
            in_progress,
        })
    }
}
