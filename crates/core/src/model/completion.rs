use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::{CourseId, LearnerId, LessonId};

/// Durable fact that a learner finished a lesson.
///
/// At most one record exists per `(learner_id, lesson_id)`. Completing the same
/// lesson again refreshes `completed_at` instead of creating a second record.
/// `course_id` is a denormalized reporting tag and plays no part in identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonCompletion {
    pub learner_id: LearnerId,
    pub lesson_id: LessonId,
    pub course_id: Option<CourseId>,
    pub completed_at: DateTime<Utc>,
}

impl LessonCompletion {
    #[must_use]
    pub fn new(
        learner_id: LearnerId,
        lesson_id: LessonId,
        course_id: Option<CourseId>,
        completed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            learner_id,
            lesson_id,
            course_id,
            completed_at,
        }
    }

    /// Key the remote store uses for uniqueness.
    #[must_use]
    pub fn key(&self) -> (&LearnerId, &LessonId) {
        (&self.learner_id, &self.lesson_id)
    }

    /// Returns the same completion re-stamped at `at`.
    ///
    /// A missing `course_id` on the repeat keeps the previously known tag.
    #[must_use]
    pub fn refreshed(mut self, at: DateTime<Utc>, course_id: Option<CourseId>) -> Self {
        self.completed_at = at;
        if course_id.is_some() {
            self.course_id = course_id;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use chrono::Duration;

    fn completion() -> LessonCompletion {
        LessonCompletion::new(
            LearnerId::new("u1").unwrap(),
            LessonId::new("L1").unwrap(),
            Some(CourseId::new("c1").unwrap()),
            fixed_now(),
        )
    }

    #[test]
    fn refresh_updates_timestamp_only() {
        let later = fixed_now() + Duration::hours(3);
        let refreshed = completion().refreshed(later, None);

        assert_eq!(refreshed.completed_at, later);
        assert_eq!(refreshed.course_id, Some(CourseId::new("c1").unwrap()));
        assert_eq!(refreshed.key(), completion().key());
    }

    #[test]
    fn refresh_replaces_course_tag_when_given() {
        let refreshed = completion().refreshed(fixed_now(), Some(CourseId::new("c2").unwrap()));
        assert_eq!(refreshed.course_id.unwrap().as_str(), "c2");
    }
}
