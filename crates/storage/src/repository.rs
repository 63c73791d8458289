use async_trait::async_trait;
use academy_core::model::{Course, CourseId, LearnerId, LessonCompletion, LessonId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("unauthorized")]
    Unauthorized,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Remote, multi-device source of truth for completion facts.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Lesson ids the learner has completed, oldest completion first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be reached or read.
    async fn fetch_completions(&self, learner_id: &LearnerId)
    -> Result<Vec<LessonId>, StorageError>;

    /// Insert or overwrite the completion keyed by `(learner_id, lesson_id)`.
    ///
    /// Last write wins on `completed_at`; there is no version check.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be stored.
    async fn upsert_completion(&self, completion: &LessonCompletion) -> Result<(), StorageError>;
}

/// Read-mostly supplier of course structure.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// All courses, newest first, with modules and lessons ordered by position.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn list_courses(&self) -> Result<Vec<Course>, StorageError>;

    /// Fetch a course by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn get_course(&self, id: &CourseId) -> Result<Option<Course>, StorageError>;

    /// Persist or replace a course together with its module and lesson tree.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the course cannot be stored.
    async fn upsert_course(&self, course: &Course) -> Result<(), StorageError>;
}

/// Same-device key/value slot for instant, offline-tolerant reads.
///
/// Calls are synchronous: callers rely on a write having landed before they
/// hand control back to the UI.
pub trait LocalCache: Send + Sync {
    /// Read the JSON value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` when the slot holds unparseable
    /// data, or `StorageError::Connection` when the backing medium fails.
    fn read(&self, key: &str) -> Result<Option<serde_json::Value>, StorageError>;

    /// Replace the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the value cannot be written.
    fn write(&self, key: &str, value: &serde_json::Value) -> Result<(), StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    completions: Arc<Mutex<Vec<LessonCompletion>>>,
    courses: Arc<Mutex<Vec<(u64, Course)>>>,
    next_seq: Arc<Mutex<u64>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored completion row, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn completions(&self) -> Result<Vec<LessonCompletion>, StorageError> {
        let guard = self
            .completions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.clone())
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn fetch_completions(
        &self,
        learner_id: &LearnerId,
    ) -> Result<Vec<LessonId>, StorageError> {
        let guard = self
            .completions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut rows: Vec<&LessonCompletion> = guard
            .iter()
            .filter(|c| &c.learner_id == learner_id)
            .collect();
        rows.sort_by(|a, b| {
            a.completed_at
                .cmp(&b.completed_at)
                .then_with(|| a.lesson_id.cmp(&b.lesson_id))
        });
        Ok(rows.into_iter().map(|c| c.lesson_id.clone()).collect())
    }

    async fn upsert_completion(&self, completion: &LessonCompletion) -> Result<(), StorageError> {
        let mut guard = self
            .completions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        match guard.iter_mut().find(|c| c.key() == completion.key()) {
            Some(existing) => {
                *existing = existing
                    .clone()
                    .refreshed(completion.completed_at, completion.course_id.clone());
            }
            None => guard.push(completion.clone()),
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogRepository for InMemoryRepository {
    async fn list_courses(&self) -> Result<Vec<Course>, StorageError> {
        let guard = self
            .courses
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut rows: Vec<&(u64, Course)> = guard.iter().collect();
        rows.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(rows
            .into_iter()
            .map(|(_, course)| {
                let mut course = course.clone();
                course.sort_structure();
                course
            })
            .collect())
    }

    async fn get_course(&self, id: &CourseId) -> Result<Option<Course>, StorageError> {
        let guard = self
            .courses
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.iter().find(|(_, c)| &c.id == id).map(|(_, course)| {
            let mut course = course.clone();
            course.sort_structure();
            course
        }))
    }

    async fn upsert_course(&self, course: &Course) -> Result<(), StorageError> {
        course
            .validate()
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let seq = {
            let mut next = self
                .next_seq
                .lock()
                .map_err(|e| StorageError::Connection(e.to_string()))?;
            *next += 1;
            *next
        };
        let mut guard = self
            .courses
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        match guard.iter_mut().find(|(_, c)| c.id == course.id) {
            Some((_, existing)) => *existing = course.clone(),
            None => guard.push((seq, course.clone())),
        }
        Ok(())
    }
}

/// In-memory `LocalCache`. Holds raw text so tests can plant corrupt entries.
#[derive(Clone, Default)]
pub struct InMemoryCache {
    slots: Arc<Mutex<HashMap<String, String>>>,
}

impl InMemoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `raw` verbatim under `key`, bypassing JSON encoding.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn write_raw(&self, key: &str, raw: impl Into<String>) -> Result<(), StorageError> {
        let mut guard = self
            .slots
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(key.to_owned(), raw.into());
        Ok(())
    }

    /// The raw text stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn read_raw(&self, key: &str) -> Result<Option<String>, StorageError> {
        let guard = self
            .slots
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(key).cloned())
    }
}

impl LocalCache for InMemoryCache {
    fn read(&self, key: &str) -> Result<Option<serde_json::Value>, StorageError> {
        self.read_raw(key)?
            .map(|raw| {
                serde_json::from_str(&raw).map_err(|e| StorageError::Serialization(e.to_string()))
            })
            .transpose()
    }

    fn write(&self, key: &str, value: &serde_json::Value) -> Result<(), StorageError> {
        self.write_raw(key, value.to_string())
    }
}

/// Aggregates the remote repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub progress: Arc<dyn ProgressRepository>,
    pub catalog: Arc<dyn CatalogRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let progress: Arc<dyn ProgressRepository> = Arc::new(repo.clone());
        let catalog: Arc<dyn CatalogRepository> = Arc::new(repo);
        Self { progress, catalog }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use academy_core::model::Module;
    use academy_core::time::fixed_now;
    use chrono::Duration;

    fn lesson(id: &str) -> LessonId {
        LessonId::new(id).unwrap()
    }

    fn learner(id: &str) -> LearnerId {
        LearnerId::new(id).unwrap()
    }

    fn course(id: &str) -> Course {
        Course {
            id: CourseId::new(id).unwrap(),
            title: format!("Course {id}"),
            description: String::new(),
            category: "Tech".into(),
            price_fcfa: 0,
            rating: 0.0,
            instructor_name: String::new(),
            duration: String::new(),
            level: String::new(),
            thumbnail_url: None,
            modules: Vec::<Module>::new(),
        }
    }

    #[tokio::test]
    async fn repeat_completion_updates_instead_of_duplicating() {
        let repo = InMemoryRepository::new();
        let first = LessonCompletion::new(learner("u1"), lesson("L1"), None, fixed_now());
        repo.upsert_completion(&first).await.unwrap();

        let later = fixed_now() + Duration::hours(1);
        let again = LessonCompletion::new(
            learner("u1"),
            lesson("L1"),
            Some(CourseId::new("c1").unwrap()),
            later,
        );
        repo.upsert_completion(&again).await.unwrap();

        let rows = repo.completions().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].completed_at, later);
        assert_eq!(rows[0].course_id.as_ref().unwrap().as_str(), "c1");
    }

    #[tokio::test]
    async fn fetch_is_scoped_to_learner_and_ordered() {
        let repo = InMemoryRepository::new();
        let now = fixed_now();
        for (who, id, offset) in [("u1", "B", 2), ("u2", "X", 0), ("u1", "A", 1)] {
            let c = LessonCompletion::new(
                learner(who),
                lesson(id),
                None,
                now + Duration::minutes(offset),
            );
            repo.upsert_completion(&c).await.unwrap();
        }

        let ids = repo.fetch_completions(&learner("u1")).await.unwrap();
        assert_eq!(ids, vec![lesson("A"), lesson("B")]);
    }

    #[tokio::test]
    async fn courses_list_newest_first() {
        let repo = InMemoryRepository::new();
        repo.upsert_course(&course("old")).await.unwrap();
        repo.upsert_course(&course("new")).await.unwrap();

        let listed = repo.list_courses().await.unwrap();
        let ids: Vec<&str> = listed.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "old"]);
        assert!(repo
            .get_course(&CourseId::new("missing").unwrap())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn invalid_course_is_rejected_and_not_stored() {
        let repo = InMemoryRepository::new();
        let mut untitled = course("blank");
        untitled.title = "  ".into();

        let err = repo.upsert_course(&untitled).await.unwrap_err();
        assert!(matches!(err, StorageError::Serialization(_)));
        assert!(repo.list_courses().await.unwrap().is_empty());
    }

    #[test]
    fn cache_reports_corrupt_entries() {
        let cache = InMemoryCache::new();
        cache.write_raw("progress", "{not json").unwrap();
        assert!(matches!(
            cache.read("progress"),
            Err(StorageError::Serialization(_))
        ));
        assert!(cache.read("other").unwrap().is_none());
    }
}
