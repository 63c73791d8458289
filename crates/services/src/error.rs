//! Shared error types for the services crate.

use std::fmt;

use thiserror::Error;

use academy_core::model::{CourseId, LessonId};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Coarse failure classes reported by the progress tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgressFailureKind {
    RemoteUnavailable,
    AuthExpired,
    SchemaMismatch,
    CacheCorrupt,
}

impl ProgressFailureKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RemoteUnavailable => "remote_unavailable",
            Self::AuthExpired => "auth_expired",
            Self::SchemaMismatch => "schema_mismatch",
            Self::CacheCorrupt => "cache_corrupt",
        }
    }
}

impl fmt::Display for ProgressFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failures the progress tracker absorbs.
///
/// None of these reach the UI; they are logged and kept for diagnostics while
/// the tracker carries on with the best data it has.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("progress store unavailable: {0}")]
    RemoteUnavailable(String),
    #[error("session expired while talking to the progress store")]
    AuthExpired,
    #[error("progress store returned unexpected data: {0}")]
    SchemaMismatch(String),
    #[error("local progress cache unusable: {0}")]
    CacheCorrupt(String),
}

impl ProgressError {
    /// Classify a failure coming back from the remote progress store.
    #[must_use]
    pub fn from_remote(err: StorageError) -> Self {
        match err {
            StorageError::Unauthorized => Self::AuthExpired,
            StorageError::Serialization(detail) => Self::SchemaMismatch(detail),
            other => Self::RemoteUnavailable(other.to_string()),
        }
    }

    /// Any local cache failure means the slot cannot be trusted.
    #[must_use]
    pub fn from_cache(err: StorageError) -> Self {
        Self::CacheCorrupt(err.to_string())
    }

    #[must_use]
    pub fn kind(&self) -> ProgressFailureKind {
        match self {
            Self::RemoteUnavailable(_) => ProgressFailureKind::RemoteUnavailable,
            Self::AuthExpired => ProgressFailureKind::AuthExpired,
            Self::SchemaMismatch(_) => ProgressFailureKind::SchemaMismatch,
            Self::CacheCorrupt(_) => ProgressFailureKind::CacheCorrupt,
        }
    }
}

/// Errors emitted by `CatalogService` and the views built on it.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogServiceError {
    #[error("course not found: {0}")]
    CourseNotFound(CourseId),
    #[error("lesson {lesson_id} is not part of course {course_id}")]
    LessonNotFound {
        course_id: CourseId,
        lesson_id: LessonId,
    },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors raised while reading configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("{name} must not be empty")]
    Empty { name: &'static str },
    #[error("{name} is not a valid http(s) url: {value}")]
    InvalidUrl { name: &'static str, value: String },
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
