mod catalog;
mod completion;
mod identity;
mod ids;
mod progress;

pub use catalog::{CatalogError, Course, Lesson, Module};
pub use completion::LessonCompletion;
pub use identity::Identity;
pub use ids::{CourseId, IdError, LearnerId, LessonId, ModuleId};
pub use progress::{CourseProgress, ProgressSnapshot, percentage};
