#![forbid(unsafe_code)]

pub mod app_services;
pub mod catalog_service;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod identity;
pub mod progress;
pub mod rest_store;

pub use academy_core::Clock;

pub use app_services::AppServices;
pub use catalog_service::{CatalogService, LessonContext};
pub use config::{ProgressConfig, RestStoreConfig};
pub use dashboard::{
    Certificate, CertificateOverview, CertificateService, CourseCard, DashboardService,
    DashboardSummary,
};
pub use error::{
    AppServicesError, CatalogServiceError, ConfigError, ProgressError, ProgressFailureKind,
};
pub use identity::{IdentityProvider, SessionIdentity};
pub use progress::{
    PendingReconcile, ProgressFailure, ProgressOperation, ProgressTracker, ReconcileOutcome,
    TrackerPhase,
};
pub use rest_store::RestProgressStore;
