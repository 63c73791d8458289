use std::sync::Arc;

use storage::FileCache;
use storage::repository::{LocalCache, ProgressRepository, Storage};
use tokio::task::JoinHandle;

use crate::Clock;
use crate::catalog_service::CatalogService;
use crate::config::{ProgressConfig, RestStoreConfig};
use crate::dashboard::{CertificateService, DashboardService};
use crate::error::AppServicesError;
use crate::identity::{IdentityProvider, SessionIdentity};
use crate::progress::ProgressTracker;
use crate::rest_store::RestProgressStore;

/// Assembles the app-facing services around one progress tracker.
#[derive(Clone)]
pub struct AppServices {
    identity: SessionIdentity,
    tracker: ProgressTracker,
    catalog: Arc<CatalogService>,
    dashboard: Arc<DashboardService>,
    certificates: Arc<CertificateService>,
}

impl AppServices {
    /// Build services backed by `SQLite` for the catalog and a file cache for
    /// progress. Completions go to the REST store when one is configured and
    /// to the same database otherwise.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage or the cache directory cannot be
    /// initialized.
    pub async fn new_sqlite(
        db_url: &str,
        config: &ProgressConfig,
        rest: Option<RestStoreConfig>,
        clock: Clock,
    ) -> Result<Self, AppServicesError> {
        let mut storage = Storage::sqlite(db_url).await?;
        if let Some(rest) = rest {
            tracing::info!(url = %rest.base_url, "using REST progress store");
            let remote: Arc<dyn ProgressRepository> = Arc::new(RestProgressStore::new(rest));
            storage.progress = remote;
        }
        let cache: Arc<dyn LocalCache> = Arc::new(FileCache::open(config.cache_dir.clone())?);
        Ok(Self::from_parts(&storage, cache, config, clock))
    }

    /// Wire services from already-built storage.
    #[must_use]
    pub fn from_parts(
        storage: &Storage,
        cache: Arc<dyn LocalCache>,
        config: &ProgressConfig,
        clock: Clock,
    ) -> Self {
        let tracker =
            ProgressTracker::mount(config, cache, Arc::clone(&storage.progress), clock.clone());
        let catalog = CatalogService::new(Arc::clone(&storage.catalog));
        let dashboard = Arc::new(DashboardService::new(catalog.clone()));
        let certificates = Arc::new(CertificateService::new(catalog.clone(), clock));

        Self {
            identity: SessionIdentity::anonymous(),
            tracker,
            catalog: Arc::new(catalog),
            dashboard,
            certificates,
        }
    }

    /// Start feeding identity changes into the tracker.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn follow_identity(&self) -> JoinHandle<()> {
        self.tracker.follow_identity(&self.identity as &dyn IdentityProvider)
    }

    #[must_use]
    pub fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    #[must_use]
    pub fn tracker(&self) -> &ProgressTracker {
        &self.tracker
    }

    #[must_use]
    pub fn catalog(&self) -> Arc<CatalogService> {
        Arc::clone(&self.catalog)
    }

    #[must_use]
    pub fn dashboard(&self) -> Arc<DashboardService> {
        Arc::clone(&self.dashboard)
    }

    #[must_use]
    pub fn certificates(&self) -> Arc<CertificateService> {
        Arc::clone(&self.certificates)
    }
}
