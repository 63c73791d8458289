use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use thiserror::Error;

use crate::repository::{CatalogRepository, ProgressRepository, Storage};

mod catalog_repo;
mod mapping;
mod migrate;
mod progress_repo;

#[derive(Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SqliteInitError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Pool sizing and per-connection settings.
///
/// Foreign keys are always enforced; the catalog relies on cascading deletes
/// when a course tree is replaced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SqliteOptions {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    /// How long a writer waits on a locked database before failing.
    pub busy_timeout: Duration,
    pub create_if_missing: bool,
}

impl Default for SqliteOptions {
    fn default() -> Self {
        Self {
            max_connections: 5,
            acquire_timeout: Duration::from_secs(5),
            busy_timeout: Duration::from_secs(5),
            create_if_missing: true,
        }
    }
}

impl SqliteOptions {
    #[must_use]
    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections.max(1);
        self
    }

    #[must_use]
    pub fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }

    fn connect_options(&self, database_url: &str) -> Result<SqliteConnectOptions, SqliteInitError> {
        Ok(SqliteConnectOptions::from_str(database_url)?
            .foreign_keys(true)
            .busy_timeout(self.busy_timeout)
            .create_if_missing(self.create_if_missing))
    }
}

impl SqliteRepository {
    /// Connect with default [`SqliteOptions`].
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if the url is malformed or the pool cannot
    /// be opened.
    pub async fn connect(database_url: &str) -> Result<Self, SqliteInitError> {
        Self::connect_with(database_url, &SqliteOptions::default()).await
    }

    /// Connect using explicit pool and connection settings.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if the url is malformed or the pool cannot
    /// be opened.
    pub async fn connect_with(
        database_url: &str,
        options: &SqliteOptions,
    ) -> Result<Self, SqliteInitError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(options.max_connections)
            .acquire_timeout(options.acquire_timeout)
            .connect_with(options.connect_options(database_url)?)
            .await?;
        tracing::debug!(
            url = database_url,
            max_connections = options.max_connections,
            "sqlite pool ready"
        );
        Ok(Self { pool })
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create tables if they do not exist.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if migration queries fail.
    pub async fn migrate(&self) -> Result<(), SqliteInitError> {
        migrate::run_migrations(&self.pool).await
    }
}

impl Storage {
    /// Build a `Storage` backed by `SQLite`.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if connection or migrations cannot be
    /// completed.
    pub async fn sqlite(database_url: &str) -> Result<Self, SqliteInitError> {
        Self::sqlite_with(database_url, &SqliteOptions::default()).await
    }

    /// Like [`Storage::sqlite`], with explicit pool settings.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if connection or migrations cannot be
    /// completed.
    pub async fn sqlite_with(
        database_url: &str,
        options: &SqliteOptions,
    ) -> Result<Self, SqliteInitError> {
        let repo = SqliteRepository::connect_with(database_url, options).await?;
        repo.migrate().await?;
        let progress: Arc<dyn ProgressRepository> = Arc::new(repo.clone());
        let catalog: Arc<dyn CatalogRepository> = Arc::new(repo);
        Ok(Self { progress, catalog })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repository_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SqliteRepository>();
    }

    #[test]
    fn pool_size_never_drops_to_zero() {
        let options = SqliteOptions::default().with_max_connections(0);
        assert_eq!(options.max_connections, 1);
    }

    #[tokio::test]
    async fn connections_enforce_foreign_keys() {
        let options = SqliteOptions::default()
            .with_max_connections(2)
            .with_busy_timeout(Duration::from_millis(250));
        let repo = SqliteRepository::connect_with(
            "sqlite:file:sqlite_options_pragmas?mode=memory&cache=shared",
            &options,
        )
        .await
        .unwrap();

        let enabled: i64 = sqlx::query_scalar("PRAGMA foreign_keys")
            .fetch_one(repo.pool())
            .await
            .unwrap();
        assert_eq!(enabled, 1);
        let busy: i64 = sqlx::query_scalar("PRAGMA busy_timeout")
            .fetch_one(repo.pool())
            .await
            .unwrap();
        assert_eq!(busy, 250);
    }
}
