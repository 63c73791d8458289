#![forbid(unsafe_code)]

pub mod cache;
pub mod repository;
pub mod sqlite;

pub use cache::FileCache;
pub use sqlite::{SqliteOptions, SqliteRepository};
pub use repository::{
    CatalogRepository, InMemoryCache, InMemoryRepository, LocalCache, ProgressRepository, Storage,
    StorageError,
};
