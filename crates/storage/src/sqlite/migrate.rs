use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
    let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
        .bind(version)
        .fetch_optional(pool)
        .await?;
    Ok(row.is_some())
}

/// Applies pending schema versions in order, each inside its own transaction.
///
/// Version 1 holds the course catalog tree, version 2 the per-learner
/// completion facts.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    let migrations: [(i64, &[&str]); 2] = [(1, CATALOG_SCHEMA), (2, PROGRESS_SCHEMA)];
    for (version, statements) in migrations {
        if is_applied(pool, version).await? {
            continue;
        }

        let mut tx = pool.begin().await?;
        for statement in statements {
            sqlx::query(*statement).execute(&mut *tx).await?;
        }
        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(version)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::info!(version, "applied schema migration");
    }

    Ok(())
}

const CATALOG_SCHEMA: &[&str] = &[
    r"
        CREATE TABLE IF NOT EXISTS courses (
            id TEXT PRIMARY KEY CHECK (id <> ''),
            title TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            category TEXT NOT NULL DEFAULT '',
            price_fcfa INTEGER NOT NULL DEFAULT 0 CHECK (price_fcfa >= 0),
            rating REAL NOT NULL DEFAULT 0,
            instructor_name TEXT NOT NULL DEFAULT '',
            duration TEXT NOT NULL DEFAULT '',
            level TEXT NOT NULL DEFAULT '',
            thumbnail_url TEXT
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS modules (
            id TEXT PRIMARY KEY CHECK (id <> ''),
            course_id TEXT NOT NULL,
            title TEXT NOT NULL,
            position INTEGER NOT NULL,
            FOREIGN KEY (course_id) REFERENCES courses(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS lessons (
            id TEXT PRIMARY KEY CHECK (id <> ''),
            module_id TEXT NOT NULL,
            title TEXT NOT NULL,
            duration TEXT NOT NULL DEFAULT '',
            video_url TEXT,
            content TEXT,
            position INTEGER NOT NULL,
            FOREIGN KEY (module_id) REFERENCES modules(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_modules_course_position
            ON modules (course_id, position);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_lessons_module_position
            ON lessons (module_id, position);
    ",
];

const PROGRESS_SCHEMA: &[&str] = &[
    r"
        CREATE TABLE IF NOT EXISTS user_progress (
            id INTEGER PRIMARY KEY,
            user_id TEXT NOT NULL CHECK (user_id <> ''),
            lesson_id TEXT NOT NULL CHECK (lesson_id <> ''),
            course_id TEXT,
            completed INTEGER NOT NULL DEFAULT 1 CHECK (completed IN (0, 1)),
            last_watched_at TEXT NOT NULL,
            UNIQUE (user_id, lesson_id)
        );
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_user_progress_user_completed
            ON user_progress (user_id, completed, last_watched_at);
    ",
];
