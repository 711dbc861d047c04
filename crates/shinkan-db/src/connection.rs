//! Database connection management.
//!
//! Provides a thin pool wrapper around `SQLx` that handles opening the
//! store file and running embedded migrations.

use crate::error::{DatabaseError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;

/// Open a connection pool for the store file, creating it if missing.
///
/// The pool is capped at a single connection: the store has exactly one
/// logical writer by construction (series are scanned strictly one at a
/// time), and a single connection keeps `:memory:` databases coherent in
/// tests.
pub async fn open(path: impl AsRef<Path>) -> Result<Pool<Sqlite>> {
    let options = SqliteConnectOptions::new()
        .filename(path.as_ref())
        .create_if_missing(true);

    connect(options).await
}

/// Open an in-memory database, used by tests.
pub async fn open_in_memory() -> Result<Pool<Sqlite>> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .map_err(|e| DatabaseError::Open(format!("invalid connection string: {e}")))?;

    connect(options).await
}

async fn connect(options: SqliteConnectOptions) -> Result<Pool<Sqlite>> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .map_err(|e| DatabaseError::Open(format!("failed to open pool: {e}")))?;

    Ok(pool)
}

/// Run all pending database migrations.
///
/// Uses `SQLx`'s built-in migration system which tracks applied migrations
/// in a `_sqlx_migrations` table; re-running is idempotent.
///
/// # Errors
/// Returns `DatabaseError::Migration` if any migration fails to execute.
pub async fn run_migrations(pool: &Pool<Sqlite>) -> Result<()> {
    tracing::info!("Running database migrations");

    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| DatabaseError::Migration(format!("migration execution failed: {e}")))?;

    tracing::info!("Database migrations completed");
    Ok(())
}

/// Get the current schema version (the number of applied migrations, 0 if
/// none have been applied yet).
pub async fn schema_version(pool: &Pool<Sqlite>) -> Result<i64> {
    let table_exists = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='_sqlx_migrations'",
    )
    .fetch_one(pool)
    .await?
        > 0;

    if !table_exists {
        return Ok(0);
    }

    let version =
        sqlx::query_scalar::<_, i64>("SELECT COALESCE(MAX(version), 0) FROM _sqlx_migrations")
            .fetch_optional(pool)
            .await?
            .unwrap_or(0);

    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_in_memory() {
        let pool = open_in_memory().await.expect("open in-memory pool");
        sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .expect("trivial query");
    }

    #[tokio::test]
    async fn test_migrations_and_version() {
        let pool = open_in_memory().await.expect("open in-memory pool");

        let before = schema_version(&pool).await.expect("get version");
        assert_eq!(before, 0);

        run_migrations(&pool).await.expect("run migrations");

        let after = schema_version(&pool).await.expect("get version");
        assert_eq!(after, 1);
    }

    #[tokio::test]
    async fn test_migrations_idempotent() {
        let pool = open_in_memory().await.expect("open in-memory pool");
        run_migrations(&pool).await.expect("first run");
        run_migrations(&pool).await.expect("second run is idempotent");
    }
}
