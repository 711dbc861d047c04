//! Shinkan Database Layer
//!
//! The persistent reconciliation store behind the discovery/verification
//! pipeline: known volumes per series, the classification history of every
//! identifier ever seen, per-series pagination progress, the per-identifier
//! verification cache, operator overrides, alert dedup, and the
//! publisher-of-record per series.
//!
//! # Architecture
//!
//! - **Migrations**: SQL migrations are embedded and versioned using `SQLx`
//! - **Idempotence**: every mutation is an upsert or an idempotent insert,
//!   so re-running the same scan never creates duplicate rows
//! - **Single writer**: one logical scan process at a time; the pool is
//!   capped at one connection
//!
//! # Example
//!
//! ```ignore
//! use shinkan_db::Database;
//!
//! let db = Database::open("shinkan.db").await?;
//! let known = shinkan_db::volumes::known_urls(db.pool(), &series_id).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod alerts;
pub mod cache;
pub mod classifications;
pub mod connection;
pub mod error;
pub mod manual;
pub mod progress;
pub mod publishers;
pub mod volumes;

pub use cache::{CacheEntry, CachedTome};
pub use classifications::Outcome;
pub use error::{DatabaseError, Result};
pub use manual::ManualStatus;

use shinkan_core::SeriesId;
use sqlx::{Pool, Sqlite};
use std::path::Path;

/// High-level database interface.
///
/// Wraps the connection pool and handles initialization and migration.
#[derive(Debug, Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Open the store at the given path, creating it if missing, and run
    /// any pending migrations.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let pool = connection::open(path).await?;
        connection::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    /// Open an in-memory store with the full schema. Used by tests.
    pub async fn open_in_memory() -> Result<Self> {
        let pool = connection::open_in_memory().await?;
        connection::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    /// Get a reference to the underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Get the current schema version.
    pub async fn schema_version(&self) -> Result<i64> {
        connection::schema_version(&self.pool).await
    }

    /// Every identifier the store has ever seen for a series: the union
    /// of its volume rows and its classification history.
    ///
    /// An identifier in this set needs no further work during discovery —
    /// it is either already a candidate or already classified, and costs
    /// zero fetches either way.
    pub async fn known_identifiers(
        &self,
        series: &SeriesId,
    ) -> Result<std::collections::HashSet<String>> {
        let mut ids: std::collections::HashSet<String> =
            volumes::known_urls(&self.pool, series)
                .await?
                .into_iter()
                .map(|(item_id, _)| item_id)
                .collect();
        ids.extend(classifications::seen_items(&self.pool, series).await?);
        Ok(ids)
    }

    /// Remove every row, across all tables, keyed by the given series.
    ///
    /// Used when a series is removed (and potentially re-added later) to
    /// avoid stale cross-contamination. Per-identifier tables (the
    /// verification cache and manual statuses) are left intact: catalog
    /// facts and operator decisions are not series-scoped.
    pub async fn purge_series(&self, series: &SeriesId) -> Result<u64> {
        let mut removed = 0;

        for (table, column) in [
            ("volumes", "series"),
            ("classification_history", "series"),
            ("search_progress", "series"),
            ("alerts", "series"),
            ("series_publishers", "series"),
        ] {
            let result = sqlx::query(&format!("DELETE FROM {table} WHERE {column} = ?"))
                .bind(series.as_str())
                .execute(&self.pool)
                .await?;
            removed += result.rows_affected();
        }

        if removed > 0 {
            tracing::info!(series = %series, rows = removed, "purged series from store");
        }
        Ok(removed)
    }

    /// Close the database connection gracefully.
    pub async fn close(self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_schema_tables() {
        let db = Database::open_in_memory().await.expect("open database");

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' AND name != '_sqlx_migrations' ORDER BY name"
        )
        .fetch_all(db.pool())
        .await
        .expect("query tables");

        assert_eq!(
            tables,
            vec![
                "alerts",
                "classification_history",
                "manual_status",
                "search_progress",
                "series_publishers",
                "verification_cache",
                "volumes",
            ]
        );
    }

    #[tokio::test]
    async fn test_purge_series() {
        let db = Database::open_in_memory().await.expect("open database");
        let series = SeriesId::new("purge-me").expect("valid series ID");
        let other = SeriesId::new("keep-me").expect("valid series ID");
        let item = shinkan_core::ItemId::new("4091234567").expect("valid item ID");
        let other_item = shinkan_core::ItemId::new("4099876543").expect("valid item ID");

        volumes::upsert(
            db.pool(),
            &series,
            None,
            Some(1),
            &item,
            "https://catalog.example/dp/4091234567",
            Some("2026/01/01"),
            "title",
            Some("Kodansha"),
        )
        .await
        .expect("upsert volume");
        volumes::upsert(
            db.pool(),
            &other,
            None,
            Some(1),
            &other_item,
            "https://catalog.example/dp/4099876543",
            Some("2026/01/01"),
            "title",
            Some("Kodansha"),
        )
        .await
        .expect("upsert other volume");

        let removed = db.purge_series(&series).await.expect("purge");
        assert!(removed >= 1);

        let remaining = volumes::known_urls(db.pool(), &series)
            .await
            .expect("known urls");
        assert!(remaining.is_empty());

        // The other series is untouched
        let kept = volumes::known_urls(db.pool(), &other)
            .await
            .expect("known urls");
        assert_eq!(kept.len(), 1);
    }

    #[tokio::test]
    async fn test_known_identifiers_union() {
        let db = Database::open_in_memory().await.expect("open database");
        let series = SeriesId::new("union-series").expect("valid series ID");
        let volume_item = shinkan_core::ItemId::new("4090000001").expect("valid item ID");
        let classified_item = shinkan_core::ItemId::new("B0ABCDEF12").expect("valid item ID");

        volumes::upsert(
            db.pool(),
            &series,
            None,
            Some(1),
            &volume_item,
            "https://catalog.example/dp/4090000001",
            None,
            "title",
            None,
        )
        .await
        .expect("upsert volume");
        classifications::record(
            db.pool(),
            &series,
            &classified_item,
            Outcome::Digital,
            "search_p1",
            None,
            None,
        )
        .await
        .expect("record classification");

        let known = db.known_identifiers(&series).await.expect("known ids");
        assert_eq!(known.len(), 2);
        assert!(known.contains("4090000001"));
        assert!(known.contains("B0ABCDEF12"));
    }

    #[tokio::test]
    async fn test_close() {
        let db = Database::open_in_memory().await.expect("open database");
        db.close().await; // Should not panic
    }
}
