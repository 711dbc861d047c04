//! Per-series catalog-search pagination progress.
//!
//! Multi-page discovery is spread across runs: page 1 is re-scanned every
//! run (newest items surface first), while progress beyond it is persisted
//! here so exhausted pages are never re-fetched.

use crate::error::Result;
use chrono::Utc;
use shinkan_core::SeriesId;
use sqlx::{Pool, Row, Sqlite};

/// Pagination progress for one series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    /// Last catalog-search page fully processed (0 = none yet)
    pub last_page: u32,
    /// Whether exploration reached the end of the result set
    pub complete: bool,
}

/// Read the progress for a series, defaulting to "nothing explored".
pub async fn get(pool: &Pool<Sqlite>, series: &SeriesId) -> Result<Progress> {
    let row = sqlx::query("SELECT last_page, complete FROM search_progress WHERE series = ?")
        .bind(series.as_str())
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => {
            let last_page: i64 = row.try_get("last_page")?;
            let complete: i64 = row.try_get("complete")?;
            Ok(Progress {
                last_page: u32::try_from(last_page).unwrap_or(0),
                complete: complete != 0,
            })
        }
        None => Ok(Progress::default()),
    }
}

/// Record the last fully-processed page, optionally marking exploration
/// complete. Marking complete is independent of advancing the page.
pub async fn set(pool: &Pool<Sqlite>, series: &SeriesId, page: u32, complete: bool) -> Result<()> {
    sqlx::query(
        "INSERT INTO search_progress (series, last_page, complete, updated_at)
         VALUES (?, ?, ?, ?)
         ON CONFLICT(series) DO UPDATE SET
            last_page = excluded.last_page,
            complete = excluded.complete,
            updated_at = excluded.updated_at",
    )
    .bind(series.as_str())
    .bind(i64::from(page))
    .bind(i64::from(complete))
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    fn series(id: &str) -> SeriesId {
        SeriesId::new(id).expect("valid series ID")
    }

    #[tokio::test]
    async fn test_default_progress() {
        let db = Database::open_in_memory().await.expect("open database");
        let p = get(db.pool(), &series("fresh")).await.expect("get progress");
        assert_eq!(p, Progress::default());
    }

    #[tokio::test]
    async fn test_advance_then_complete() {
        let db = Database::open_in_memory().await.expect("open database");
        let s = series("mud-country-comic");

        set(db.pool(), &s, 2, false).await.expect("advance");
        let p = get(db.pool(), &s).await.expect("get progress");
        assert_eq!(p, Progress { last_page: 2, complete: false });

        set(db.pool(), &s, 4, true).await.expect("mark complete");
        let p = get(db.pool(), &s).await.expect("get progress");
        assert_eq!(p, Progress { last_page: 4, complete: true });
    }
}
