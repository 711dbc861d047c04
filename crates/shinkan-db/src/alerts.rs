//! New-release alert dedup, keyed by (series, normalized URL).
//!
//! The stored date is what detects "release date changed after the fact"
//! (pre-order corrections): a later scan whose extracted date differs from
//! the recorded one re-opens the alert.

use crate::error::Result;
use shinkan_core::SeriesId;
use sqlx::{Pool, Row, Sqlite};
use std::collections::HashSet;

/// All URLs already alerted for a series.
pub async fn alerted_urls(pool: &Pool<Sqlite>, series: &SeriesId) -> Result<HashSet<String>> {
    let rows = sqlx::query("SELECT url FROM alerts WHERE series = ?")
        .bind(series.as_str())
        .fetch_all(pool)
        .await?;

    rows.into_iter()
        .map(|row| Ok(row.try_get::<String, _>("url")?))
        .collect()
}

/// Record an alert. Idempotent: an existing (series, url) row is left
/// untouched, preserving its originally recorded date.
pub async fn record(pool: &Pool<Sqlite>, series: &SeriesId, url: &str, date: &str) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO alerts (series, url, release_date) VALUES (?, ?, ?)")
        .bind(series.as_str())
        .bind(url)
        .bind(date)
        .execute(pool)
        .await?;

    Ok(())
}

/// The date recorded with an alert, if the alert exists.
pub async fn date(pool: &Pool<Sqlite>, series: &SeriesId, url: &str) -> Result<Option<String>> {
    let row = sqlx::query("SELECT release_date FROM alerts WHERE series = ? AND url = ?")
        .bind(series.as_str())
        .bind(url)
        .fetch_optional(pool)
        .await?;

    Ok(row.and_then(|r| r.try_get::<Option<String>, _>("release_date").ok().flatten()))
}

/// Update the date of an existing alert (pre-order date correction).
pub async fn update_date(
    pool: &Pool<Sqlite>,
    series: &SeriesId,
    url: &str,
    new_date: &str,
) -> Result<()> {
    sqlx::query("UPDATE alerts SET release_date = ? WHERE series = ? AND url = ?")
        .bind(new_date)
        .bind(series.as_str())
        .bind(url)
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
    async fn test_record_is_idempotent() {
        let db = Database::open_in_memory().await.expect("open database");
        let s = series("mud-country-comic");
        let url = "https://catalog.example/dp/4091234567";

        record(db.pool(), &s, url, "2026/05/01").await.expect("record");
        // A second record with a different date does not overwrite
        record(db.pool(), &s, url, "2026/06/01").await.expect("repeat");

        let stored = date(db.pool(), &s, url).await.expect("date");
        assert_eq!(stored.as_deref(), Some("2026/05/01"));

        let urls = alerted_urls(db.pool(), &s).await.expect("urls");
        assert_eq!(urls.len(), 1);
    }

    #[tokio::test]
    async fn test_update_date() {
        let db = Database::open_in_memory().await.expect("open database");
        let s = series("mud-country-comic");
        let url = "https://catalog.example/dp/4091234567";

        record(db.pool(), &s, url, "2026/05/01").await.expect("record");
        update_date(db.pool(), &s, url, "2026/05/08")
            .await
            .expect("update");

        let stored = date(db.pool(), &s, url).await.expect("date");
        assert_eq!(stored.as_deref(), Some("2026/05/08"));
    }

    #[tokio::test]
    async fn test_alerts_scoped_per_series() {
        let db = Database::open_in_memory().await.expect("open database");
        let url = "https://catalog.example/dp/4091234567";

        record(db.pool(), &series("series-a"), url, "2026/05/01")
            .await
            .expect("record");

        let other = alerted_urls(db.pool(), &series("series-b"))
            .await
            .expect("urls");
        assert!(other.is_empty());
    }
}
