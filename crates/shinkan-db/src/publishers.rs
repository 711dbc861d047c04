//! Publisher-of-record per series.
//!
//! The publisher-of-record filters out same-title items from unrelated
//! publishers (anthologies, unofficial reprints). Resolution priority:
//! operator confirmation outranks automatic detection, and automatic
//! detection never overwrites an operator-derived value.

use crate::error::Result;
use chrono::Utc;
use shinkan_core::SeriesId;
use sqlx::{Pool, Row, Sqlite};

/// The stored publisher-of-record for a series, if any.
pub async fn of_record(pool: &Pool<Sqlite>, series: &SeriesId) -> Result<Option<String>> {
    let row = sqlx::query("SELECT publisher FROM series_publishers WHERE series = ?")
        .bind(series.as_str())
        .fetch_optional(pool)
        .await?;

    Ok(row.and_then(|r| r.try_get::<Option<String>, _>("publisher").ok().flatten()))
}

/// Store the publisher-of-record for a series.
///
/// The value is canonicalized before storage so later comparisons are
/// stable across imprint spellings.
pub async fn set_of_record(
    pool: &Pool<Sqlite>,
    series: &SeriesId,
    publisher: &str,
    volume_count: i64,
) -> Result<()> {
    let canonical = shinkan_text::canonical_publisher(publisher);

    sqlx::query(
        "INSERT INTO series_publishers (series, publisher, detected_at, volume_count)
         VALUES (?, ?, ?, ?)
         ON CONFLICT(series) DO UPDATE SET
            publisher = excluded.publisher,
            detected_at = excluded.detected_at,
            volume_count = excluded.volume_count",
    )
    .bind(series.as_str())
    .bind(&canonical)
    .bind(Utc::now().to_rfc3339())
    .bind(volume_count)
    .execute(pool)
    .await?;

    tracing::info!(series = %series, publisher = %canonical, "publisher-of-record set");
    Ok(())
}

/// The majority publisher among a series' volumes, canonicalized.
///
/// With `accepted_only`, only operator-accepted volumes are counted.
pub async fn majority(
    pool: &Pool<Sqlite>,
    series: &SeriesId,
    accepted_only: bool,
) -> Result<Option<String>> {
    let row = if accepted_only {
        sqlx::query(
            "SELECT v.publisher, COUNT(*) AS n
             FROM volumes v
             JOIN manual_status m ON v.item_id = m.item_id AND m.status = 'accepted'
             WHERE v.series = ? AND v.publisher IS NOT NULL AND v.publisher != ''
             GROUP BY v.publisher
             ORDER BY n DESC
             LIMIT 1",
        )
        .bind(series.as_str())
        .fetch_optional(pool)
        .await?
    } else {
        sqlx::query(
            "SELECT publisher, COUNT(*) AS n
             FROM volumes
             WHERE series = ? AND publisher IS NOT NULL AND publisher != ''
             GROUP BY publisher
             ORDER BY n DESC
             LIMIT 1",
        )
        .bind(series.as_str())
        .fetch_optional(pool)
        .await?
    };

    Ok(row
        .map(|r| r.try_get::<String, _>("publisher"))
        .transpose()?
        .map(|p| shinkan_text::canonical_publisher(&p)))
}

/// Resolve (and persist) the publisher-of-record for a series.
///
/// Priority order:
/// 1. Majority publisher among operator-accepted volumes. Operator
///    confirmation is authoritative and overwrites a previously stored
///    value that disagrees.
/// 2. The previously stored value, if no accepted-volume evidence exists.
/// 3. Majority publisher among all volumes (first-time auto-detection).
pub async fn resolve(pool: &Pool<Sqlite>, series: &SeriesId) -> Result<Option<String>> {
    if let Some(accepted_majority) = majority(pool, series, true).await? {
        let stored = of_record(pool, series).await?;
        if stored.as_deref() != Some(accepted_majority.as_str()) {
            let count = sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*)
                 FROM volumes v
                 JOIN manual_status m ON v.item_id = m.item_id AND m.status = 'accepted'
                 WHERE v.series = ?",
            )
            .bind(series.as_str())
            .fetch_one(pool)
            .await?;
            set_of_record(pool, series, &accepted_majority, count).await?;
            if let Some(previous) = stored {
                tracing::info!(
                    series = %series,
                    previous = %previous,
                    current = %accepted_majority,
                    "publisher-of-record updated by operator acceptance"
                );
            }
        }
        return Ok(Some(accepted_majority));
    }

    if let Some(stored) = of_record(pool, series).await? {
        return Ok(Some(stored));
    }

    if let Some(overall_majority) = majority(pool, series, false).await? {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM volumes WHERE series = ? AND publisher IS NOT NULL",
        )
        .bind(series.as_str())
        .fetch_one(pool)
        .await?;
        set_of_record(pool, series, &overall_majority, count).await?;
        return Ok(Some(overall_majority));
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{manual, manual::ManualStatus, volumes, Database};
    use shinkan_core::ItemId;

    fn series(id: &str) -> SeriesId {
        SeriesId::new(id).expect("valid series ID")
    }

    fn item(id: &str) -> ItemId {
        ItemId::new(id).expect("valid item ID")
    }

    async fn add_volume(db: &Database, s: &SeriesId, id: &str, publisher: &str) {
        volumes::upsert(
            db.pool(),
            s,
            None,
            Some(1),
            &item(id),
            &format!("https://catalog.example/dp/{id}"),
            None,
            "title",
            Some(publisher),
        )
        .await
        .expect("upsert volume");
    }

    #[tokio::test]
    async fn test_auto_detection_from_majority() {
        let db = Database::open_in_memory().await.expect("open database");
        let s = series("mud-country-comic");

        add_volume(&db, &s, "4090000001", "Kadokawa Comics").await;
        add_volume(&db, &s, "4090000002", "Kadokawa").await;
        add_volume(&db, &s, "4090000003", "Shueisha").await;

        let resolved = resolve(db.pool(), &s).await.expect("resolve");
        // "Kadokawa Comics" and "Kadokawa" canonicalize to the same parent,
        // but majority is computed per raw value; either way the winner
        // canonicalizes to kadokawa.
        assert_eq!(resolved.as_deref(), Some("kadokawa"));

        // Stored for next time
        assert_eq!(
            of_record(db.pool(), &s).await.expect("of record").as_deref(),
            Some("kadokawa")
        );
    }

    #[tokio::test]
    async fn test_accepted_evidence_overrides_stored() {
        let db = Database::open_in_memory().await.expect("open database");
        let s = series("mud-country-comic");

        set_of_record(db.pool(), &s, "Shueisha", 2)
            .await
            .expect("seed stored value");

        add_volume(&db, &s, "4090000001", "Kadokawa").await;
        manual::set_status(db.pool(), &item("4090000001"), ManualStatus::Accepted, None)
            .await
            .expect("accept");

        let resolved = resolve(db.pool(), &s).await.expect("resolve");
        assert_eq!(resolved.as_deref(), Some("kadokawa"));
        assert_eq!(
            of_record(db.pool(), &s).await.expect("of record").as_deref(),
            Some("kadokawa")
        );
    }

    #[tokio::test]
    async fn test_stored_value_kept_without_accepted_evidence() {
        let db = Database::open_in_memory().await.expect("open database");
        let s = series("mud-country-comic");

        set_of_record(db.pool(), &s, "Shueisha", 2)
            .await
            .expect("seed stored value");
        add_volume(&db, &s, "4090000001", "Kadokawa").await;

        // No accepted volumes: the stored value wins over the new majority.
        let resolved = resolve(db.pool(), &s).await.expect("resolve");
        assert_eq!(resolved.as_deref(), Some("shueisha"));
    }

    #[tokio::test]
    async fn test_no_evidence_at_all() {
        let db = Database::open_in_memory().await.expect("open database");
        let resolved = resolve(db.pool(), &series("empty")).await.expect("resolve");
        assert!(resolved.is_none());
    }
}
