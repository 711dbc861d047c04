//! Volume rows: one physical edition of one tome of a series.
//!
//! The item identifier is the uniqueness key across ALL series: one
//! identifier cannot belong to two volume rows. A repeated upsert updates
//! in place, and a null incoming field never overwrites known-good data.

use crate::error::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use shinkan_core::{ItemId, SeriesId};
use sqlx::{Pool, Row, Sqlite};

/// A stored volume row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Volume {
    /// Series this volume belongs to
    pub series: String,
    /// Translated series title, when known
    pub translated_title: Option<String>,
    /// Tome number; `None` is a valid, later-correctable state
    pub tome: Option<i64>,
    /// Globally unique catalog item identifier
    pub item_id: String,
    /// Canonical detail-page URL
    pub url: String,
    /// Release date as published by the source (string-typed; not every
    /// source date resolves to a real calendar date)
    pub release_date: Option<String>,
    /// Raw listing title
    pub title: String,
    /// Publisher name as extracted
    pub publisher: Option<String>,
    /// When this row was first created (RFC 3339)
    pub first_seen: String,
    /// When this row was last touched (RFC 3339)
    pub last_updated: String,
}

/// Insert a volume, or update the existing row with the same item
/// identifier.
///
/// Mutable fields are overwritten except `translated_title` and
/// `publisher`, where an incoming `None` preserves any existing non-null
/// value — an unknown never overwrites known-good data.
#[allow(clippy::too_many_arguments)]
pub async fn upsert(
    pool: &Pool<Sqlite>,
    series: &SeriesId,
    translated_title: Option<&str>,
    tome: Option<i64>,
    item: &ItemId,
    url: &str,
    release_date: Option<&str>,
    title: &str,
    publisher: Option<&str>,
) -> Result<()> {
    let now = Utc::now().to_rfc3339();

    let existing = sqlx::query("SELECT translated_title, publisher FROM volumes WHERE item_id = ?")
        .bind(item.as_str())
        .fetch_optional(pool)
        .await?;

    if let Some(row) = existing {
        let existing_translated: Option<String> = row.try_get("translated_title")?;
        let existing_publisher: Option<String> = row.try_get("publisher")?;

        let final_translated = translated_title
            .map(ToString::to_string)
            .or(existing_translated);
        let final_publisher = publisher.map(ToString::to_string).or(existing_publisher);

        sqlx::query(
            "UPDATE volumes SET
                series = ?, translated_title = ?, tome = ?, url = ?,
                release_date = ?, title = ?, publisher = ?, last_updated = ?
             WHERE item_id = ?",
        )
        .bind(series.as_str())
        .bind(final_translated)
        .bind(tome)
        .bind(url)
        .bind(release_date)
        .bind(title)
        .bind(final_publisher)
        .bind(&now)
        .bind(item.as_str())
        .execute(pool)
        .await?;
    } else {
        sqlx::query(
            "INSERT INTO volumes
                (series, translated_title, tome, item_id, url, release_date,
                 title, publisher, first_seen, last_updated)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(series.as_str())
        .bind(translated_title)
        .bind(tome)
        .bind(item.as_str())
        .bind(url)
        .bind(release_date)
        .bind(title)
        .bind(publisher)
        .bind(&now)
        .bind(&now)
        .execute(pool)
        .await?;
    }

    Ok(())
}

/// All known `(item_id, url)` pairs for a series, ordered by tome with
/// unknown tomes last. Discovery seeds from this: it is the zero-network
/// part of every scan.
pub async fn known_urls(pool: &Pool<Sqlite>, series: &SeriesId) -> Result<Vec<(String, String)>> {
    let rows = sqlx::query(
        "SELECT item_id, url FROM volumes
         WHERE series = ?
         ORDER BY tome IS NULL, tome ASC",
    )
    .bind(series.as_str())
    .fetch_all(pool)
    .await?;

    let mut pairs = Vec::with_capacity(rows.len());
    for row in rows {
        pairs.push((row.try_get("item_id")?, row.try_get("url")?));
    }
    Ok(pairs)
}

/// All volume rows for a series, ordered by tome with unknown tomes last.
pub async fn for_series(pool: &Pool<Sqlite>, series: &SeriesId) -> Result<Vec<Volume>> {
    let rows = sqlx::query(
        "SELECT series, translated_title, tome, item_id, url, release_date,
                title, publisher, first_seen, last_updated
         FROM volumes
         WHERE series = ?
         ORDER BY tome IS NULL, tome ASC",
    )
    .bind(series.as_str())
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(|row| volume_from_row(&row)).collect()
}

/// Look up a single volume row by item identifier.
pub async fn by_item(pool: &Pool<Sqlite>, item: &ItemId) -> Result<Option<Volume>> {
    let row = sqlx::query(
        "SELECT series, translated_title, tome, item_id, url, release_date,
                title, publisher, first_seen, last_updated
         FROM volumes
         WHERE item_id = ?",
    )
    .bind(item.as_str())
    .fetch_optional(pool)
    .await?;

    row.map(|r| volume_from_row(&r)).transpose()
}

/// Count the volumes stored for a series.
pub async fn count_for_series(pool: &Pool<Sqlite>, series: &SeriesId) -> Result<i64> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM volumes WHERE series = ?")
        .bind(series.as_str())
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Per-series aggregates over the volumes table.
#[derive(Debug, Clone)]
pub struct SeriesSummary {
    /// Series identifier
    pub series: String,
    /// Any stored translated title
    pub translated_title: Option<String>,
    /// Number of volume rows
    pub volume_count: i64,
    /// Smallest known tome
    pub tome_min: Option<i64>,
    /// Largest known tome
    pub tome_max: Option<i64>,
}

/// Aggregate every series in the store, ordered by series identifier.
pub async fn series_summaries(pool: &Pool<Sqlite>) -> Result<Vec<SeriesSummary>> {
    let rows = sqlx::query(
        "SELECT series, MAX(translated_title) AS translated_title, COUNT(*) AS n,
                MIN(tome) AS tome_min, MAX(tome) AS tome_max
         FROM volumes
         GROUP BY series
         ORDER BY series",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|row| {
            Ok(SeriesSummary {
                series: row.try_get("series")?,
                translated_title: row.try_get("translated_title")?,
                volume_count: row.try_get("n")?,
                tome_min: row.try_get("tome_min")?,
                tome_max: row.try_get("tome_max")?,
            })
        })
        .collect()
}

/// Correct the tome number of a volume.
///
/// The verification cache row for the same identifier is rewritten too, so
/// a later scan does not resurrect the unknown-tome state from cache.
pub async fn update_tome(pool: &Pool<Sqlite>, item: &ItemId, tome: i64) -> Result<()> {
    let now = Utc::now().to_rfc3339();

    sqlx::query("UPDATE volumes SET tome = ?, last_updated = ? WHERE item_id = ?")
        .bind(tome)
        .bind(&now)
        .bind(item.as_str())
        .execute(pool)
        .await?;

    sqlx::query("UPDATE verification_cache SET tome = ? WHERE item_id = ?")
        .bind(tome.to_string())
        .bind(item.as_str())
        .execute(pool)
        .await?;

    tracing::debug!(item = %item, tome, "tome corrected");
    Ok(())
}

fn volume_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Volume> {
    Ok(Volume {
        series: row.try_get("series")?,
        translated_title: row.try_get("translated_title")?,
        tome: row.try_get("tome")?,
        item_id: row.try_get("item_id")?,
        url: row.try_get("url")?,
        release_date: row.try_get("release_date")?,
        title: row.try_get("title")?,
        publisher: row.try_get("publisher")?,
        first_seen: row.try_get("first_seen")?,
        last_updated: row.try_get("last_updated")?,
    })
}
