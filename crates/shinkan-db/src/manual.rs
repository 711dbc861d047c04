//! Operator-supplied per-identifier overrides.
//!
//! Rejected identifiers act as a permanent, global exclusion filter applied
//! before any network fetch. Accepted identifiers outrank automatic
//! detection and can serve as reference seeds for bootstrapping a series
//! with no cache.

use crate::error::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use shinkan_core::{ItemId, SeriesId};
use sqlx::{Pool, Row, Sqlite};
use std::collections::HashSet;

/// Manual status of an identifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManualStatus {
    /// No operator decision yet
    #[default]
    Unprocessed,
    /// Confirmed as a genuine volume of its series
    Accepted,
    /// Permanently excluded
    Rejected,
}

impl ManualStatus {
    /// Stable string form stored in the database.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unprocessed => "unprocessed",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }

    /// Parse from the stored string form, defaulting to unprocessed.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "accepted" => Self::Accepted,
            "rejected" => Self::Rejected,
            _ => Self::Unprocessed,
        }
    }
}

/// Set the manual status of an identifier.
pub async fn set_status(
    pool: &Pool<Sqlite>,
    item: &ItemId,
    status: ManualStatus,
    comment: Option<&str>,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO manual_status (item_id, status, comment, updated_at)
         VALUES (?, ?, ?, ?)
         ON CONFLICT(item_id) DO UPDATE SET
            status = excluded.status,
            comment = excluded.comment,
            updated_at = excluded.updated_at",
    )
    .bind(item.as_str())
    .bind(status.as_str())
    .bind(comment)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// All rejected identifiers.
pub async fn rejected_items(pool: &Pool<Sqlite>) -> Result<HashSet<String>> {
    items_with_status(pool, ManualStatus::Rejected).await
}

/// All accepted identifiers.
pub async fn accepted_items(pool: &Pool<Sqlite>) -> Result<HashSet<String>> {
    items_with_status(pool, ManualStatus::Accepted).await
}

async fn items_with_status(pool: &Pool<Sqlite>, status: ManualStatus) -> Result<HashSet<String>> {
    let rows = sqlx::query("SELECT item_id FROM manual_status WHERE status = ?")
        .bind(status.as_str())
        .fetch_all(pool)
        .await?;

    rows.into_iter()
        .map(|row| Ok(row.try_get::<String, _>("item_id")?))
        .collect()
}

/// Find a trustworthy reference identifier for a series: the accepted
/// volume with the highest tome number, if any exists.
pub async fn reference_item(pool: &Pool<Sqlite>, series: &SeriesId) -> Result<Option<String>> {
    let row = sqlx::query(
        "SELECT v.item_id
         FROM volumes v
         JOIN manual_status m ON v.item_id = m.item_id
         WHERE v.series = ? AND m.status = 'accepted'
         ORDER BY v.tome DESC
         LIMIT 1",
    )
    .bind(series.as_str())
    .fetch_optional(pool)
    .await?;

    row.map(|r| Ok(r.try_get("item_id")?)).transpose()
}

/// An accepted volume whose tome number is still missing.
#[derive(Debug, Clone)]
pub struct AcceptedWithoutTome {
    /// Item identifier
    pub item_id: String,
    /// Series the volume belongs to
    pub series: String,
    /// Detail-page URL
    pub url: String,
    /// Stored title snapshot
    pub title: String,
}

/// Accepted volumes with a missing tome number.
///
/// These were typically added from a manually-supplied URL before the tome
/// could be extracted; the correction pass re-fetches them.
pub async fn accepted_without_tome(pool: &Pool<Sqlite>) -> Result<Vec<AcceptedWithoutTome>> {
    let rows = sqlx::query(
        "SELECT v.item_id, v.series, v.url, v.title
         FROM volumes v
         JOIN manual_status m ON v.item_id = m.item_id
         WHERE m.status = 'accepted'
           AND (v.tome IS NULL OR v.tome <= 0)",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|row| {
            Ok(AcceptedWithoutTome {
                item_id: row.try_get("item_id")?,
                series: row.try_get("series")?,
                url: row.try_get("url")?,
                title: row.try_get("title")?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{volumes, Database};

    fn series(id: &str) -> SeriesId {
        SeriesId::new(id).expect("valid series ID")
    }

    fn item(id: &str) -> ItemId {
        ItemId::new(id).expect("valid item ID")
    }

    #[tokio::test]
    async fn test_status_sets() {
        let db = Database::open_in_memory().await.expect("open database");

        set_status(db.pool(), &item("4090000001"), ManualStatus::Accepted, None)
            .await
            .expect("accept");
        set_status(
            db.pool(),
            &item("4090000002"),
            ManualStatus::Rejected,
            Some("anthology, not the series"),
        )
        .await
        .expect("reject");

        let accepted = accepted_items(db.pool()).await.expect("accepted set");
        let rejected = rejected_items(db.pool()).await.expect("rejected set");
        assert!(accepted.contains("4090000001"));
        assert!(rejected.contains("4090000002"));
        assert!(!rejected.contains("4090000001"));
    }

    #[tokio::test]
    async fn test_reference_item_prefers_highest_tome() {
        let db = Database::open_in_memory().await.expect("open database");
        let s = series("mud-country-comic");

        for (id, tome) in [("4090000001", 1), ("4090000005", 5)] {
            volumes::upsert(
                db.pool(),
                &s,
                None,
                Some(tome),
                &item(id),
                &format!("https://catalog.example/dp/{id}"),
                None,
                "泥の国",
                None,
            )
            .await
            .expect("upsert");
            set_status(db.pool(), &item(id), ManualStatus::Accepted, None)
                .await
                .expect("accept");
        }

        let reference = reference_item(db.pool(), &s).await.expect("reference");
        assert_eq!(reference.as_deref(), Some("4090000005"));

        // No accepted volumes for an unknown series
        let none = reference_item(db.pool(), &series("other"))
            .await
            .expect("reference");
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn test_accepted_without_tome() {
        let db = Database::open_in_memory().await.expect("open database");
        let s = series("mud-country-comic");

        volumes::upsert(
            db.pool(),
            &s,
            None,
            None,
            &item("4090000007"),
            "https://catalog.example/dp/4090000007",
            None,
            "泥の国",
            None,
        )
        .await
        .expect("upsert");
        set_status(db.pool(), &item("4090000007"), ManualStatus::Accepted, None)
            .await
            .expect("accept");

        let missing = accepted_without_tome(db.pool()).await.expect("query");
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].item_id, "4090000007");
    }
}
