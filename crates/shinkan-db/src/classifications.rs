//! Classification history: the last-seen disposition of every identifier
//! ever encountered for a series.
//!
//! This is what makes repeated catalog scans cheap: any identifier already
//! classified is skipped without a network fetch. The same identifier may
//! be classified differently under two different series, so the key is the
//! (series, item) pair. Last write wins; no history is retained.

use crate::error::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use shinkan_core::{ItemId, SeriesId};
use sqlx::{Pool, Row, Sqlite};
use std::collections::HashSet;

/// Terminal classification outcome for a discovered identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// A physical-edition candidate worth verifying
    Physical,
    /// A digital edition (possibly resolved to a linked physical one)
    Digital,
    /// Title does not contain the series key
    OffTopicTitle,
    /// Derivative merchandise (figures, guidebooks, costumes...)
    Derivative,
    /// A boxed set / multi-tome lot listing
    Bundle,
    /// A sponsored placement in search results
    Sponsored,
    /// Identifier is not of the physical type
    NonPhysical,
}

impl Outcome {
    /// Stable string form stored in the database.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Physical => "physical",
            Self::Digital => "digital",
            Self::OffTopicTitle => "off_topic_title",
            Self::Derivative => "derivative",
            Self::Bundle => "bundle",
            Self::Sponsored => "sponsored",
            Self::NonPhysical => "non_physical",
        }
    }

    /// Parse from the stored string form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "physical" => Some(Self::Physical),
            "digital" => Some(Self::Digital),
            "off_topic_title" => Some(Self::OffTopicTitle),
            "derivative" => Some(Self::Derivative),
            "bundle" => Some(Self::Bundle),
            "sponsored" => Some(Self::Sponsored),
            "non_physical" => Some(Self::NonPhysical),
            _ => None,
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Record (or overwrite) the classification of an identifier for a series.
///
/// `source` names the page/section that produced the classification (e.g.
/// `search_p2`, `bulk`); `linked_item` carries the physical edition a
/// digital listing resolved to, when one was found.
pub async fn record(
    pool: &Pool<Sqlite>,
    series: &SeriesId,
    item: &ItemId,
    outcome: Outcome,
    source: &str,
    title: Option<&str>,
    linked_item: Option<&ItemId>,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO classification_history
            (series, item_id, outcome, source, title, linked_item_id, seen_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(series, item_id) DO UPDATE SET
            outcome = excluded.outcome,
            source = excluded.source,
            title = excluded.title,
            linked_item_id = excluded.linked_item_id,
            seen_at = excluded.seen_at",
    )
    .bind(series.as_str())
    .bind(item.as_str())
    .bind(outcome.as_str())
    .bind(source)
    .bind(title)
    .bind(linked_item.map(ItemId::as_str))
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// All identifiers already classified for a series, regardless of outcome.
///
/// Discovery excludes these from further consideration without a fetch.
pub async fn seen_items(pool: &Pool<Sqlite>, series: &SeriesId) -> Result<HashSet<String>> {
    let rows = sqlx::query("SELECT item_id FROM classification_history WHERE series = ?")
        .bind(series.as_str())
        .fetch_all(pool)
        .await?;

    rows.into_iter()
        .map(|row| Ok(row.try_get::<String, _>("item_id")?))
        .collect()
}

/// Per-outcome counts for a series, for the discovery summary log line.
pub async fn stats(pool: &Pool<Sqlite>, series: &SeriesId) -> Result<Vec<(String, i64)>> {
    let rows = sqlx::query(
        "SELECT outcome, COUNT(*) AS n FROM classification_history
         WHERE series = ? GROUP BY outcome ORDER BY outcome",
    )
    .bind(series.as_str())
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|row| Ok((row.try_get("outcome")?, row.try_get("n")?)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    fn series(id: &str) -> SeriesId {
        SeriesId::new(id).expect("valid series ID")
    }

    fn item(id: &str) -> ItemId {
        ItemId::new(id).expect("valid item ID")
    }

    #[tokio::test]
    async fn test_record_and_seen() {
        let db = Database::open_in_memory().await.expect("open database");
        let s = series("mud-country-comic");

        record(
            db.pool(),
            &s,
            &item("B0ABCDEF12"),
            Outcome::Digital,
            "search_p1",
            Some("泥の国 Kindle版"),
            Some(&item("4091234567")),
        )
        .await
        .expect("record digital");

        record(
            db.pool(),
            &s,
            &item("4099999999"),
            Outcome::OffTopicTitle,
            "search_p1",
            Some("別の漫画 (5)"),
            None,
        )
        .await
        .expect("record off-topic");

        let seen = seen_items(db.pool(), &s).await.expect("seen items");
        assert_eq!(seen.len(), 2);
        assert!(seen.contains("B0ABCDEF12"));
        assert!(seen.contains("4099999999"));
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let db = Database::open_in_memory().await.expect("open database");
        let s = series("mud-country-comic");
        let i = item("4091234567");

        record(db.pool(), &s, &i, Outcome::Physical, "bulk", None, None)
            .await
            .expect("first record");
        record(db.pool(), &s, &i, Outcome::Bundle, "search_p2", None, None)
            .await
            .expect("overwrite");

        let stats = stats(db.pool(), &s).await.expect("stats");
        assert_eq!(stats, vec![("bundle".to_string(), 1)]);
    }

    #[tokio::test]
    async fn test_same_item_differs_across_series() {
        let db = Database::open_in_memory().await.expect("open database");
        let i = item("B0ABCDEF12");

        // A digital edition relevant to the novel series workflow may be
        // irrelevant to the comic series.
        record(
            db.pool(),
            &series("work-novel"),
            &i,
            Outcome::Digital,
            "search_p1",
            None,
            None,
        )
        .await
        .expect("record for novel");
        record(
            db.pool(),
            &series("work-comic"),
            &i,
            Outcome::OffTopicTitle,
            "search_p1",
            None,
            None,
        )
        .await
        .expect("record for comic");

        let novel_stats = stats(db.pool(), &series("work-novel")).await.expect("stats");
        let comic_stats = stats(db.pool(), &series("work-comic")).await.expect("stats");
        assert_eq!(novel_stats, vec![("digital".to_string(), 1)]);
        assert_eq!(comic_stats, vec![("off_topic_title".to_string(), 1)]);
    }

    #[test]
    fn test_outcome_roundtrip() {
        for outcome in [
            Outcome::Physical,
            Outcome::Digital,
            Outcome::OffTopicTitle,
            Outcome::Derivative,
            Outcome::Bundle,
            Outcome::Sponsored,
            Outcome::NonPhysical,
        ] {
            assert_eq!(Outcome::parse(outcome.as_str()), Some(outcome));
        }
        assert_eq!(Outcome::parse("garbage"), None);
    }
}
