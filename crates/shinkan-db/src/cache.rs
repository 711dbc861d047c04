//! Per-identifier verification cache.
//!
//! Catalog facts (tome number, release date, publisher) do not change once
//! published, so cache entries are permanent — with one exception: an entry
//! whose tome is still [`CachedTome::Unknown`] always permits
//! re-verification, because the tome may simply not have been detectable
//! yet. `Unknown` is distinct from [`CachedTome::NoTome`], which records
//! that the item is settled as having no tome at all (bundles, one-shots).

use crate::error::Result;
use chrono::Utc;
use shinkan_core::ItemId;
use sqlx::{Pool, Row, Sqlite};

/// Tome state of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachedTome {
    /// The tome number is known.
    Known(u32),
    /// The item is settled as having no tome number.
    NoTome,
    /// The tome could not be determined; re-verification is allowed.
    Unknown,
}

impl CachedTome {
    /// The numeric tome, if known.
    #[must_use]
    pub fn number(self) -> Option<u32> {
        match self {
            Self::Known(n) => Some(n),
            Self::NoTome | Self::Unknown => None,
        }
    }

    fn to_db(self) -> Option<String> {
        match self {
            Self::Known(n) => Some(n.to_string()),
            Self::NoTome => Some("none".to_string()),
            Self::Unknown => None,
        }
    }

    fn from_db(value: Option<String>) -> Self {
        match value.as_deref() {
            None => Self::Unknown,
            Some("none") => Self::NoTome,
            Some(s) => s.parse().map_or(Self::Unknown, Self::Known),
        }
    }
}

/// A verification cache entry.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The cached identifier
    pub item_id: String,
    /// When the item was last verified (RFC 3339)
    pub verified_at: String,
    /// Release date as published by the source
    pub release_date: Option<String>,
    /// Tome state
    pub tome: CachedTome,
    /// Title snapshot
    pub title: String,
    /// Publisher as extracted
    pub publisher: Option<String>,
}

/// Store (or overwrite) the cache entry for an identifier.
pub async fn store(
    pool: &Pool<Sqlite>,
    item: &ItemId,
    release_date: Option<&str>,
    tome: CachedTome,
    title: &str,
    publisher: Option<&str>,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO verification_cache
            (item_id, verified_at, release_date, tome, title, publisher)
         VALUES (?, ?, ?, ?, ?, ?)
         ON CONFLICT(item_id) DO UPDATE SET
            verified_at = excluded.verified_at,
            release_date = excluded.release_date,
            tome = excluded.tome,
            title = excluded.title,
            publisher = excluded.publisher",
    )
    .bind(item.as_str())
    .bind(Utc::now().to_rfc3339())
    .bind(release_date)
    .bind(tome.to_db())
    .bind(title)
    .bind(publisher)
    .execute(pool)
    .await?;

    Ok(())
}

/// Look up a cache entry in any state.
///
/// Used as the fallback when a live fetch returns an invalid page: even an
/// unknown-tome entry is better than nothing then.
pub async fn lookup(pool: &Pool<Sqlite>, item: &ItemId) -> Result<Option<CacheEntry>> {
    fetch(pool, item).await
}

/// Look up a cache entry for skip purposes.
///
/// Returns `None` when the entry's tome is [`CachedTome::Unknown`], forcing
/// a re-verification — the unknown state must never count as a hit.
pub async fn lookup_settled(pool: &Pool<Sqlite>, item: &ItemId) -> Result<Option<CacheEntry>> {
    let entry = fetch(pool, item).await?;
    Ok(entry.filter(|e| e.tome != CachedTome::Unknown))
}

async fn fetch(pool: &Pool<Sqlite>, item: &ItemId) -> Result<Option<CacheEntry>> {
    let row = sqlx::query(
        "SELECT item_id, verified_at, release_date, tome, title, publisher
         FROM verification_cache
         WHERE item_id = ?",
    )
    .bind(item.as_str())
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    Ok(Some(CacheEntry {
        item_id: row.try_get("item_id")?,
        verified_at: row.try_get("verified_at")?,
        release_date: row.try_get("release_date")?,
        tome: CachedTome::from_db(row.try_get("tome")?),
        title: row.try_get("title")?,
        publisher: row.try_get("publisher")?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    fn item(id: &str) -> ItemId {
        ItemId::new(id).expect("valid item ID")
    }

    #[tokio::test]
    async fn test_store_and_lookup() {
        let db = Database::open_in_memory().await.expect("open database");
        let i = item("4091234567");

        store(
            db.pool(),
            &i,
            Some("2026/03/15"),
            CachedTome::Known(3),
            "泥の国 (3)",
            Some("Kadokawa"),
        )
        .await
        .expect("store entry");

        let entry = lookup(db.pool(), &i)
            .await
            .expect("lookup")
            .expect("entry exists");
        assert_eq!(entry.tome, CachedTome::Known(3));
        assert_eq!(entry.release_date.as_deref(), Some("2026/03/15"));

        // Settled lookup hits too
        assert!(lookup_settled(db.pool(), &i)
            .await
            .expect("settled lookup")
            .is_some());
    }

    #[tokio::test]
    async fn test_unknown_tome_is_never_a_settled_hit() {
        let db = Database::open_in_memory().await.expect("open database");
        let i = item("4091234567");

        store(db.pool(), &i, Some("2026/03/15"), CachedTome::Unknown, "泥の国", None)
            .await
            .expect("store entry");

        // The raw lookup sees the entry...
        assert!(lookup(db.pool(), &i).await.expect("lookup").is_some());
        // ...but it must not count as a hit for skip purposes.
        assert!(lookup_settled(db.pool(), &i)
            .await
            .expect("settled lookup")
            .is_none());
    }

    #[tokio::test]
    async fn test_no_tome_is_settled() {
        let db = Database::open_in_memory().await.expect("open database");
        let i = item("B0ABCDEF12");

        store(
            db.pool(),
            &i,
            Some("2026/01/01"),
            CachedTome::NoTome,
            "泥の国 1-8巻セット",
            None,
        )
        .await
        .expect("store entry");

        let entry = lookup_settled(db.pool(), &i)
            .await
            .expect("settled lookup")
            .expect("no-tome entries are settled");
        assert_eq!(entry.tome, CachedTome::NoTome);
        assert_eq!(entry.tome.number(), None);
    }

    #[tokio::test]
    async fn test_overwrite() {
        let db = Database::open_in_memory().await.expect("open database");
        let i = item("4091234567");

        store(db.pool(), &i, None, CachedTome::Unknown, "泥の国", None)
            .await
            .expect("first store");
        store(
            db.pool(),
            &i,
            Some("2026/03/15"),
            CachedTome::Known(3),
            "泥の国 (3)",
            Some("Kadokawa"),
        )
        .await
        .expect("overwrite");

        let entry = lookup(db.pool(), &i)
            .await
            .expect("lookup")
            .expect("entry exists");
        assert_eq!(entry.tome, CachedTome::Known(3));

        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM verification_cache")
                .fetch_one(db.pool())
                .await
                .expect("count");
        assert_eq!(count, 1);
    }
}
