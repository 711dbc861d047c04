//! Phase B — verification: validate every discovered candidate.
//!
//! Per candidate, in discovery order: operator-reject filter, forced
//! re-verification of future-dated pre-orders, the settled-cache fast
//! path, then a live detail fetch with a fallback chain (older cache
//! entry, then discovery-time snippet metadata) and a circuit breaker
//! after repeated invalid pages. Every verified item is persisted to the
//! cache and the volumes table regardless of newness — the catalog
//! snapshot is always kept current.

use crate::candidates::Seed;
use crate::discovery::Discovery;
use crate::error::Result;
use crate::report::VolumeRecord;
use crate::scan::SeriesScanner;
use chrono::{NaiveDate, Utc};
use shinkan_core::ItemId;
use shinkan_db::{alerts, cache, volumes, CacheEntry, CachedTome};
use shinkan_extract::{parse_detail, DetailPage};
use shinkan_fetch::{FetchError, RequestKind};
use shinkan_series::SeriesDefinition;
use shinkan_text::{
    canonical_item_url, kind_matches_format, parse_release_date, publisher_from_title,
    publishers_match, romanize_publisher, BundleInfo, Tome,
};
use std::collections::HashSet;
use tracing::{info, warn};

/// Mutable verification state threaded through the per-candidate loop.
struct VerifyState {
    snapshot: Vec<VolumeRecord>,
    alerted: HashSet<String>,
    publisher_of_record: Option<String>,
    consecutive_invalid: u32,
    today: NaiveDate,
}

impl SeriesScanner<'_> {
    /// Run Phase B over the discovery output, returning the snapshot of
    /// every verified volume (new-release entries flagged inline).
    pub(crate) async fn verify(
        &self,
        series: &SeriesDefinition,
        d: &Discovery,
    ) -> Result<Vec<VolumeRecord>> {
        let pool = self.db.pool();
        let mut state = VerifyState {
            snapshot: Vec::new(),
            alerted: alerts::alerted_urls(pool, &series.id).await?,
            publisher_of_record: shinkan_db::publishers::of_record(pool, &series.id).await?,
            consecutive_invalid: 0,
            today: Utc::now().date_naive(),
        };

        info!(count = d.candidates.len(), "verifying candidates");

        for (item, seed) in d.candidates.iter() {
            if d.rejected.contains(item.as_str()) {
                info!(item = %item, "operator-rejected, skipped");
                continue;
            }
            self.verify_one(series, d, item, seed, &mut state).await?;
        }

        Ok(state.snapshot)
    }

    async fn verify_one(
        &self,
        series: &SeriesDefinition,
        d: &Discovery,
        item: &ItemId,
        seed: &Seed,
        state: &mut VerifyState,
    ) -> Result<()> {
        let pool = self.db.pool();
        let url = canonical_item_url(self.fetcher.base_url(), &seed.url);
        let already_alerted = state.alerted.contains(&url);

        // A previously alerted pre-order with a still-future date is
        // re-verified even though a cache entry exists: release dates of
        // pre-orders get corrected after the fact.
        let mut recorded_date = None;
        let mut force_refetch = false;
        if already_alerted {
            recorded_date = alerts::date(pool, &series.id, &url).await?;
            if let Some(date) = recorded_date.as_deref().and_then(parse_release_date) {
                if date > state.today {
                    force_refetch = true;
                    info!(item = %item, date = ?recorded_date, "future-dated pre-order, re-verifying");
                }
            }
        }

        if !force_refetch {
            if let Some(entry) = cache::lookup_settled(pool, item).await? {
                self.verify_from_cache(series, item, &url, already_alerted, &entry, state)
                    .await?;
                return Ok(());
            }
        }

        // Live fetch
        let html = match self.fetcher.fetch(&url, RequestKind::Detail).await {
            Ok(html) => html,
            Err(FetchError::NotFound { .. }) => {
                info!(item = %item, "item gone (404), skipped permanently");
                return Ok(());
            }
            Err(e @ FetchError::InvalidPage { .. }) => {
                warn!(item = %item, error = %e, "invalid page from fetch");
                return self
                    .handle_invalid_page(series, d, item, seed, &url, already_alerted, state)
                    .await;
            }
            Err(e) => {
                warn!(item = %item, error = %e, "fetch failed");
                // Transport-level failure: fall back to any older cache
                // entry; otherwise the item stays unresolved and is
                // retried next run from the discovery seed.
                if let Some(entry) = cache::lookup(pool, item).await? {
                    info!(item = %item, "using cached entry as fallback");
                    let record =
                        record_from_cache(series, item, &url, already_alerted, &entry);
                    state.snapshot.push(record);
                }
                return Ok(());
            }
        };

        let detail = match parse_detail(&html) {
            Ok(detail) => detail,
            Err(invalid) => {
                warn!(item = %item, reason = %invalid, "invalid detail page");
                return self
                    .handle_invalid_page(series, d, item, seed, &url, already_alerted, state)
                    .await;
            }
        };

        state.consecutive_invalid = 0;
        self.verify_from_detail(
            series,
            d,
            item,
            &url,
            already_alerted,
            force_refetch,
            recorded_date,
            &detail,
            state,
        )
        .await
    }

    /// Cache-hit path: reuse cached fields, apply the publisher filter,
    /// evaluate newness against the threshold.
    async fn verify_from_cache(
        &self,
        series: &SeriesDefinition,
        item: &ItemId,
        url: &str,
        already_alerted: bool,
        entry: &CacheEntry,
        state: &mut VerifyState,
    ) -> Result<()> {
        if let (Some(por), Some(publisher)) =
            (state.publisher_of_record.as_deref(), entry.publisher.as_deref())
        {
            if !publisher.is_empty() && !publishers_match(publisher, por) {
                info!(item = %item, publisher, expected = por, "publisher mismatch (cache), skipped");
                return Ok(());
            }
        }

        info!(item = %item, alerted = already_alerted, "cache hit");
        let mut record = record_from_cache(series, item, url, already_alerted, entry);

        if !already_alerted {
            if let Some(date) = entry.release_date.as_deref().and_then(parse_release_date) {
                if date > self.config.scan.new_since {
                    info!(item = %item, date = ?entry.release_date, "newly detected (from cache)");
                    record.newly_detected = true;
                    alerts::record(
                        self.db.pool(),
                        &series.id,
                        url,
                        entry.release_date.as_deref().unwrap_or_default(),
                    )
                    .await?;
                    state.alerted.insert(url.to_string());
                }
            }
        }

        state.snapshot.push(record);
        Ok(())
    }

    /// Fallback chain for an invalid page: an older cache entry in any
    /// state, then the discovery-time snippet metadata. Trips the circuit
    /// breaker after repeated consecutive invalid pages.
    #[allow(clippy::too_many_arguments)]
    async fn handle_invalid_page(
        &self,
        series: &SeriesDefinition,
        d: &Discovery,
        item: &ItemId,
        seed: &Seed,
        url: &str,
        already_alerted: bool,
        state: &mut VerifyState,
    ) -> Result<()> {
        state.consecutive_invalid += 1;
        let pool = self.db.pool();

        if let Some(entry) = cache::lookup(pool, item).await? {
            info!(item = %item, "using cached entry as invalid-page fallback");
            let record = record_from_cache(series, item, url, already_alerted, &entry);
            state.snapshot.push(record);
        } else if let Some(snippet) = seed.snippet.as_ref() {
            self.verify_from_snippet(series, d, item, seed, snippet, url, already_alerted, state)
                .await?;
        }

        if state.consecutive_invalid >= self.config.scan.invalid_page_limit {
            let cooldown =
                std::time::Duration::from_secs(self.config.scan.circuit_breaker_cooldown_secs);
            warn!(
                consecutive = state.consecutive_invalid,
                cooldown_secs = cooldown.as_secs(),
                "circuit breaker tripped, cooling down"
            );
            tokio::time::sleep(cooldown).await;
            state.consecutive_invalid = 0;
        }

        Ok(())
    }

    /// Last-resort fallback: the metadata captured from the search-result
    /// snippet in Phase A. Persisted like a real verification so the next
    /// run does not need the detail page either.
    #[allow(clippy::too_many_arguments)]
    async fn verify_from_snippet(
        &self,
        series: &SeriesDefinition,
        d: &Discovery,
        item: &ItemId,
        seed: &Seed,
        snippet: &shinkan_extract::SnippetMeta,
        url: &str,
        already_alerted: bool,
        state: &mut VerifyState,
    ) -> Result<()> {
        let pool = self.db.pool();
        info!(
            item = %item,
            tome = ?snippet.tome,
            date = ?snippet.date,
            "using snippet metadata as fallback"
        );

        let tome = snippet.tome.or_else(|| d.bulk_tomes.get(item.as_str()).copied());
        let cached_tome = tome.map_or(CachedTome::Unknown, CachedTome::Known);
        let title = seed.title.clone().unwrap_or_default();

        cache::store(
            pool,
            item,
            snippet.date.as_deref(),
            cached_tome,
            &truncate(&title, 100),
            snippet.publisher.as_deref(),
        )
        .await?;

        if let Some(format) = snippet.format.as_deref() {
            if !format.is_empty() && !kind_matches_format(series.kind, format) {
                info!(item = %item, format, "snippet format contradicts edition kind, skipped");
                return Ok(());
            }
        }
        if let (Some(por), Some(publisher)) =
            (state.publisher_of_record.as_deref(), snippet.publisher.as_deref())
        {
            if !publisher.is_empty() && !publishers_match(publisher, por) {
                info!(item = %item, publisher, expected = por, "publisher mismatch (snippet), skipped");
                return Ok(());
            }
        }

        volumes::upsert(
            pool,
            &series.id,
            series.translated_title.as_deref(),
            tome.map(i64::from),
            item,
            url,
            snippet.date.as_deref(),
            &truncate(&title, 200),
            snippet.publisher.as_deref(),
        )
        .await?;

        let mut record = VolumeRecord {
            series: series.id.as_str().to_string(),
            display_title: series.display_title().to_string(),
            tome,
            release_date: snippet.date.clone(),
            publisher: snippet.publisher.clone(),
            url: url.to_string(),
            item_id: item.as_str().to_string(),
            cover_url: None,
            bundle: None,
            newly_detected: false,
            previously_alerted: already_alerted,
            date_changed: false,
            previous_date: None,
        };

        if !already_alerted {
            if let Some(date) = snippet.date.as_deref().and_then(parse_release_date) {
                if date > self.config.scan.new_since {
                    info!(item = %item, date = ?snippet.date, "newly detected (from snippet)");
                    record.newly_detected = true;
                    alerts::record(pool, &series.id, url, snippet.date.as_deref().unwrap_or_default())
                        .await?;
                    state.alerted.insert(url.to_string());
                }
            }
        }

        state.snapshot.push(record);
        Ok(())
    }

    /// Valid-page path: filters, persistence, newness and date-change
    /// evaluation.
    #[allow(clippy::too_many_arguments)]
    async fn verify_from_detail(
        &self,
        series: &SeriesDefinition,
        d: &Discovery,
        item: &ItemId,
        url: &str,
        already_alerted: bool,
        force_refetch: bool,
        recorded_date: Option<String>,
        detail: &DetailPage,
        state: &mut VerifyState,
    ) -> Result<()> {
        let pool = self.db.pool();

        // Tome: the title first, then the bulk-section label
        let mut tome = detail.tome.and_then(Tome::number);
        if tome.is_none() && !detail.is_bundle() {
            if let Some(n) = d.bulk_tomes.get(item.as_str()) {
                info!(item = %item, tome = n, "tome taken from bundle label");
                tome = Some(*n);
            }
        }
        if tome.is_none() && !detail.is_bundle() && detail.tome != Some(Tome::Final) {
            warn!(item = %item, title = %detail.title, "tome not detected");
        }

        // Edition-kind filter comes first: the wrong format is skipped
        // before anything is persisted.
        if let Some(format) = detail.format.as_deref() {
            if !format.is_empty() && !kind_matches_format(series.kind, format) {
                info!(item = %item, format, "format contradicts edition kind, skipped");
                return Ok(());
            }
        }

        let publisher = detail.publisher.clone().or_else(|| {
            publisher_from_title(&detail.title).map(|raw| romanize_publisher(&raw))
        });

        let cached_tome = if detail.is_bundle() || detail.tome == Some(Tome::Final) {
            CachedTome::NoTome
        } else {
            tome.map_or(CachedTome::Unknown, CachedTome::Known)
        };
        cache::store(
            pool,
            item,
            detail.release_date.as_deref(),
            cached_tome,
            &truncate(&detail.title, 100),
            publisher.as_deref(),
        )
        .await?;

        if let (Some(por), Some(publisher)) =
            (state.publisher_of_record.as_deref(), publisher.as_deref())
        {
            if !publisher.is_empty() && !publishers_match(publisher, por) {
                info!(item = %item, publisher, expected = por, "publisher mismatch, skipped");
                return Ok(());
            }
        }

        volumes::upsert(
            pool,
            &series.id,
            series.translated_title.as_deref(),
            if detail.is_bundle() { None } else { tome.map(i64::from) },
            item,
            url,
            detail.release_date.as_deref(),
            &truncate(&detail.title, 200),
            publisher.as_deref(),
        )
        .await?;

        let mut record = VolumeRecord {
            series: series.id.as_str().to_string(),
            display_title: series.display_title().to_string(),
            tome: if detail.is_bundle() { None } else { tome },
            release_date: detail.release_date.clone(),
            publisher,
            url: url.to_string(),
            item_id: item.as_str().to_string(),
            cover_url: detail.cover_url.clone(),
            bundle: detail.bundle.map(bundle_label),
            newly_detected: false,
            previously_alerted: already_alerted,
            date_changed: false,
            previous_date: None,
        };

        let Some(raw_date) = detail.release_date.clone() else {
            warn!(item = %item, "no release date on detail page");
            state.snapshot.push(record);
            return Ok(());
        };
        let Some(parsed) = parse_release_date(&raw_date) else {
            warn!(item = %item, date = %raw_date, "release date not parseable");
            state.snapshot.push(record);
            return Ok(());
        };

        // Forced pre-order re-check: did the recorded date move?
        if force_refetch {
            if let Some(recorded) = recorded_date {
                let changed = match parse_release_date(&recorded) {
                    Some(previous) => previous != parsed,
                    None => recorded != raw_date,
                };
                if changed {
                    warn!(item = %item, previous = %recorded, current = %raw_date, "release date changed");
                    alerts::update_date(pool, &series.id, url, &raw_date).await?;
                    record.newly_detected = true;
                    record.date_changed = true;
                    record.previous_date = Some(recorded);
                } else {
                    info!(item = %item, date = %raw_date, "pre-order re-verified, date unchanged");
                }
                state.snapshot.push(record);
                return Ok(());
            }
        }

        if parsed <= self.config.scan.new_since {
            state.snapshot.push(record);
            return Ok(());
        }

        if !already_alerted {
            if detail.is_bundle() {
                warn!(item = %item, "new listing is a bundle, not an individual volume");
            }
            info!(item = %item, date = %raw_date, tome = ?record.tome, "newly detected");
            record.newly_detected = true;
            alerts::record(pool, &series.id, url, &raw_date).await?;
            state.alerted.insert(url.to_string());
        }

        state.snapshot.push(record);
        Ok(())
    }
}

/// Build a snapshot record from a cache entry.
fn record_from_cache(
    series: &SeriesDefinition,
    item: &ItemId,
    url: &str,
    already_alerted: bool,
    entry: &CacheEntry,
) -> VolumeRecord {
    VolumeRecord {
        series: series.id.as_str().to_string(),
        display_title: series.display_title().to_string(),
        tome: entry.tome.number(),
        release_date: entry.release_date.clone(),
        publisher: entry.publisher.clone(),
        url: url.to_string(),
        item_id: item.as_str().to_string(),
        cover_url: None,
        bundle: None,
        newly_detected: false,
        previously_alerted: already_alerted,
        date_changed: false,
        previous_date: None,
    }
}

/// Human-readable label for a bundle listing.
fn bundle_label(info: BundleInfo) -> String {
    match info {
        BundleInfo::Range { first, last } => format!("volumes {first}-{last}"),
        BundleInfo::Total(0) => "boxed set".to_string(),
        BundleInfo::Total(n) => format!("complete set of {n}"),
    }
}

/// First `max_chars` characters of a string.
fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundle_label() {
        assert_eq!(
            bundle_label(BundleInfo::Range { first: 1, last: 8 }),
            "volumes 1-8"
        );
        assert_eq!(bundle_label(BundleInfo::Total(5)), "complete set of 5");
        assert_eq!(bundle_label(BundleInfo::Total(0)), "boxed set");
    }

    #[test]
    fn test_truncate_by_chars() {
        assert_eq!(truncate("泥の国アパートメント", 3), "泥の国");
        assert_eq!(truncate("abc", 10), "abc");
    }
}
