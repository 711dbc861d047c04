//! Phase C — extended missing-tome search.
//!
//! After verification, compute which tome numbers of the contiguous
//! [1, max] range are absent. Gaps are hunted two ways, best-effort:
//! further catalog-search pages verified inline, then the bulk sections
//! of a few representative known volumes. Both recover volumes the
//! primary discovery missed (search-ranking order hides mid-series
//! tomes).

use crate::discovery::Discovery;
use crate::error::Result;
use crate::report::VolumeRecord;
use crate::scan::SeriesScanner;
use crate::url_builder;
use shinkan_core::ItemId;
use shinkan_db::{cache, volumes, CachedTome};
use shinkan_extract::{parse_detail, parse_related, parse_search_page};
use shinkan_fetch::RequestKind;
use shinkan_series::SeriesDefinition;
use shinkan_text::{
    canonical_item_url, is_digital_listing, is_paper_format, kind_matches_format, normalize_title,
    publisher_from_title, publishers_match, romanize_publisher, title_key, Tome,
};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Only this many search-result items per extended page are considered.
const EXTENDED_PAGE_ITEM_LIMIT: usize = 30;

/// Gap search only engages once a series has at least this many tomes.
const MIN_MAX_TOME_FOR_GAP_SEARCH: u32 = 3;

/// The bulk walk over known volumes engages only for small gaps.
const MAX_MISSING_FOR_BULK_WALK: usize = 5;

/// How many known volumes the bulk walk samples (first/middle/last).
const BULK_WALK_SOURCES: usize = 3;

/// Tome numbers missing from the contiguous [1, max] range of a snapshot.
fn missing_tomes(snapshot: &[VolumeRecord]) -> BTreeSet<u32> {
    let found: BTreeSet<u32> = snapshot
        .iter()
        .filter(|record| record.bundle.is_none())
        .filter_map(|record| record.tome)
        .filter(|&tome| tome > 0)
        .collect();

    let Some(&max) = found.iter().next_back() else {
        return BTreeSet::new();
    };
    if max < MIN_MAX_TOME_FOR_GAP_SEARCH {
        return BTreeSet::new();
    }

    (1..=max).filter(|tome| !found.contains(tome)).collect()
}

impl SeriesScanner<'_> {
    /// Run the extended search: gap hunting over further search pages,
    /// then the known-volume bulk walk for small residual gaps.
    pub(crate) async fn extended_search(
        &self,
        series: &SeriesDefinition,
        d: &mut Discovery,
        snapshot: &mut Vec<VolumeRecord>,
    ) -> Result<()> {
        let mut missing = missing_tomes(snapshot);
        if missing.is_empty() {
            return Ok(());
        }

        info!(missing = ?missing, "tome gaps detected, extended search");
        self.search_gap_pages(series, d, snapshot, &mut missing).await?;

        let missing = missing_tomes(snapshot);
        if !missing.is_empty() && missing.len() <= MAX_MISSING_FOR_BULK_WALK {
            info!(missing = ?missing, "walking bulk sections of known volumes");
            self.bulk_walk(series, d, snapshot).await?;
        }

        Ok(())
    }

    /// Up to a few additional search pages, each candidate verified
    /// inline with the same classification rules as the main cascade.
    async fn search_gap_pages(
        &self,
        series: &SeriesDefinition,
        d: &mut Discovery,
        snapshot: &mut Vec<VolumeRecord>,
        missing: &mut BTreeSet<u32>,
    ) -> Result<()> {
        let search_key = title_key(&series.search_key);
        let first_page = 2_u32;
        let last_page = first_page + self.config.scan.extended_search_pages;

        for page in first_page..last_page {
            if missing.is_empty() {
                break;
            }

            let url = url_builder::build_search_url(&self.config.catalog, series, page);
            let html = match self.fetcher.fetch(&url, RequestKind::Search).await {
                Ok(html) => html,
                Err(e) => {
                    debug!(page, error = %e, "extended search page unreachable");
                    continue;
                }
            };

            let parsed = parse_search_page(&html, self.fetcher.base_url());
            if parsed.items.is_empty() {
                break;
            }

            let mut found_on_page = 0_usize;
            for item in parsed.items.iter().take(EXTENDED_PAGE_ITEM_LIMIT) {
                let Some(id) = &item.item_id else { continue };
                if d.seen.contains(id.as_str()) {
                    continue;
                }
                if !normalize_title(&item.title).contains(&search_key) {
                    continue;
                }
                if is_digital_listing(&item.url, &item.title) || !id.is_physical() {
                    d.seen.insert(id.as_str().to_string());
                    continue;
                }

                info!(page, item = %id, title = %item.title, "extended search candidate");
                d.seen.insert(id.as_str().to_string());

                if let Some(record) = self
                    .verify_inline(series, id, &canonical_item_url(self.fetcher.base_url(), &item.url))
                    .await?
                {
                    if let Some(tome) = record.tome {
                        missing.remove(&tome);
                    }
                    found_on_page += 1;
                    snapshot.push(record);
                }
            }

            if found_on_page > 0 {
                info!(page, found = found_on_page, "extended page yielded volumes");
            } else {
                debug!(page, "extended page yielded nothing");
            }
        }

        Ok(())
    }

    /// Fetch and verify one candidate outside the main Phase B loop.
    /// Persists cache and volume rows; never raises alerts (gap recovery
    /// finds old volumes, not new releases).
    async fn verify_inline(
        &self,
        series: &SeriesDefinition,
        item: &ItemId,
        url: &str,
    ) -> Result<Option<VolumeRecord>> {
        let pool = self.db.pool();

        let html = match self.fetcher.fetch(url, RequestKind::Detail).await {
            Ok(html) => html,
            Err(e) => {
                debug!(item = %item, error = %e, "inline verification fetch failed");
                return Ok(None);
            }
        };
        let detail = match parse_detail(&html) {
            Ok(detail) => detail,
            Err(invalid) => {
                debug!(item = %item, reason = %invalid, "inline verification page invalid");
                return Ok(None);
            }
        };

        let publisher = detail.publisher.clone().or_else(|| {
            publisher_from_title(&detail.title).map(|raw| romanize_publisher(&raw))
        });
        let tome = detail.tome.and_then(Tome::number);

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
            &detail.title.chars().take(100).collect::<String>(),
            publisher.as_deref(),
        )
        .await?;

        let por = shinkan_db::publishers::of_record(pool, &series.id).await?;
        if let (Some(por), Some(publisher)) = (por.as_deref(), publisher.as_deref()) {
            if !publisher.is_empty() && !publishers_match(publisher, por) {
                info!(item = %item, publisher, expected = por, "publisher mismatch, skipped");
                return Ok(None);
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
            &detail.title.chars().take(200).collect::<String>(),
            publisher.as_deref(),
        )
        .await?;

        Ok(Some(VolumeRecord {
            series: series.id.as_str().to_string(),
            display_title: series.display_title().to_string(),
            tome: if detail.is_bundle() { None } else { tome },
            release_date: detail.release_date.clone(),
            publisher,
            url: url.to_string(),
            item_id: item.as_str().to_string(),
            cover_url: detail.cover_url.clone(),
            bundle: None,
            newly_detected: false,
            previously_alerted: false,
            date_changed: false,
            previous_date: None,
        }))
    }

    /// Walk the bulk sections of up to three representative known volumes
    /// (first, middle, last by tome) looking for unseen same-series
    /// items.
    async fn bulk_walk(
        &self,
        series: &SeriesDefinition,
        d: &mut Discovery,
        snapshot: &mut Vec<VolumeRecord>,
    ) -> Result<()> {
        let pool = self.db.pool();

        let known: Vec<_> = volumes::for_series(pool, &series.id)
            .await?
            .into_iter()
            .filter(|volume| volume.tome.is_some())
            .collect();
        if known.len() < 2 {
            return Ok(());
        }

        let mut sources = vec![known[0].item_id.clone()];
        sources.push(known[known.len() / 2].item_id.clone());
        sources.push(known[known.len() - 1].item_id.clone());
        sources.dedup();
        sources.truncate(BULK_WALK_SOURCES);

        let series_key = normalize_title(&series.title).to_lowercase();
        let first_word_key = series
            .title
            .split_whitespace()
            .next()
            .map(|word| normalize_title(word).to_lowercase())
            .unwrap_or_else(|| series_key.clone());

        for source_raw in sources {
            let Ok(source) = ItemId::new(&source_raw) else {
                continue;
            };
            let url = self.detail_url(&source);
            let html = match self.fetcher.fetch(&url, RequestKind::Detail).await {
                Ok(html) => html,
                Err(e) => {
                    debug!(source = %source, error = %e, "bulk walk fetch failed");
                    continue;
                }
            };

            let sections = parse_related(&html, &title_key(&series.title), &source, false);
            let linked: Vec<ItemId> = sections
                .bulk
                .iter()
                .chain(sections.publisher.iter())
                .cloned()
                .collect();

            for id in linked {
                if d.seen.contains(id.as_str())
                    || d.known.contains(id.as_str())
                    || d.rejected.contains(id.as_str())
                {
                    continue;
                }
                if cache::lookup_settled(pool, &id).await?.is_some() {
                    continue;
                }
                d.seen.insert(id.as_str().to_string());

                let item_url = self.detail_url(&id);
                let html = match self.fetcher.fetch(&item_url, RequestKind::Detail).await {
                    Ok(html) => html,
                    Err(_) => continue,
                };
                let Ok(detail) = parse_detail(&html) else {
                    continue;
                };

                if !detail.format.as_deref().is_some_and(is_paper_format) {
                    continue;
                }
                if series.kind != shinkan_core::EditionKind::Any {
                    if let Some(format) = detail.format.as_deref() {
                        if !kind_matches_format(series.kind, format) {
                            continue;
                        }
                    }
                }

                // The publisher carousel shows "similar" series too; only
                // titles containing the series name survive.
                let listing_title = normalize_title(&detail.title).to_lowercase();
                let on_topic = listing_title.contains(&series_key)
                    || listing_title.contains(&first_word_key);
                let publisher = detail.publisher.clone().or_else(|| {
                    publisher_from_title(&detail.title).map(|raw| romanize_publisher(&raw))
                });
                let tome = detail.tome.and_then(Tome::number);
                let cached_tome = tome.map_or(CachedTome::Unknown, CachedTome::Known);

                cache::store(
                    pool,
                    &id,
                    detail.release_date.as_deref(),
                    cached_tome,
                    &detail.title.chars().take(100).collect::<String>(),
                    publisher.as_deref(),
                )
                .await?;

                if !on_topic {
                    debug!(item = %id, title = %detail.title, "off-topic in bulk walk, cached only");
                    continue;
                }

                info!(item = %id, tome = ?tome, "new volume found via bulk walk");
                volumes::upsert(
                    pool,
                    &series.id,
                    series.translated_title.as_deref(),
                    tome.map(i64::from),
                    &id,
                    &item_url,
                    detail.release_date.as_deref(),
                    &detail.title.chars().take(200).collect::<String>(),
                    publisher.as_deref(),
                )
                .await?;
                d.known.insert(id.as_str().to_string());

                snapshot.push(VolumeRecord {
                    series: series.id.as_str().to_string(),
                    display_title: series.display_title().to_string(),
                    tome,
                    release_date: detail.release_date.clone(),
                    publisher,
                    url: item_url,
                    item_id: id.as_str().to_string(),
                    cover_url: detail.cover_url.clone(),
                    bundle: None,
                    newly_detected: false,
                    previously_alerted: false,
                    date_changed: false,
                    previous_date: None,
                });
            }
        }

        Ok(())
    }
}
