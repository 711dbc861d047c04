//! Phase A — discovery: build the ordered map of candidate identifiers
//! for one series.
//!
//! Seeding order, cheapest first: known volumes from the store, the
//! classification-history skip set, the reference-item bootstrap for new
//! series, operator-supplied URLs, bundle exploration from one seed's
//! detail page, then the paginated catalog search with its terminal
//! classification cascade.

use crate::candidates::{CandidateSet, Seed};
use crate::error::Result;
use crate::scan::SeriesScanner;
use crate::url_builder;
use shinkan_core::ItemId;
use shinkan_db::{classifications, manual, progress, volumes, Outcome};
use shinkan_extract::{find_physical_edition, parse_related, parse_search_page};
use shinkan_fetch::RequestKind;
use shinkan_text::{
    canonical_item_url, extract_item_id, is_bundle_listing, is_derivative_listing,
    is_digital_listing, is_sponsored_url, normalize_title, title_key,
};
use shinkan_series::SeriesDefinition;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

/// How many seeds bundle exploration may try before giving up: the first
/// candidate plus one retry when its page lacks a bulk/publisher section.
const MAX_BUNDLE_SEEDS: usize = 2;

/// The discovery state handed to verification.
#[derive(Debug, Default)]
pub struct Discovery {
    /// Candidate identifiers in discovery order
    pub candidates: CandidateSet,
    /// Identifiers already handled this scan (candidates plus everything
    /// classified, now or in any previous run)
    pub seen: HashSet<String>,
    /// Operator-rejected identifiers (global exclusion filter)
    pub rejected: HashSet<String>,
    /// Identifiers that already have a volume row for this series
    pub known: HashSet<String>,
    /// Tome numbers labeled in the bulk section, by identifier
    pub bulk_tomes: HashMap<String, u32>,
}

/// Bundle-exploration bookkeeping: at most one successful exploration per
/// series scan, over at most [`MAX_BUNDLE_SEEDS`] attempted seeds.
#[derive(Debug, Default)]
pub(crate) struct BundleState {
    done: bool,
    tried: HashSet<String>,
}

impl SeriesScanner<'_> {
    /// Resolve the reference identifier used to bootstrap a series with
    /// no cached volumes: the configured one, else the first
    /// operator-supplied URL, else an operator-accepted volume.
    pub(crate) async fn resolve_reference(
        &self,
        series: &SeriesDefinition,
    ) -> Result<Option<ItemId>> {
        if let Some(reference) = &series.reference_item {
            return Ok(Some(reference.clone()));
        }

        for url in &series.extra_urls {
            if let Some(id) = extract_item_id(url) {
                return Ok(Some(id));
            }
        }

        if let Some(raw) = manual::reference_item(self.db.pool(), &series.id).await? {
            if let Ok(id) = ItemId::new(raw) {
                return Ok(Some(id));
            }
        }

        Ok(None)
    }

    /// Run Phase A for one series.
    pub(crate) async fn discover(
        &self,
        series: &SeriesDefinition,
        reference: Option<ItemId>,
    ) -> Result<Discovery> {
        let pool = self.db.pool();
        let mut d = Discovery {
            rejected: manual::rejected_items(pool).await?,
            ..Discovery::default()
        };
        let mut bundle = BundleState::default();

        // A0: known volumes, zero network cost
        for (item_raw, url) in volumes::known_urls(pool, &series.id).await? {
            let Ok(item) = ItemId::new(&item_raw) else {
                continue;
            };
            if d.rejected.contains(item.as_str()) {
                continue;
            }
            d.known.insert(item_raw.clone());
            d.seen.insert(item_raw);
            d.candidates.insert(item, Seed::from_url(url));
        }
        if !d.candidates.is_empty() {
            info!(count = d.candidates.len(), "seeded from known volumes");
        }

        // Classification history: everything here is skipped without a fetch
        let classified = classifications::seen_items(pool, &series.id).await?;
        let skip_count = classified
            .iter()
            .filter(|id| !d.seen.contains(*id))
            .count();
        if skip_count > 0 {
            let stats = classifications::stats(pool, &series.id).await?;
            let detail: Vec<String> =
                stats.iter().map(|(outcome, n)| format!("{n} {outcome}")).collect();
            info!(
                count = skip_count,
                breakdown = detail.join(", "),
                "identifiers pre-classified, skipping without fetch"
            );
        }
        d.seen.extend(classified);

        // A1: reference-item bootstrap when nothing is cached
        if d.candidates.is_empty() {
            if let Some(reference) = reference {
                let resolved = self.resolve_physical_reference(series, reference).await;
                info!(item = %resolved, "bootstrapping from reference item");
                let url = self.detail_url(&resolved);
                d.seen.insert(resolved.as_str().to_string());
                d.candidates.insert(resolved, Seed::from_url(url));
            }
        }

        // A2: operator-supplied URLs, trusted above automated discovery
        for url in &series.extra_urls {
            let Some(item) = extract_item_id(url) else {
                continue;
            };
            if d.seen.contains(item.as_str()) {
                continue;
            }
            info!(item = %item, "added from operator URL");
            d.seen.insert(item.as_str().to_string());
            d.candidates.insert(item, Seed::from_url(url.clone()));
        }

        // Bundle exploration from the first available seed. The
        // frequently-bought carousel is only consulted when bootstrapping
        // a series with no cached volumes (high off-topic rate).
        if let Some(first) = d.candidates.first().cloned() {
            let include_fbt = d.known.is_empty();
            self.explore_bundle(series, &mut d, &mut bundle, &first, include_fbt)
                .await?;
        }

        // A6: paginated catalog search
        self.search_catalog(series, &mut d).await?;

        // A7: bundle exploration after search, if not yet attempted,
        // anchored on a candidate of the right edition kind when possible
        if !bundle.done && !d.candidates.is_empty() {
            let preferred = self.preferred_bundle_seed(series, &d);
            if let Some(seed) = preferred {
                self.explore_bundle(series, &mut d, &mut bundle, &seed, false)
                    .await?;
            }
            if !bundle.done {
                for id in d.candidates.ids() {
                    self.explore_bundle(series, &mut d, &mut bundle, &id, false)
                        .await?;
                    if bundle.done || bundle.tried.len() >= MAX_BUNDLE_SEEDS {
                        break;
                    }
                }
            }
        }

        let new_count = d.candidates.len().saturating_sub(d.known.len());
        info!(
            total = d.candidates.len(),
            known = d.known.len(),
            new = new_count,
            "discovery complete"
        );

        Ok(d)
    }

    /// A digital reference identifier is resolved to its linked physical
    /// edition when one exists; otherwise the digital identifier itself
    /// remains the seed.
    async fn resolve_physical_reference(
        &self,
        series: &SeriesDefinition,
        reference: ItemId,
    ) -> ItemId {
        if reference.is_physical() {
            return reference;
        }

        warn!(item = %reference, "reference item is digital, resolving physical edition");
        let url = self.detail_url(&reference);
        match self.fetcher.fetch(&url, RequestKind::Detail).await {
            Ok(html) => match find_physical_edition(&html, series.kind) {
                Some(physical) if physical.is_physical() => {
                    info!(item = %physical, "physical edition found for reference");
                    physical
                }
                _ => {
                    warn!("no physical edition linked, using digital reference as fallback");
                    reference
                }
            },
            Err(e) => {
                warn!(error = %e, "could not fetch reference page, using it as-is");
                reference
            }
        }
    }

    /// Fetch one seed's detail page and merge its cross-referenced
    /// identifiers into the candidate set.
    pub(crate) async fn explore_bundle(
        &self,
        series: &SeriesDefinition,
        d: &mut Discovery,
        state: &mut BundleState,
        source: &ItemId,
        include_fbt: bool,
    ) -> Result<()> {
        if state.done
            || state.tried.contains(source.as_str())
            || state.tried.len() >= MAX_BUNDLE_SEEDS
        {
            return Ok(());
        }
        state.tried.insert(source.as_str().to_string());

        info!(source = %source, "exploring bundle sections");
        let url = self.detail_url(source);
        let html = match self.fetcher.fetch(&url, RequestKind::Detail).await {
            Ok(html) => html,
            Err(e) => {
                warn!(source = %source, error = %e, "bundle exploration fetch failed");
                return Ok(());
            }
        };

        let sections = parse_related(&html, &title_key(&series.title), source, include_fbt);
        if sections.is_empty() {
            info!(source = %source, "no bundle/publisher section on this page");
            return Ok(());
        }
        state.done = true;

        for (id, tome) in &sections.bulk_tomes {
            d.bulk_tomes.insert(id.as_str().to_string(), *tome);
        }

        let pool = self.db.pool();
        for (section, ids) in [
            ("bulk", &sections.bulk),
            ("publisher", &sections.publisher),
            ("frequently_bought", &sections.frequently_bought),
        ] {
            for id in ids {
                if d.seen.contains(id.as_str()) {
                    continue;
                }
                d.seen.insert(id.as_str().to_string());

                if !id.is_physical() {
                    classifications::record(
                        pool,
                        &series.id,
                        id,
                        Outcome::NonPhysical,
                        "bulk",
                        None,
                        None,
                    )
                    .await?;
                    continue;
                }

                classifications::record(pool, &series.id, id, Outcome::Physical, "bulk", None, None)
                    .await?;
                let is_new = !d.known.contains(id.as_str());
                d.candidates
                    .insert(id.clone(), Seed::from_url(self.detail_url(id)));
                if is_new {
                    let tome = d.bulk_tomes.get(id.as_str());
                    info!(item = %id, section, ?tome, "new volume from bundle exploration");
                }
            }
        }

        Ok(())
    }

    /// The candidate whose search snippet declares a format matching the
    /// target edition kind, to avoid anchoring bundle exploration on the
    /// wrong edition (or an artbook).
    fn preferred_bundle_seed(&self, series: &SeriesDefinition, d: &Discovery) -> Option<ItemId> {
        let wanted: &[&str] = match series.kind {
            shinkan_core::EditionKind::Novel => &["文庫"],
            shinkan_core::EditionKind::Comic => &["コミック"],
            shinkan_core::EditionKind::Any => &[],
        };

        if !wanted.is_empty() {
            for (id, seed) in d.candidates.iter() {
                let declared = seed
                    .snippet
                    .as_ref()
                    .and_then(|s| s.format.as_deref())
                    .unwrap_or("");
                if wanted.iter().any(|kw| declared.contains(kw)) {
                    return Some(id.clone());
                }
            }
        }

        d.candidates.first().cloned()
    }

    /// A6: the paginated catalog search with its per-item classification
    /// cascade. Page 1 is always scanned; pages beyond it advance only
    /// when page 1 held nothing new, a few pages per run, with progress
    /// persisted after each page.
    async fn search_catalog(&self, series: &SeriesDefinition, d: &mut Discovery) -> Result<()> {
        let pool = self.db.pool();
        let search_key = title_key(&series.search_key);
        let state = progress::get(pool, &series.id).await?;

        let mut pages = vec![1_u32];
        if state.complete {
            info!("search exploration complete, page 1 only");
        } else {
            let start = state.last_page.max(1) + 1;
            let end = state.last_page + self.config.scan.pages_per_run + 1;
            pages.extend(start.max(2)..end);
            if state.last_page > 0 {
                info!(resume_from = start, "resuming search exploration");
            }
        }

        let mut found_new = false;
        let mut page_max = state.last_page;

        for page in pages {
            if found_new && page > 1 {
                // Something new surfaced: stop progressing, the rest
                // waits for the next run.
                break;
            }

            let url = url_builder::build_search_url(&self.config.catalog, series, page);
            let html = match self.fetcher.fetch(&url, RequestKind::Search).await {
                Ok(html) => html,
                Err(e) => {
                    if page == 1 && d.candidates.is_empty() {
                        warn!(error = %e, "search page 1 unreachable and nothing cached");
                    } else if page == 1 {
                        warn!(error = %e, "search unreachable, continuing with known volumes");
                    }
                    break;
                }
            };

            let parsed = parse_search_page(&html, self.fetcher.base_url());
            if parsed.items.is_empty() {
                if page > 1 {
                    progress::set(pool, &series.id, page - 1, true).await?;
                    info!(page, "empty page, search exploration finished");
                }
                break;
            }

            debug!(page, items = parsed.items.len(), "classifying search results");
            let mut new_on_page = 0_usize;

            for item in &parsed.items {
                let Some(id) = &item.item_id else { continue };
                if d.seen.contains(id.as_str()) {
                    continue;
                }
                let source = format!("search_p{page}");

                if d.rejected.contains(id.as_str()) {
                    d.seen.insert(id.as_str().to_string());
                    classifications::record(
                        pool,
                        &series.id,
                        id,
                        Outcome::OffTopicTitle,
                        &source,
                        Some(&item.title),
                        None,
                    )
                    .await?;
                    info!(item = %id, "operator-rejected, recorded");
                    continue;
                }

                if !normalize_title(&item.title).contains(&search_key) {
                    d.seen.insert(id.as_str().to_string());
                    classifications::record(
                        pool,
                        &series.id,
                        id,
                        Outcome::OffTopicTitle,
                        &source,
                        Some(&item.title),
                        None,
                    )
                    .await?;
                    continue;
                }

                if is_derivative_listing(&item.title) {
                    d.seen.insert(id.as_str().to_string());
                    classifications::record(
                        pool,
                        &series.id,
                        id,
                        Outcome::Derivative,
                        &source,
                        Some(&item.title),
                        None,
                    )
                    .await?;
                    continue;
                }

                if is_sponsored_url(&item.url) {
                    d.seen.insert(id.as_str().to_string());
                    classifications::record(
                        pool,
                        &series.id,
                        id,
                        Outcome::Sponsored,
                        &source,
                        Some(&item.title),
                        None,
                    )
                    .await?;
                    continue;
                }

                if is_digital_listing(&item.url, &item.title) {
                    d.seen.insert(id.as_str().to_string());
                    let linked = self.resolve_digital(series, d, item, &mut found_new).await;
                    classifications::record(
                        pool,
                        &series.id,
                        id,
                        Outcome::Digital,
                        &source,
                        Some(&item.title),
                        linked.as_ref(),
                    )
                    .await?;
                    if linked.is_some() {
                        new_on_page += 1;
                    }
                    continue;
                }

                if is_bundle_listing(&item.title) {
                    d.seen.insert(id.as_str().to_string());
                    classifications::record(
                        pool,
                        &series.id,
                        id,
                        Outcome::Bundle,
                        &source,
                        Some(&item.title),
                        None,
                    )
                    .await?;
                    continue;
                }

                if !id.is_physical() {
                    d.seen.insert(id.as_str().to_string());
                    classifications::record(
                        pool,
                        &series.id,
                        id,
                        Outcome::NonPhysical,
                        &source,
                        Some(&item.title),
                        None,
                    )
                    .await?;
                    continue;
                }

                // A physical candidate. Keep the snippet metadata around
                // as the fallback if the detail page later proves
                // unreachable.
                info!(item = %id, title = %item.title, "physical candidate");
                d.seen.insert(id.as_str().to_string());
                d.candidates.insert(
                    id.clone(),
                    Seed {
                        url: canonical_item_url(self.fetcher.base_url(), &item.url),
                        title: Some(item.title.clone()),
                        snippet: Some(item.snippet.clone()),
                    },
                );
                classifications::record(
                    pool,
                    &series.id,
                    id,
                    Outcome::Physical,
                    &source,
                    Some(&item.title),
                    None,
                )
                .await?;
                found_new = true;
                new_on_page += 1;
            }

            debug!(page, new = new_on_page, "page classified");

            if !parsed.has_next_page {
                progress::set(pool, &series.id, page, true).await?;
                info!(page, "no further pages, search exploration finished");
                break;
            }
            if page > 1 && parsed.items.len() < self.config.scan.sparse_page_threshold {
                progress::set(pool, &series.id, page, true).await?;
                info!(page, items = parsed.items.len(), "sparse page, search exploration finished");
                break;
            }

            if page > page_max {
                page_max = page;
                progress::set(pool, &series.id, page, false).await?;
            }
        }

        Ok(())
    }

    /// Resolve a digital search result to its linked physical edition and
    /// add that edition to the candidates when it is new.
    async fn resolve_digital(
        &self,
        series: &SeriesDefinition,
        d: &mut Discovery,
        item: &shinkan_extract::SearchItem,
        found_new: &mut bool,
    ) -> Option<ItemId> {
        let html = match self.fetcher.fetch(&item.url, RequestKind::Detail).await {
            Ok(html) => html,
            Err(e) => {
                debug!(url = %item.url, error = %e, "digital page unreachable");
                return None;
            }
        };

        let physical = find_physical_edition(&html, series.kind)?;
        if !physical.is_physical() {
            return None;
        }

        if !d.seen.contains(physical.as_str()) {
            info!(digital = %item.item_id.as_ref().map_or("?", ItemId::as_str),
                  physical = %physical, "physical edition resolved from digital listing");
            d.seen.insert(physical.as_str().to_string());
            d.candidates.insert(
                physical.clone(),
                Seed::from_url(self.detail_url(&physical)),
            );
            *found_new = true;
        }

        Some(physical)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundle_state_limits() {
        let mut state = BundleState::default();
        assert!(!state.done);
        state.tried.insert("4090000001".to_string());
        state.tried.insert("4090000002".to_string());
        assert!(state.tried.len() >= MAX_BUNDLE_SEEDS);
    }
}
