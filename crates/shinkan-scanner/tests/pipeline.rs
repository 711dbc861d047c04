//! End-to-end pipeline scenarios against a stub page fetcher.
//!
//! The stub serves canned HTML by exact URL and counts every fetch, so
//! these tests can assert not just what a scan produced but which pages
//! it did (and did not) touch.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use shinkan_core::{AppConfig, EditionKind, ItemId, SeriesId};
use shinkan_db::{alerts, cache, classifications, volumes, CachedTome, Database};
use shinkan_fetch::{FetchError, RequestKind};
use shinkan_scanner::{url_builder, PageFetcher, SeriesScanner};
use shinkan_series::SeriesDefinition;
use std::collections::HashMap;
use std::sync::Mutex;

const BASE: &str = "https://catalog.example";

struct StubFetcher {
    base: String,
    pages: Mutex<HashMap<String, String>>,
    counts: Mutex<HashMap<String, usize>>,
}

impl StubFetcher {
    fn new() -> Self {
        Self {
            base: BASE.to_string(),
            pages: Mutex::new(HashMap::new()),
            counts: Mutex::new(HashMap::new()),
        }
    }

    fn serve(&self, url: &str, html: String) {
        self.pages.lock().expect("pages lock").insert(url.to_string(), html);
    }

    fn remove(&self, url: &str) {
        self.pages.lock().expect("pages lock").remove(url);
    }

    fn fetch_count(&self, url: &str) -> usize {
        *self.counts.lock().expect("counts lock").get(url).unwrap_or(&0)
    }

    fn reset_counts(&self) {
        self.counts.lock().expect("counts lock").clear();
    }
}

#[async_trait]
impl PageFetcher for StubFetcher {
    async fn fetch(&self, url: &str, _kind: RequestKind) -> shinkan_fetch::Result<String> {
        *self
            .counts
            .lock()
            .expect("counts lock")
            .entry(url.to_string())
            .or_insert(0) += 1;

        self.pages
            .lock()
            .expect("pages lock")
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::NotFound {
                url: url.to_string(),
            })
    }

    fn base_url(&self) -> &str {
        &self.base
    }
}

fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.catalog.base_url = BASE.to_string();
    config
}

fn series(id: &str, search_key: &str, reference: Option<&str>) -> SeriesDefinition {
    SeriesDefinition {
        id: SeriesId::new(id).expect("valid series ID"),
        title: search_key.to_string(),
        search_key: search_key.to_string(),
        kind: EditionKind::Comic,
        translated_title: Some("Land of Mud".to_string()),
        reference_item: reference.map(|r| ItemId::new(r).expect("valid item ID")),
        extra_urls: vec![],
        quote_search_key: false,
    }
}

fn detail_url(item: &str) -> String {
    format!("{BASE}/dp/{item}")
}

fn detail_page(title: &str, date: &str, publisher: &str) -> String {
    format!(
        r#"<html><body>
        <span id="productTitle">{title}</span>
        <img id="landingImage" src="https://img.example/cover.jpg"/>
        <div id="detailBulletsWrapper_feature_div"><ul>
            <li><span>発売日 : </span><span>{date}</span></li>
            <li><span>出版社 : </span><span>{publisher}</span></li>
        </ul></div>
        {}
        </body></html>"#,
        "x".repeat(6000)
    )
}

fn captcha_page() -> String {
    "<html><body>please solve this captcha</body></html>".to_string()
}

fn search_page(entries: &[(&str, &str)], has_next: bool) -> String {
    let items: String = entries
        .iter()
        .map(|(id, title)| {
            format!(
                r#"<div class="s-result-item" data-asin="{id}">
                    <h2><a class="a-link-normal" href="/dp/{id}">
                        <span class="a-text-normal">{title}</span>
                    </a></h2>
                </div>"#
            )
        })
        .collect();
    let pagination = if has_next {
        r#"<span class="s-pagination-next">next</span>"#
    } else {
        r#"<span class="s-pagination-next s-pagination-disabled">next</span>"#
    };
    format!("<html><body>{items}{pagination}</body></html>")
}

/// Scenario 1: a new series bootstrapped from a reference identifier ends
/// up with exactly one volume row and one newly-detected release.
#[tokio::test]
async fn bootstrap_from_reference_detects_new_volume() {
    let db = Database::open_in_memory().await.expect("open database");
    let fetcher = StubFetcher::new();
    let config = test_config();

    fetcher.serve(
        &detail_url("4091234567"),
        detail_page("泥の国 (3) (ハルタコミックス)", "2026/03/15", "講談社"),
    );

    let def = series("mud-country-comic", "泥の国", Some("4091234567"));
    let scanner = SeriesScanner::new(&db, &fetcher, &config);
    let outcome = scanner.scan(&def, None).await.expect("scan succeeds");

    assert_eq!(outcome.snapshot.len(), 1);
    assert_eq!(outcome.new_releases.len(), 1);

    let release = &outcome.new_releases[0];
    assert_eq!(release.item_id, "4091234567");
    assert_eq!(release.tome, Some(3));
    assert_eq!(release.publisher.as_deref(), Some("Kodansha"));
    assert!(release.newly_detected);
    assert!(!release.date_changed);

    // Exactly one volume row in the store
    let item = ItemId::new("4091234567").expect("valid item ID");
    let stored = volumes::by_item(db.pool(), &item)
        .await
        .expect("query")
        .expect("volume row exists");
    assert_eq!(stored.tome, Some(3));
    assert_eq!(stored.translated_title.as_deref(), Some("Land of Mud"));

    // And the alert was recorded
    let urls = alerts::alerted_urls(db.pool(), &def.id).await.expect("alerts");
    assert!(urls.contains(&detail_url("4091234567")));
}

/// Scenario 2: rescanning an unchanged series produces no new releases,
/// no duplicate rows, and needs no detail fetch for the known identifier
/// — the verification cache answers. The detail page is removed from the
/// stub before the rescan to prove it.
#[tokio::test]
async fn rescan_hits_cache_without_fetching() {
    let db = Database::open_in_memory().await.expect("open database");
    let fetcher = StubFetcher::new();
    let config = test_config();

    fetcher.serve(
        &detail_url("4091234567"),
        detail_page("泥の国 (3) (ハルタコミックス)", "2026/03/15", "講談社"),
    );

    let def = series("mud-country-comic", "泥の国", Some("4091234567"));
    let scanner = SeriesScanner::new(&db, &fetcher, &config);
    let first = scanner.scan(&def, None).await.expect("first scan");
    assert_eq!(first.new_releases.len(), 1);

    // The source goes dark: if the rescan needed the page, it would lose
    // the volume.
    fetcher.remove(&detail_url("4091234567"));
    fetcher.reset_counts();

    let second = scanner.scan(&def, None).await.expect("second scan");
    assert_eq!(second.new_releases.len(), 0, "already alerted, nothing new");
    assert_eq!(second.snapshot.len(), 1, "cache still answers");
    assert_eq!(second.snapshot[0].tome, Some(3));
    assert!(second.snapshot[0].previously_alerted);

    let item = ItemId::new("4091234567").expect("valid item ID");
    let count = volumes::count_for_series(db.pool(), &def.id)
        .await
        .expect("count");
    assert_eq!(count, 1, "no duplicate row");

    // The cached entry is settled, so verification never re-fetched
    let entry = cache::lookup_settled(db.pool(), &item)
        .await
        .expect("cache lookup")
        .expect("cache entry");
    assert_eq!(entry.tome, CachedTome::Known(3));
}

/// Scenario 3: an off-topic search result is classified once, excluded
/// from discovery, and never fetched — on this scan or the next.
#[tokio::test]
async fn off_topic_result_classified_and_never_fetched() {
    let db = Database::open_in_memory().await.expect("open database");
    let fetcher = StubFetcher::new();
    let config = test_config();

    let def = series("mud-country-comic", "泥の国", None);

    // Page 1 carries one on-topic volume and one off-topic listing
    let page1 = url_builder::build_search_url(&config.catalog, &def, 1);
    fetcher.serve(
        &page1,
        search_page(
            &[
                ("4091234567", "泥の国 (3) (ハルタコミックス)"),
                ("4099999990", "別の漫画 (5) (講談社)"),
            ],
            false,
        ),
    );
    fetcher.serve(
        &detail_url("4091234567"),
        detail_page("泥の国 (3) (ハルタコミックス)", "2026/03/15", "講談社"),
    );

    let scanner = SeriesScanner::new(&db, &fetcher, &config);
    let outcome = scanner.scan(&def, None).await.expect("scan succeeds");

    // Only the on-topic listing became a volume
    assert_eq!(outcome.snapshot.len(), 1);
    assert_eq!(outcome.snapshot[0].item_id, "4091234567");

    // The off-topic listing was recorded to history...
    let seen = classifications::seen_items(db.pool(), &def.id)
        .await
        .expect("seen items");
    assert!(seen.contains("4099999990"));
    let stats = classifications::stats(db.pool(), &def.id)
        .await
        .expect("stats");
    assert!(stats.contains(&("off_topic_title".to_string(), 1)));

    // ...and its detail page was never touched
    assert_eq!(fetcher.fetch_count(&detail_url("4099999990")), 0);

    // A rescan skips it via history: still zero fetches
    fetcher.reset_counts();
    scanner.scan(&def, None).await.expect("rescan succeeds");
    assert_eq!(fetcher.fetch_count(&detail_url("4099999990")), 0);
}

/// Scenario 4: a pre-order whose release date moved is re-flagged as
/// newly detected with the date-changed marker, and the stored alert date
/// is updated.
#[tokio::test]
async fn preorder_date_change_reopens_alert() {
    let db = Database::open_in_memory().await.expect("open database");
    let fetcher = StubFetcher::new();
    let config = test_config();

    let original = (Utc::now() + Duration::days(60)).format("%Y/%m/%d").to_string();
    let corrected = (Utc::now() + Duration::days(67)).format("%Y/%m/%d").to_string();

    fetcher.serve(
        &detail_url("4091234567"),
        detail_page("泥の国 (3) (ハルタコミックス)", &original, "講談社"),
    );

    let def = series("mud-country-comic", "泥の国", Some("4091234567"));
    let scanner = SeriesScanner::new(&db, &fetcher, &config);
    let first = scanner.scan(&def, None).await.expect("first scan");
    assert_eq!(first.new_releases.len(), 1);

    // The source corrects the pre-order date
    fetcher.serve(
        &detail_url("4091234567"),
        detail_page("泥の国 (3) (ハルタコミックス)", &corrected, "講談社"),
    );

    let second = scanner.scan(&def, None).await.expect("second scan");
    assert_eq!(second.new_releases.len(), 1, "date change re-opens the alert");

    let release = &second.new_releases[0];
    assert!(release.date_changed);
    assert_eq!(release.previous_date.as_deref(), Some(original.as_str()));
    assert_eq!(release.release_date.as_deref(), Some(corrected.as_str()));

    let stored = alerts::date(db.pool(), &def.id, &detail_url("4091234567"))
        .await
        .expect("alert date");
    assert_eq!(stored.as_deref(), Some(corrected.as_str()));
}

/// Scenario 5: three consecutive invalid pages trip the circuit breaker,
/// which delays the next fetch by the cooldown and then resets.
#[tokio::test]
async fn circuit_breaker_cools_down_after_consecutive_invalid_pages() {
    let db = Database::open_in_memory().await.expect("open database");
    let fetcher = StubFetcher::new();
    // Run on the real clock with a short cooldown: sqlx's SQLite pool
    // validates/opens connections on a background thread, which races
    // tokio's paused-clock auto-advance (the acquire timeout fires before
    // the background thread answers). A 1s cooldown keeps the real-time
    // sleep tractable; the assertions below are relative to this value.
    let mut config = test_config();
    config.scan.circuit_breaker_cooldown_secs = 1;
    let def = series("mud-country-comic", "泥の国", None);

    // Four known volumes whose detail pages all come back as challenges
    for (i, id) in ["4090000001", "4090000002", "4090000003", "4090000004"]
        .iter()
        .enumerate()
    {
        let item = ItemId::new(*id).expect("valid item ID");
        volumes::upsert(
            db.pool(),
            &def.id,
            None,
            Some(i as i64 + 1),
            &item,
            &detail_url(id),
            None,
            "泥の国",
            None,
        )
        .await
        .expect("seed volume");
        fetcher.serve(&detail_url(id), captcha_page());
    }

    let scanner = SeriesScanner::new(&db, &fetcher, &config);
    let start = tokio::time::Instant::now();
    let outcome = scanner.scan(&def, None).await.expect("scan completes");
    let elapsed = start.elapsed();

    // All four pages were invalid with no fallback data, so nothing came out
    assert!(outcome.snapshot.is_empty());

    // One cooldown fired (after the 3rd invalid page) and the counter
    // reset, so the 4th did not trigger a second cooldown.
    let cooldown = std::time::Duration::from_secs(config.scan.circuit_breaker_cooldown_secs);
    assert!(elapsed >= cooldown, "cooldown must delay the 4th fetch");
    assert!(elapsed < cooldown * 2, "counter must reset after the cooldown");
}
