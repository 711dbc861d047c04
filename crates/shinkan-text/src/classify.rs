//! Listing classification helpers: bundle detection, digital-edition
//! detection, print-format matching, identifier/URL extraction, and
//! release-date parsing.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use shinkan_core::{EditionKind, ItemId};

/// Format strings accepted as physical print editions.
const PAPER_FORMATS: &[&str] = &[
    "単行本",
    "ペーパーバック",
    "文庫",
    "コミック",
    "Paperback",
    "Tankobon",
];

/// Title keywords marking a digital edition.
const DIGITAL_TITLE_KEYWORDS: &[&str] =
    &["Kindle版", "kindle版", "電子書籍", "ebook", "Ebook", "eBook"];

/// Title keywords marking derivative merchandise rather than a volume
/// (costumes, figures, posters, guidebooks and the like).
const DERIVATIVE_KEYWORDS: &[&str] = &[
    "コスプレ",
    "コスチューム",
    "衣装",
    "ウィッグ",
    "髪飾り",
    "フィギュア",
    "グッズ",
    "ポスター",
    "タペストリー",
    "靴",
    "バニー",
    "Official Book",
    "オフィシャルブック",
    "ガイドブック",
    "ファンブック",
];

static ITEM_ID_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"/dp/([A-Z0-9]{10})",
        r"/gp/product/([A-Z0-9]{10})",
        r"/product/([A-Z0-9]{10})",
    ]
    .into_iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});
static BUNDLE_RANGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)-(\d+)巻").expect("valid regex"));
static BUNDLE_TOTAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"全(\d+)巻").expect("valid regex"));
static DATE_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{4}/\d{1,2}/\d{1,2})").expect("valid regex"));

/// Bundle composition parsed from a listing title.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleInfo {
    /// A span of tomes sold together, e.g. `1-8巻セット`.
    Range {
        /// First tome in the span
        first: u32,
        /// Last tome in the span
        last: u32,
    },
    /// A complete set of a known size, e.g. `全5巻セット`.
    Total(u32),
}

impl BundleInfo {
    /// Parse the range or total count out of a bundle title, if present.
    #[must_use]
    pub fn from_title(title: &str) -> Option<Self> {
        if let Some(c) = BUNDLE_RANGE.captures(title) {
            let first = c[1].parse().ok()?;
            let last = c[2].parse().ok()?;
            return Some(Self::Range { first, last });
        }
        if let Some(c) = BUNDLE_TOTAL.captures(title) {
            return Some(Self::Total(c[1].parse().ok()?));
        }
        None
    }
}

/// Whether a listing title denotes a boxed set / multi-tome lot.
///
/// A title is a bundle when it carries the boxed-set marker, or a generic
/// set marker combined with a range start or a complete-set marker.
#[must_use]
pub fn is_bundle_listing(title: &str) -> bool {
    title.contains("巻セット")
        || (title.contains("セット") && (title.contains("1-") || title.contains("全巻")))
}

/// Whether a listing is a digital edition, judged from its URL and title.
#[must_use]
pub fn is_digital_listing(url: &str, title: &str) -> bool {
    if url.contains("/ebook/dp/") || url.contains("-ebook/dp/") || url.to_lowercase().contains("kindle")
    {
        return true;
    }
    DIGITAL_TITLE_KEYWORDS.iter().any(|kw| title.contains(kw))
}

/// Whether a declared format string is a physical print format.
#[must_use]
pub fn is_paper_format(format: &str) -> bool {
    !format.is_empty() && PAPER_FORMATS.iter().any(|f| format.contains(f))
}

/// Whether a declared format is acceptable for the given edition kind.
///
/// Novels accept pocket and paperback formats; comics require a comic
/// format. Callers should skip this filter when the format is unknown.
#[must_use]
pub fn kind_matches_format(kind: EditionKind, format: &str) -> bool {
    match kind {
        EditionKind::Novel => {
            format.contains("文庫")
                || format.contains("Bunko")
                || format.contains("ペーパーバック")
                || format.contains("Paperback")
        }
        EditionKind::Comic => format.contains("コミック") || format.contains("Comic"),
        EditionKind::Any => true,
    }
}

/// Whether a listing title matches the derivative-merchandise keyword list.
#[must_use]
pub fn is_derivative_listing(title: &str) -> bool {
    DERIVATIVE_KEYWORDS.iter().any(|kw| title.contains(kw))
}

/// Whether a result URL indicates a sponsored placement.
#[must_use]
pub fn is_sponsored_url(url: &str) -> bool {
    url.contains("/sspa/click") || url.contains("sspa")
}

/// Extract an item identifier from any of the catalog's URL shapes.
#[must_use]
pub fn extract_item_id(url: &str) -> Option<ItemId> {
    for pattern in ITEM_ID_PATTERNS.iter() {
        if let Some(c) = pattern.captures(url) {
            if let Ok(id) = ItemId::new(&c[1]) {
                return Some(id);
            }
        }
    }
    None
}

/// Reduce an item URL to its canonical `{base}/dp/{id}` form.
///
/// URLs that carry no recognizable identifier are returned unchanged.
#[must_use]
pub fn canonical_item_url(base_url: &str, url: &str) -> String {
    match extract_item_id(url) {
        Some(id) => format!("{}/dp/{}", base_url.trim_end_matches('/'), id),
        None => url.to_string(),
    }
}

/// Parse a source release-date string into a calendar date.
///
/// The source publishes `YYYY/M/D` on Japanese pages and a long English
/// form (`January 9, 2026`) when a page is served in English; both are
/// accepted. Invisible directional marks are stripped first. Returns
/// `None` for anything else — not every source date resolves to a real
/// calendar date.
#[must_use]
pub fn parse_release_date(raw: &str) -> Option<NaiveDate> {
    let cleaned: String = raw
        .chars()
        .filter(|c| {
            !matches!(
                c,
                '\u{200e}' | '\u{200f}' | '\u{200b}' | '\u{202a}' | '\u{202b}' | '\u{202c}'
                    | '\u{a0}'
            )
        })
        .collect();
    let cleaned = cleaned.trim();

    NaiveDate::parse_from_str(cleaned, "%Y/%m/%d")
        .or_else(|_| NaiveDate::parse_from_str(cleaned, "%B %d, %Y"))
        .ok()
}

/// Find the first date token (`YYYY/M/D`) in arbitrary snippet text and
/// zero-pad it to `YYYY/MM/DD`.
#[must_use]
pub fn find_date_token(text: &str) -> Option<String> {
    let token = DATE_TOKEN.captures(text)?.get(1)?.as_str().to_string();
    let parts: Vec<&str> = token.split('/').collect();
    if parts.len() == 3 {
        if let (Ok(month), Ok(day)) = (parts[1].parse::<u32>(), parts[2].parse::<u32>()) {
            return Some(format!("{}/{month:02}/{day:02}", parts[0]));
        }
    }
    Some(token)
}
