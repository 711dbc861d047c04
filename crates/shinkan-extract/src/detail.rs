//! Product detail-page extraction.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use shinkan_text::{extract_tome, is_bundle_listing, romanize_publisher, BundleInfo, Tome};
use thiserror::Error;

static INVISIBLE_MARKS: Lazy<Regex> = Lazy::new(|| {
    Regex::new("[\u{200e}\u{200f}\u{200b}\u{202a}\u{202b}\u{202c}\u{a0}]").expect("valid regex")
});

/// Format keywords recognized in the detail-bullet fallback.
const FORMAT_KEYWORDS: &[&str] = &[
    "単行本",
    "文庫",
    "ペーパーバック",
    "コミック",
    "Paperback",
    "Tankobon",
];

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid selector")
}

/// Why a fetched detail page could not be used.
///
/// These are page-content judgments, not transport errors: the fetch
/// succeeded but the body is not a product page. The pipeline answers
/// them with its cache/snippet fallback chain and the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PageInvalid {
    /// The body is an anti-bot challenge.
    #[error("anti-bot challenge page")]
    Captcha,
    /// The body is a rate-limit interstitial.
    #[error("rate-limit interstitial")]
    RateLimit,
    /// The body is abnormally short.
    #[error("abnormally short page")]
    TooShort,
    /// The primary title field is missing from an otherwise-normal page.
    #[error("product title missing")]
    MissingTitle,
}

/// Structured fields of a product detail page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetailPage {
    /// Product title
    pub title: String,
    /// Release date string as published (`YYYY/M/D` or English long form)
    pub release_date: Option<String>,
    /// Publisher, romanized, with the parenthesized date stripped
    pub publisher: Option<String>,
    /// Declared format
    pub format: Option<String>,
    /// Cover image URL
    pub cover_url: Option<String>,
    /// Bundle composition, when the listing is a boxed set
    pub bundle: Option<BundleInfo>,
    /// Tome marker extracted from the title (absent for bundles)
    pub tome: Option<Tome>,
}

impl DetailPage {
    /// Whether this listing is a bundle rather than a single volume.
    #[must_use]
    pub fn is_bundle(&self) -> bool {
        self.bundle.is_some()
    }
}

fn strip_invisible(text: &str) -> String {
    INVISIBLE_MARKS.replace_all(text, "").trim().to_string()
}

/// Text after the last ASCII or full-width colon.
fn after_colon(text: &str) -> String {
    let tail = text
        .rsplit(|c| c == ':' || c == '：')
        .next()
        .unwrap_or(text);
    strip_invisible(tail)
}

/// Parse a product detail page into structured fields.
///
/// Returns `Err(PageInvalid)` when the page cannot be a product page:
/// anti-bot challenge, rate-limit interstitial, truncated body, or a page
/// with no title field. Missing individual fields (date, publisher, tome)
/// are not errors; the record is still usable with nulls.
pub fn parse_detail(html: &str) -> Result<DetailPage, PageInvalid> {
    let document = Html::parse_document(html);

    let title_sel = selector("span#productTitle");
    let title = document
        .select(&title_sel)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .unwrap_or_default();

    if title.is_empty() {
        let lowered = html.to_lowercase();
        if lowered.contains("captcha") || lowered.contains("robot") {
            return Err(PageInvalid::Captcha);
        }
        if html.contains("To discuss automated access") {
            return Err(PageInvalid::RateLimit);
        }
        if html.len() < 5000 {
            return Err(PageInvalid::TooShort);
        }
        return Err(PageInvalid::MissingTitle);
    }

    let mut page = DetailPage {
        bundle: if is_bundle_listing(&title) {
            // Range/total may be absent; a bundle with no parseable span
            // is still a bundle.
            Some(BundleInfo::from_title(&title).unwrap_or(BundleInfo::Total(0)))
        } else {
            None
        },
        tome: None,
        ..DetailPage::default()
    };

    // Date and publisher live in the detail bullets. Pages may be served
    // in Japanese (発売日/出版社) or English (Publication date/Publisher)
    // depending on session cookies; both are recognized.
    let bullets_sel = selector("div#detailBulletsWrapper_feature_div li");
    for li in document.select(&bullets_sel) {
        let text: String = li.text().collect();
        if text.contains("発売日") || text.contains("Publication date") {
            page.release_date = Some(after_colon(&text));
        } else if text.contains("出版社") || text.contains("Publisher") {
            let raw = after_colon(&text);
            // Drop the release date the source appends in parentheses
            let name = raw.split('(').next().unwrap_or(&raw).trim();
            if !name.is_empty() {
                page.publisher = Some(romanize_publisher(name));
            }
        }
    }

    if page.bundle.is_none() {
        page.tome = extract_tome(&title);
    }

    let cover_sel = selector("img#landingImage");
    page.cover_url = document
        .select(&cover_sel)
        .next()
        .and_then(|el| el.value().attr("src"))
        .map(ToString::to_string);

    page.format = extract_format(&document, &title);
    page.title = title;

    Ok(page)
}

/// Four-method format cascade: the selected format-switcher entry, the
/// detail bullets, keywords in the title, then the breadcrumb.
fn extract_format(document: &Html, title: &str) -> Option<String> {
    let switcher_sel = selector("div#tmmSwatches span.a-button-selected, div#tmmSwatches li.selected");
    if let Some(selected) = document.select(&switcher_sel).next() {
        let text: String = selected.text().collect::<String>().trim().to_string();
        if !text.is_empty() {
            return Some(text);
        }
    }

    let bullets_sel = selector("div#detailBullets_feature_div li");
    for li in document.select(&bullets_sel) {
        let text: String = li.text().collect::<String>().trim().to_string();
        if FORMAT_KEYWORDS.iter().any(|kw| text.contains(kw)) {
            return Some(text.chars().take(50).collect());
        }
    }

    if title.contains("文庫") {
        return Some("文庫".to_string());
    }
    if title.contains("コミック") {
        return Some("コミック".to_string());
    }

    let breadcrumb_sel = selector("div#wayfinding-breadcrumbs_feature_div");
    if let Some(breadcrumb) = document.select(&breadcrumb_sel).next() {
        let text: String = breadcrumb.text().collect();
        if text.contains("文庫") {
            return Some("文庫".to_string());
        }
        if text.contains("コミック") || text.contains("マンガ") {
            return Some("コミック".to_string());
        }
        if text.contains("単行本") {
            return Some("単行本".to_string());
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product_page(title: &str, date: &str, publisher: &str) -> String {
        format!(
            r#"<html><body>
            <span id="productTitle">{title}</span>
            <img id="landingImage" src="https://img.example/cover.jpg"/>
            <div id="detailBulletsWrapper_feature_div"><ul>
                <li><span>発売日 : </span><span>{date}</span></li>
                <li><span>出版社 : </span><span>{publisher}</span></li>
            </ul></div>
            <div id="tmmSwatches">
                <span class="a-button-selected">コミック (紙)</span>
            </div>
            {}
            </body></html>"#,
            "x".repeat(6000)
        )
    }

    #[test]
    fn test_parse_full_page() {
        let html = product_page("泥の国 (3) (ハルタコミックス)", "2026/3/15", "KADOKAWA (2026/3/15)");
        let page = parse_detail(&html).expect("valid page");

        assert_eq!(page.title, "泥の国 (3) (ハルタコミックス)");
        assert_eq!(page.tome, Some(Tome::Number(3)));
        assert_eq!(page.publisher.as_deref(), Some("Kadokawa"));
        assert_eq!(page.format.as_deref(), Some("コミック (紙)"));
        assert_eq!(page.cover_url.as_deref(), Some("https://img.example/cover.jpg"));
        assert!(!page.is_bundle());
        // Date kept as published; the pipeline parses it later
        assert_eq!(page.release_date.as_deref(), Some("2026/3/15"));
    }

    #[test]
    fn test_invisible_marks_stripped() {
        let html = product_page("泥の国 (3)", "\u{200e}2026/3/15", "講談社");
        let page = parse_detail(&html).expect("valid page");
        assert_eq!(page.release_date.as_deref(), Some("2026/3/15"));
        assert_eq!(page.publisher.as_deref(), Some("Kodansha"));
    }

    #[test]
    fn test_bundle_page_has_no_tome() {
        let html = product_page("泥の国 1-5巻セット", "2026/3/15", "KADOKAWA");
        let page = parse_detail(&html).expect("valid page");
        assert!(page.is_bundle());
        assert_eq!(page.bundle, Some(BundleInfo::Range { first: 1, last: 5 }));
        assert_eq!(page.tome, None);
    }

    #[test]
    fn test_captcha_page() {
        let html = "<html><body>Please solve this captcha to continue</body></html>";
        assert_eq!(parse_detail(html), Err(PageInvalid::Captcha));
    }

    #[test]
    fn test_rate_limit_page() {
        let html = format!(
            "<html><body>To discuss automated access contact us {}</body></html>",
            "y".repeat(6000)
        );
        assert_eq!(parse_detail(&html), Err(PageInvalid::RateLimit));
    }

    #[test]
    fn test_short_page() {
        assert_eq!(parse_detail("<html></html>"), Err(PageInvalid::TooShort));
    }

    #[test]
    fn test_missing_title_on_long_page() {
        let html = format!("<html><body>{}</body></html>", "z".repeat(6000));
        assert_eq!(parse_detail(&html), Err(PageInvalid::MissingTitle));
    }

    #[test]
    fn test_format_from_title_fallback() {
        let html = format!(
            r#"<html><body><span id="productTitle">氷菓 (角川文庫)</span>{}</body></html>"#,
            "x".repeat(6000)
        );
        let page = parse_detail(&html).expect("valid page");
        assert_eq!(page.format.as_deref(), Some("文庫"));
    }
}
