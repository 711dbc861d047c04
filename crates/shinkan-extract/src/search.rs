//! Search-result page extraction.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use shinkan_core::ItemId;
use shinkan_text::{extract_item_id, find_date_token, publisher_from_title, romanize_publisher};

static FORMAT_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(コミック|文庫|単行本|新書|大型本|ムック)").expect("valid regex"));

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid selector")
}

/// Metadata opportunistically captured from a search-result snippet.
///
/// When the detail page later proves unreachable, this is the fallback
/// that lets a candidate still be recorded without a second fetch.
#[derive(Debug, Clone, Default)]
pub struct SnippetMeta {
    /// Tome number extracted from the snippet title
    pub tome: Option<u32>,
    /// Publisher extracted from the snippet title, romanized
    pub publisher: Option<String>,
    /// Release date (`YYYY/MM/DD`) found next to the format token
    pub date: Option<String>,
    /// Format token found in the snippet (`コミック`, `文庫`, ...)
    pub format: Option<String>,
}

/// One item of a search-result page, in page order.
#[derive(Debug, Clone)]
pub struct SearchItem {
    /// Raw listing title
    pub title: String,
    /// Absolute listing URL
    pub url: String,
    /// Item identifier, when one could be extracted
    pub item_id: Option<ItemId>,
    /// Opportunistic snippet metadata
    pub snippet: SnippetMeta,
}

/// A parsed search-result page.
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    /// Result items in page order
    pub items: Vec<SearchItem>,
    /// Whether the source signals a further page (next-page control
    /// present and not disabled)
    pub has_next_page: bool,
}

/// Parse a catalog search-result page.
#[must_use]
pub fn parse_search_page(html: &str, base_url: &str) -> SearchPage {
    let document = Html::parse_document(html);

    let item_sel = selector(".s-result-item");
    let title_sel = selector(".a-text-normal");
    let title_alt_sel = selector("h2 a span");
    let link_sel = selector(".a-link-normal");
    let link_alt_sel = selector("h2 a");

    let mut items = Vec::new();

    for element in document.select(&item_sel) {
        let title = element
            .select(&title_sel)
            .next()
            .or_else(|| element.select(&title_alt_sel).next())
            .map(|el| el.text().collect::<String>());
        let Some(title) = title else { continue };

        let href = element
            .select(&link_sel)
            .next()
            .or_else(|| element.select(&link_alt_sel).next())
            .and_then(|el| el.value().attr("href"));
        let Some(href) = href else { continue };

        let url = if href.starts_with("http") {
            href.to_string()
        } else {
            format!("{}{}", base_url.trim_end_matches('/'), href)
        };

        let item_id = extract_item_id(&url).or_else(|| {
            element
                .value()
                .attr("data-asin")
                .and_then(|raw| ItemId::new(raw).ok())
        });

        let snippet = snippet_metadata(element, &title);

        items.push(SearchItem {
            title,
            url,
            item_id,
            snippet,
        });
    }

    let next_sel = selector(".s-pagination-next");
    let has_next_page = document.select(&next_sel).next().is_some_and(|el| {
        !el.value()
            .classes()
            .any(|class| class == "s-pagination-disabled")
    });

    SearchPage {
        items,
        has_next_page,
    }
}

/// Extract the metadata visible directly in a result snippet: tome and
/// publisher from the title, release date and format from the byline
/// spans (`コミック – 2026/1/23`).
fn snippet_metadata(element: ElementRef<'_>, title: &str) -> SnippetMeta {
    let mut meta = SnippetMeta {
        tome: shinkan_text::extract_tome(title).and_then(shinkan_text::Tome::number),
        publisher: publisher_from_title(title)
            .map(|raw| romanize_publisher(&raw)),
        ..SnippetMeta::default()
    };

    let byline_sel = selector("span.a-text-normal, span.a-size-base, span.a-color-secondary");
    for span in element.select(&byline_sel) {
        let text: String = span.text().collect();
        if let Some(date) = find_date_token(&text) {
            meta.date = Some(date);
            if let Some(format) = FORMAT_TOKEN.captures(&text) {
                meta.format = Some(format[1].to_string());
            }
            break;
        }
    }

    // Some layouts put the byline in a row div instead
    if meta.date.is_none() {
        let row_sel = selector(".a-row");
        for row in element.select(&row_sel) {
            let text: String = row.text().collect();
            if let Some(date) = find_date_token(&text) {
                meta.date = Some(date);
                break;
            }
        }
    }

    meta
}
