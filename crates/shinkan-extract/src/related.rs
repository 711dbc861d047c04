//! Bundle/cross-sell section extraction and digital-to-physical edition
//! resolution from a product detail page.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use shinkan_core::{EditionKind, ItemId};
use shinkan_text::{extract_item_id, normalize_title};
use std::collections::HashMap;
use tracing::debug;

static TOME_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:Vol\.?\s*|第?\s*)(\d+)\s*巻?|(\d+)\s*巻").expect("valid regex")
});
static RAW_ITEM_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z0-9]{10}$").expect("valid regex"));

/// Data attributes that may carry an item identifier.
const ID_ATTRIBUTES: &[&str] = &["data-asin", "data-value", "data-dp-url"];

/// Keywords marking a digital entry in the format switcher.
const KINDLE_KEYWORDS: &[&str] = &["kindle", "Kindle", "デジタル", "電子"];

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid selector")
}

/// Cross-referenced identifiers found on a detail page, per section.
///
/// Sections in decreasing order of reliability: the bulk-purchase box
/// typically contains only same-series items; the publisher section is a
/// usable fallback; the frequently-bought carousel has a high off-topic
/// rate and is only consulted when bootstrapping a brand-new series.
#[derive(Debug, Clone, Default)]
pub struct RelatedSections {
    /// Identifiers from the bulk-purchase box
    pub bulk: Vec<ItemId>,
    /// Tome numbers labeled on bulk entries, when the box provides them
    pub bulk_tomes: HashMap<ItemId, u32>,
    /// Identifiers from the publisher section
    pub publisher: Vec<ItemId>,
    /// Identifiers from the frequently-bought carousel
    pub frequently_bought: Vec<ItemId>,
}

impl RelatedSections {
    /// Whether any section yielded identifiers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bulk.is_empty() && self.publisher.is_empty() && self.frequently_bought.is_empty()
    }
}

/// Extract cross-referenced identifiers from a detail page.
///
/// `title_key` is the series' normalized containment key, used to pick
/// the right bulk box when a page carries several. `exclude` is the
/// page's own identifier. When the bulk section yields anything, the
/// publisher fallback is skipped entirely.
pub fn parse_related(
    html: &str,
    title_key: &str,
    exclude: &ItemId,
    include_frequently_bought: bool,
) -> RelatedSections {
    let document = Html::parse_document(html);
    let mut sections = RelatedSections::default();
    let mut seen: Vec<ItemId> = vec![exclude.clone()];

    extract_bulk(&document, title_key, &mut sections, &mut seen);

    if !sections.bulk.is_empty() {
        debug!(
            count = sections.bulk.len(),
            labeled = sections.bulk_tomes.len(),
            "bulk section found"
        );
        return sections;
    }

    sections.publisher = section_links(
        &document,
        &["From the Publisher", "出版社より", "Products related"],
        &mut seen,
    );

    if include_frequently_bought {
        sections.frequently_bought = section_links(
            &document,
            &["Frequently bought together", "よく一緒に購入されている商品"],
            &mut seen,
        );
        if sections.frequently_bought.is_empty() {
            // Alternative: the carousel container has a stable element id
            let fbt_sel = selector("div#sims-fbt a[href]");
            for link in document.select(&fbt_sel) {
                if let Some(id) = id_from_link(link) {
                    if !seen.contains(&id) {
                        seen.push(id.clone());
                        sections.frequently_bought.push(id);
                    }
                }
            }
        }
    }

    sections
}

/// The bulk-purchase box: first by the box markup with a title matching
/// the series key, then by section header.
fn extract_bulk(
    document: &Html,
    title_key: &str,
    sections: &mut RelatedSections,
    seen: &mut Vec<ItemId>,
) {
    let box_sel = selector("div.pbnx-desktop-box");
    let box_title_sel = selector("span.a-size-base");
    let key_norm = normalize_title(title_key);

    for bulk_box in document.select(&box_sel) {
        let Some(title_span) = bulk_box.select(&box_title_sel).next() else {
            continue;
        };
        let box_title: String = title_span.text().collect();
        if !normalize_title(&box_title).contains(&key_norm) {
            continue;
        }

        collect_bulk_entries(bulk_box, sections, seen);
        break;
    }

    if !sections.bulk.is_empty() {
        return;
    }

    // Header-based fallback when the box markup is absent
    if let Some(container) =
        section_container(document, &["Bulk purchases", "新品まとめ買い"])
    {
        collect_bulk_entries(container, sections, seen);
    }
}

/// Collect per-entry identifiers and tome labels inside a bulk container.
fn collect_bulk_entries(
    container: ElementRef<'_>,
    sections: &mut RelatedSections,
    seen: &mut Vec<ItemId>,
) {
    let entry_sel = selector("div.pbnx-single-product");
    let li_sel = selector("li");
    let link_sel = selector("a[href]");

    let mut entries: Vec<ElementRef<'_>> = container.select(&entry_sel).collect();
    if entries.is_empty() {
        entries = container.select(&li_sel).collect();
    }

    for entry in &entries {
        let Some(link) = entry.select(&link_sel).next() else {
            continue;
        };
        let Some(id) = id_from_link(link) else { continue };
        if seen.contains(&id) {
            continue;
        }
        seen.push(id.clone());

        let label: String = entry.text().collect();
        if let Some(tome) = tome_from_label(&label) {
            sections.bulk_tomes.insert(id.clone(), tome);
        }
        sections.bulk.push(id);
    }

    // Last resort: bare links in the container
    if sections.bulk.is_empty() {
        for link in container.select(&link_sel) {
            if let Some(id) = id_from_link(link) {
                if !seen.contains(&id) {
                    seen.push(id.clone());
                    sections.bulk.push(id);
                }
            }
        }
    }
}

/// Identifiers linked from the section introduced by any of the given
/// header markers.
fn section_links(document: &Html, markers: &[&str], seen: &mut Vec<ItemId>) -> Vec<ItemId> {
    let link_sel = selector("a[href]");
    let mut ids = Vec::new();

    if let Some(container) = section_container(document, markers) {
        for link in container.select(&link_sel) {
            if let Some(id) = id_from_link(link) {
                if !seen.contains(&id) {
                    seen.push(id.clone());
                    ids.push(id);
                }
            }
        }
    }

    ids
}

/// Find the container div of the section whose header carries one of the
/// given markers. The tightest matching element is treated as the header
/// (every ancestor of a header also contains its text), then the nearest
/// ancestor div is the container.
fn section_container<'a>(document: &'a Html, markers: &[&str]) -> Option<ElementRef<'a>> {
    let candidate_sel = selector("h2, h3, div, span");

    let header = document
        .select(&candidate_sel)
        .filter(|el| {
            let text: String = el.text().collect();
            markers.iter().any(|m| text.contains(m))
        })
        .min_by_key(|el| el.text().collect::<String>().len())?;

    for ancestor in header.ancestors() {
        if let Some(el) = ElementRef::wrap(ancestor) {
            if el.value().name() == "div" {
                return Some(el);
            }
        }
    }

    None
}

/// Extract an identifier from a link: the href first, then the id-bearing
/// data attributes of the element and of its parent.
fn id_from_link(link: ElementRef<'_>) -> Option<ItemId> {
    if let Some(href) = link.value().attr("href") {
        if let Some(id) = extract_item_id(href) {
            return Some(id);
        }
    }

    if let Some(id) = id_from_attributes(link) {
        return Some(id);
    }

    link.parent()
        .and_then(ElementRef::wrap)
        .and_then(id_from_attributes)
}

fn id_from_attributes(element: ElementRef<'_>) -> Option<ItemId> {
    for attribute in ID_ATTRIBUTES {
        let Some(value) = element.value().attr(attribute) else {
            continue;
        };
        if let Some(id) = extract_item_id(value) {
            return Some(id);
        }
        if RAW_ITEM_ID.is_match(value) {
            if let Ok(id) = ItemId::new(value) {
                return Some(id);
            }
        }
    }
    None
}

fn tome_from_label(label: &str) -> Option<u32> {
    let captures = TOME_LABEL.captures(label)?;
    captures
        .get(1)
        .or_else(|| captures.get(2))
        .and_then(|m| m.as_str().parse().ok())
}

/// Find the physical edition linked from a digital listing's format
/// switcher.
///
/// Scans the switcher entries for a paper format matching the edition
/// kind, excluding digital entries, and pulls the identifier from the
/// entry link or its data attributes.
#[must_use]
pub fn find_physical_edition(html: &str, kind: EditionKind) -> Option<ItemId> {
    let paper_keywords: &[&str] = match kind {
        EditionKind::Novel => &["文庫", "Bunko"],
        EditionKind::Comic => &["コミック", "Comic"],
        EditionKind::Any => &[
            "コミック",
            "Comic",
            "文庫",
            "Bunko",
            "単行本",
            "Tankobon",
            "ペーパーバック",
            "Paperback",
        ],
    };

    let document = Html::parse_document(html);

    let switcher_link_sel = selector("div#tmmSwatches a, div#MediaMatrix a");
    for link in document.select(&switcher_link_sel) {
        let text: String = link.text().collect();
        let is_paper = paper_keywords.iter().any(|kw| text.contains(kw));
        let is_digital = KINDLE_KEYWORDS.iter().any(|kw| text.contains(kw));
        if is_paper && !is_digital {
            if let Some(id) = id_from_link(link) {
                return Some(id);
            }
        }
    }

    // Alternative markup: individual swatch list entries
    let swatch_sel = selector(r#"li[class*="swatchElement"]"#);
    let link_sel = selector("a[href]");
    for swatch in document.select(&swatch_sel) {
        let text: String = swatch.text().collect();
        let is_paper = paper_keywords.iter().any(|kw| text.contains(kw));
        let is_digital = KINDLE_KEYWORDS.iter().any(|kw| text.contains(kw));
        if !is_paper || is_digital {
            continue;
        }
        if let Some(link) = swatch.select(&link_sel).next() {
            if let Some(id) = id_from_link(link) {
                return Some(id);
            }
        }
        if let Some(id) = id_from_attributes(swatch) {
            return Some(id);
        }
    }

    None
}
