//! Catalog search URL construction.

use shinkan_core::CatalogConfig;
use shinkan_series::SeriesDefinition;
use url::Url;

/// How many characters a search key may have before it is quoted even
/// without the per-series override.
const UNQUOTED_KEY_MAX_CHARS: usize = 10;

/// Whether this series' search key should be sent quoted.
///
/// Long keys are always quoted (exact-phrase matching); short keys stay
/// unquoted unless the series opts in — some short generic keys drown in
/// unrelated results otherwise.
#[must_use]
pub fn should_quote(series: &SeriesDefinition) -> bool {
    series.search_key.chars().count() > UNQUOTED_KEY_MAX_CHARS || series.quote_search_key
}

/// Build the search URL for one result page.
#[must_use]
pub fn build_search_url(catalog: &CatalogConfig, series: &SeriesDefinition, page: u32) -> String {
    let query = if should_quote(series) {
        format!("\"{}\"", series.search_key)
    } else {
        series.search_key.clone()
    };

    let mut url = Url::parse(&format!("{}/s", catalog.base_url.trim_end_matches('/')))
        .expect("base URL is valid");

    {
        let mut pairs = url.query_pairs_mut();
        pairs.append_pair("k", &query);
        pairs.append_pair("i", &catalog.search_category);
        pairs.append_pair("s", &catalog.search_sort);
        if !catalog.seller_filter.is_empty() {
            pairs.append_pair("rh", &catalog.seller_filter);
        }
        if page > 1 {
            pairs.append_pair("page", &page.to_string());
        }
    }

    url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use shinkan_core::{EditionKind, SeriesId};

    fn series(search_key: &str, quote: bool) -> SeriesDefinition {
        SeriesDefinition {
            id: SeriesId::new("test-series").expect("valid series ID"),
            title: search_key.to_string(),
            search_key: search_key.to_string(),
            kind: EditionKind::Comic,
            translated_title: None,
            reference_item: None,
            extra_urls: vec![],
            quote_search_key: quote,
        }
    }

    #[test]
    fn test_short_key_unquoted() {
        let catalog = CatalogConfig::default();
        let url = build_search_url(&catalog, &series("泥の国", false), 1);
        assert!(url.contains("k=%E6%B3%A5%E3%81%AE%E5%9B%BD"));
        assert!(!url.contains("%22"));
        assert!(!url.contains("page="));
    }

    #[test]
    fn test_long_key_quoted() {
        let catalog = CatalogConfig::default();
        let url = build_search_url(&catalog, &series("拝啓見知らぬ旦那様、離婚していただきます", false), 1);
        // Quoted: the encoded double quote appears around the key
        assert!(url.contains("%22"));
    }

    #[test]
    fn test_forced_quoting() {
        let catalog = CatalogConfig::default();
        assert!(should_quote(&series("ギフテッド", true)));
        assert!(!should_quote(&series("ギフテッド", false)));
    }

    #[test]
    fn test_page_parameter() {
        let catalog = CatalogConfig::default();
        let url = build_search_url(&catalog, &series("泥の国", false), 3);
        assert!(url.contains("page=3"));
    }

    #[test]
    fn test_seller_filter_encoded() {
        let catalog = CatalogConfig::default();
        let url = build_search_url(&catalog, &series("泥の国", false), 1);
        assert!(url.contains("rh=p_6%3AAN1VRQENFRJN5"));
    }
}
