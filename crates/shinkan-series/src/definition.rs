//! Series definition types and structures.
//!
//! This module defines the data structures for series definitions loaded
//! from TOML files.

use crate::error::{Result, SeriesError};
use serde::{Deserialize, Serialize};
use shinkan_core::{EditionKind, ItemId, SeriesId};

/// A tracked series, loaded from one TOML file.
///
/// ```toml
/// id = "mud-country-comic"
/// title = "泥の国"
/// search_key = "泥の国"
/// kind = "comic"
/// translated_title = "Land of Mud"
/// reference_item = "4047372110"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesDefinition {
    /// Canonical series identifier (store key)
    pub id: SeriesId,

    /// Source-language title
    pub title: String,

    /// Key used to query the catalog search endpoint
    pub search_key: String,

    /// Which print edition of the work this series tracks
    #[serde(default)]
    pub kind: EditionKind,

    /// Human-readable translated title, if one exists
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translated_title: Option<String>,

    /// Known-good item used to bootstrap discovery for a series with no
    /// cached volumes yet
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_item: Option<ItemId>,

    /// Operator-supplied item URLs, trusted above automated discovery
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_urls: Vec<String>,

    /// Force quoting of the search key even when it is short. Short
    /// generic keys return far too many unrelated results unquoted.
    #[serde(default)]
    pub quote_search_key: bool,
}

impl SeriesDefinition {
    /// Get the series identifier.
    #[must_use]
    pub fn id(&self) -> &SeriesId {
        &self.id
    }

    /// The display title: the translated title when known, the source
    /// title otherwise.
    #[must_use]
    pub fn display_title(&self) -> &str {
        self.translated_title.as_deref().unwrap_or(&self.title)
    }

    /// Validate the definition for completeness and correctness.
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(SeriesError::ValidationError {
                series_id: self.id.to_string(),
                reason: "title cannot be empty".to_string(),
            });
        }

        if self.search_key.trim().is_empty() {
            return Err(SeriesError::ValidationError {
                series_id: self.id.to_string(),
                reason: "search_key cannot be empty".to_string(),
            });
        }

        for url in &self.extra_urls {
            if !url.starts_with("http") {
                return Err(SeriesError::ValidationError {
                    series_id: self.id.to_string(),
                    reason: format!("extra_urls entry is not an absolute URL: {url}"),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition(id: &str) -> SeriesDefinition {
        SeriesDefinition {
            id: SeriesId::new(id).expect("valid series ID"),
            title: "泥の国".to_string(),
            search_key: "泥の国".to_string(),
            kind: EditionKind::Comic,
            translated_title: Some("Land of Mud".to_string()),
            reference_item: Some(ItemId::new("4047372110").expect("valid item ID")),
            extra_urls: vec![],
            quote_search_key: false,
        }
    }

    #[test]
    fn test_valid_definition() {
        assert!(definition("mud-country-comic").validate().is_ok());
    }

    #[test]
    fn test_empty_title_fails() {
        let mut def = definition("mud-country-comic");
        def.title = String::new();
        assert!(def.validate().is_err());
    }

    #[test]
    fn test_empty_search_key_fails() {
        let mut def = definition("mud-country-comic");
        def.search_key = "  ".to_string();
        assert!(def.validate().is_err());
    }

    #[test]
    fn test_relative_extra_url_fails() {
        let mut def = definition("mud-country-comic");
        def.extra_urls = vec!["/dp/4047372110".to_string()];
        assert!(def.validate().is_err());
    }

    #[test]
    fn test_display_title_prefers_translation() {
        let mut def = definition("mud-country-comic");
        assert_eq!(def.display_title(), "Land of Mud");
        def.translated_title = None;
        assert_eq!(def.display_title(), "泥の国");
    }

    #[test]
    fn test_toml_roundtrip() {
        let toml_str = r#"
            id = "mud-country-comic"
            title = "泥の国"
            search_key = "泥の国"
            kind = "comic"
            translated_title = "Land of Mud"
            reference_item = "4047372110"
        "#;
        let def: SeriesDefinition = toml::from_str(toml_str).expect("parse definition");
        assert_eq!(def.id.as_str(), "mud-country-comic");
        assert_eq!(def.kind, EditionKind::Comic);
        assert!(def.extra_urls.is_empty());
        assert!(!def.quote_search_key);
    }
}
