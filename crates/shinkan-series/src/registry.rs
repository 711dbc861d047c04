//! In-memory series definition registry with lookup support.

use crate::{
    definition::SeriesDefinition,
    error::{Result, SeriesError},
    loader::SeriesLoader,
};
use shinkan_core::SeriesId;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// In-memory cache of series definitions.
///
/// The registry loads definitions from disk and caches them in memory for
/// fast lookups during a run.
#[derive(Clone, Default)]
pub struct SeriesRegistry {
    /// Cached definitions, indexed by series ID
    definitions: Arc<RwLock<HashMap<SeriesId, SeriesDefinition>>>,
}

impl SeriesRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry and load all definitions from the given loader.
    ///
    /// # Errors
    /// Returns error if loading fails.
    pub fn load_from(loader: &SeriesLoader) -> Result<Self> {
        let registry = Self::new();
        registry.reload(loader)?;
        Ok(registry)
    }

    /// Reload all definitions, replacing the current cache.
    ///
    /// # Errors
    /// Returns error if loading fails.
    pub fn reload(&self, loader: &SeriesLoader) -> Result<()> {
        let definitions = loader.load_all()?;

        let mut cache = self
            .definitions
            .write()
            .expect("acquire write lock on definitions");

        cache.clear();
        for definition in definitions {
            cache.insert(definition.id().clone(), definition);
        }

        debug!(count = cache.len(), "series registry reloaded");
        Ok(())
    }

    /// Insert or replace a single definition.
    pub fn insert(&self, definition: SeriesDefinition) {
        let mut cache = self
            .definitions
            .write()
            .expect("acquire write lock on definitions");
        cache.insert(definition.id().clone(), definition);
    }

    /// Look up a definition by series ID.
    ///
    /// # Errors
    /// Returns `SeriesError::NotFound` if the series is not registered.
    pub fn get(&self, series_id: &SeriesId) -> Result<SeriesDefinition> {
        let cache = self
            .definitions
            .read()
            .expect("acquire read lock on definitions");

        cache
            .get(series_id)
            .cloned()
            .ok_or_else(|| SeriesError::NotFound {
                series_id: series_id.to_string(),
            })
    }

    /// Get all registered definitions, sorted by series ID for a stable
    /// iteration order.
    #[must_use]
    pub fn all(&self) -> Vec<SeriesDefinition> {
        let cache = self
            .definitions
            .read()
            .expect("acquire read lock on definitions");

        let mut definitions: Vec<_> = cache.values().cloned().collect();
        definitions.sort_by(|a, b| a.id().as_str().cmp(b.id().as_str()));
        definitions
    }

    /// Number of registered series.
    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions
            .read()
            .expect("acquire read lock on definitions")
            .len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shinkan_core::EditionKind;

    fn definition(id: &str) -> SeriesDefinition {
        SeriesDefinition {
            id: SeriesId::new(id).expect("valid series ID"),
            title: format!("title-{id}"),
            search_key: format!("key-{id}"),
            kind: EditionKind::Comic,
            translated_title: None,
            reference_item: None,
            extra_urls: vec![],
            quote_search_key: false,
        }
    }

    #[test]
    fn test_insert_and_get() {
        let registry = SeriesRegistry::new();
        registry.insert(definition("series-a"));

        let id = SeriesId::new("series-a").expect("valid series ID");
        let def = registry.get(&id).expect("get definition");
        assert_eq!(def.title, "title-series-a");
    }

    #[test]
    fn test_get_missing() {
        let registry = SeriesRegistry::new();
        let id = SeriesId::new("nope").expect("valid series ID");
        assert!(matches!(
            registry.get(&id).unwrap_err(),
            SeriesError::NotFound { .. }
        ));
    }

    #[test]
    fn test_all_sorted() {
        let registry = SeriesRegistry::new();
        registry.insert(definition("series-b"));
        registry.insert(definition("series-a"));

        let all = registry.all();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id().as_str(), "series-a");
        assert_eq!(all[1].id().as_str(), "series-b");
    }
}
