//! The discovery candidate set.
//!
//! An insertion-ordered map from item identifier to its best-known seed
//! data. Semantics: unique keys, insertion order preserved on iteration,
//! O(1) membership, and first-insert-wins (a later seed never downgrades
//! an earlier, higher-trust one). Verification processes candidates in
//! exactly the order discovery found them.

use shinkan_core::ItemId;
use shinkan_extract::SnippetMeta;
use std::collections::HashMap;

/// What discovery knows about a candidate before verification.
#[derive(Debug, Clone, Default)]
pub struct Seed {
    /// Best-known listing URL
    pub url: String,
    /// Listing title as seen at discovery time, if any
    pub title: Option<String>,
    /// Snippet metadata captured from search results, if any
    pub snippet: Option<SnippetMeta>,
}

impl Seed {
    /// A seed carrying only a URL.
    #[must_use]
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}

/// Insertion-ordered candidate map.
#[derive(Debug, Default)]
pub struct CandidateSet {
    order: Vec<ItemId>,
    entries: HashMap<ItemId, Seed>,
}

impl CandidateSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a candidate. Returns `false` (and keeps the existing seed)
    /// if the identifier is already present.
    pub fn insert(&mut self, id: ItemId, seed: Seed) -> bool {
        if self.entries.contains_key(&id) {
            return false;
        }
        self.order.push(id.clone());
        self.entries.insert(id, seed);
        true
    }

    /// O(1) membership test.
    #[must_use]
    pub fn contains(&self, id: &ItemId) -> bool {
        self.entries.contains_key(id)
    }

    /// The seed for an identifier.
    #[must_use]
    pub fn get(&self, id: &ItemId) -> Option<&Seed> {
        self.entries.get(id)
    }

    /// First candidate in insertion order.
    #[must_use]
    pub fn first(&self) -> Option<&ItemId> {
        self.order.first()
    }

    /// Number of candidates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Iterate candidates in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&ItemId, &Seed)> {
        self.order.iter().map(move |id| {
            let seed = self.entries.get(id).expect("order and entries in sync");
            (id, seed)
        })
    }

    /// Snapshot of the identifiers in insertion order, for iteration that
    /// mutates the set.
    #[must_use]
    pub fn ids(&self) -> Vec<ItemId> {
        self.order.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str) -> ItemId {
        ItemId::new(id).expect("valid item ID")
    }

    #[test]
    fn test_insertion_order_preserved() {
        let mut set = CandidateSet::new();
        for id in ["4090000003", "4090000001", "4090000002"] {
            assert!(set.insert(item(id), Seed::from_url(format!("u/{id}"))));
        }

        let ids: Vec<String> = set.iter().map(|(id, _)| id.to_string()).collect();
        assert_eq!(ids, vec!["4090000003", "4090000001", "4090000002"]);
        assert_eq!(set.first(), Some(&item("4090000003")));
    }

    #[test]
    fn test_first_insert_wins() {
        let mut set = CandidateSet::new();
        assert!(set.insert(item("4090000001"), Seed::from_url("first")));
        assert!(!set.insert(item("4090000001"), Seed::from_url("second")));

        assert_eq!(set.len(), 1);
        assert_eq!(set.get(&item("4090000001")).expect("seed").url, "first");
    }

    #[test]
    fn test_membership() {
        let mut set = CandidateSet::new();
        set.insert(item("4090000001"), Seed::from_url("u"));
        assert!(set.contains(&item("4090000001")));
        assert!(!set.contains(&item("4090000002")));
    }
}
