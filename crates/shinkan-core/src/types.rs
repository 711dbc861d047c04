//! Shared types used across the Shinkan application.
//!
//! This module defines common newtypes and enums that provide type safety
//! and clear domain modeling.

use crate::error::ShinkanError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Newtype for catalog item identifiers with validation.
///
/// Item identifiers are exactly 10 uppercase alphanumeric characters. The
/// source encodes the physical/digital axis in the first character: print
/// editions carry ISBN-derived identifiers that start with a digit, while
/// digital editions and bundles start with a letter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemId(String);

impl ItemId {
    /// Create a new `ItemId` from a string.
    ///
    /// # Errors
    /// Returns error if the ID is not 10 uppercase alphanumeric characters.
    pub fn new(id: impl Into<String>) -> Result<Self, ShinkanError> {
        let id = id.into();
        Self::validate(&id)?;
        Ok(Self(id))
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this identifier denotes a physical (print) edition.
    ///
    /// Digit-leading identifiers are print editions; letter-leading ones are
    /// digital editions or bundle listings. This is a hard rule of the
    /// source's identifier scheme, not a heuristic.
    #[must_use]
    pub fn is_physical(&self) -> bool {
        self.0
            .as_bytes()
            .first()
            .is_some_and(u8::is_ascii_digit)
    }

    /// Validate identifier format: exactly 10 chars, `[A-Z0-9]`.
    fn validate(id: &str) -> Result<(), ShinkanError> {
        static ITEM_REGEX: OnceLock<Regex> = OnceLock::new();
        let regex =
            ITEM_REGEX.get_or_init(|| Regex::new(r"^[A-Z0-9]{10}$").expect("valid regex"));

        if regex.is_match(id) {
            Ok(())
        } else {
            Err(ShinkanError::Validation(format!(
                "invalid item ID: must be 10 uppercase alphanumeric characters, got '{id}'"
            )))
        }
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Newtype for series identifiers.
///
/// A series identifier is the canonical key under which all store rows for a
/// tracked publication live. Two editions of the same work (comic vs. novel)
/// are distinct series with distinct identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeriesId(String);

impl SeriesId {
    /// Create a new `SeriesId` from a string.
    ///
    /// # Errors
    /// Returns error if the ID is empty or longer than 200 characters.
    pub fn new(id: impl Into<String>) -> Result<Self, ShinkanError> {
        let id = id.into();

        if id.trim().is_empty() {
            return Err(ShinkanError::Validation(
                "series ID cannot be empty".to_string(),
            ));
        }
        if id.chars().count() > 200 {
            return Err(ShinkanError::Validation(format!(
                "series ID too long: {} characters (max 200)",
                id.chars().count()
            )));
        }

        Ok(Self(id))
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SeriesId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The edition axis distinguishing print formats of the same work.
///
/// A tracked series targets one of these; discovery filters out detail pages
/// whose declared format contradicts the configured kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EditionKind {
    /// Comic-book editions
    #[default]
    Comic,
    /// Prose novel editions (pocket/paperback formats)
    Novel,
    /// Either edition is acceptable
    Any,
}

impl EditionKind {
    /// Get a human-readable display name.
    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Comic => "Comic",
            Self::Novel => "Novel",
            Self::Any => "Any",
        }
    }
}

impl fmt::Display for EditionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}
