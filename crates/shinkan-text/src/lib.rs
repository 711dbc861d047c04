//! Shinkan Text - Pure text and identifier heuristics.
//!
//! Everything in this crate is a pure function with no I/O: title
//! normalization, tome-number extraction, publisher canonicalization,
//! bundle detection, and identifier/URL helpers. These are the functions
//! that turn unstructured catalog text into structured records, and they
//! are safe to property-test in isolation.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod classify;
pub mod normalize;
pub mod publisher;
pub mod tome;

pub use classify::{
    canonical_item_url, extract_item_id, find_date_token, is_bundle_listing,
    is_derivative_listing, is_digital_listing, is_paper_format, is_sponsored_url,
    kind_matches_format, parse_release_date, BundleInfo,
};
pub use normalize::{normalize_title, title_key};
pub use publisher::{
    canonical_publisher, publisher_from_title, publishers_match, romanize_publisher,
};
pub use tome::{extract_tome, Tome};
