//! Shinkan Extract - HTML page extraction.
//!
//! Parses fetched catalog HTML into the structured candidate lists the
//! pipeline consumes: search-result items with an end-of-pagination
//! signal, product detail fields, and the bundle/cross-sell identifier
//! sections. The pipeline never touches raw HTML; everything it needs is
//! in the types this crate returns.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod detail;
pub mod related;
pub mod search;

pub use detail::{parse_detail, DetailPage, PageInvalid};
pub use related::{find_physical_edition, parse_related, RelatedSections};
pub use search::{parse_search_page, SearchItem, SearchPage, SnippetMeta};
