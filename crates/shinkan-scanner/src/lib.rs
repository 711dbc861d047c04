//! Shinkan Scanner - The discovery/verification pipeline.
//!
//! For one tracked series, a scan runs three strictly sequential phases:
//! discovery (collect candidate identifiers from the store, a reference
//! item, operator URLs, bundle sections, and paginated catalog search),
//! verification (validate every candidate against its detail page, with a
//! cache-first path, an invalid-page fallback chain, and a circuit
//! breaker), and an extended search that hunts tome gaps. The orchestrator
//! iterates all tracked series with priority ordering, pacing pauses,
//! per-series error isolation, and a retry pass for series that yielded
//! nothing.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod candidates;
pub mod discovery;
pub mod error;
pub mod extended;
pub mod fetcher;
pub mod orchestrator;
pub mod report;
pub mod scan;
pub mod url_builder;
pub mod verify;

pub use candidates::{CandidateSet, Seed};
pub use error::{Result, ScanError};
pub use fetcher::PageFetcher;
pub use orchestrator::Orchestrator;
pub use report::{RunReport, SeriesOutcome, VolumeRecord};
pub use scan::SeriesScanner;
