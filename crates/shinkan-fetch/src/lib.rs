//! Shinkan Fetch - Catalog HTTP client.
//!
//! One shared, sequentially-reused client for the whole batch: cookies
//! persist across requests, the session is warmed up once before the first
//! real request, and every fetch goes through per-kind randomized pacing
//! plus bounded retry with exponential backoff. There is deliberately no
//! concurrent fetching anywhere — the upstream source rate-limits
//! aggressively, and parallelism would reduce throughput, not improve it.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod client;
pub mod error;
pub mod pacing;

pub use client::{FetchClient, RequestKind};
pub use error::{FetchError, Result};
