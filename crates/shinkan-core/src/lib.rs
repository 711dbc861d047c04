//! Shinkan Core - Foundation crate for the Shinkan release tracker.
//!
//! This crate provides shared types, error handling, and configuration
//! management that all other Shinkan crates depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths
//! - [`types`] - Shared newtypes and enums (`ItemId`, `SeriesId`, `EditionKind`)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{AppConfig, CatalogConfig, ExportConfig, PacingConfig, ScanConfig};
pub use error::{ConfigError, ConfigResult, Result, ShinkanError};
pub use types::{EditionKind, ItemId, SeriesId};
