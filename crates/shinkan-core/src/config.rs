//! Configuration management for Shinkan.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides.

use crate::error::{ConfigError, ConfigResult};
use chrono::NaiveDate;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Main application configuration.
///
/// This is loaded from `~/.config/shinkan/config.toml` (or platform
/// equivalent). If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Catalog endpoint settings
    pub catalog: CatalogConfig,
    /// Scan behavior settings
    pub scan: ScanConfig,
    /// Request pacing settings
    pub pacing: PacingConfig,
    /// Export settings
    pub export: ExportConfig,
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path, falling back to defaults
    /// if the file does not exist.
    pub fn load_from(config_path: &std::path::Path) -> ConfigResult<Self> {
        if config_path.exists() {
            tracing::debug!("Loading config from {}", config_path.display());
            let contents = fs::read_to_string(config_path)?;
            let config = toml::from_str(&contents)?;
            Ok(config)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `SHINKAN_NEW_SINCE`: Override the new-release threshold (YYYY-MM-DD)
    /// - `SHINKAN_DATABASE_PATH`: Override the database file path
    /// - `SHINKAN_BASE_URL`: Override the catalog base URL
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;
        config.apply_env();
        Ok(config)
    }

    /// Apply environment variable overrides to an already-loaded config.
    pub fn apply_env(&mut self) {
        if let Ok(val) = std::env::var("SHINKAN_NEW_SINCE") {
            if let Ok(date) = val.parse() {
                self.scan.new_since = date;
                tracing::debug!("Override scan.new_since from env: {}", val);
            }
        }

        if let Ok(val) = std::env::var("SHINKAN_DATABASE_PATH") {
            self.scan.database_path = PathBuf::from(&val);
            tracing::debug!("Override scan.database_path from env: {}", val);
        }

        if let Ok(val) = std::env::var("SHINKAN_BASE_URL") {
            self.catalog.base_url = val.clone();
            tracing::debug!("Override catalog.base_url from env: {}", val);
        }
    }

    /// Save configuration to disk.
    ///
    /// Creates the config directory if it doesn't exist.
    pub fn save(&self) -> ConfigResult<()> {
        let config_path = Self::config_path()?;
        let config_dir = config_path
            .parent()
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "config_path".to_string(),
                reason: "no parent directory".to_string(),
            })?;

        fs::create_dir_all(config_dir)?;
        tracing::debug!("Saving config to {}", config_path.display());

        let contents = toml::to_string_pretty(self)?;
        fs::write(config_path, contents)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/shinkan/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs =
            ProjectDirs::from("io", "shinkan", "shinkan").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }
}

/// Catalog endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Base URL of the catalog site
    pub base_url: String,
    /// Search category restriction (query parameter `i`)
    pub search_category: String,
    /// Result sort order (query parameter `s`)
    pub search_sort: String,
    /// Seller restriction filter (query parameter `rh`), empty to disable
    pub seller_filter: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.amazon.co.jp".to_string(),
            search_category: "stripbooks".to_string(),
            search_sort: "relevancerank".to_string(),
            seller_filter: "p_6:AN1VRQENFRJN5".to_string(),
        }
    }
}

/// Scan behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Releases dated strictly after this threshold count as new
    pub new_since: NaiveDate,
    /// Path to the SQLite store
    pub database_path: PathBuf,
    /// Directory holding per-series TOML definitions
    pub series_dir: PathBuf,
    /// Maximum new search pages explored per series per run (page 1 excluded)
    pub pages_per_run: u32,
    /// Pages beyond page 1 with fewer items than this end exploration
    pub sparse_page_threshold: usize,
    /// Extra search pages for the missing-tome extended search
    pub extended_search_pages: u32,
    /// Consecutive invalid detail pages before the circuit breaker trips
    pub invalid_page_limit: u32,
    /// Cooldown after the circuit breaker trips
    pub circuit_breaker_cooldown_secs: u64,
    /// Wall-clock limit for a whole batch run, in minutes
    pub batch_timeout_minutes: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            new_since: NaiveDate::from_ymd_opt(2025, 6, 1).expect("valid default date"),
            database_path: PathBuf::from("shinkan.db"),
            series_dir: PathBuf::from("series-definitions"),
            pages_per_run: 3,
            sparse_page_threshold: 8,
            extended_search_pages: 3,
            invalid_page_limit: 3,
            circuit_breaker_cooldown_secs: 30,
            batch_timeout_minutes: 90,
        }
    }
}

/// Request pacing settings.
///
/// All delays are randomized within `[min, max]`; the split between search
/// and detail requests is deliberate: search pages draw more scrutiny from
/// the source's rate limiter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    /// Delay range before a search-page request, in milliseconds
    pub search_delay_ms: (u64, u64),
    /// Delay range before a detail-page request, in milliseconds
    pub detail_delay_ms: (u64, u64),
    /// Delay range before any other request, in milliseconds
    pub other_delay_ms: (u64, u64),
    /// Delay range between series, in milliseconds
    pub series_delay_ms: (u64, u64),
    /// Long pause inserted once at the run midpoint, in seconds
    pub midpoint_pause_secs: u64,
    /// Short pause inserted every `periodic_pause_every` series, in seconds
    pub periodic_pause_secs: u64,
    /// How many series between periodic pauses
    pub periodic_pause_every: usize,
    /// Pause after a series yields zero results, in seconds
    pub blocked_pause_secs: u64,
    /// Pause before the failed-series retry pass, in seconds
    pub retry_pass_pause_secs: u64,
    /// Delay range between retried series, in milliseconds
    pub retry_delay_ms: (u64, u64),
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            search_delay_ms: (2000, 4500),
            detail_delay_ms: (800, 2000),
            other_delay_ms: (300, 900),
            series_delay_ms: (1500, 3000),
            midpoint_pause_secs: 60,
            periodic_pause_secs: 8,
            periodic_pause_every: 15,
            blocked_pause_secs: 15,
            retry_pass_pause_secs: 30,
            retry_delay_ms: (3000, 6000),
        }
    }
}

/// Export settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Path of the JSON collection export written after each run
    pub collection_path: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            collection_path: PathBuf::from("collection.json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.catalog.search_category, "stripbooks");
        assert_eq!(config.scan.pages_per_run, 3);
        assert_eq!(config.scan.invalid_page_limit, 3);
        assert_eq!(config.pacing.periodic_pause_every, 15);
    }

    #[test]
    fn test_config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize config");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("parse config");
        assert_eq!(parsed.scan.new_since, config.scan.new_since);
        assert_eq!(parsed.catalog.base_url, config.catalog.base_url);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let toml_str = r#"
            [scan]
            new_since = "2026-01-01"
        "#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse partial config");
        assert_eq!(
            config.scan.new_since,
            NaiveDate::from_ymd_opt(2026, 1, 1).expect("valid date")
        );
        // Untouched sections fall back to defaults
        assert_eq!(config.pacing.periodic_pause_every, 15);
        assert_eq!(config.catalog.search_sort, "relevancerank");
    }

    #[test]
    fn test_load_from_missing_file() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let config =
            AppConfig::load_from(&dir.path().join("nope.toml")).expect("load defaults");
        assert_eq!(config.scan.pages_per_run, 3);
    }
}
