//! The data contract emitted toward notification/export collaborators.

use serde::Serialize;

/// One verified volume in a run's output.
///
/// Doubles as the snapshot row and, when `newly_detected` is set, the
/// new-release notification record.
#[derive(Debug, Clone, Serialize)]
pub struct VolumeRecord {
    /// Series identifier
    pub series: String,
    /// Display title (translated when known)
    pub display_title: String,
    /// Tome number, when known
    pub tome: Option<u32>,
    /// Release date as published by the source
    pub release_date: Option<String>,
    /// Publisher
    pub publisher: Option<String>,
    /// Canonical detail URL
    pub url: String,
    /// Item identifier
    pub item_id: String,
    /// Cover image URL, when captured
    pub cover_url: Option<String>,
    /// Bundle label (`volumes 1-8`, `complete set of 5`) when the listing
    /// is a boxed set
    pub bundle: Option<String>,
    /// Whether this run flagged the volume as newly detected
    pub newly_detected: bool,
    /// Whether an alert already existed before this run
    pub previously_alerted: bool,
    /// Whether the release date changed since the alert was raised
    /// (pre-order correction)
    pub date_changed: bool,
    /// The previously alerted date, when `date_changed` is set
    pub previous_date: Option<String>,
}

/// Result of scanning one series.
#[derive(Debug, Clone, Serialize)]
pub struct SeriesOutcome {
    /// Series identifier
    pub series: String,
    /// Newly detected volumes (subset of `snapshot`)
    pub new_releases: Vec<VolumeRecord>,
    /// Every volume verified this run
    pub snapshot: Vec<VolumeRecord>,
}

impl SeriesOutcome {
    /// An outcome with no results at all.
    #[must_use]
    pub fn empty(series: impl Into<String>) -> Self {
        Self {
            series: series.into(),
            new_releases: Vec::new(),
            snapshot: Vec::new(),
        }
    }

    /// Build an outcome from a snapshot, deriving the new-release list
    /// from the per-record flags.
    #[must_use]
    pub fn from_snapshot(series: impl Into<String>, snapshot: Vec<VolumeRecord>) -> Self {
        let new_releases = snapshot
            .iter()
            .filter(|record| record.newly_detected)
            .cloned()
            .collect();
        Self {
            series: series.into(),
            new_releases,
            snapshot,
        }
    }
}

/// Aggregate result of a full batch run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// When the run started (RFC 3339)
    pub started_at: String,
    /// When the run finished (RFC 3339)
    pub finished_at: String,
    /// Wall-clock duration in seconds
    pub duration_secs: f64,
    /// How many series were scanned
    pub series_scanned: usize,
    /// Newly detected volumes across all series
    pub new_releases: Vec<VolumeRecord>,
    /// Full snapshot of every verified volume across all series
    pub snapshot: Vec<VolumeRecord>,
    /// Series that failed or yielded nothing even after the retry pass
    pub failed_series: Vec<String>,
    /// Tome numbers corrected by the post-batch pass
    pub tomes_corrected: usize,
}
