//! JSON collection export.
//!
//! After each run the full verified snapshot is written as one JSON
//! document, enriched with operator statuses, for downstream viewers and
//! notification tooling. This is a data contract; no rendering happens
//! here.

use anyhow::Context;
use chrono::Utc;
use serde::Serialize;
use shinkan_db::{manual, Database};
use shinkan_scanner::{RunReport, VolumeRecord};
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Serialize)]
struct ExportedVolume<'a> {
    #[serde(flatten)]
    record: &'a VolumeRecord,
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct CollectionExport<'a> {
    generated_at: String,
    total_volumes: usize,
    total_series: usize,
    stats: StatusStats,
    new_releases: &'a [VolumeRecord],
    volumes: Vec<ExportedVolume<'a>>,
}

#[derive(Debug, Serialize)]
struct StatusStats {
    accepted: usize,
    rejected: usize,
    unprocessed: usize,
}

/// Write the collection export for a finished run.
pub async fn write_collection(db: &Database, report: &RunReport, path: &Path) -> anyhow::Result<()> {
    let accepted = manual::accepted_items(db.pool()).await?;
    let rejected = manual::rejected_items(db.pool()).await?;

    let volumes: Vec<ExportedVolume<'_>> = report
        .snapshot
        .iter()
        .map(|record| ExportedVolume {
            status: status_of(record, &accepted, &rejected),
            record,
        })
        .collect();

    let stats = StatusStats {
        accepted: volumes.iter().filter(|v| v.status == "accepted").count(),
        rejected: volumes.iter().filter(|v| v.status == "rejected").count(),
        unprocessed: volumes.iter().filter(|v| v.status == "unprocessed").count(),
    };

    let series: HashSet<&str> = report.snapshot.iter().map(|r| r.series.as_str()).collect();

    let export = CollectionExport {
        generated_at: Utc::now().to_rfc3339(),
        total_volumes: report.snapshot.len(),
        total_series: series.len(),
        stats,
        new_releases: &report.new_releases,
        volumes,
    };

    let json = serde_json::to_string_pretty(&export).context("serializing collection export")?;
    std::fs::write(path, json)
        .with_context(|| format!("writing collection export to {}", path.display()))?;

    tracing::info!(path = %path.display(), volumes = report.snapshot.len(), "collection exported");
    Ok(())
}

fn status_of(
    record: &VolumeRecord,
    accepted: &HashSet<String>,
    rejected: &HashSet<String>,
) -> &'static str {
    if rejected.contains(&record.item_id) {
        "rejected"
    } else if accepted.contains(&record.item_id) {
        "accepted"
    } else {
        "unprocessed"
    }
}
