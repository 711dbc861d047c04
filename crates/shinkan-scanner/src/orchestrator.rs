//! Batch run orchestrator.
//!
//! Iterates all tracked series strictly one at a time. Series with cached
//! volumes go first (cheap, and they warm the session before the source's
//! rate limiter sees anything unusual), then series with only a reference
//! item, then the rest. Per-series failures are isolated; series that
//! yielded nothing are retried once at the end, when the session is well
//! established.

use crate::error::Result;
use crate::fetcher::PageFetcher;
use crate::report::{RunReport, VolumeRecord};
use crate::scan::SeriesScanner;
use chrono::Utc;
use shinkan_core::{AppConfig, ItemId};
use shinkan_db::{manual, volumes, Database};
use shinkan_extract::parse_detail;
use shinkan_fetch::{pacing, RequestKind};
use shinkan_series::{SeriesDefinition, SeriesRegistry};
use std::time::Duration;
use tracing::{error, info, warn};

/// One series queued for scanning, with its resolved priority inputs.
struct QueuedSeries {
    definition: SeriesDefinition,
    reference: Option<ItemId>,
    cached_volumes: i64,
    priority: u8,
}

/// Drives a full batch run over every registered series.
pub struct Orchestrator<'a> {
    db: &'a Database,
    fetcher: &'a dyn PageFetcher,
    config: &'a AppConfig,
}

impl<'a> Orchestrator<'a> {
    /// Create an orchestrator over the shared store, fetcher, and config.
    #[must_use]
    pub fn new(db: &'a Database, fetcher: &'a dyn PageFetcher, config: &'a AppConfig) -> Self {
        Self {
            db,
            fetcher,
            config,
        }
    }

    /// Run the full batch and produce the run report.
    ///
    /// A failure scanning one series never aborts the batch; the series is
    /// recorded as failed and retried once after the main pass.
    pub async fn run(&self, registry: &SeriesRegistry) -> Result<RunReport> {
        let started = Utc::now();
        let scanner = SeriesScanner::new(self.db, self.fetcher, self.config);

        let queue = self.prioritize(&scanner, registry.all()).await?;
        let total = queue.len();
        info!(
            total,
            with_cache = queue.iter().filter(|q| q.priority == 1).count(),
            with_reference = queue.iter().filter(|q| q.priority == 2).count(),
            cold = queue.iter().filter(|q| q.priority == 3).count(),
            threshold = %self.config.scan.new_since,
            "starting batch run"
        );

        self.fetcher.warm_up().await;

        let mut new_releases: Vec<VolumeRecord> = Vec::new();
        let mut snapshot: Vec<VolumeRecord> = Vec::new();
        let mut failed: Vec<QueuedSeries> = Vec::new();

        for (index, queued) in queue.into_iter().enumerate() {
            let position = index + 1;
            let mut yielded = 0_usize;

            match scanner
                .scan(&queued.definition, queued.reference.clone())
                .await
            {
                Ok(outcome) => {
                    yielded = outcome.snapshot.len();
                    new_releases.extend(outcome.new_releases);
                    snapshot.extend(outcome.snapshot);
                    if yielded == 0 {
                        failed.push(queued);
                    }
                }
                Err(e) => {
                    error!(series = %queued.definition.id, error = %e, "series scan failed");
                    failed.push(queued);
                }
            }

            if position < total {
                self.inter_series_pause(position, total, yielded == 0).await;
            }
        }

        // Retry pass: by now the session has warmed up and cookies are
        // established, so series that came back empty get one more shot.
        if !failed.is_empty() {
            info!(count = failed.len(), "retrying series that yielded nothing");
            tokio::time::sleep(Duration::from_secs(
                self.config.pacing.retry_pass_pause_secs,
            ))
            .await;

            let mut still_failed = Vec::new();
            let retry_total = failed.len();
            for (index, queued) in failed.into_iter().enumerate() {
                info!(series = %queued.definition.id, "retry");
                match scanner
                    .scan(&queued.definition, queued.reference.clone())
                    .await
                {
                    Ok(outcome) if !outcome.snapshot.is_empty() => {
                        info!(
                            series = %queued.definition.id,
                            recovered = outcome.snapshot.len(),
                            "retry recovered the series"
                        );
                        new_releases.extend(outcome.new_releases);
                        snapshot.extend(outcome.snapshot);
                    }
                    Ok(_) => {
                        warn!(series = %queued.definition.id, "still no results after retry");
                        still_failed.push(queued.definition.id.to_string());
                    }
                    Err(e) => {
                        error!(series = %queued.definition.id, error = %e, "retry failed");
                        still_failed.push(queued.definition.id.to_string());
                    }
                }

                if index + 1 < retry_total {
                    let (lo, hi) = self.config.pacing.retry_delay_ms;
                    tokio::time::sleep(pacing::jittered_ms(lo, hi)).await;
                }
            }

            return self
                .finish(started, total, new_releases, snapshot, still_failed)
                .await;
        }

        self.finish(started, total, new_releases, snapshot, Vec::new())
            .await
    }

    /// Compute the priority queue: cached series first (largest cache
    /// first), then reference-only series, then cold series.
    async fn prioritize(
        &self,
        scanner: &SeriesScanner<'_>,
        definitions: Vec<SeriesDefinition>,
    ) -> Result<Vec<QueuedSeries>> {
        let mut queue = Vec::with_capacity(definitions.len());

        for definition in definitions {
            let cached_volumes =
                volumes::count_for_series(self.db.pool(), &definition.id).await?;
            let reference = scanner.resolve_reference(&definition).await?;
            let priority = if cached_volumes > 0 {
                1
            } else if reference.is_some() {
                2
            } else {
                3
            };

            queue.push(QueuedSeries {
                definition,
                reference,
                cached_volumes,
                priority,
            });
        }

        queue.sort_by_key(|q| (q.priority, -q.cached_volumes));
        Ok(queue)
    }

    /// Pacing between series: a long one-time pause at the midpoint, a
    /// short pause every N series, a recovery pause after a blocked
    /// series, a jittered delay otherwise.
    async fn inter_series_pause(&self, position: usize, total: usize, blocked: bool) {
        let pacing_config = &self.config.pacing;

        if total >= 10 && position == total / 2 {
            info!(
                pause_secs = pacing_config.midpoint_pause_secs,
                "midpoint pause"
            );
            tokio::time::sleep(Duration::from_secs(pacing_config.midpoint_pause_secs)).await;
            return;
        }

        if pacing_config.periodic_pause_every > 0 && position % pacing_config.periodic_pause_every == 0
        {
            info!(
                after = position,
                pause_secs = pacing_config.periodic_pause_secs,
                "periodic pause"
            );
            tokio::time::sleep(Duration::from_secs(pacing_config.periodic_pause_secs)).await;
        } else if blocked {
            info!(
                pause_secs = pacing_config.blocked_pause_secs,
                "recovery pause after empty series"
            );
            tokio::time::sleep(Duration::from_secs(pacing_config.blocked_pause_secs)).await;
        } else {
            let (lo, hi) = pacing_config.series_delay_ms;
            tokio::time::sleep(pacing::jittered_ms(lo, hi)).await;
        }
    }

    /// Post-batch tome correction, then the final report.
    async fn finish(
        &self,
        started: chrono::DateTime<Utc>,
        series_scanned: usize,
        new_releases: Vec<VolumeRecord>,
        snapshot: Vec<VolumeRecord>,
        failed_series: Vec<String>,
    ) -> Result<RunReport> {
        let tomes_corrected = match self.correct_missing_tomes().await {
            Ok(count) => count,
            Err(e) => {
                warn!(error = %e, "tome correction pass failed");
                0
            }
        };

        let finished = Utc::now();
        let report = RunReport {
            started_at: started.to_rfc3339(),
            finished_at: finished.to_rfc3339(),
            duration_secs: (finished - started).num_milliseconds() as f64 / 1000.0,
            series_scanned,
            new_releases,
            snapshot,
            failed_series,
            tomes_corrected,
        };

        info!(
            series = report.series_scanned,
            volumes = report.snapshot.len(),
            new = report.new_releases.len(),
            failed = report.failed_series.len(),
            corrected = report.tomes_corrected,
            duration_secs = report.duration_secs,
            "batch run finished"
        );

        Ok(report)
    }

    /// Re-fetch operator-accepted volumes whose tome is still unknown and
    /// fill it in from the detail page or its title.
    async fn correct_missing_tomes(&self) -> Result<usize> {
        let pool = self.db.pool();
        let pending = manual::accepted_without_tome(pool).await?;
        if pending.is_empty() {
            return Ok(0);
        }

        info!(count = pending.len(), "correcting missing tome numbers");
        let mut corrected = 0_usize;

        for volume in pending {
            let Ok(item) = ItemId::new(&volume.item_id) else {
                continue;
            };
            let url = if volume.url.is_empty() {
                format!(
                    "{}/dp/{}",
                    self.fetcher.base_url().trim_end_matches('/'),
                    item
                )
            } else {
                volume.url.clone()
            };

            let html = match self.fetcher.fetch(&url, RequestKind::Detail).await {
                Ok(html) => html,
                Err(e) => {
                    warn!(item = %item, error = %e, "tome correction fetch failed");
                    continue;
                }
            };
            let Ok(detail) = parse_detail(&html) else {
                continue;
            };

            let tome = detail
                .tome
                .and_then(shinkan_text::Tome::number)
                .or_else(|| {
                    // The stored title sometimes carries what the page no
                    // longer shows
                    shinkan_text::extract_tome(&volume.title)
                        .and_then(shinkan_text::Tome::number)
                });

            if let Some(tome) = tome.filter(|&n| n > 0) {
                volumes::update_tome(pool, &item, i64::from(tome)).await?;
                info!(item = %item, tome, "tome corrected");
                corrected += 1;
            }
        }

        if corrected > 0 {
            info!(corrected, "tome correction pass finished");
        }
        Ok(corrected)
    }
}
