//! Per-series scan: phases A → B → C, strictly sequential.

use crate::error::Result;
use crate::fetcher::PageFetcher;
use crate::report::SeriesOutcome;
use shinkan_core::{AppConfig, ItemId};
use shinkan_db::{publishers, Database};
use shinkan_series::SeriesDefinition;
use tracing::{debug, info};

/// Runs the discovery/verification pipeline for one series at a time.
pub struct SeriesScanner<'a> {
    pub(crate) db: &'a Database,
    pub(crate) fetcher: &'a dyn PageFetcher,
    pub(crate) config: &'a AppConfig,
}

impl<'a> SeriesScanner<'a> {
    /// Create a scanner over the shared store, fetcher, and config.
    #[must_use]
    pub fn new(db: &'a Database, fetcher: &'a dyn PageFetcher, config: &'a AppConfig) -> Self {
        Self {
            db,
            fetcher,
            config,
        }
    }

    /// Canonical detail-page URL for an item.
    pub(crate) fn detail_url(&self, item: &ItemId) -> String {
        format!(
            "{}/dp/{}",
            self.fetcher.base_url().trim_end_matches('/'),
            item
        )
    }

    /// Scan one series: discovery, verification, extended search,
    /// publisher-of-record resolution.
    ///
    /// `reference` overrides the definition's reference item when the
    /// orchestrator resolved a better one (an operator-accepted volume).
    pub async fn scan(
        &self,
        series: &SeriesDefinition,
        reference: Option<ItemId>,
    ) -> Result<SeriesOutcome> {
        info!(
            series = %series.id,
            title = %series.title,
            kind = %series.kind,
            "scanning series"
        );

        let reference = match reference {
            Some(reference) => Some(reference),
            None => self.resolve_reference(series).await?,
        };

        let mut discovery = self.discover(series, reference).await?;
        if discovery.candidates.is_empty() {
            info!(series = %series.id, "no candidates discovered");
            return Ok(SeriesOutcome::empty(series.id.as_str()));
        }

        let mut snapshot = self.verify(series, &discovery).await?;

        self.extended_search(series, &mut discovery, &mut snapshot)
            .await?;

        if !snapshot.is_empty() {
            if let Some(publisher) = publishers::resolve(self.db.pool(), &series.id).await? {
                debug!(series = %series.id, publisher = %publisher, "publisher-of-record");
            }
        }

        let outcome = SeriesOutcome::from_snapshot(series.id.as_str(), snapshot);
        info!(
            series = %series.id,
            new = outcome.new_releases.len(),
            total = outcome.snapshot.len(),
            "series scan finished"
        );
        Ok(outcome)
    }
}
