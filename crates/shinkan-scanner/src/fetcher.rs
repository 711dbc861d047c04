//! The page-fetching seam.
//!
//! The pipeline talks to the catalog through this trait rather than the
//! concrete HTTP client, so integration tests can drive a full scan
//! against canned HTML and count the fetches that were (not) issued.

use async_trait::async_trait;
use shinkan_fetch::{FetchClient, RequestKind, Result};

/// Fetches catalog pages. Implemented by the real HTTP client and by test
/// stubs.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch a page as HTML.
    async fn fetch(&self, url: &str, kind: RequestKind) -> Result<String>;

    /// The catalog base URL.
    fn base_url(&self) -> &str;

    /// Establish session state before the first real request. Default:
    /// nothing to do.
    async fn warm_up(&self) {}
}

#[async_trait]
impl PageFetcher for FetchClient {
    async fn fetch(&self, url: &str, kind: RequestKind) -> Result<String> {
        self.get_html(url, kind).await
    }

    fn base_url(&self) -> &str {
        FetchClient::base_url(self)
    }

    async fn warm_up(&self) {
        FetchClient::warm_up(self).await;
    }
}
