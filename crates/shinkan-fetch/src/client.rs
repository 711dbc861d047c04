//! The shared catalog HTTP client.

use crate::error::{FetchError, Result};
use crate::pacing;
pub use crate::pacing::RequestKind;
use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, REFERER, USER_AGENT};
use shinkan_core::PacingConfig;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Per-attempt request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Bodies shorter than this are checked for anti-bot challenge markers.
const CHALLENGE_SCAN_MAX_LEN: usize = 5000;

/// Bodies shorter than this are never a real page.
const MIN_BODY_LEN: usize = 500;

/// Substrings marking an anti-bot challenge in a 200 response.
const CHALLENGE_MARKERS: &[&str] = &["captcha", "robot", "automated access"];

/// Shared catalog HTTP client with cookies, pacing, and bounded retry.
///
/// One instance is reused sequentially across the whole batch; the cookie
/// jar is the session state that warm-up establishes.
pub struct FetchClient {
    http: reqwest::Client,
    cookies: Arc<Jar>,
    base_url: String,
    pacing: PacingConfig,
    warmed_up: AtomicBool,
}

impl FetchClient {
    /// Build the client for the given catalog base URL.
    pub fn new(base_url: impl Into<String>, pacing: PacingConfig) -> Result<Self> {
        let base_url = base_url.into();
        let cookies = Arc::new(Jar::default());

        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
            ),
        );
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static("ja-JP,ja;q=0.9,en;q=0.5"),
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .cookie_provider(Arc::clone(&cookies))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| FetchError::Transport {
                url: base_url.clone(),
                source: e,
            })?;

        Ok(Self {
            http,
            cookies,
            base_url,
            pacing,
            warmed_up: AtomicBool::new(false),
        })
    }

    /// The catalog base URL this client targets.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Visit the catalog root once to establish session cookies.
    ///
    /// A cold session gets challenged far more often; the one-time visit
    /// plus the language preference cookie make the rest of the batch look
    /// like a returning browser. Failure is logged and the scan proceeds
    /// anyway.
    pub async fn warm_up(&self) {
        if self.warmed_up.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Ok(url) = reqwest::Url::parse(&self.base_url) {
            // Language/currency preference, forces native-language pages
            self.cookies.add_cookie_str("i18n-prefs=JPY", &url);
        }

        match self.http.get(&self.base_url).send().await {
            Ok(response) => {
                info!(status = %response.status(), "session warm-up complete");
            }
            Err(e) => {
                warn!(error = %e, "session warm-up failed; continuing without it");
            }
        }

        tokio::time::sleep(pacing::jittered_ms(2000, 4000)).await;
    }

    /// Fetch a page as HTML, with pacing and bounded retry.
    ///
    /// Retries transient failures (transport errors, 503, challenge
    /// bodies) up to [`pacing::MAX_RETRIES`] times with exponential
    /// backoff. 404 is returned immediately as permanent.
    pub async fn get_html(&self, url: &str, kind: RequestKind) -> Result<String> {
        let mut last_failure: Option<FetchError> = None;

        for attempt in 0..=pacing::MAX_RETRIES {
            if attempt > 0 {
                let backoff = pacing::retry_backoff(attempt);
                info!(url, attempt, backoff_secs = backoff.as_secs(), "retrying fetch");
                tokio::time::sleep(backoff).await;
            } else {
                tokio::time::sleep(pacing::pre_request_delay(&self.pacing, kind)).await;
            }

            let mut request = self.http.get(url);
            if kind == RequestKind::Detail {
                request = request.header(REFERER, format!("{}/", self.base_url));
            }

            let response = match request.send().await {
                Ok(response) => response,
                Err(e) => {
                    warn!(url, attempt, error = %e, "transport error");
                    last_failure = Some(FetchError::Transport {
                        url: url.to_string(),
                        source: e,
                    });
                    continue;
                }
            };

            let status = response.status();
            if status.as_u16() == 404 {
                return Err(FetchError::NotFound {
                    url: url.to_string(),
                });
            }
            if status.as_u16() == 503 {
                warn!(url, attempt, "rate limited (503)");
                last_failure = Some(FetchError::RateLimited {
                    url: url.to_string(),
                });
                continue;
            }
            if !status.is_success() {
                warn!(url, attempt, status = status.as_u16(), "unexpected HTTP status");
                last_failure = Some(FetchError::Status {
                    url: url.to_string(),
                    status: status.as_u16(),
                });
                continue;
            }

            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    warn!(url, attempt, error = %e, "failed to read response body");
                    last_failure = Some(FetchError::Transport {
                        url: url.to_string(),
                        source: e,
                    });
                    continue;
                }
            };

            if body.len() < CHALLENGE_SCAN_MAX_LEN {
                let lowered = body.to_lowercase();
                if CHALLENGE_MARKERS.iter().any(|m| lowered.contains(m)) {
                    warn!(url, attempt, len = body.len(), "challenge page in 200 response");
                    last_failure = Some(FetchError::InvalidPage {
                        url: url.to_string(),
                        reason: "anti-bot challenge".to_string(),
                    });
                    continue;
                }
            }

            if body.len() <= MIN_BODY_LEN {
                warn!(url, attempt, len = body.len(), "response body too short");
                last_failure = Some(FetchError::InvalidPage {
                    url: url.to_string(),
                    reason: format!("body too short ({} bytes)", body.len()),
                });
                continue;
            }

            return Ok(body);
        }

        Err(last_failure.unwrap_or_else(|| FetchError::InvalidPage {
            url: url.to_string(),
            reason: "no response".to_string(),
        }))
    }
}
