//! Page fetching with retries, backoff, and optional headless rendering.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use rand::Rng;
use tracing::{info, warn};

use blueline_common::BluelineError;
use browserless_client::{BrowserlessClient, ContentOptions};

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (compatible; blueline/0.1; newsroom monitor)";

/// Per-call fetch policy. Defaults follow the pipeline contract: 30 s per
/// request, 2 retries, 45 s total elapsed budget.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub timeout: Duration,
    pub max_retries: u32,
    pub use_browser: bool,
    pub user_agent: String,
    /// Hard cap on the whole call including backoff sleeps.
    pub total_budget: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 2,
            use_browser: false,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            total_budget: Duration::from_secs(45),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub status: u16,
    pub body: String,
    /// URL after redirects. Fingerprints canonicalize this, not the request URL.
    pub final_url: String,
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str, options: &FetchOptions)
        -> Result<FetchedPage, BluelineError>;
}

/// Production fetcher: direct reqwest path with retry/backoff, plus a
/// Browserless path for sources whose listing pages are JS-rendered.
pub struct PageFetcher {
    client: reqwest::Client,
    browserless: Option<BrowserlessClient>,
}

impl PageFetcher {
    pub fn new(browserless: Option<BrowserlessClient>) -> Self {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .expect("Failed to build HTTP client");

        if browserless.is_some() {
            info!("PageFetcher initialized with Browserless rendering");
        } else {
            info!("PageFetcher initialized (direct HTTP only)");
        }

        Self { client, browserless }
    }

    async fn fetch_direct(
        &self,
        url: &str,
        options: &FetchOptions,
    ) -> Result<FetchedPage, BluelineError> {
        let started = Instant::now();
        let mut attempt = 0u32;

        loop {
            match self.try_once(url, options).await {
                Ok(page) => return Ok(page),
                Err(e) if e.is_transient() && attempt < options.max_retries => {
                    let backoff = backoff_delay(attempt);
                    if started.elapsed() + backoff > options.total_budget {
                        warn!(url, attempt, "Fetch budget exhausted, giving up");
                        return Err(e);
                    }
                    warn!(
                        url,
                        attempt = attempt + 1,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Transient fetch failure, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn try_once(
        &self,
        url: &str,
        options: &FetchOptions,
    ) -> Result<FetchedPage, BluelineError> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, &options.user_agent)
            .timeout(options.timeout)
            .send()
            .await
            .map_err(|e| classify_reqwest(url, e))?;

        let status = response.status();
        let final_url = response.url().to_string();

        if !status.is_success() {
            return Err(BluelineError::Http {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| classify_reqwest(url, e))?;

        Ok(FetchedPage {
            status: status.as_u16(),
            body,
            final_url,
        })
    }

    async fn fetch_rendered(
        &self,
        url: &str,
        options: &FetchOptions,
    ) -> Result<FetchedPage, BluelineError> {
        let Some(ref browserless) = self.browserless else {
            warn!(
                url,
                "use_browser requested but no BROWSERLESS_URL configured, using direct HTTP"
            );
            return self.fetch_direct(url, options).await;
        };

        let content_options = ContentOptions {
            wait_until: "networkidle2",
            timeout: options.timeout,
        };

        match browserless.content(url, &content_options).await {
            Ok(html) => {
                if html.is_empty() {
                    warn!(url, fetcher = "browserless", "Empty HTML response");
                }
                Ok(FetchedPage {
                    status: 200,
                    body: html,
                    final_url: url.to_string(),
                })
            }
            Err(e) => {
                warn!(url, error = %e, "Browserless fetch failed");
                Err(e)
            }
        }
    }
}

#[async_trait]
impl Fetcher for PageFetcher {
    async fn fetch(
        &self,
        url: &str,
        options: &FetchOptions,
    ) -> Result<FetchedPage, BluelineError> {
        if options.use_browser {
            // Rendered path skips direct HTTP entirely.
            self.fetch_rendered(url, options).await
        } else {
            self.fetch_direct(url, options).await
        }
    }
}

/// Exponential backoff: base 1 s, factor 2, ±25 % jitter.
fn backoff_delay(attempt: u32) -> Duration {
    let base_ms = 1000u64.saturating_mul(2u64.saturating_pow(attempt));
    let jitter_span = base_ms / 4;
    let jitter = rand::rng().random_range(0..=jitter_span * 2) as i64 - jitter_span as i64;
    Duration::from_millis((base_ms as i64 + jitter).max(0) as u64)
}

fn classify_reqwest(url: &str, e: reqwest::Error) -> BluelineError {
    if e.is_timeout() {
        BluelineError::Timeout(format!("fetch {url}: {e}"))
    } else {
        BluelineError::Network(format!("fetch {url}: {e}"))
    }
}
