//! Client for a Browserless/Chrome `/content` endpoint. Failures land
//! directly in the pipeline error taxonomy: transport problems are
//! `Network`/`Timeout`, upstream rejections are `Http`, so the fetcher's
//! retry classification applies to rendered fetches the same way it does to
//! direct ones.

use std::time::Duration;

use tracing::warn;

use blueline_common::BluelineError;

/// How long Browserless waits for the page before giving up, and which load
/// event ends the wait. Listing pages that hydrate client-side need the
/// network-idle wait; plain pages can use the default load event.
#[derive(Debug, Clone)]
pub struct ContentOptions {
    pub wait_until: &'static str,
    pub timeout: Duration,
}

impl Default for ContentOptions {
    fn default() -> Self {
        Self {
            wait_until: "networkidle2",
            timeout: Duration::from_secs(30),
        }
    }
}

pub struct BrowserlessClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl BrowserlessClient {
    pub fn new(base_url: &str, token: Option<&str>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.map(String::from),
        }
    }

    /// Fetch fully-rendered HTML for a URL via the Browserless /content
    /// endpoint, waiting for the configured load condition.
    pub async fn content(
        &self,
        url: &str,
        options: &ContentOptions,
    ) -> Result<String, BluelineError> {
        let mut endpoint = format!("{}/content", self.base_url);
        if let Some(ref token) = self.token {
            endpoint.push_str(&format!("?token={token}"));
        }

        let body = serde_json::json!({
            "url": url,
            "gotoOptions": {
                "waitUntil": options.wait_until,
                "timeout": options.timeout.as_millis() as u64,
            },
        });

        let resp = self
            .client
            .post(&endpoint)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| classify(url, e))?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            warn!(url, status = status.as_u16(), message, "Browserless API error");
            return Err(BluelineError::Http {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        resp.text().await.map_err(|e| classify(url, e))
    }
}

fn classify(url: &str, e: reqwest::Error) -> BluelineError {
    if e.is_timeout() {
        BluelineError::Timeout(format!("browserless {url}: {e}"))
    } else {
        BluelineError::Network(format!("browserless {url}: {e}"))
    }
}
