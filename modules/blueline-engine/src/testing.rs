//! Deterministic test doubles: no network, no database, no Docker.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use blueline_common::BluelineError;

use crate::fetcher::{FetchOptions, FetchedPage, Fetcher};

/// Programmable fetcher keyed by exact URL. Unknown URLs return 404.
#[derive(Default)]
pub struct MockFetcher {
    pages: Mutex<HashMap<String, String>>,
    failures: Mutex<HashMap<String, u16>>,
    hits: Mutex<Vec<String>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `html` for `url`.
    pub fn stub(&self, url: &str, html: &str) {
        self.pages
            .lock()
            .unwrap()
            .insert(url.to_string(), html.to_string());
        self.failures.lock().unwrap().remove(url);
    }

    /// Fail `url` with an HTTP status.
    pub fn fail(&self, url: &str, status: u16) {
        self.failures
            .lock()
            .unwrap()
            .insert(url.to_string(), status);
    }

    /// Every URL fetched so far, in order.
    pub fn hits(&self) -> Vec<String> {
        self.hits.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(
        &self,
        url: &str,
        _options: &FetchOptions,
    ) -> Result<FetchedPage, BluelineError> {
        self.hits.lock().unwrap().push(url.to_string());

        if let Some(status) = self.failures.lock().unwrap().get(url) {
            return Err(BluelineError::Http {
                status: *status,
                url: url.to_string(),
            });
        }

        match self.pages.lock().unwrap().get(url) {
            Some(body) => Ok(FetchedPage {
                status: 200,
                body: body.clone(),
                final_url: url.to_string(),
            }),
            None => Err(BluelineError::Http {
                status: 404,
                url: url.to_string(),
            }),
        }
    }
}
