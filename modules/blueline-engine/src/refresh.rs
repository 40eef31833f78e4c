//! Region refresh orchestration: parallel across sources, sequential within
//! a source, absorb everything short of `NoActiveSources`.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use blueline_common::{BluelineError, RefreshSummary, Source};

use crate::enrich::Enricher;
use crate::parsers::ParserRegistry;
use crate::store::IncidentStore;

#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Concurrent source tasks per refresh.
    pub fan_out: usize,
    /// Deadline for one source's whole run (listing + articles + enrichment).
    pub source_timeout: Duration,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            fan_out: 4,
            source_timeout: Duration::from_secs(45),
        }
    }
}

/// How a single source run ended. None of these fail the region refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    Ok,
    PartialSuccess,
    ParserUnknown,
    ListingFetchFailed,
    Timeout,
}

#[derive(Debug)]
pub struct SourceOutcome {
    pub source_id: i64,
    pub inserted: u32,
    pub state: SourceState,
}

/// The pipeline context: every dependency is explicit, nothing lives in
/// module scope.
pub struct RefreshEngine {
    store: Arc<dyn IncidentStore>,
    registry: ParserRegistry,
    enricher: Arc<dyn Enricher>,
    config: RefreshConfig,
}

impl RefreshEngine {
    pub fn new(
        store: Arc<dyn IncidentStore>,
        registry: ParserRegistry,
        enricher: Arc<dyn Enricher>,
    ) -> Self {
        Self {
            store,
            registry,
            enricher,
            config: RefreshConfig::default(),
        }
    }

    pub fn with_config(mut self, config: RefreshConfig) -> Self {
        self.config = config;
        self
    }

    pub fn store(&self) -> &Arc<dyn IncidentStore> {
        &self.store
    }

    pub fn registry(&self) -> &ParserRegistry {
        &self.registry
    }

    pub fn enricher(&self) -> &Arc<dyn Enricher> {
        &self.enricher
    }

    /// Refresh every active source in a region. Individual source failures
    /// lower the count; only a region with no active sources is an error.
    pub async fn refresh(&self, region: &str) -> Result<RefreshSummary, BluelineError> {
        let sources = self.store.active_sources_for(region).await?;
        if sources.is_empty() {
            return Err(BluelineError::NoActiveSources(region.to_string()));
        }

        info!(region, sources = sources.len(), "Refresh starting");

        let outcomes: Vec<SourceOutcome> = stream::iter(sources)
            .map(|source| self.run_source(source))
            .buffer_unordered(self.config.fan_out)
            .collect()
            .await;

        let new_articles: u32 = outcomes.iter().map(|o| o.inserted).sum();
        let total_incidents = self.store.count_incidents(region).await?;

        info!(region, new_articles, total_incidents, "Refresh complete");

        Ok(RefreshSummary {
            region: region.to_string(),
            new_articles,
            total_incidents,
        })
    }

    /// One bounded source run. The inserted counter lives outside the timed
    /// future so rows persisted before a timeout still count.
    async fn run_source(&self, source: Source) -> SourceOutcome {
        let inserted = Arc::new(AtomicU32::new(0));

        let state = match tokio::time::timeout(
            self.config.source_timeout,
            self.ingest_source(&source, inserted.clone()),
        )
        .await
        {
            Ok(Ok(state)) => state,
            Ok(Err(e)) => {
                warn!(source = %source.agency_name, error = %e, "Source run failed");
                match e {
                    BluelineError::UnknownParser(_) => SourceState::ParserUnknown,
                    _ => SourceState::ListingFetchFailed,
                }
            }
            Err(_) => {
                warn!(
                    source = %source.agency_name,
                    timeout_secs = self.config.source_timeout.as_secs(),
                    "Source run timed out"
                );
                SourceState::Timeout
            }
        };

        // Advanced even on failure so a broken source is not hot-looped.
        // The watermark is a hint; the store stays authoritative on dedup.
        if let Err(e) = self.store.touch_source(source.id, Utc::now()).await {
            warn!(source_id = source.id, error = %e, "Failed to advance watermark");
        }

        SourceOutcome {
            source_id: source.id,
            inserted: inserted.load(Ordering::Relaxed),
            state,
        }
    }

    async fn ingest_source(
        &self,
        source: &Source,
        inserted: Arc<AtomicU32>,
    ) -> Result<SourceState, BluelineError> {
        let parser = self.registry.get(&source.parser_id)?;
        let articles = parser.fetch_new(source, source.last_checked_at).await?;

        let mut failures = 0u32;
        for article in articles {
            let outcome = match self.store.upsert_raw(&article).await {
                Ok(o) => o,
                Err(e) => {
                    // Uniqueness violations here are a benign race with a
                    // concurrent refresh; either way the row exists.
                    warn!(url = %article.url, error = %e, "Upsert failed, treating as already inserted");
                    failures += 1;
                    continue;
                }
            };

            if !outcome.inserted {
                continue;
            }
            inserted.fetch_add(1, Ordering::Relaxed);

            let incident = self.enricher.enrich(outcome.id, &article, source).await;
            if let Err(e) = self.store.store_enriched(&incident).await {
                warn!(article_id = outcome.id, error = %e, "Failed to store enrichment");
                failures += 1;
            }
        }

        Ok(if failures > 0 {
            SourceState::PartialSuccess
        } else {
            SourceState::Ok
        })
    }
}
