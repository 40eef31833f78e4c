//! Deduplicating persistence for sources, raw articles, enriched incidents,
//! and refresh jobs.
//!
//! The store is the only component that enforces uniqueness. Everything
//! upstream (parsers, the orchestrator) may emit duplicates freely; a
//! duplicate reads back as `inserted = false` and costs nothing downstream.

pub mod postgres;

#[cfg(any(test, feature = "test-support"))]
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use blueline_common::{
    BluelineError, EnrichedIncident, IncidentRecord, NewRawArticle, RefreshJob, Source, SourceSeed,
};

pub use postgres::PgStore;

#[cfg(any(test, feature = "test-support"))]
pub use memory::MemoryStore;

/// Result of an idempotent raw-article upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub id: i64,
    /// True only for the call that actually created the row. Enrichment is
    /// keyed off this: one LLM call per inserted article, ever.
    pub inserted: bool,
}

#[async_trait]
pub trait IncidentStore: Send + Sync {
    // --- Sources ---

    /// Upsert the seed list by `base_url`. Returns the number of rows
    /// written. Never touches `last_checked_at`; never deletes.
    async fn sync_sources(&self, seeds: &[SourceSeed]) -> Result<u32, BluelineError>;

    async fn active_sources_for(&self, region: &str) -> Result<Vec<Source>, BluelineError>;

    async fn list_sources(&self) -> Result<Vec<Source>, BluelineError>;

    async fn get_source(&self, source_id: i64) -> Result<Option<Source>, BluelineError>;

    /// Advance the advisory watermark. Idempotent.
    async fn touch_source(&self, source_id: i64, at: DateTime<Utc>) -> Result<(), BluelineError>;

    // --- Raw articles ---

    /// Atomic lookup-or-insert by `(source_id, external_id)`. Never mutates
    /// an existing row.
    async fn upsert_raw(&self, article: &NewRawArticle) -> Result<UpsertOutcome, BluelineError>;

    // --- Enriched incidents ---

    /// Insert the 1:1 enrichment row. Fails loudly if one already exists;
    /// callers must only enrich freshly inserted articles.
    async fn store_enriched(&self, incident: &EnrichedIncident) -> Result<(), BluelineError>;

    // --- Query surface ---

    /// Joined rows for a region, newest first (`published_at` desc, id desc).
    async fn list_incidents(
        &self,
        region: &str,
        limit: i64,
    ) -> Result<Vec<IncidentRecord>, BluelineError>;

    async fn count_incidents(&self, region: &str) -> Result<i64, BluelineError>;

    // --- Refresh jobs ---

    async fn create_job(&self, region: &str) -> Result<RefreshJob, BluelineError>;

    async fn get_job(&self, job_id: Uuid) -> Result<Option<RefreshJob>, BluelineError>;

    /// pending → running. Any other starting state is rejected.
    async fn mark_job_running(&self, job_id: Uuid) -> Result<(), BluelineError>;

    /// running → succeeded, recording the counts.
    async fn mark_job_succeeded(
        &self,
        job_id: Uuid,
        new_articles: i64,
        total_incidents: i64,
    ) -> Result<(), BluelineError>;

    /// running → failed, recording the error.
    async fn mark_job_failed(&self, job_id: Uuid, error: &str) -> Result<(), BluelineError>;
}
