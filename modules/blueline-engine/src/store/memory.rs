//! In-memory store for deterministic tests. Mirrors the Postgres semantics:
//! the same uniqueness key, the same loud duplicate-enrichment failure, the
//! same guarded job transitions.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use blueline_common::{
    BluelineError, EnrichedIncident, IncidentRecord, JobStatus, NewRawArticle, RawArticle,
    RefreshJob, Source, SourceSeed,
};

use super::{IncidentStore, UpsertOutcome};

#[derive(Default)]
struct Inner {
    sources: Vec<Source>,
    next_source_id: i64,
    articles: Vec<RawArticle>,
    next_article_id: i64,
    incidents: HashMap<i64, EnrichedIncident>,
    jobs: Vec<RefreshJob>,
    next_job_id: i64,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // --- Test inspection helpers ---

    pub fn article_count(&self) -> usize {
        self.inner.lock().unwrap().articles.len()
    }

    /// The `(source_id, external_id)` set, for idempotence assertions.
    pub fn external_ids(&self) -> Vec<(i64, String)> {
        let mut ids: Vec<_> = self
            .inner
            .lock()
            .unwrap()
            .articles
            .iter()
            .map(|a| (a.source_id, a.external_id.clone()))
            .collect();
        ids.sort();
        ids
    }

    pub fn incident(&self, id: i64) -> Option<EnrichedIncident> {
        self.inner.lock().unwrap().incidents.get(&id).cloned()
    }

    pub fn incident_count(&self) -> usize {
        self.inner.lock().unwrap().incidents.len()
    }

    pub fn source(&self, source_id: i64) -> Option<Source> {
        self.inner
            .lock()
            .unwrap()
            .sources
            .iter()
            .find(|s| s.id == source_id)
            .cloned()
    }
}

#[async_trait]
impl IncidentStore for MemoryStore {
    async fn sync_sources(&self, seeds: &[SourceSeed]) -> Result<u32, BluelineError> {
        let mut inner = self.inner.lock().unwrap();
        for seed in seeds {
            match inner
                .sources
                .iter()
                .position(|s| s.base_url == seed.base_url)
            {
                Some(idx) => {
                    let existing = &mut inner.sources[idx];
                    existing.agency_name = seed.agency_name.clone();
                    existing.jurisdiction = seed.jurisdiction.clone();
                    existing.region_label = seed.region_label.clone();
                    existing.source_type = seed.source_type.clone();
                    existing.parser_id = seed.parser_id.clone();
                    existing.active = seed.active;
                    existing.use_browser = seed.use_browser;
                }
                None => {
                    inner.next_source_id += 1;
                    let id = inner.next_source_id;
                    inner.sources.push(Source {
                        id,
                        agency_name: seed.agency_name.clone(),
                        jurisdiction: seed.jurisdiction.clone(),
                        region_label: seed.region_label.clone(),
                        source_type: seed.source_type.clone(),
                        base_url: seed.base_url.clone(),
                        parser_id: seed.parser_id.clone(),
                        active: seed.active,
                        use_browser: seed.use_browser,
                        last_checked_at: None,
                    });
                }
            }
        }
        Ok(seeds.len() as u32)
    }

    async fn active_sources_for(&self, region: &str) -> Result<Vec<Source>, BluelineError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .sources
            .iter()
            .filter(|s| s.region_label == region && s.active)
            .cloned()
            .collect())
    }

    async fn list_sources(&self) -> Result<Vec<Source>, BluelineError> {
        Ok(self.inner.lock().unwrap().sources.clone())
    }

    async fn get_source(&self, source_id: i64) -> Result<Option<Source>, BluelineError> {
        Ok(self.source(source_id))
    }

    async fn touch_source(&self, source_id: i64, at: DateTime<Utc>) -> Result<(), BluelineError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(source) = inner.sources.iter_mut().find(|s| s.id == source_id) {
            source.last_checked_at = Some(at);
        }
        Ok(())
    }

    async fn upsert_raw(&self, article: &NewRawArticle) -> Result<UpsertOutcome, BluelineError> {
        let mut inner = self.inner.lock().unwrap();

        if let Some(existing) = inner
            .articles
            .iter()
            .find(|a| a.source_id == article.source_id && a.external_id == article.external_id)
        {
            return Ok(UpsertOutcome {
                id: existing.id,
                inserted: false,
            });
        }

        inner.next_article_id += 1;
        let id = inner.next_article_id;
        inner.articles.push(RawArticle {
            id,
            source_id: article.source_id,
            external_id: article.external_id.clone(),
            url: article.url.clone(),
            title_raw: article.title_raw.clone(),
            body_raw: article.body_raw.clone(),
            published_at: article.published_at,
            raw_html: article.raw_html.clone(),
            created_at: Utc::now(),
        });

        Ok(UpsertOutcome { id, inserted: true })
    }

    async fn store_enriched(&self, incident: &EnrichedIncident) -> Result<(), BluelineError> {
        let mut inner = self.inner.lock().unwrap();

        if !inner.articles.iter().any(|a| a.id == incident.id) {
            return Err(BluelineError::Store(format!(
                "no raw article with id {}",
                incident.id
            )));
        }
        if inner.incidents.contains_key(&incident.id) {
            return Err(BluelineError::Store(format!(
                "incident {} already enriched",
                incident.id
            )));
        }

        inner.incidents.insert(incident.id, incident.clone());
        Ok(())
    }

    async fn list_incidents(
        &self,
        region: &str,
        limit: i64,
    ) -> Result<Vec<IncidentRecord>, BluelineError> {
        let inner = self.inner.lock().unwrap();

        let mut records: Vec<IncidentRecord> = inner
            .articles
            .iter()
            .filter_map(|article| {
                let source = inner
                    .sources
                    .iter()
                    .find(|s| s.id == article.source_id && s.region_label == region)?;
                let incident = inner.incidents.get(&article.id)?;
                Some(IncidentRecord {
                    source: source.clone(),
                    article: article.clone(),
                    incident: incident.clone(),
                })
            })
            .collect();

        // published_at desc with nulls last, then id desc.
        records.sort_by(|a, b| {
            match (b.article.published_at, a.article.published_at) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => std::cmp::Ordering::Greater,
                (None, Some(_)) => std::cmp::Ordering::Less,
                (None, None) => std::cmp::Ordering::Equal,
            }
            .then(b.article.id.cmp(&a.article.id))
        });
        records.truncate(limit.max(0) as usize);

        Ok(records)
    }

    async fn count_incidents(&self, region: &str) -> Result<i64, BluelineError> {
        let inner = self.inner.lock().unwrap();
        let count = inner
            .incidents
            .keys()
            .filter(|id| {
                inner
                    .articles
                    .iter()
                    .find(|a| a.id == **id)
                    .and_then(|a| inner.sources.iter().find(|s| s.id == a.source_id))
                    .is_some_and(|s| s.region_label == region)
            })
            .count();
        Ok(count as i64)
    }

    async fn create_job(&self, region: &str) -> Result<RefreshJob, BluelineError> {
        let mut inner = self.inner.lock().unwrap();
        inner.next_job_id += 1;
        let job = RefreshJob {
            id: inner.next_job_id,
            job_id: Uuid::new_v4(),
            region: region.to_string(),
            status: JobStatus::Pending,
            new_articles: None,
            total_incidents: None,
            error_message: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        };
        inner.jobs.push(job.clone());
        Ok(job)
    }

    async fn get_job(&self, job_id: Uuid) -> Result<Option<RefreshJob>, BluelineError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .jobs
            .iter()
            .find(|j| j.job_id == job_id)
            .cloned())
    }

    async fn mark_job_running(&self, job_id: Uuid) -> Result<(), BluelineError> {
        let mut inner = self.inner.lock().unwrap();
        let job = inner
            .jobs
            .iter_mut()
            .find(|j| j.job_id == job_id)
            .ok_or(BluelineError::JobNotFound)?;
        if job.status != JobStatus::Pending {
            return Err(BluelineError::JobTransition(format!(
                "{job_id} is not pending"
            )));
        }
        job.status = JobStatus::Running;
        job.started_at = Some(Utc::now());
        Ok(())
    }

    async fn mark_job_succeeded(
        &self,
        job_id: Uuid,
        new_articles: i64,
        total_incidents: i64,
    ) -> Result<(), BluelineError> {
        let mut inner = self.inner.lock().unwrap();
        let job = inner
            .jobs
            .iter_mut()
            .find(|j| j.job_id == job_id)
            .ok_or(BluelineError::JobNotFound)?;
        if job.status != JobStatus::Running {
            return Err(BluelineError::JobTransition(format!(
                "{job_id} is not running"
            )));
        }
        job.status = JobStatus::Succeeded;
        job.new_articles = Some(new_articles);
        job.total_incidents = Some(total_incidents);
        job.completed_at = Some(Utc::now());
        Ok(())
    }

    async fn mark_job_failed(&self, job_id: Uuid, error: &str) -> Result<(), BluelineError> {
        let mut inner = self.inner.lock().unwrap();
        let job = inner
            .jobs
            .iter_mut()
            .find(|j| j.job_id == job_id)
            .ok_or(BluelineError::JobNotFound)?;
        if job.status != JobStatus::Running {
            return Err(BluelineError::JobTransition(format!(
                "{job_id} is not running"
            )));
        }
        job.status = JobStatus::Failed;
        job.error_message = Some(error.to_string());
        job.completed_at = Some(Utc::now());
        Ok(())
    }
}
