//! Async refresh jobs: persisted lifecycle records polled over HTTP.

use std::sync::Arc;

use tracing::{error, info};
use uuid::Uuid;

use blueline_common::{BluelineError, RefreshJob};

use crate::refresh::RefreshEngine;
use crate::store::IncidentStore;

/// Thin facade over the store's job rows. Transitions are the only allowed
/// mutations and the store rejects everything else.
#[derive(Clone)]
pub struct JobRegistry {
    store: Arc<dyn IncidentStore>,
}

impl JobRegistry {
    pub fn new(store: Arc<dyn IncidentStore>) -> Self {
        Self { store }
    }

    pub async fn create(&self, region: &str) -> Result<RefreshJob, BluelineError> {
        self.store.create_job(region).await
    }

    pub async fn get(&self, job_id: Uuid) -> Result<RefreshJob, BluelineError> {
        self.store
            .get_job(job_id)
            .await?
            .ok_or(BluelineError::JobNotFound)
    }
}

/// Start an async refresh: create the job in `pending`, then drive
/// pending → running → {succeeded | failed} in a spawned task. The caller
/// gets the pending job back immediately and polls for the rest.
pub async fn start_refresh_job(
    engine: Arc<RefreshEngine>,
    region: &str,
) -> Result<RefreshJob, BluelineError> {
    let job = engine.store().create_job(region).await?;
    let job_id = job.job_id;
    let region = region.to_string();

    info!(job_id = %job_id, region, "Refresh job created");

    tokio::spawn(async move {
        if let Err(e) = run_job(&engine, job_id, &region).await {
            error!(job_id = %job_id, error = %e, "Refresh job bookkeeping failed");
        }
    });

    Ok(job)
}

async fn run_job(
    engine: &RefreshEngine,
    job_id: Uuid,
    region: &str,
) -> Result<(), BluelineError> {
    engine.store().mark_job_running(job_id).await?;

    match engine.refresh(region).await {
        Ok(summary) => {
            info!(
                job_id = %job_id,
                new_articles = summary.new_articles,
                total_incidents = summary.total_incidents,
                "Refresh job succeeded"
            );
            engine
                .store()
                .mark_job_succeeded(
                    job_id,
                    summary.new_articles as i64,
                    summary.total_incidents,
                )
                .await
        }
        Err(e) => {
            engine.store().mark_job_failed(job_id, &e.to_string()).await
        }
    }
}
