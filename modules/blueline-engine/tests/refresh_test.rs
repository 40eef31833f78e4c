//! End-to-end refresh scenarios against the in-memory store and mock
//! fetcher: no network, no database, no Docker.

use std::sync::Arc;
use std::time::Duration;

use blueline_common::{BluelineError, JobStatus, Severity, SourceSeed};
use blueline_engine::enrich::StubEnricher;
use blueline_engine::jobs::{start_refresh_job, JobRegistry};
use blueline_engine::parsers::{ParserContext, ParserRegistry};
use blueline_engine::refresh::RefreshEngine;
use blueline_engine::store::{IncidentStore, MemoryStore};
use blueline_engine::testing::MockFetcher;

// =========================================================================
// Fixtures
// =========================================================================

fn seed(region: &str, base_url: &str) -> SourceSeed {
    SourceSeed {
        agency_name: "Test Detachment".to_string(),
        jurisdiction: "BC".to_string(),
        region_label: region.to_string(),
        source_type: "rcmp_detachment".to_string(),
        base_url: base_url.to_string(),
        parser_id: "rcmp".to_string(),
        active: true,
        use_browser: false,
    }
}

/// Article page with no machine-readable date: realistic for municipal CMSes,
/// and it keeps the watermark hint out of dedup-focused scenarios.
fn article_html(title: &str, body: &str) -> String {
    format!("<html><body><h1>{title}</h1><article><p>{body}</p></article></body></html>")
}

fn listing_html(paths: &[&str]) -> String {
    paths
        .iter()
        .map(|p| format!(r#"<a href="{p}">{p}</a>"#))
        .collect::<Vec<_>>()
        .join("\n")
}

fn engine_with(fetcher: Arc<MockFetcher>, store: Arc<MemoryStore>) -> Arc<RefreshEngine> {
    let registry = ParserRegistry::new(
        ParserContext::new(fetcher).with_article_delay(Duration::ZERO),
    );
    let store: Arc<dyn IncidentStore> = store;
    Arc::new(RefreshEngine::new(store, registry, Arc::new(StubEnricher)))
}

const LISTING: &str = "https://pd.example/newsroom";

async fn seed_one_source(store: &Arc<MemoryStore>, region: &str) {
    store
        .sync_sources(&[seed(region, LISTING)])
        .await
        .unwrap();
}

fn stub_two_articles(fetcher: &MockFetcher) {
    fetcher.stub(LISTING, &listing_html(&["/news/a", "/news/b"]));
    fetcher.stub(
        "https://pd.example/news/a",
        &article_html("T_A", "B_A body text"),
    );
    fetcher.stub(
        "https://pd.example/news/b",
        &article_html("T_B", "B_B body text"),
    );
}

// =========================================================================
// S1–S3: ingest, idempotence, incremental
// =========================================================================

#[tokio::test]
async fn s1_fresh_ingest_inserts_and_enriches() {
    let store = Arc::new(MemoryStore::new());
    let fetcher = Arc::new(MockFetcher::new());
    seed_one_source(&store, "R").await;
    stub_two_articles(&fetcher);

    let engine = engine_with(fetcher, store.clone());
    let summary = engine.refresh("R").await.unwrap();

    assert_eq!(summary.region, "R");
    assert_eq!(summary.new_articles, 2);
    assert_eq!(summary.total_incidents, 2);
    assert_eq!(store.article_count(), 2);

    // Fingerprints are reproducible from the canonical inputs.
    let expected_a = blueline_common::stable_hash(1, "https://pd.example/news/a", "T_A");
    let expected_b = blueline_common::stable_hash(1, "https://pd.example/news/b", "T_B");
    let mut expected = vec![(1, expected_a), (1, expected_b)];
    expected.sort();
    assert_eq!(store.external_ids(), expected);

    // Exactly one enrichment per article, ids aligned.
    assert_eq!(store.incident_count(), 2);
    for record in store.list_incidents("R", 100).await.unwrap() {
        assert_eq!(record.incident.id, record.article.id);
    }
}

#[tokio::test]
async fn s2_repeat_refresh_is_a_noop() {
    let store = Arc::new(MemoryStore::new());
    let fetcher = Arc::new(MockFetcher::new());
    seed_one_source(&store, "R").await;
    stub_two_articles(&fetcher);

    let engine = engine_with(fetcher, store.clone());
    engine.refresh("R").await.unwrap();
    let before = store.external_ids();

    let second = engine.refresh("R").await.unwrap();
    assert_eq!(second.new_articles, 0);
    assert_eq!(second.total_incidents, 2);
    assert_eq!(store.article_count(), 2);
    assert_eq!(store.external_ids(), before);

    // The advisory watermark advanced anyway.
    assert!(store.source(1).unwrap().last_checked_at.is_some());
}

#[tokio::test]
async fn s3_mixed_new_and_duplicate() {
    let store = Arc::new(MemoryStore::new());
    let fetcher = Arc::new(MockFetcher::new());
    seed_one_source(&store, "R").await;
    stub_two_articles(&fetcher);

    let engine = engine_with(fetcher.clone(), store.clone());
    engine.refresh("R").await.unwrap();

    // A new release lands at the top of the listing.
    fetcher.stub(LISTING, &listing_html(&["/news/c", "/news/a", "/news/b"]));
    fetcher.stub(
        "https://pd.example/news/c",
        &article_html("T_C", "B_C body text"),
    );

    let summary = engine.refresh("R").await.unwrap();
    assert_eq!(summary.new_articles, 1);
    assert_eq!(summary.total_incidents, 3);
    assert_eq!(store.article_count(), 3);
}

// =========================================================================
// S4: unknown region
// =========================================================================

#[tokio::test]
async fn s4_unknown_region_fails_with_no_active_sources() {
    let store = Arc::new(MemoryStore::new());
    let fetcher = Arc::new(MockFetcher::new());
    seed_one_source(&store, "R").await;

    let engine = engine_with(fetcher, store);
    match engine.refresh("X").await {
        Err(BluelineError::NoActiveSources(region)) => assert_eq!(region, "X"),
        other => panic!("expected NoActiveSources, got {other:?}"),
    }
}

#[tokio::test]
async fn inactive_sources_do_not_count() {
    let store = Arc::new(MemoryStore::new());
    let fetcher = Arc::new(MockFetcher::new());
    let mut s = seed("R", LISTING);
    s.active = false;
    store.sync_sources(&[s]).await.unwrap();

    let engine = engine_with(fetcher, store);
    assert!(matches!(
        engine.refresh("R").await,
        Err(BluelineError::NoActiveSources(_))
    ));
}

// =========================================================================
// S5: enrichment disabled → stub records
// =========================================================================

#[tokio::test]
async fn s5_stub_enrichment_fields() {
    let store = Arc::new(MemoryStore::new());
    let fetcher = Arc::new(MockFetcher::new());
    seed_one_source(&store, "R").await;
    stub_two_articles(&fetcher);

    let engine = engine_with(fetcher, store.clone());
    engine.refresh("R").await.unwrap();

    let records = store.list_incidents("R", 100).await.unwrap();
    assert_eq!(records.len(), 2);
    for record in records {
        let incident = record.incident;
        assert_eq!(incident.severity, Severity::Medium);
        assert_eq!(incident.crime_category.as_str(), "Unknown");
        assert_eq!(incident.llm_model, "none");
        assert_eq!(incident.prompt_version, "stub_v1");
        assert!(incident.tags.is_empty());
        assert!(incident.entities.is_empty());
        assert!(record.article.body_raw.starts_with(&incident.summary_tactical));
    }
}

// =========================================================================
// S6 + property 7: async job lifecycle
// =========================================================================

#[tokio::test]
async fn s6_async_job_lifecycle() {
    let store = Arc::new(MemoryStore::new());
    let fetcher = Arc::new(MockFetcher::new());
    seed_one_source(&store, "R").await;
    stub_two_articles(&fetcher);

    let engine = engine_with(fetcher, store.clone());
    let registry = JobRegistry::new(store.clone() as Arc<dyn IncidentStore>);

    let job = start_refresh_job(engine, "R").await.unwrap();
    assert_eq!(job.region, "R");

    let mut polled = registry.get(job.job_id).await.unwrap();
    for _ in 0..200 {
        if polled.status.is_terminal() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        polled = registry.get(job.job_id).await.unwrap();
    }

    assert_eq!(polled.status, JobStatus::Succeeded);
    assert_eq!(polled.new_articles, Some(2));
    assert_eq!(polled.total_incidents, Some(2));

    let started = polled.started_at.unwrap();
    let completed = polled.completed_at.unwrap();
    assert!(polled.created_at <= started);
    assert!(started <= completed);
}

#[tokio::test]
async fn failed_region_marks_job_failed() {
    let store = Arc::new(MemoryStore::new());
    let fetcher = Arc::new(MockFetcher::new());
    seed_one_source(&store, "R").await;

    let engine = engine_with(fetcher, store.clone());
    let registry = JobRegistry::new(store.clone() as Arc<dyn IncidentStore>);

    let job = start_refresh_job(engine, "Nowhere").await.unwrap();

    let mut polled = registry.get(job.job_id).await.unwrap();
    for _ in 0..200 {
        if polled.status.is_terminal() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        polled = registry.get(job.job_id).await.unwrap();
    }

    assert_eq!(polled.status, JobStatus::Failed);
    assert!(polled.error_message.unwrap().contains("Nowhere"));
}

#[tokio::test]
async fn terminal_jobs_reject_further_transitions() {
    let store = Arc::new(MemoryStore::new());
    let job = store.create_job("R").await.unwrap();

    // pending → succeeded is illegal.
    assert!(store.mark_job_succeeded(job.job_id, 0, 0).await.is_err());

    store.mark_job_running(job.job_id).await.unwrap();
    store.mark_job_succeeded(job.job_id, 1, 1).await.unwrap();

    // Terminal states are immutable.
    assert!(store.mark_job_running(job.job_id).await.is_err());
    assert!(store.mark_job_failed(job.job_id, "late").await.is_err());

    let final_job = store.get_job(job.job_id).await.unwrap().unwrap();
    assert_eq!(final_job.status, JobStatus::Succeeded);
}

// =========================================================================
// Property 6: per-source isolation
// =========================================================================

#[tokio::test]
async fn one_broken_source_does_not_hide_the_others() {
    let store = Arc::new(MemoryStore::new());
    let fetcher = Arc::new(MockFetcher::new());
    store
        .sync_sources(&[
            seed("R", "https://pd.example/newsroom"),
            seed("R", "https://other-pd.example/newsroom"),
        ])
        .await
        .unwrap();

    stub_two_articles(&fetcher);
    fetcher.fail("https://other-pd.example/newsroom", 500);

    let engine = engine_with(fetcher, store.clone());
    let summary = engine.refresh("R").await.unwrap();

    assert_eq!(summary.new_articles, 2);
    assert_eq!(summary.total_incidents, 2);

    // Both watermarks advanced, including the broken source's.
    assert!(store.source(1).unwrap().last_checked_at.is_some());
    assert!(store.source(2).unwrap().last_checked_at.is_some());
}

#[tokio::test]
async fn unknown_parser_id_skips_the_source() {
    let store = Arc::new(MemoryStore::new());
    let fetcher = Arc::new(MockFetcher::new());

    let mut bad = seed("R", "https://bad.example/newsroom");
    bad.parser_id = "usenet".to_string();
    store
        .sync_sources(&[seed("R", LISTING), bad])
        .await
        .unwrap();
    stub_two_articles(&fetcher);

    let engine = engine_with(fetcher, store.clone());
    let summary = engine.refresh("R").await.unwrap();
    assert_eq!(summary.new_articles, 2);
}

// =========================================================================
// Property 8: uniqueness under concurrent refreshes
// =========================================================================

#[tokio::test]
async fn concurrent_refreshes_insert_each_article_once() {
    let store = Arc::new(MemoryStore::new());
    let fetcher = Arc::new(MockFetcher::new());
    seed_one_source(&store, "R").await;
    stub_two_articles(&fetcher);

    let engine_a = engine_with(fetcher.clone(), store.clone());
    let engine_b = engine_with(fetcher, store.clone());

    let (a, b) = tokio::join!(engine_a.refresh("R"), engine_b.refresh("R"));
    let a = a.unwrap();
    let b = b.unwrap();

    // Each article was inserted exactly once, whichever side won.
    assert_eq!(a.new_articles + b.new_articles, 2);
    assert_eq!(store.article_count(), 2);
    assert_eq!(store.incident_count(), 2);

    let expected_a = blueline_common::stable_hash(1, "https://pd.example/news/a", "T_A");
    let expected_b = blueline_common::stable_hash(1, "https://pd.example/news/b", "T_B");
    let mut expected = vec![(1, expected_a), (1, expected_b)];
    expected.sort();
    assert_eq!(store.external_ids(), expected);
}

// =========================================================================
// Regions are isolated query keys
// =========================================================================

#[tokio::test]
async fn counts_are_scoped_to_the_region() {
    let store = Arc::new(MemoryStore::new());
    let fetcher = Arc::new(MockFetcher::new());
    store
        .sync_sources(&[
            seed("R", LISTING),
            seed("Elsewhere", "https://other-pd.example/newsroom"),
        ])
        .await
        .unwrap();

    stub_two_articles(&fetcher);
    fetcher.stub(
        "https://other-pd.example/newsroom",
        &listing_html(&["/news/z"]),
    );
    fetcher.stub(
        "https://other-pd.example/news/z",
        &article_html("T_Z", "B_Z body text"),
    );

    let engine = engine_with(fetcher, store.clone());
    let summary_r = engine.refresh("R").await.unwrap();
    let summary_e = engine.refresh("Elsewhere").await.unwrap();

    assert_eq!(summary_r.new_articles, 2);
    assert_eq!(summary_r.total_incidents, 2);
    assert_eq!(summary_e.new_articles, 1);
    assert_eq!(summary_e.total_incidents, 1);

    assert_eq!(store.list_incidents("R", 100).await.unwrap().len(), 2);
    assert_eq!(store.list_incidents("Elsewhere", 100).await.unwrap().len(), 1);
}
