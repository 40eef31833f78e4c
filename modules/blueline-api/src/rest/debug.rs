//! Dev-only endpoints. The router only mounts these when `ENV=dev`.

use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::response::Json;
use serde::Deserialize;

use blueline_common::{BluelineError, NewRawArticle};
use blueline_engine::store::IncidentStore;

use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CandidatesQuery {
    pub source_id: i64,
}

/// GET /api/debug/candidates?source_id= — run only the discovery half of a
/// source's parser and return the accepted candidate URLs.
pub async fn candidates(
    State(state): State<Arc<AppState>>,
    query: Result<Query<CandidatesQuery>, QueryRejection>,
) -> Result<Json<Vec<String>>, ApiError> {
    let Query(q) = query.map_err(|e| ApiError::Unprocessable(e.body_text()))?;

    let source = state
        .store
        .get_source(q.source_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No source with id {}", q.source_id)))?;

    let parser = state.engine.registry().get(&source.parser_id).map_err(|e| match e {
        BluelineError::UnknownParser(id) => {
            ApiError::Unprocessable(format!("Source has unknown parser_id: {id}"))
        }
        other => other.into(),
    })?;

    let urls = parser.discover(&source).await?;
    Ok(Json(urls))
}

/// GET /api/debug/enrichment-check — push a canned release through the live
/// enricher and report what came back.
pub async fn enrichment_check(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let article = NewRawArticle {
        source_id: 0,
        external_id: "enrichment-check".to_string(),
        url: "https://example.invalid/news/enrichment-check".to_string(),
        title_raw: "Vehicle break-ins reported in downtown core".to_string(),
        body_raw: "Police received several reports of overnight vehicle break-ins \
                   along the 800 block of Main Street. Officers recovered stolen \
                   property nearby and are reviewing surveillance footage. No \
                   suspects are in custody."
            .to_string(),
        published_at: None,
        raw_html: None,
    };
    let source = blueline_common::Source {
        id: 0,
        agency_name: "Self Test PD".to_string(),
        jurisdiction: "BC".to_string(),
        region_label: "Self Test, BC".to_string(),
        source_type: "self_test".to_string(),
        base_url: "https://example.invalid/news".to_string(),
        parser_id: "municipal_list".to_string(),
        active: false,
        use_browser: false,
        last_checked_at: None,
    };

    let enricher = state.engine.enricher();
    let incident = enricher.enrich(0, &article, &source).await;

    Ok(Json(serde_json::json!({
        "ok": incident.llm_model != "none",
        "model_name": enricher.model_label(),
        "prompt_version": enricher.prompt_version(),
        "severity": incident.severity.as_str(),
        "crime_category": incident.crime_category.as_str(),
        "summary": incident.summary_tactical,
    })))
}
