use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::response::Json;
use serde::Deserialize;

use blueline_engine::store::IncidentStore;

use crate::error::ApiError;
use crate::graph::{build_graph, build_markers};
use crate::views::build_incident_views;
use crate::AppState;

const DEFAULT_LIMIT: i64 = 100;
const MAX_LIMIT: i64 = 500;

#[derive(Debug, Deserialize)]
pub struct RegionQuery {
    pub region: String,
    pub limit: Option<i64>,
}

/// GET /api/incidents?region=&limit=
pub async fn list(
    State(state): State<Arc<AppState>>,
    query: Result<Query<RegionQuery>, QueryRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Query(q) = query.map_err(|e| ApiError::Unprocessable(e.body_text()))?;
    let limit = q.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    let records = state.store.list_incidents(&q.region, limit).await?;
    let incidents = build_incident_views(&records);

    Ok(Json(serde_json::json!({
        "region": q.region,
        "incidents": incidents,
    })))
}

/// GET /api/graph?region=
pub async fn graph(
    State(state): State<Arc<AppState>>,
    query: Result<Query<RegionQuery>, QueryRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Query(q) = query.map_err(|e| ApiError::Unprocessable(e.body_text()))?;

    let records = state.store.list_incidents(&q.region, MAX_LIMIT).await?;
    let (nodes, links) = build_graph(&records);

    Ok(Json(serde_json::json!({
        "region": q.region,
        "nodes": nodes,
        "links": links,
    })))
}

/// GET /api/map?region=
pub async fn map(
    State(state): State<Arc<AppState>>,
    query: Result<Query<RegionQuery>, QueryRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Query(q) = query.map_err(|e| ApiError::Unprocessable(e.body_text()))?;

    let records = state.store.list_incidents(&q.region, MAX_LIMIT).await?;
    let markers = build_markers(&records);

    Ok(Json(serde_json::json!({
        "region": q.region,
        "markers": markers,
    })))
}
