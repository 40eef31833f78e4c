pub mod debug;
pub mod incidents;
pub mod refresh;

use std::sync::Arc;

use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;

use crate::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        .route("/", get(health))
        .route("/api/refresh", post(refresh::refresh_sync))
        .route("/api/refresh-async", post(refresh::refresh_async))
        .route("/api/refresh-status/{job_id}", get(refresh::refresh_status))
        .route("/api/incidents", get(incidents::list))
        .route("/api/graph", get(incidents::graph))
        .route("/api/map", get(incidents::map));

    if state.config.is_dev() {
        router = router
            .route("/api/debug/candidates", get(debug::candidates))
            .route("/api/debug/enrichment-check", get(debug::enrichment_check));
    }

    router.with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "service": "blueline-api",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "ok",
    }))
}
