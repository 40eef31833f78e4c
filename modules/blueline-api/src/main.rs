use std::sync::Arc;

use anyhow::Result;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use blueline_common::Config;
use blueline_engine::enrich::build_enricher;
use blueline_engine::fetcher::PageFetcher;
use blueline_engine::jobs::JobRegistry;
use blueline_engine::parsers::{ParserContext, ParserRegistry};
use blueline_engine::refresh::RefreshEngine;
use blueline_engine::seeds;
use blueline_engine::store::{IncidentStore, PgStore};
use browserless_client::BrowserlessClient;

mod error;
mod graph;
mod rest;
mod views;

#[cfg(test)]
mod test_fixtures;

pub struct AppState {
    pub engine: Arc<RefreshEngine>,
    pub store: Arc<dyn IncidentStore>,
    pub jobs: JobRegistry,
    pub config: Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("blueline=info".parse()?),
        )
        .init();

    let config = Config::from_env()?;
    config.log_redacted();

    let pg = PgStore::connect(&config.database_url).await?;
    pg.ensure_schema().await?;
    let store: Arc<dyn IncidentStore> = Arc::new(pg);

    // Sync the configured source list on startup (upsert by base_url).
    let seeds = seeds::load_seeds(&config)?;
    let written = store.sync_sources(&seeds).await?;
    info!(written, "Source sync complete");

    let browserless = (!config.browserless_url.is_empty()).then(|| {
        BrowserlessClient::new(
            &config.browserless_url,
            (!config.browserless_token.is_empty())
                .then_some(config.browserless_token.as_str()),
        )
    });
    let fetcher = Arc::new(PageFetcher::new(browserless));
    let registry = ParserRegistry::new(ParserContext::new(fetcher));
    let enricher = build_enricher(&config);

    let engine = Arc::new(RefreshEngine::new(store.clone(), registry, enricher));
    let jobs = JobRegistry::new(store.clone());

    let state = Arc::new(AppState {
        engine,
        store,
        jobs,
        config: config.clone(),
    });

    if config.is_dev() {
        info!("ENV=dev: debug endpoints enabled");
    }

    let app = rest::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("{}:{}", config.web_host, config.web_port);
    info!(addr, "blueline-api listening");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
