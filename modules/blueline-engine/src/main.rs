//! Worker CLI: the operational entry points that don't need the HTTP server.

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use blueline_common::Config;
use blueline_engine::enrich::build_enricher;
use blueline_engine::fetcher::PageFetcher;
use blueline_engine::parsers::{ParserContext, ParserRegistry};
use blueline_engine::refresh::RefreshEngine;
use blueline_engine::seeds;
use blueline_engine::store::{IncidentStore, PgStore};
use browserless_client::BrowserlessClient;

#[derive(Parser)]
#[command(name = "blueline-engine", about = "Police newsroom ingestion worker")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upsert the configured source list into the store.
    SyncSources,
    /// Run one synchronous refresh for a region.
    Refresh {
        #[arg(long)]
        region: String,
    },
    /// Print the stored sources.
    ListSources {
        #[arg(long)]
        region: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("blueline=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::worker_from_env()?;
    config.log_redacted();

    let store = PgStore::connect(&config.database_url).await?;
    store.ensure_schema().await?;
    let store: Arc<dyn IncidentStore> = Arc::new(store);

    match cli.command {
        Command::SyncSources => {
            let seeds = seeds::load_seeds(&config)?;
            let written = store.sync_sources(&seeds).await?;
            info!(written, "Source sync complete");
        }
        Command::Refresh { region } => {
            let seeds = seeds::load_seeds(&config)?;
            store.sync_sources(&seeds).await?;

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

            let engine = RefreshEngine::new(store, registry, enricher);
            let summary = engine.refresh(&region).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::ListSources { region } => {
            let sources = match region {
                Some(ref r) => store.active_sources_for(r).await?,
                None => store.list_sources().await?,
            };
            for s in sources {
                println!(
                    "{:>4}  {:<40}  {:<24}  parser={:<14}  active={}  last_checked={}",
                    s.id,
                    s.agency_name,
                    s.region_label,
                    s.parser_id,
                    s.active,
                    s.last_checked_at
                        .map(|t| t.to_rfc3339())
                        .unwrap_or_else(|| "never".to_string()),
                );
            }
        }
    }

    Ok(())
}
