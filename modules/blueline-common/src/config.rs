use std::env;

use crate::error::BluelineError;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Postgres
    pub database_url: String,

    // LLM enrichment. Empty key = stub enrichment only.
    pub llm_api_key: String,
    pub llm_model: String,

    // Headless rendering. Empty URL = degrade use_browser sources to direct HTTP.
    pub browserless_url: String,
    pub browserless_token: String,

    // Web server
    pub web_host: String,
    pub web_port: u16,

    // "dev" enables the debug endpoints.
    pub env: String,

    // Optional JSON file overriding the built-in source seed list.
    pub sources_path: Option<String>,
}

impl Config {
    /// Load configuration for the API server. Missing or malformed required
    /// vars surface as a `Config` error.
    pub fn from_env() -> Result<Self, BluelineError> {
        Ok(Self {
            database_url: required_env("DATABASE_URL")?,
            llm_api_key: env::var("LLM_API_KEY").unwrap_or_default(),
            llm_model: env::var("LLM_MODEL")
                .unwrap_or_else(|_| "claude-haiku-4-5-20251001".to_string()),
            browserless_url: env::var("BROWSERLESS_URL").unwrap_or_default(),
            browserless_token: env::var("BROWSERLESS_TOKEN").unwrap_or_default(),
            web_host: env::var("WEB_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            web_port: env::var("WEB_PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .map_err(|_| BluelineError::Config("WEB_PORT must be a number".to_string()))?,
            env: env::var("ENV").unwrap_or_else(|_| "prod".to_string()),
            sources_path: env::var("SOURCES_PATH").ok(),
        })
    }

    /// Load config for the worker CLI (no web server fields needed).
    pub fn worker_from_env() -> Result<Self, BluelineError> {
        Ok(Self {
            database_url: required_env("DATABASE_URL")?,
            llm_api_key: env::var("LLM_API_KEY").unwrap_or_default(),
            llm_model: env::var("LLM_MODEL")
                .unwrap_or_else(|_| "claude-haiku-4-5-20251001".to_string()),
            browserless_url: env::var("BROWSERLESS_URL").unwrap_or_default(),
            browserless_token: env::var("BROWSERLESS_TOKEN").unwrap_or_default(),
            web_host: String::new(),
            web_port: 0,
            env: env::var("ENV").unwrap_or_else(|_| "prod".to_string()),
            sources_path: env::var("SOURCES_PATH").ok(),
        })
    }

    pub fn is_dev(&self) -> bool {
        self.env == "dev"
    }

    pub fn enrichment_enabled(&self) -> bool {
        !self.llm_api_key.is_empty()
    }

    /// Log the length of each sensitive env var for debugging, never the value.
    pub fn log_redacted(&self) {
        let vars = [
            ("DATABASE_URL", &self.database_url),
            ("LLM_API_KEY", &self.llm_api_key),
            ("BROWSERLESS_URL", &self.browserless_url),
            ("BROWSERLESS_TOKEN", &self.browserless_token),
        ];
        for (name, value) in vars {
            if value.is_empty() {
                tracing::info!("{name} = (empty)");
            } else {
                tracing::info!("{name} = ({} chars)", value.len());
            }
        }
    }
}

fn required_env(key: &str) -> Result<String, BluelineError> {
    env::var(key)
        .map_err(|_| BluelineError::Config(format!("{key} environment variable is required")))
}
