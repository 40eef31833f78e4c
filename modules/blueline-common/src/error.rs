use thiserror::Error;

#[derive(Error, Debug)]
pub enum BluelineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown parser id: {0}")]
    UnknownParser(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("HTTP error {status} for {url}")]
    Http { status: u16, url: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Enrichment error: {0}")]
    Enrichment(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("No active sources for region: {0}")]
    NoActiveSources(String),

    #[error("Job not found")]
    JobNotFound,

    #[error("Illegal job transition: {0}")]
    JobTransition(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl BluelineError {
    /// Transient failures are retried by the fetcher; everything else
    /// surfaces to the caller.
    pub fn is_transient(&self) -> bool {
        match self {
            BluelineError::Network(_) | BluelineError::Timeout(_) => true,
            BluelineError::Http { status, .. } => {
                *status >= 500 || *status == 408 || *status == 429
            }
            _ => false,
        }
    }
}
