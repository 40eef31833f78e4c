pub mod config;
pub mod error;
pub mod fingerprint;
pub mod types;

pub use config::Config;
pub use error::BluelineError;
pub use fingerprint::{canonicalize_url, stable_hash};
pub use types::*;
