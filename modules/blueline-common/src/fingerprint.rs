//! Deterministic article fingerprinting.
//!
//! The fingerprint must be stable across processes and languages, so it is a
//! plain SHA-256 over a fixed field layout. Never use `DefaultHasher` here
//! (HashDoS randomization makes it process-local).

use sha2::{Digest, Sha256};
use url::Url;

/// Canonical URL form used for fingerprinting.
///
/// Rule: lowercase scheme and host, drop the fragment, drop a trailing slash
/// on a non-root path, keep the query string (query strings distinguish
/// articles on some municipal CMSes). Unparseable input canonicalizes to
/// itself, trimmed.
pub fn canonicalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let Ok(mut parsed) = Url::parse(trimmed) else {
        return trimmed.to_string();
    };
    parsed.set_fragment(None);

    let scheme = parsed.scheme().to_lowercase();
    let host = parsed.host_str().unwrap_or("").to_lowercase();
    let port = parsed
        .port()
        .map(|p| format!(":{p}"))
        .unwrap_or_default();

    let mut path = parsed.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        path.pop();
    }

    let query = parsed
        .query()
        .map(|q| format!("?{q}"))
        .unwrap_or_default();

    format!("{scheme}://{host}{port}{path}{query}")
}

/// Deterministic fingerprint of one article within one source:
/// hex-encoded SHA-256 over `(source_id, canonical_url, title)`.
pub fn stable_hash(source_id: i64, canonical_url: &str, title: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source_id.to_string().as_bytes());
    hasher.update(b"\n");
    hasher.update(canonical_url.as_bytes());
    hasher.update(b"\n");
    hasher.update(title.as_bytes());
    hex::encode(hasher.finalize())
}
