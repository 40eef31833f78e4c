//! Source parsers: discover articles on a listing page, fetch each article,
//! normalize to `NewRawArticle`.
//!
//! The family set is closed at build time; the registry only resolves string
//! ids onto it. Duplication is not the parser's problem — the store is
//! authoritative — so parsers emit everything past the watermark hint.

pub mod families;
pub mod html;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use url::Url;

use blueline_common::{canonicalize_url, stable_hash, BluelineError, NewRawArticle, Source};

use crate::fetcher::{FetchOptions, Fetcher, DEFAULT_USER_AGENT};
pub use families::Family;

/// Shared dependencies for all parsers.
pub struct ParserContext {
    pub fetcher: Arc<dyn Fetcher>,
    /// Polite pause between article fetches within one source. Fetches
    /// across sources may run in parallel; within a source they never do.
    pub article_delay: Duration,
    pub user_agent: String,
}

impl ParserContext {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            fetcher,
            article_delay: Duration::from_secs(1),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    pub fn with_article_delay(mut self, delay: Duration) -> Self {
        self.article_delay = delay;
        self
    }
}

/// A parser bound to one family. Cheap to construct per refresh.
pub struct Parser {
    family: Family,
    ctx: Arc<ParserContext>,
}

impl Parser {
    pub fn id(&self) -> &'static str {
        self.family.id()
    }

    /// Pure half of discovery: candidate article URLs this family accepts on
    /// an already-fetched listing page. Absolute, deduplicated, filtered.
    pub fn candidates(&self, listing_html: &str, base_url: &str) -> Vec<String> {
        let Ok(base) = Url::parse(base_url) else {
            warn!(base_url, "Unparseable base URL");
            return Vec::new();
        };
        let scoped = self.family.scope_listing(listing_html);
        let haystack = scoped.as_deref().unwrap_or(listing_html);

        html::extract_links(haystack, base_url)
            .into_iter()
            .filter(|u| u.as_str() != base_url)
            .filter(|u| self.family.accepts(u, &base))
            .collect()
    }

    /// Fetch the listing page and return the filtered candidates.
    /// A listing fetch failure aborts the whole source run.
    pub async fn discover(&self, source: &Source) -> Result<Vec<String>, BluelineError> {
        let options = self.fetch_options(source);
        let listing = self.ctx.fetcher.fetch(&source.base_url, &options).await?;
        Ok(self.candidates(&listing.body, &source.base_url))
    }

    /// Fetch everything new for this source. Output preserves listing order,
    /// which newsrooms keep newest-first. Individual article failures are
    /// skipped; enumeration stops early at the watermark hint.
    pub async fn fetch_new(
        &self,
        source: &Source,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<NewRawArticle>, BluelineError> {
        let candidates = self.discover(source).await?;
        info!(
            source = %source.agency_name,
            parser = self.id(),
            candidates = candidates.len(),
            "Listing discovered"
        );
        Ok(self.collect_articles(source, since, candidates).await)
    }

    async fn collect_articles(
        &self,
        source: &Source,
        since: Option<DateTime<Utc>>,
        candidates: Vec<String>,
    ) -> Vec<NewRawArticle> {
        let options = self.fetch_options(source);
        let mut articles = Vec::new();

        for (i, url) in candidates.iter().enumerate() {
            if i > 0 && !self.ctx.article_delay.is_zero() {
                tokio::time::sleep(self.ctx.article_delay).await;
            }

            let page = match self.ctx.fetcher.fetch(url, &options).await {
                Ok(p) => p,
                Err(e) => {
                    warn!(url = %url, error = %e, "Article fetch failed, skipping");
                    continue;
                }
            };

            let Some(title) = html::extract_title(&page.body) else {
                warn!(url = %url, "No title found, skipping article");
                continue;
            };
            let body = html::extract_body(&page.body, self.family.body_containers());
            if body.is_empty() {
                warn!(url = %url, "Empty body after extraction, skipping article");
                continue;
            }
            let published_at = html::extract_published(&page.body);

            if let (Some(published), Some(since)) = (published_at, since) {
                if published <= since {
                    debug!(url = %url, "Reached watermark, stopping enumeration");
                    break;
                }
            }

            let canonical = canonicalize_url(&page.final_url);
            let external_id = stable_hash(source.id, &canonical, &title);

            articles.push(NewRawArticle {
                source_id: source.id,
                external_id,
                url: canonical,
                title_raw: title,
                body_raw: body,
                published_at,
                raw_html: Some(page.body),
            });
        }

        articles
    }

    fn fetch_options(&self, source: &Source) -> FetchOptions {
        FetchOptions {
            use_browser: source.use_browser,
            user_agent: self.ctx.user_agent.clone(),
            ..Default::default()
        }
    }
}

/// Maps `parser_id` strings onto the closed family set.
pub struct ParserRegistry {
    ctx: Arc<ParserContext>,
}

impl ParserRegistry {
    pub fn new(ctx: ParserContext) -> Self {
        Self { ctx: Arc::new(ctx) }
    }

    pub fn get(&self, parser_id: &str) -> Result<Parser, BluelineError> {
        Family::from_id(parser_id)
            .map(|family| Parser {
                family,
                ctx: self.ctx.clone(),
            })
            .ok_or_else(|| BluelineError::UnknownParser(parser_id.to_string()))
    }

    pub fn known_ids(&self) -> Vec<&'static str> {
        Family::ALL.iter().map(|f| f.id()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockFetcher;

    fn registry_with(fetcher: Arc<MockFetcher>) -> ParserRegistry {
        ParserRegistry::new(
            ParserContext::new(fetcher).with_article_delay(Duration::ZERO),
        )
    }

    fn test_source(parser_id: &str, base_url: &str) -> Source {
        Source {
            id: 1,
            agency_name: "Test Detachment".to_string(),
            jurisdiction: "BC".to_string(),
            region_label: "Test Region, BC".to_string(),
            source_type: "rcmp_detachment".to_string(),
            base_url: base_url.to_string(),
            parser_id: parser_id.to_string(),
            active: true,
            use_browser: false,
            last_checked_at: None,
        }
    }

    #[test]
    fn registry_resolves_known_families() {
        let registry = registry_with(Arc::new(MockFetcher::new()));
        for id in ["rcmp", "wordpress", "municipal_list"] {
            assert_eq!(registry.get(id).unwrap().id(), id);
        }
        assert!(matches!(
            registry.get("usenet"),
            Err(BluelineError::UnknownParser(_))
        ));
    }

    #[tokio::test]
    async fn fetch_new_extracts_articles_in_listing_order() {
        let fetcher = Arc::new(MockFetcher::new());
        fetcher.stub(
            "https://pd.example/newsroom",
            r#"<a href="/news/alpha">A</a><a href="/news/beta">B</a>"#,
        );
        fetcher.stub(
            "https://pd.example/news/alpha",
            r#"<h1>Alpha headline</h1><time datetime="2025-06-02">Jun 2</time>
               <article><p>Alpha body text.</p></article>"#,
        );
        fetcher.stub(
            "https://pd.example/news/beta",
            r#"<h1>Beta headline</h1><time datetime="2025-06-01">Jun 1</time>
               <article><p>Beta body text.</p></article>"#,
        );

        let registry = registry_with(fetcher);
        let parser = registry.get("rcmp").unwrap();
        let source = test_source("rcmp", "https://pd.example/newsroom");

        let articles = parser.fetch_new(&source, None).await.unwrap();
        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].title_raw, "Alpha headline");
        assert_eq!(articles[1].title_raw, "Beta headline");
        assert_eq!(articles[0].body_raw, "Alpha body text.");
        assert_eq!(
            articles[0].external_id,
            blueline_common::stable_hash(1, "https://pd.example/news/alpha", "Alpha headline")
        );
        assert!(articles[0].raw_html.is_some());
    }

    #[tokio::test]
    async fn failed_article_fetch_is_skipped() {
        let fetcher = Arc::new(MockFetcher::new());
        fetcher.stub(
            "https://pd.example/newsroom",
            r#"<a href="/news/gone">X</a><a href="/news/here">Y</a>"#,
        );
        fetcher.fail("https://pd.example/news/gone", 500);
        fetcher.stub(
            "https://pd.example/news/here",
            "<h1>Still here</h1><article><p>Body.</p></article>",
        );

        let registry = registry_with(fetcher);
        let parser = registry.get("rcmp").unwrap();
        let source = test_source("rcmp", "https://pd.example/newsroom");

        let articles = parser.fetch_new(&source, None).await.unwrap();
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].title_raw, "Still here");
    }

    #[tokio::test]
    async fn listing_fetch_failure_aborts_the_source() {
        let fetcher = Arc::new(MockFetcher::new());
        fetcher.fail("https://pd.example/newsroom", 503);

        let registry = registry_with(fetcher);
        let parser = registry.get("rcmp").unwrap();
        let source = test_source("rcmp", "https://pd.example/newsroom");

        assert!(parser.fetch_new(&source, None).await.is_err());
    }

    #[tokio::test]
    async fn watermark_stops_enumeration_early() {
        let fetcher = Arc::new(MockFetcher::new());
        fetcher.stub(
            "https://pd.example/newsroom",
            r#"<a href="/news/new">N</a><a href="/news/old">O</a>"#,
        );
        fetcher.stub(
            "https://pd.example/news/new",
            r#"<h1>New item</h1><time datetime="2025-06-10T00:00:00Z">x</time>
               <article><p>New body.</p></article>"#,
        );
        fetcher.stub(
            "https://pd.example/news/old",
            r#"<h1>Old item</h1><time datetime="2025-01-01T00:00:00Z">x</time>
               <article><p>Old body.</p></article>"#,
        );

        let registry = registry_with(fetcher.clone());
        let parser = registry.get("rcmp").unwrap();
        let source = test_source("rcmp", "https://pd.example/newsroom");
        let since = html::parse_date("2025-05-01").unwrap();

        let articles = parser.fetch_new(&source, Some(since)).await.unwrap();
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].title_raw, "New item");
        // The old article page was fetched (to read its date) but nothing past it.
        assert!(fetcher.hits().contains(&"https://pd.example/news/old".to_string()));
    }
}
