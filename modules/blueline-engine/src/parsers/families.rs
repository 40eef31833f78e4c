//! The closed set of parser families.
//!
//! Each family shares the discover-filter-extract contract; they differ only
//! in which listing links count as articles and where article bodies live.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use super::html::{self, Container, GENERIC_CONTAINERS};

static NODE_PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/node/\d+").expect("valid regex"));

/// Path fragments that are never articles on blog-style or municipal sites.
const URL_BLACKLIST: &[&str] = &[
    "login",
    "signin",
    "sign-up",
    "subscribe",
    "privacy",
    "terms",
    "contact",
    "about",
    "careers",
    "category/",
    "/tag/",
    "archive",
    "search",
    "sitemap",
    "/feed",
    "/rss",
    "/page/",
    "share=",
    ".pdf",
    ".jpg",
    ".jpeg",
    ".png",
    ".gif",
];

/// Path fragments that mark a municipal page as news-like.
const NEWS_SEGMENTS: &[&str] = &["news", "release", "announcement", "media-room", "newsroom"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    /// RCMP detachment newsrooms. Listings are JS-rendered; articles live
    /// under `/news/` paths or Drupal `/node/<id>` aliases.
    Rcmp,
    /// Blog-style sites: article cards carry `<time>` elements, bodies live
    /// in `.entry-content`/`.post-content`.
    Wordpress,
    /// Municipal list/card layouts with news-like path segments.
    MunicipalList,
}

impl Family {
    pub const ALL: &'static [Family] = &[Family::Rcmp, Family::Wordpress, Family::MunicipalList];

    pub fn from_id(id: &str) -> Option<Family> {
        match id {
            "rcmp" => Some(Family::Rcmp),
            "wordpress" => Some(Family::Wordpress),
            "municipal_list" => Some(Family::MunicipalList),
            _ => None,
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            Family::Rcmp => "rcmp",
            Family::Wordpress => "wordpress",
            Family::MunicipalList => "municipal_list",
        }
    }

    /// Family URL filter. Candidates have already been resolved to absolute
    /// form; every family also requires the candidate to stay on the listing
    /// host.
    pub(crate) fn accepts(&self, candidate: &str, base: &Url) -> bool {
        let Ok(parsed) = Url::parse(candidate) else {
            return false;
        };
        if parsed.host_str() != base.host_str() {
            return false;
        }
        let path = parsed.path();
        let lower = candidate.to_lowercase();

        match self {
            Family::Rcmp => path.contains("/news/") || NODE_PATH_RE.is_match(path),
            Family::Wordpress => {
                path.len() > 1 && !URL_BLACKLIST.iter().any(|kw| lower.contains(kw))
            }
            Family::MunicipalList => {
                let news_like = NEWS_SEGMENTS.iter().any(|seg| lower.contains(seg));
                news_like && !URL_BLACKLIST.iter().any(|kw| lower.contains(kw))
            }
        }
    }

    /// Body extraction priority for article pages.
    pub(crate) fn body_containers(&self) -> &'static [Container] {
        match self {
            Family::Wordpress => &[
                Container::Class("entry-content"),
                Container::Class("post-content"),
                Container::Element("article"),
                Container::Element("main"),
                Container::Element("body"),
            ],
            Family::Rcmp | Family::MunicipalList => GENERIC_CONTAINERS,
        }
    }

    /// Narrow the listing page before link extraction. Blog themes wrap each
    /// card in `<article>`, which keeps sidebar and footer links out.
    pub(crate) fn scope_listing(&self, listing_html: &str) -> Option<String> {
        match self {
            Family::Wordpress => html::article_blocks(listing_html),
            Family::Rcmp | Family::MunicipalList => None,
        }
    }
}
