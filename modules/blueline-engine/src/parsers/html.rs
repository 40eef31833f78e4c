//! Regex-based HTML extraction shared by every parser family.
//!
//! Newsroom pages are too messy for strict parsing; these helpers pull out
//! links, titles, dates, and readable body text and tolerate broken markup.

use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use url::Url;

static HREF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"href\s*=\s*["']([^"']+)["']"#).expect("valid regex"));

static BLOCK_STRIP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)<script\b.*?</script>|<style\b.*?</style>|<nav\b.*?</nav>|<header\b.*?</header>|<footer\b.*?</footer>|<noscript\b.*?</noscript>",
    )
    .expect("valid regex")
});

static COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("valid regex"));

static PARA_BREAK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</(p|h[1-6]|li|div|tr)>|<br\s*/?>").expect("valid regex")
});

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));

static H1_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<h1[^>]*>(.*?)</h1>").expect("valid regex"));

static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("valid regex"));

static OG_TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta[^>]*property\s*=\s*["']og:title["'][^>]*content\s*=\s*["']([^"']+)["']"#)
        .expect("valid regex")
});

static OG_TITLE_REV_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta[^>]*content\s*=\s*["']([^"']+)["'][^>]*property\s*=\s*["']og:title["']"#)
        .expect("valid regex")
});

static TIME_DATETIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<time[^>]*datetime\s*=\s*["']([^"']+)["']"#).expect("valid regex")
});

static TIME_TEXT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<time[^>]*>(.*?)</time>").expect("valid regex"));

static META_PUBLISHED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)<meta[^>]*(?:property|name)\s*=\s*["'](?:article:published_time|date|pubdate)["'][^>]*content\s*=\s*["']([^"']+)["']"#,
    )
    .expect("valid regex")
});

static ARTICLE_BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<article\b[^>]*>.*?</article>").expect("valid regex"));

static ORDINAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d)(?:st|nd|rd|th)\b").expect("valid regex"));

static MONTH_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:January|February|March|April|May|June|July|August|September|October|November|December)\s+\d{1,2},?\s+\d{4}",
    )
    .expect("valid regex")
});

static ISO_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{4}-\d{2}-\d{2}\b").expect("valid regex"));

/// Where to look for article body text, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    Element(&'static str),
    Class(&'static str),
}

/// The generic fallback priority: `<article>` → `<main>` → content classes →
/// `<body>`.
pub const GENERIC_CONTAINERS: &[Container] = &[
    Container::Element("article"),
    Container::Element("main"),
    Container::Class("content"),
    Container::Class("post-content"),
    Container::Class("entry-content"),
    Container::Element("body"),
];

/// Extract all link targets from a page, resolved to absolute http(s) URLs,
/// deduplicated in document order.
pub fn extract_links(html: &str, base_url: &str) -> Vec<String> {
    let base = Url::parse(base_url).ok();

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for cap in HREF_RE.captures_iter(html) {
        let raw = cap[1].trim();
        if raw.is_empty()
            || raw.starts_with('#')
            || raw.starts_with("mailto:")
            || raw.starts_with("tel:")
            || raw.starts_with("javascript:")
        {
            continue;
        }

        let resolved = if raw.starts_with("http://") || raw.starts_with("https://") {
            raw.to_string()
        } else if let Some(ref b) = base {
            match b.join(raw) {
                Ok(u) => u.to_string(),
                Err(_) => continue,
            }
        } else {
            continue;
        };

        if !resolved.starts_with("http://") && !resolved.starts_with("https://") {
            continue;
        }

        if seen.insert(resolved.clone()) {
            links.push(resolved);
        }
    }

    links
}

/// Concatenated `<article>` card blocks, if the listing uses them.
pub fn article_blocks(html: &str) -> Option<String> {
    let blocks: Vec<&str> = ARTICLE_BLOCK_RE
        .find_iter(html)
        .map(|m| m.as_str())
        .collect();
    if blocks.is_empty() {
        None
    } else {
        Some(blocks.join("\n"))
    }
}

/// Page title: first `<h1>`, then `og:title`, then `<title>`.
pub fn extract_title(html: &str) -> Option<String> {
    if let Some(cap) = H1_RE.captures(html) {
        let text = strip_tags(&cap[1]);
        if !text.is_empty() {
            return Some(text);
        }
    }
    for re in [&*OG_TITLE_RE, &*OG_TITLE_REV_RE] {
        if let Some(cap) = re.captures(html) {
            let text = decode_entities(cap[1].trim());
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    if let Some(cap) = TITLE_RE.captures(html) {
        let text = strip_tags(&cap[1]);
        if !text.is_empty() {
            return Some(text);
        }
    }
    None
}

/// Readable body text from the first matching container in priority order.
/// Falls through to the next container when a match strips down to nothing.
pub fn extract_body(html: &str, containers: &[Container]) -> String {
    for container in containers {
        let fragment = match container {
            Container::Element(tag) => first_element(html, tag),
            Container::Class(class) => first_class_block(html, class),
        };
        if let Some(fragment) = fragment {
            let text = strip_tags(&fragment);
            if !text.is_empty() {
                return text;
            }
        }
    }
    strip_tags(html)
}

fn first_element(html: &str, tag: &str) -> Option<String> {
    let re = Regex::new(&format!(r"(?is)<{tag}\b[^>]*>(.*?)</{tag}>")).ok()?;
    re.captures(html).map(|cap| cap[1].to_string())
}

fn first_class_block(html: &str, class: &str) -> Option<String> {
    let escaped = regex::escape(class);
    for tag in ["div", "section", "article", "main"] {
        let re = Regex::new(&format!(
            r#"(?is)<{tag}\b[^>]*class\s*=\s*["'][^"']*{escaped}[^"']*["'][^>]*>(.*?)</{tag}>"#
        ))
        .ok()?;
        if let Some(cap) = re.captures(html) {
            return Some(cap[1].to_string());
        }
    }
    None
}

/// Best-effort publication timestamp: `<time datetime>`, publish meta tags,
/// `<time>` text, then a date pattern near the top of the visible text.
pub fn extract_published(html: &str) -> Option<DateTime<Utc>> {
    if let Some(cap) = TIME_DATETIME_RE.captures(html) {
        if let Some(dt) = parse_date(&cap[1]) {
            return Some(dt);
        }
    }
    if let Some(cap) = META_PUBLISHED_RE.captures(html) {
        if let Some(dt) = parse_date(&cap[1]) {
            return Some(dt);
        }
    }
    if let Some(cap) = TIME_TEXT_RE.captures(html) {
        if let Some(dt) = parse_date(&strip_tags(&cap[1])) {
            return Some(dt);
        }
    }

    // Date-like text near the top of the page (detachment pages print the
    // release date under the headline).
    let text = strip_tags(html);
    let head: String = text.chars().take(1500).collect();
    if let Some(m) = ISO_DATE_RE.find(&head) {
        if let Some(dt) = parse_date(m.as_str()) {
            return Some(dt);
        }
    }
    if let Some(m) = MONTH_DATE_RE.find(&head) {
        if let Some(dt) = parse_date(m.as_str()) {
            return Some(dt);
        }
    }
    None
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%B %d, %Y %H:%M",
    "%b %d, %Y %H:%M",
];

const OFFSET_DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%z", "%Y-%m-%d %H:%M:%S %z"];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
    "%m/%d/%Y",
    "%A, %B %d, %Y",
];

/// Parse a date string against the formats seen in the wild on newsroom
/// pages. Naive dates resolve to midnight UTC.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let cleaned = ORDINAL_RE.replace_all(raw.trim(), "$1");
    let s = cleaned.as_ref();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in OFFSET_DATETIME_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.and_utc());
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return d.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
        }
    }
    None
}

/// Strip chrome blocks and tags, decode common entities, collapse whitespace.
/// Block-level closers become line breaks so paragraphs stay separated.
pub fn strip_tags(fragment: &str) -> String {
    let no_comments = COMMENT_RE.replace_all(fragment, " ");
    let no_blocks = BLOCK_STRIP_RE.replace_all(&no_comments, " ");
    let with_breaks = PARA_BREAK_RE.replace_all(&no_blocks, "\n");
    let no_tags = TAG_RE.replace_all(&with_breaks, " ");
    let decoded = decode_entities(&no_tags);
    collapse_whitespace(&decoded)
}

fn decode_entities(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&rsquo;", "'")
        .replace("&lsquo;", "'")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
}

fn collapse_whitespace(s: &str) -> String {
    let mut lines = Vec::new();
    for line in s.lines() {
        let compact = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if !compact.is_empty() {
            lines.push(compact);
        }
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn extracts_absolute_and_relative_links() {
        let html = r##"
            <a href="/news/1">One</a>
            <a href="https://other.example/item">Two</a>
            <a href="/news/1">Dup</a>
            <a href="#top">Anchor</a>
            <a href="mailto:tips@pd.example">Mail</a>
        "##;
        let links = extract_links(html, "https://pd.example/newsroom");
        assert_eq!(
            links,
            vec![
                "https://pd.example/news/1".to_string(),
                "https://other.example/item".to_string(),
            ]
        );
    }

    #[test]
    fn title_prefers_h1_over_title_tag() {
        let html = "<title>Site | Newsroom</title><h1>Suspect <em>arrested</em></h1>";
        assert_eq!(extract_title(html).unwrap(), "Suspect arrested");
    }

    #[test]
    fn title_falls_back_to_og_then_title() {
        let html = r#"<meta property="og:title" content="Break and enter"><title>x</title>"#;
        assert_eq!(extract_title(html).unwrap(), "Break and enter");
        assert_eq!(extract_title("<title>Fallback</title>").unwrap(), "Fallback");
        assert!(extract_title("<p>nothing</p>").is_none());
    }

    #[test]
    fn body_priority_prefers_article() {
        let html = r#"
            <body>
              <nav>Menu Menu</nav>
              <article><p>The real story.</p></article>
              <div class="content">Sidebar junk</div>
            </body>
        "#;
        let body = extract_body(html, GENERIC_CONTAINERS);
        assert_eq!(body, "The real story.");
    }

    #[test]
    fn body_falls_through_to_class_container() {
        let html = r#"<body><div class="entry-content"><p>Post text here.</p></div></body>"#;
        let containers = &[
            Container::Class("entry-content"),
            Container::Element("body"),
        ];
        assert_eq!(extract_body(html, containers), "Post text here.");
    }

    #[test]
    fn body_strips_chrome_blocks() {
        let html = r#"
            <body>
              <script>var x = 1;</script>
              <header>Site header</header>
              <p>Visible text.</p>
              <footer>Copyright</footer>
            </body>
        "#;
        let body = extract_body(html, GENERIC_CONTAINERS);
        assert_eq!(body, "Visible text.");
    }

    #[test]
    fn strip_tags_decodes_entities_and_keeps_paragraphs() {
        let text = strip_tags("<p>One &amp; two</p><p>Three&nbsp;four</p>");
        assert_eq!(text, "One & two\nThree four");
    }

    #[test]
    fn article_blocks_scopes_to_cards() {
        let html = r#"
            <a href="/elsewhere">outside</a>
            <article><a href="/post-a">A</a></article>
            <article><a href="/post-b">B</a></article>
        "#;
        let scoped = article_blocks(html).unwrap();
        assert!(scoped.contains("/post-a"));
        assert!(scoped.contains("/post-b"));
        assert!(!scoped.contains("/elsewhere"));
        assert!(article_blocks("<div>no cards</div>").is_none());
    }

    #[test]
    fn parses_the_format_battery() {
        // At least ten distinct formats must parse.
        let samples = [
            "2025-06-01T12:30:00Z",
            "2025-06-01T12:30:00+00:00",
            "Sun, 01 Jun 2025 12:30:00 +0000",
            "2025-06-01T12:30:00",
            "2025-06-01 12:30:00",
            "2025-06-01 12:30",
            "2025-06-01",
            "2025/06/01",
            "June 1, 2025",
            "Jun 1, 2025",
            "1 June 2025",
            "1 Jun 2025",
            "06/01/2025",
            "Sunday, June 1, 2025",
        ];
        for s in samples {
            let parsed = parse_date(s);
            assert!(parsed.is_some(), "failed to parse: {s}");
            let dt = parsed.unwrap();
            assert_eq!(dt.date_naive().to_string(), "2025-06-01", "wrong date for {s}");
        }
    }

    #[test]
    fn parses_ordinal_dates() {
        let dt = parse_date("June 1st, 2025").unwrap();
        assert_eq!(dt.date_naive().to_string(), "2025-06-01");
        assert_eq!(dt.hour(), 0);
    }

    #[test]
    fn rejects_non_dates() {
        assert!(parse_date("").is_none());
        assert!(parse_date("not a date").is_none());
        assert!(parse_date("13/32/2025").is_none());
    }

    #[test]
    fn published_prefers_time_datetime() {
        let html = r#"
            <time datetime="2025-03-10T08:00:00Z">March 10</time>
            <meta property="article:published_time" content="2024-01-01T00:00:00Z">
        "#;
        let dt = extract_published(html).unwrap();
        assert_eq!(dt.date_naive().to_string(), "2025-03-10");
    }

    #[test]
    fn published_falls_back_to_visible_date() {
        let html = "<body><h1>Headline</h1><p>March 10, 2025</p><p>Body text</p></body>";
        let dt = extract_published(html).unwrap();
        assert_eq!(dt.date_naive().to_string(), "2025-03-10");
        assert!(extract_published("<body>no dates at all</body>").is_none());
    }
}
