//! The source config provider: a curated seed list of BC law-enforcement
//! newsrooms, overridable with a JSON file via `SOURCES_PATH`.

use anyhow::{Context, Result};
use tracing::info;

use blueline_common::{Config, SourceSeed};

fn seed(
    agency_name: &str,
    region_label: &str,
    source_type: &str,
    base_url: &str,
    parser_id: &str,
    use_browser: bool,
) -> SourceSeed {
    SourceSeed {
        agency_name: agency_name.to_string(),
        jurisdiction: "BC".to_string(),
        region_label: region_label.to_string(),
        source_type: source_type.to_string(),
        base_url: base_url.to_string(),
        parser_id: parser_id.to_string(),
        active: true,
        use_browser,
    }
}

/// Built-in seed list. RCMP detachment newsrooms are JS-rendered, so those
/// carry the browser hint.
pub fn builtin_seeds() -> Vec<SourceSeed> {
    vec![
        // Metro Vancouver
        seed(
            "Surrey RCMP",
            "Metro Vancouver, BC",
            "rcmp_detachment",
            "https://bc-cb.rcmp-grc.gc.ca/surrey/news",
            "rcmp",
            true,
        ),
        seed(
            "Richmond RCMP",
            "Metro Vancouver, BC",
            "rcmp_detachment",
            "https://bc-cb.rcmp-grc.gc.ca/richmond/news",
            "rcmp",
            true,
        ),
        seed(
            "Burnaby RCMP",
            "Metro Vancouver, BC",
            "rcmp_detachment",
            "https://bc-cb.rcmp-grc.gc.ca/burnaby/news",
            "rcmp",
            true,
        ),
        seed(
            "Coquitlam RCMP",
            "Metro Vancouver, BC",
            "rcmp_detachment",
            "https://bc-cb.rcmp-grc.gc.ca/coquitlam/news",
            "rcmp",
            true,
        ),
        seed(
            "Vancouver Police Department",
            "Metro Vancouver, BC",
            "municipal_pd",
            "https://vpd.ca/news/",
            "wordpress",
            false,
        ),
        seed(
            "Delta Police Department",
            "Metro Vancouver, BC",
            "municipal_pd",
            "https://deltapolice.ca/news/",
            "wordpress",
            false,
        ),
        seed(
            "New Westminster Police Department",
            "Metro Vancouver, BC",
            "municipal_pd",
            "https://www.nwpolice.org/news/",
            "wordpress",
            false,
        ),
        // Fraser Valley
        seed(
            "Langley RCMP",
            "Fraser Valley, BC",
            "rcmp_detachment",
            "https://bc-cb.rcmp-grc.gc.ca/langley/news",
            "rcmp",
            true,
        ),
        seed(
            "Mission RCMP",
            "Fraser Valley, BC",
            "rcmp_detachment",
            "https://bc-cb.rcmp-grc.gc.ca/mission/news",
            "rcmp",
            true,
        ),
        seed(
            "Chilliwack RCMP",
            "Fraser Valley, BC",
            "rcmp_detachment",
            "https://bc-cb.rcmp-grc.gc.ca/chilliwack/news",
            "rcmp",
            true,
        ),
        seed(
            "Abbotsford Police Department",
            "Fraser Valley, BC",
            "municipal_pd",
            "https://www.abbypd.ca/news-releases",
            "municipal_list",
            false,
        ),
        // Vancouver Island
        seed(
            "Victoria Police Department",
            "Vancouver Island, BC",
            "municipal_pd",
            "https://vicpd.ca/news-releases/",
            "wordpress",
            false,
        ),
        seed(
            "Saanich Police Department",
            "Vancouver Island, BC",
            "municipal_pd",
            "https://www.saanichpolice.ca/news",
            "municipal_list",
            false,
        ),
    ]
}

/// Load the seed list: `SOURCES_PATH` JSON when set, the built-in list
/// otherwise.
pub fn load_seeds(config: &Config) -> Result<Vec<SourceSeed>> {
    match &config.sources_path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading SOURCES_PATH {path}"))?;
            let seeds: Vec<SourceSeed> =
                serde_json::from_str(&raw).with_context(|| format!("parsing {path}"))?;
            info!(path = %path, count = seeds.len(), "Loaded sources from file");
            Ok(seeds)
        }
        None => {
            let seeds = builtin_seeds();
            info!(count = seeds.len(), "Using built-in source list");
            Ok(seeds)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn builtin_seeds_have_unique_base_urls() {
        let seeds = builtin_seeds();
        let urls: HashSet<_> = seeds.iter().map(|s| s.base_url.as_str()).collect();
        assert_eq!(urls.len(), seeds.len());
    }

    #[test]
    fn builtin_seeds_use_known_parser_ids() {
        for s in builtin_seeds() {
            assert!(
                crate::parsers::Family::from_id(&s.parser_id).is_some(),
                "unknown parser_id {} for {}",
                s.parser_id,
                s.agency_name
            );
        }
    }

    #[test]
    fn rcmp_seeds_request_rendering() {
        for s in builtin_seeds() {
            if s.parser_id == "rcmp" {
                assert!(s.use_browser, "{} should set use_browser", s.agency_name);
            }
        }
    }
}
