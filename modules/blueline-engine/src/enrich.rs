//! LLM enrichment: one model call per new article, stub fallback on any
//! failure so ingestion never loses data.

use async_trait::async_trait;
use chrono::Utc;
use schemars::JsonSchema;
use serde::Deserialize;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use ai_client::util::truncate_to_char_boundary;
use ai_client::Claude;
use blueline_common::{
    Config, CrimeCategory, EnrichedIncident, Entity, EntityType, NewRawArticle, Severity, Source,
};

/// Bumping this re-opens every article to operator-driven replay; the refresh
/// path itself never re-enriches.
pub const PROMPT_VERSION: &str = "v1";

/// Prompt budget for article bodies.
const BODY_BUDGET_BYTES: usize = 8_000;

/// Provider-side politeness: at most this many in-flight model calls.
const MAX_CONCURRENT_LLM: usize = 2;

const SYSTEM_PROMPT: &str = r#"You are an analyst turning police newsroom releases into structured incident records for a public-safety map.

Classify the release into exactly these fields:
- severity: one of LOW, MEDIUM, HIGH, CRITICAL. Property crime with no suspect contact is LOW or MEDIUM; violence, weapons, or an ongoing public risk is HIGH; an active threat to life is CRITICAL.
- summary_tactical: at most 200 characters, plain language, what happened and where.
- tags: short lowercase slugs (e.g. "vehicle-theft", "missing-person").
- entities: people, groups, and places named in the release. type is one of Person, Group, Location. Never invent names.
- location_label, lat, lng: the most specific place the release names, with coordinates only if you are confident.
- graph_cluster_key: a short slug grouping related incidents (e.g. "surrey-vehicle-thefts"), or null.
- crime_category: one of Violent Crime, Property Crime, Traffic Incident, Drug Offense, Sexual Offense, Cybercrime, Public Safety, Other, Unknown.
- temporal_context, weapon_involved, tactical_advice: short strings, or null when the release says nothing.

Use only what the release states. Prefer null over guessing."#;

/// What the model must return. Strings here, domains enforced afterwards —
/// an out-of-domain severity or category rejects the whole response.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
struct LlmIncident {
    /// "LOW", "MEDIUM", "HIGH", or "CRITICAL"
    severity: String,
    /// At most ~200 characters
    summary_tactical: String,
    tags: Vec<String>,
    entities: Vec<LlmEntity>,
    location_label: Option<String>,
    lat: Option<f64>,
    lng: Option<f64>,
    graph_cluster_key: Option<String>,
    /// One of the closed crime-category set
    crime_category: String,
    temporal_context: Option<String>,
    weapon_involved: Option<String>,
    tactical_advice: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
struct LlmEntity {
    /// "Person", "Group", or "Location"
    #[serde(rename = "type")]
    entity_type: String,
    name: String,
}

#[async_trait]
pub trait Enricher: Send + Sync {
    /// Produce the enrichment for a freshly inserted article. Infallible by
    /// contract: unrecoverable LLM errors degrade to the stub record.
    async fn enrich(
        &self,
        article_id: i64,
        article: &NewRawArticle,
        source: &Source,
    ) -> EnrichedIncident;

    fn model_label(&self) -> &str;

    fn prompt_version(&self) -> &str;
}

/// Claude-backed enricher.
pub struct LlmEnricher {
    claude: Claude,
    model_label: String,
    semaphore: Semaphore,
}

impl LlmEnricher {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            claude: Claude::new(api_key, model),
            model_label: format!("anthropic:{model}"),
            semaphore: Semaphore::new(MAX_CONCURRENT_LLM),
        }
    }

    fn build_user_prompt(article: &NewRawArticle, source: &Source) -> String {
        let published = article
            .published_at
            .map(|d| d.to_rfc3339())
            .unwrap_or_else(|| "unknown".to_string());
        let body = truncate_to_char_boundary(&article.body_raw, BODY_BUDGET_BYTES);

        format!(
            "Agency: {agency}\nRegion: {region}\nPublished: {published}\nTitle: {title}\n\n{body}",
            agency = source.agency_name,
            region = source.region_label,
            title = article.title_raw,
        )
    }
}

#[async_trait]
impl Enricher for LlmEnricher {
    async fn enrich(
        &self,
        article_id: i64,
        article: &NewRawArticle,
        source: &Source,
    ) -> EnrichedIncident {
        let _permit = match self.semaphore.acquire().await {
            Ok(p) => p,
            Err(_) => {
                warn!(article_id, "LLM semaphore closed, using stub enrichment");
                return EnrichedIncident::stub(article_id, &article.body_raw, Utc::now());
            }
        };

        let user_prompt = Self::build_user_prompt(article, source);

        let response: LlmIncident = match self.claude.extract(SYSTEM_PROMPT, &user_prompt).await {
            Ok(r) => r,
            Err(e) => {
                warn!(
                    article_id,
                    url = %article.url,
                    error = %e,
                    "LLM call failed, using stub enrichment"
                );
                return EnrichedIncident::stub(article_id, &article.body_raw, Utc::now());
            }
        };

        match validate(response, article_id, &self.model_label) {
            Ok(incident) => incident,
            Err((reason, raw)) => {
                warn!(
                    article_id,
                    url = %article.url,
                    reason = %reason,
                    response = ?raw,
                    "LLM response failed validation, using stub enrichment"
                );
                EnrichedIncident::stub(article_id, &article.body_raw, Utc::now())
            }
        }
    }

    fn model_label(&self) -> &str {
        &self.model_label
    }

    fn prompt_version(&self) -> &str {
        PROMPT_VERSION
    }
}

/// Domain validation. Unknown entity types are dropped with a warning; an
/// out-of-domain severity or category fails the whole response.
fn validate(
    response: LlmIncident,
    article_id: i64,
    model_label: &str,
) -> Result<EnrichedIncident, (String, LlmIncident)> {
    let severity: Severity = match response.severity.parse() {
        Ok(s) => s,
        Err(e) => return Err((e, response)),
    };
    let crime_category: CrimeCategory = match response.crime_category.parse() {
        Ok(c) => c,
        Err(e) => return Err((e, response)),
    };

    let entities: Vec<Entity> = response
        .entities
        .iter()
        .filter_map(|e| match e.entity_type.parse::<EntityType>() {
            Ok(entity_type) => Some(Entity {
                entity_type,
                name: e.name.trim().to_string(),
            }),
            Err(_) => {
                warn!(
                    article_id,
                    entity_type = e.entity_type,
                    name = e.name,
                    "Dropping entity with unknown type"
                );
                None
            }
        })
        .filter(|e| !e.name.is_empty())
        .collect();

    let summary_tactical: String = response.summary_tactical.chars().take(200).collect();

    Ok(EnrichedIncident {
        id: article_id,
        severity,
        summary_tactical,
        tags: response.tags.clone(),
        entities,
        location_label: response.location_label.clone(),
        lat: response.lat,
        lng: response.lng,
        graph_cluster_key: response.graph_cluster_key.clone(),
        crime_category,
        temporal_context: response.temporal_context.clone(),
        weapon_involved: response.weapon_involved.clone(),
        tactical_advice: response.tactical_advice.clone(),
        llm_model: model_label.to_string(),
        prompt_version: PROMPT_VERSION.to_string(),
        processed_at: Utc::now(),
    })
}

/// Enricher used when no LLM credentials are configured.
#[derive(Default)]
pub struct StubEnricher;

#[async_trait]
impl Enricher for StubEnricher {
    async fn enrich(
        &self,
        article_id: i64,
        article: &NewRawArticle,
        _source: &Source,
    ) -> EnrichedIncident {
        EnrichedIncident::stub(article_id, &article.body_raw, Utc::now())
    }

    fn model_label(&self) -> &str {
        "none"
    }

    fn prompt_version(&self) -> &str {
        "stub_v1"
    }
}

/// Pick the enricher for the current configuration.
pub fn build_enricher(config: &Config) -> std::sync::Arc<dyn Enricher> {
    if config.enrichment_enabled() {
        info!(model = config.llm_model, "LLM enrichment enabled");
        std::sync::Arc::new(LlmEnricher::new(&config.llm_api_key, &config.llm_model))
    } else {
        info!("No LLM_API_KEY configured, stub enrichment only");
        std::sync::Arc::new(StubEnricher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn llm_response() -> LlmIncident {
        LlmIncident {
            severity: "HIGH".to_string(),
            summary_tactical: "Armed robbery at a gas station on King George Blvd.".to_string(),
            tags: vec!["robbery".to_string()],
            entities: vec![
                LlmEntity {
                    entity_type: "Person".to_string(),
                    name: "John Doe".to_string(),
                },
                LlmEntity {
                    entity_type: "Vehicle".to_string(),
                    name: "white sedan".to_string(),
                },
            ],
            location_label: Some("Whalley".to_string()),
            lat: Some(49.19),
            lng: Some(-122.85),
            graph_cluster_key: Some("surrey-robberies".to_string()),
            crime_category: "Violent Crime".to_string(),
            temporal_context: None,
            weapon_involved: Some("handgun".to_string()),
            tactical_advice: None,
        }
    }

    #[test]
    fn validate_accepts_well_formed_response() {
        let incident = validate(llm_response(), 9, "anthropic:test-model").unwrap();
        assert_eq!(incident.id, 9);
        assert_eq!(incident.severity, Severity::High);
        assert_eq!(incident.crime_category, CrimeCategory::ViolentCrime);
        // The "Vehicle" entity is dropped, the valid one kept.
        assert_eq!(incident.entities.len(), 1);
        assert_eq!(incident.entities[0].entity_type, EntityType::Person);
        assert_eq!(incident.llm_model, "anthropic:test-model");
        assert_eq!(incident.prompt_version, PROMPT_VERSION);
    }

    #[test]
    fn validate_rejects_out_of_domain_severity() {
        let mut response = llm_response();
        response.severity = "EXTREME".to_string();
        assert!(validate(response, 1, "m").is_err());
    }

    #[test]
    fn validate_rejects_open_crime_category() {
        let mut response = llm_response();
        response.crime_category = "Mischief".to_string();
        assert!(validate(response, 1, "m").is_err());
    }

    #[test]
    fn validate_caps_summary_length() {
        let mut response = llm_response();
        response.summary_tactical = "x".repeat(500);
        let incident = validate(response, 1, "m").unwrap();
        assert_eq!(incident.summary_tactical.chars().count(), 200);
    }

    #[tokio::test]
    async fn stub_enricher_emits_stub_provenance() {
        let article = NewRawArticle {
            source_id: 1,
            external_id: "abc".to_string(),
            url: "https://pd.example/news/1".to_string(),
            title_raw: "Title".to_string(),
            body_raw: "Body text of the release.".to_string(),
            published_at: None,
            raw_html: None,
        };
        let source = Source {
            id: 1,
            agency_name: "Test PD".to_string(),
            jurisdiction: "BC".to_string(),
            region_label: "R".to_string(),
            source_type: "municipal".to_string(),
            base_url: "https://pd.example/news".to_string(),
            parser_id: "municipal_list".to_string(),
            active: true,
            use_browser: false,
            last_checked_at: None,
        };

        let incident = StubEnricher.enrich(4, &article, &source).await;
        assert_eq!(incident.id, 4);
        assert_eq!(incident.severity, Severity::Medium);
        assert_eq!(incident.llm_model, "none");
        assert_eq!(incident.prompt_version, "stub_v1");
        assert_eq!(incident.summary_tactical, "Body text of the release.");
    }
}
