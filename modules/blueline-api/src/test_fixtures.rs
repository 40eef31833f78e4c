//! Shared fixtures for view/graph tests.

use chrono::{TimeZone, Utc};

use blueline_common::{
    CrimeCategory, EnrichedIncident, Entity, EntityType, IncidentRecord, RawArticle, Severity,
    Source,
};

pub fn record(id: i64, region: &str, cluster: Option<&str>) -> IncidentRecord {
    let published = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();

    IncidentRecord {
        source: Source {
            id: 1,
            agency_name: "Surrey RCMP".to_string(),
            jurisdiction: "BC".to_string(),
            region_label: region.to_string(),
            source_type: "rcmp_detachment".to_string(),
            base_url: "https://pd.example/newsroom".to_string(),
            parser_id: "rcmp".to_string(),
            active: true,
            use_browser: false,
            last_checked_at: None,
        },
        article: RawArticle {
            id,
            source_id: 1,
            external_id: format!("ext-{id}"),
            url: format!("https://pd.example/news/{id}"),
            title_raw: format!("Release {id}"),
            body_raw: "Officers responded to a report of theft.".to_string(),
            published_at: Some(published),
            raw_html: None,
            created_at: published,
        },
        incident: EnrichedIncident {
            id,
            severity: Severity::Medium,
            summary_tactical: format!("Theft reported, case {id}"),
            tags: vec!["theft".to_string()],
            entities: vec![
                Entity {
                    entity_type: EntityType::Person,
                    name: "John Doe".to_string(),
                },
                Entity {
                    entity_type: EntityType::Group,
                    name: "Surrey Gang Unit".to_string(),
                },
            ],
            location_label: Some("Whalley".to_string()),
            lat: Some(49.1),
            lng: Some(-122.8),
            graph_cluster_key: cluster.map(String::from),
            crime_category: CrimeCategory::PropertyCrime,
            temporal_context: None,
            weapon_involved: None,
            tactical_advice: None,
            llm_model: "none".to_string(),
            prompt_version: "stub_v1".to_string(),
            processed_at: published,
        },
    }
}
