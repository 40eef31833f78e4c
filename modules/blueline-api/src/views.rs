//! Wire projections for the front end. Field names are part of the contract;
//! everything here serializes camelCase.

use std::collections::HashMap;

use serde::Serialize;

use blueline_common::{Entity, IncidentRecord, RefreshJob};

#[derive(Debug, Serialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentView {
    pub id: i64,
    /// Publication time, falling back to scrape time.
    pub timestamp: String,
    /// Coarse source category tag.
    pub source: String,
    pub agency_name: String,
    pub location: Option<String>,
    pub coordinates: Option<Coordinates>,
    pub summary: String,
    pub full_text: String,
    /// "Low" | "Medium" | "High" | "Critical"
    pub severity: String,
    pub tags: Vec<String>,
    pub entities: Vec<Entity>,
    pub related_incident_ids: Vec<i64>,
    pub source_url: String,
    pub crime_category: String,
    pub temporal_context: Option<String>,
    pub weapon_involved: Option<String>,
    pub tactical_advice: Option<String>,
}

/// Project the joined rows, filling `relatedIncidentIds` from shared
/// `graph_cluster_key` groups.
pub fn build_incident_views(records: &[IncidentRecord]) -> Vec<IncidentView> {
    let mut clusters: HashMap<&str, Vec<i64>> = HashMap::new();
    for record in records {
        if let Some(key) = record.incident.graph_cluster_key.as_deref() {
            clusters.entry(key).or_default().push(record.incident.id);
        }
    }

    records
        .iter()
        .map(|record| {
            let incident = &record.incident;
            let related_incident_ids = incident
                .graph_cluster_key
                .as_deref()
                .and_then(|key| clusters.get(key))
                .map(|ids| {
                    ids.iter()
                        .copied()
                        .filter(|id| *id != incident.id)
                        .collect()
                })
                .unwrap_or_default();

            let coordinates = match (incident.lat, incident.lng) {
                (Some(lat), Some(lng)) => Some(Coordinates { lat, lng }),
                _ => None,
            };

            IncidentView {
                id: incident.id,
                timestamp: record
                    .article
                    .published_at
                    .unwrap_or(record.article.created_at)
                    .to_rfc3339(),
                source: record.source.source_type.clone(),
                agency_name: record.source.agency_name.clone(),
                location: incident.location_label.clone(),
                coordinates,
                summary: incident.summary_tactical.clone(),
                full_text: record.article.body_raw.clone(),
                severity: incident.severity.wire_label().to_string(),
                tags: incident.tags.clone(),
                entities: incident.entities.clone(),
                related_incident_ids,
                source_url: record.article.url.clone(),
                crime_category: incident.crime_category.as_str().to_string(),
                temporal_context: incident.temporal_context.clone(),
                weapon_involved: incident.weapon_involved.clone(),
                tactical_advice: incident.tactical_advice.clone(),
            }
        })
        .collect()
}

/// Full projection of a refresh job for the polling endpoint.
#[derive(Debug, Serialize)]
pub struct JobView {
    pub job_id: String,
    pub region: String,
    pub status: String,
    pub new_articles: Option<i64>,
    pub total_incidents: Option<i64>,
    pub error_message: Option<String>,
    pub created_at: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
}

impl From<&RefreshJob> for JobView {
    fn from(job: &RefreshJob) -> Self {
        JobView {
            job_id: job.job_id.to_string(),
            region: job.region.clone(),
            status: job.status.to_string(),
            new_articles: job.new_articles,
            total_incidents: job.total_incidents,
            error_message: job.error_message.clone(),
            created_at: job.created_at.to_rfc3339(),
            started_at: job.started_at.map(|t| t.to_rfc3339()),
            completed_at: job.completed_at.map(|t| t.to_rfc3339()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::record;

    #[test]
    fn incident_view_serializes_camel_case_wire_shape() {
        let records = vec![record(1, "Fraser Valley, BC", None)];
        let views = build_incident_views(&records);
        let json = serde_json::to_value(&views[0]).unwrap();

        for key in [
            "id",
            "timestamp",
            "source",
            "agencyName",
            "location",
            "coordinates",
            "summary",
            "fullText",
            "severity",
            "tags",
            "entities",
            "relatedIncidentIds",
            "sourceUrl",
            "crimeCategory",
            "temporalContext",
            "weaponInvolved",
            "tacticalAdvice",
        ] {
            assert!(json.get(key).is_some(), "missing wire field {key}");
        }
        assert_eq!(json["severity"], "Medium");
        assert_eq!(json["coordinates"]["lat"], 49.1);
    }

    #[test]
    fn related_ids_come_from_shared_cluster_keys() {
        let records = vec![
            record(1, "R", Some("surrey-thefts")),
            record(2, "R", Some("surrey-thefts")),
            record(3, "R", Some("other")),
            record(4, "R", None),
        ];
        let views = build_incident_views(&records);

        assert_eq!(views[0].related_incident_ids, vec![2]);
        assert_eq!(views[1].related_incident_ids, vec![1]);
        assert!(views[2].related_incident_ids.is_empty());
        assert!(views[3].related_incident_ids.is_empty());
    }
}
