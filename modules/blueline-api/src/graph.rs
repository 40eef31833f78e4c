//! Pure derivations for the graph and map views. Nodes and links are built
//! per request and discarded; nothing here touches the store.

use std::collections::HashSet;

use serde::Serialize;

use blueline_common::IncidentRecord;

#[derive(Debug, Serialize)]
pub struct GraphNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GraphLink {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub link_type: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapMarker {
    pub id: i64,
    pub lat: f64,
    pub lng: f64,
    pub severity: String,
    pub summary: String,
    pub agency_name: String,
    pub source_url: String,
    pub timestamp: String,
}

fn slugify(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// One node per incident, one per distinct entity name, one per distinct
/// location label; `involved` and `occurred_at` edges.
pub fn build_graph(records: &[IncidentRecord]) -> (Vec<GraphNode>, Vec<GraphLink>) {
    let mut nodes = Vec::new();
    let mut links = Vec::new();
    let mut seen_entities = HashSet::new();
    let mut seen_locations = HashSet::new();

    for record in records {
        let incident = &record.incident;
        let incident_id = format!("incident-{}", incident.id);

        nodes.push(GraphNode {
            id: incident_id.clone(),
            node_type: "incident".to_string(),
            label: incident.summary_tactical.clone(),
            severity: Some(incident.severity.wire_label().to_string()),
            cluster: incident.graph_cluster_key.clone(),
        });

        for entity in &incident.entities {
            let entity_id = format!("entity-{}", slugify(&entity.name));
            if seen_entities.insert(entity_id.clone()) {
                nodes.push(GraphNode {
                    id: entity_id.clone(),
                    node_type: entity.entity_type.as_str().to_lowercase(),
                    label: entity.name.clone(),
                    severity: None,
                    cluster: None,
                });
            }
            links.push(GraphLink {
                source: incident_id.clone(),
                target: entity_id,
                link_type: "involved".to_string(),
            });
        }

        if let Some(location) = incident.location_label.as_deref() {
            let location_id = format!("location-{}", slugify(location));
            if seen_locations.insert(location_id.clone()) {
                nodes.push(GraphNode {
                    id: location_id.clone(),
                    node_type: "location".to_string(),
                    label: location.to_string(),
                    severity: None,
                    cluster: None,
                });
            }
            links.push(GraphLink {
                source: incident_id.clone(),
                target: location_id,
                link_type: "occurred_at".to_string(),
            });
        }
    }

    (nodes, links)
}

/// Marker records for incidents that carry coordinates.
pub fn build_markers(records: &[IncidentRecord]) -> Vec<MapMarker> {
    records
        .iter()
        .filter_map(|record| {
            let incident = &record.incident;
            let (lat, lng) = match (incident.lat, incident.lng) {
                (Some(lat), Some(lng)) => (lat, lng),
                _ => return None,
            };
            Some(MapMarker {
                id: incident.id,
                lat,
                lng,
                severity: incident.severity.wire_label().to_string(),
                summary: incident.summary_tactical.clone(),
                agency_name: record.source.agency_name.clone(),
                source_url: record.article.url.clone(),
                timestamp: record
                    .article
                    .published_at
                    .unwrap_or(record.article.created_at)
                    .to_rfc3339(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::record;

    #[test]
    fn graph_derives_nodes_and_links() {
        let records = vec![
            record(1, "R", Some("cluster-a")),
            record(2, "R", None),
        ];
        let (nodes, links) = build_graph(&records);

        // 2 incidents + 2 shared entities + 1 shared location.
        assert_eq!(nodes.len(), 5);
        let incident_nodes: Vec<_> = nodes.iter().filter(|n| n.node_type == "incident").collect();
        assert_eq!(incident_nodes.len(), 2);
        assert_eq!(incident_nodes[0].cluster.as_deref(), Some("cluster-a"));

        // Each incident links to both entities and the location.
        assert_eq!(links.len(), 6);
        assert!(links
            .iter()
            .any(|l| l.source == "incident-1" && l.link_type == "involved"));
        assert!(links
            .iter()
            .any(|l| l.source == "incident-2"
                && l.target == "location-whalley"
                && l.link_type == "occurred_at"));
    }

    #[test]
    fn entity_nodes_are_deduplicated_by_name() {
        let records = vec![record(1, "R", None), record(2, "R", None)];
        let (nodes, _) = build_graph(&records);
        let person_nodes: Vec<_> = nodes.iter().filter(|n| n.node_type == "person").collect();
        assert_eq!(person_nodes.len(), 1);
        assert_eq!(person_nodes[0].id, "entity-john-doe");
    }

    #[test]
    fn markers_require_coordinates() {
        let mut with = record(1, "R", None);
        with.incident.lat = Some(49.2);
        with.incident.lng = Some(-122.9);
        let mut without = record(2, "R", None);
        without.incident.lat = None;
        without.incident.lng = None;

        let markers = build_markers(&[with, without]);
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].id, 1);
        assert_eq!(markers[0].severity, "Medium");
    }

    #[test]
    fn slugify_collapses_punctuation() {
        assert_eq!(slugify("John Doe"), "john-doe");
        assert_eq!(slugify("King George Blvd."), "king-george-blvd");
        assert_eq!(slugify("  Whalley  "), "whalley");
    }
}
