use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Severity (closed domain, stored uppercase) ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Stored representation ("LOW" .. "CRITICAL").
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }

    /// Front-end wire label ("Low" .. "Critical").
    pub fn wire_label(&self) -> &'static str {
        match self {
            Severity::Low => "Low",
            Severity::Medium => "Medium",
            Severity::High => "High",
            Severity::Critical => "Critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "LOW" => Ok(Self::Low),
            "MEDIUM" => Ok(Self::Medium),
            "HIGH" => Ok(Self::High),
            "CRITICAL" => Ok(Self::Critical),
            other => Err(format!("unknown Severity: {other}")),
        }
    }
}

// --- Crime category (closed set, "Unknown" default) ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CrimeCategory {
    #[serde(rename = "Violent Crime")]
    ViolentCrime,
    #[serde(rename = "Property Crime")]
    PropertyCrime,
    #[serde(rename = "Traffic Incident")]
    TrafficIncident,
    #[serde(rename = "Drug Offense")]
    DrugOffense,
    #[serde(rename = "Sexual Offense")]
    SexualOffense,
    Cybercrime,
    #[serde(rename = "Public Safety")]
    PublicSafety,
    Other,
    #[default]
    Unknown,
}

impl CrimeCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            CrimeCategory::ViolentCrime => "Violent Crime",
            CrimeCategory::PropertyCrime => "Property Crime",
            CrimeCategory::TrafficIncident => "Traffic Incident",
            CrimeCategory::DrugOffense => "Drug Offense",
            CrimeCategory::SexualOffense => "Sexual Offense",
            CrimeCategory::Cybercrime => "Cybercrime",
            CrimeCategory::PublicSafety => "Public Safety",
            CrimeCategory::Other => "Other",
            CrimeCategory::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for CrimeCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for CrimeCategory {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "Violent Crime" => Ok(Self::ViolentCrime),
            "Property Crime" => Ok(Self::PropertyCrime),
            "Traffic Incident" => Ok(Self::TrafficIncident),
            "Drug Offense" => Ok(Self::DrugOffense),
            "Sexual Offense" => Ok(Self::SexualOffense),
            "Cybercrime" => Ok(Self::Cybercrime),
            "Public Safety" => Ok(Self::PublicSafety),
            "Other" => Ok(Self::Other),
            "Unknown" => Ok(Self::Unknown),
            other => Err(format!("unknown CrimeCategory: {other}")),
        }
    }
}

// --- Entities extracted by enrichment ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityType {
    Person,
    Group,
    Location,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Person => "Person",
            EntityType::Group => "Group",
            EntityType::Location => "Location",
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for EntityType {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "Person" => Ok(Self::Person),
            "Group" => Ok(Self::Group),
            "Location" => Ok(Self::Location),
            other => Err(format!("unknown EntityType: {other}")),
        }
    }
}

/// A named entity mentioned in an incident. The graph view depends on the
/// type discrimination, so this is a tagged record, not a bare string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    pub name: String,
}

// --- Source (one configured agency newsroom) ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: i64,
    pub agency_name: String,
    /// Short jurisdiction code, e.g. "BC", "AB", "WA".
    pub jurisdiction: String,
    /// Primary query key, e.g. "Fraser Valley, BC".
    pub region_label: String,
    pub source_type: String,
    /// Listing-page URL. Uniqueness key for upserts.
    pub base_url: String,
    /// Selects the parser family. Unknown ids are skipped at refresh time.
    pub parser_id: String,
    pub active: bool,
    /// Hint that the listing page needs headless rendering.
    pub use_browser: bool,
    /// Advisory watermark, advanced after every refresh attempt.
    pub last_checked_at: Option<DateTime<Utc>>,
}

/// One record from the source config provider. Synchronized into the store
/// at startup by upsert on `base_url`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSeed {
    pub agency_name: String,
    pub jurisdiction: String,
    pub region_label: String,
    pub source_type: String,
    pub base_url: String,
    pub parser_id: String,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub use_browser: bool,
}

fn default_true() -> bool {
    true
}

// --- RawArticle (verbatim scraped article) ---

/// A parser emission: everything the store needs to insert a raw article.
/// The store assigns `id` and `created_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRawArticle {
    pub source_id: i64,
    /// Deterministic fingerprint, unique per source. See `stable_hash`.
    pub external_id: String,
    pub url: String,
    pub title_raw: String,
    pub body_raw: String,
    pub published_at: Option<DateTime<Utc>>,
    /// Full page HTML kept for later reparse.
    pub raw_html: Option<String>,
}

/// A stored raw article. Immutable once inserted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawArticle {
    pub id: i64,
    pub source_id: i64,
    pub external_id: String,
    pub url: String,
    pub title_raw: String,
    pub body_raw: String,
    pub published_at: Option<DateTime<Utc>>,
    pub raw_html: Option<String>,
    pub created_at: DateTime<Utc>,
}

// --- EnrichedIncident (1:1 with RawArticle) ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedIncident {
    /// Equals the RawArticle id.
    pub id: i64,
    pub severity: Severity,
    /// Short operational summary, capped around 200 chars.
    pub summary_tactical: String,
    pub tags: Vec<String>,
    pub entities: Vec<Entity>,
    pub location_label: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    /// Grouping attribute for the graph view.
    pub graph_cluster_key: Option<String>,
    pub crime_category: CrimeCategory,
    pub temporal_context: Option<String>,
    pub weapon_involved: Option<String>,
    pub tactical_advice: Option<String>,
    /// Provenance: provider+model id, or "none" for stub output.
    pub llm_model: String,
    pub prompt_version: String,
    pub processed_at: DateTime<Utc>,
}

impl EnrichedIncident {
    /// Deterministic fallback used when no LLM is configured or the LLM
    /// response fails validation.
    pub fn stub(article_id: i64, body: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: article_id,
            severity: Severity::Medium,
            summary_tactical: truncate_chars(body, 200),
            tags: Vec::new(),
            entities: Vec::new(),
            location_label: None,
            lat: None,
            lng: None,
            graph_cluster_key: None,
            crime_category: CrimeCategory::Unknown,
            temporal_context: None,
            weapon_involved: None,
            tactical_advice: None,
            llm_model: "none".to_string(),
            prompt_version: "stub_v1".to_string(),
            processed_at: now,
        }
    }
}

/// Truncate to at most `max` characters on a char boundary.
fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

// --- Refresh jobs ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    /// True once the job can no longer change state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Succeeded => write!(f, "succeeded"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown JobStatus: {other}")),
        }
    }
}

/// Persisted record of an asynchronous refresh request.
/// pending → running → {succeeded | failed}; terminal states are immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshJob {
    pub id: i64,
    /// Externally visible opaque identifier.
    pub job_id: Uuid,
    pub region: String,
    pub status: JobStatus,
    pub new_articles: Option<i64>,
    pub total_incidents: Option<i64>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

// --- Refresh results ---

/// Aggregate outcome of one region refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshSummary {
    pub region: String,
    pub new_articles: u32,
    pub total_incidents: i64,
}

/// The joined row served by the query surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentRecord {
    pub source: Source,
    pub article: RawArticle,
    pub incident: EnrichedIncident,
}
