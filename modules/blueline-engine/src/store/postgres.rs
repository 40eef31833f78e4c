//! Postgres store. Runtime-checked sqlx queries; schema bootstrap is a set of
//! idempotent statements run at startup.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use blueline_common::{
    BluelineError, CrimeCategory, EnrichedIncident, Entity, IncidentRecord, JobStatus,
    NewRawArticle, RawArticle, RefreshJob, Severity, Source, SourceSeed,
};

use super::{IncidentStore, UpsertOutcome};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS sources (
        id              BIGSERIAL    PRIMARY KEY,
        agency_name     TEXT         NOT NULL,
        jurisdiction    TEXT         NOT NULL,
        region_label    TEXT         NOT NULL,
        source_type     TEXT         NOT NULL,
        base_url        TEXT         NOT NULL UNIQUE,
        parser_id       TEXT         NOT NULL,
        active          BOOLEAN      NOT NULL DEFAULT TRUE,
        use_browser     BOOLEAN      NOT NULL DEFAULT FALSE,
        last_checked_at TIMESTAMPTZ
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS articles_raw (
        id           BIGSERIAL    PRIMARY KEY,
        source_id    BIGINT       NOT NULL REFERENCES sources(id),
        external_id  TEXT         NOT NULL,
        url          TEXT         NOT NULL,
        title_raw    TEXT         NOT NULL,
        body_raw     TEXT         NOT NULL,
        published_at TIMESTAMPTZ,
        raw_html     TEXT,
        created_at   TIMESTAMPTZ  NOT NULL DEFAULT now(),
        UNIQUE (source_id, external_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS incidents_enriched (
        id                BIGINT           PRIMARY KEY
                                           REFERENCES articles_raw(id) ON DELETE CASCADE,
        severity          TEXT             NOT NULL,
        summary_tactical  TEXT             NOT NULL,
        tags              JSONB            NOT NULL DEFAULT '[]'::jsonb,
        entities          JSONB            NOT NULL DEFAULT '[]'::jsonb,
        location_label    TEXT,
        lat               DOUBLE PRECISION,
        lng               DOUBLE PRECISION,
        graph_cluster_key TEXT,
        crime_category    TEXT             NOT NULL DEFAULT 'Unknown',
        temporal_context  TEXT,
        weapon_involved   TEXT,
        tactical_advice   TEXT,
        llm_model         TEXT             NOT NULL,
        prompt_version    TEXT             NOT NULL,
        processed_at      TIMESTAMPTZ      NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS refresh_jobs (
        id              BIGSERIAL    PRIMARY KEY,
        job_id          UUID         NOT NULL UNIQUE,
        region          TEXT         NOT NULL,
        status          TEXT         NOT NULL,
        new_articles    BIGINT,
        total_incidents BIGINT,
        error_message   TEXT,
        created_at      TIMESTAMPTZ  NOT NULL DEFAULT now(),
        started_at      TIMESTAMPTZ,
        completed_at    TIMESTAMPTZ
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_sources_region ON sources(region_label)",
    "CREATE INDEX IF NOT EXISTS idx_articles_published ON articles_raw(published_at DESC)",
];

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, BluelineError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(store_err)?;
        Ok(Self { pool })
    }

    /// Idempotent schema bootstrap. Full migration tooling stays out of this
    /// crate; the table set is small and append-only.
    pub async fn ensure_schema(&self) -> Result<(), BluelineError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(store_err)?;
        }
        info!("Schema bootstrap complete");
        Ok(())
    }
}

fn store_err(e: sqlx::Error) -> BluelineError {
    BluelineError::Store(e.to_string())
}

// --- Row types ---

#[derive(sqlx::FromRow)]
struct SourceRow {
    id: i64,
    agency_name: String,
    jurisdiction: String,
    region_label: String,
    source_type: String,
    base_url: String,
    parser_id: String,
    active: bool,
    use_browser: bool,
    last_checked_at: Option<DateTime<Utc>>,
}

impl From<SourceRow> for Source {
    fn from(r: SourceRow) -> Self {
        Source {
            id: r.id,
            agency_name: r.agency_name,
            jurisdiction: r.jurisdiction,
            region_label: r.region_label,
            source_type: r.source_type,
            base_url: r.base_url,
            parser_id: r.parser_id,
            active: r.active,
            use_browser: r.use_browser,
            last_checked_at: r.last_checked_at,
        }
    }
}

const SOURCE_COLUMNS: &str = "id, agency_name, jurisdiction, region_label, source_type, \
                              base_url, parser_id, active, use_browser, last_checked_at";

#[derive(sqlx::FromRow)]
struct JobRow {
    id: i64,
    job_id: Uuid,
    region: String,
    status: String,
    new_articles: Option<i64>,
    total_incidents: Option<i64>,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<JobRow> for RefreshJob {
    type Error = BluelineError;

    fn try_from(r: JobRow) -> Result<Self, BluelineError> {
        Ok(RefreshJob {
            id: r.id,
            job_id: r.job_id,
            region: r.region,
            status: JobStatus::from_str(&r.status).map_err(BluelineError::Store)?,
            new_articles: r.new_articles,
            total_incidents: r.total_incidents,
            error_message: r.error_message,
            created_at: r.created_at,
            started_at: r.started_at,
            completed_at: r.completed_at,
        })
    }
}

const JOB_COLUMNS: &str = "id, job_id, region, status, new_articles, total_incidents, \
                           error_message, created_at, started_at, completed_at";

/// Flat projection of the sources ⋈ articles_raw ⋈ incidents_enriched join.
#[derive(sqlx::FromRow)]
struct IncidentRow {
    s_id: i64,
    agency_name: String,
    jurisdiction: String,
    region_label: String,
    source_type: String,
    base_url: String,
    parser_id: String,
    active: bool,
    use_browser: bool,
    last_checked_at: Option<DateTime<Utc>>,

    a_id: i64,
    external_id: String,
    url: String,
    title_raw: String,
    body_raw: String,
    published_at: Option<DateTime<Utc>>,
    raw_html: Option<String>,
    created_at: DateTime<Utc>,

    severity: String,
    summary_tactical: String,
    tags: serde_json::Value,
    entities: serde_json::Value,
    location_label: Option<String>,
    lat: Option<f64>,
    lng: Option<f64>,
    graph_cluster_key: Option<String>,
    crime_category: String,
    temporal_context: Option<String>,
    weapon_involved: Option<String>,
    tactical_advice: Option<String>,
    llm_model: String,
    prompt_version: String,
    processed_at: DateTime<Utc>,
}

impl TryFrom<IncidentRow> for IncidentRecord {
    type Error = BluelineError;

    fn try_from(r: IncidentRow) -> Result<Self, BluelineError> {
        let tags: Vec<String> =
            serde_json::from_value(r.tags).map_err(|e| BluelineError::Store(e.to_string()))?;
        let entities: Vec<Entity> =
            serde_json::from_value(r.entities).map_err(|e| BluelineError::Store(e.to_string()))?;

        Ok(IncidentRecord {
            source: Source {
                id: r.s_id,
                agency_name: r.agency_name,
                jurisdiction: r.jurisdiction,
                region_label: r.region_label,
                source_type: r.source_type,
                base_url: r.base_url,
                parser_id: r.parser_id,
                active: r.active,
                use_browser: r.use_browser,
                last_checked_at: r.last_checked_at,
            },
            article: RawArticle {
                id: r.a_id,
                source_id: r.s_id,
                external_id: r.external_id,
                url: r.url,
                title_raw: r.title_raw,
                body_raw: r.body_raw,
                published_at: r.published_at,
                raw_html: r.raw_html,
                created_at: r.created_at,
            },
            incident: EnrichedIncident {
                id: r.a_id,
                severity: Severity::from_str(&r.severity).map_err(BluelineError::Store)?,
                summary_tactical: r.summary_tactical,
                tags,
                entities,
                location_label: r.location_label,
                lat: r.lat,
                lng: r.lng,
                graph_cluster_key: r.graph_cluster_key,
                crime_category: CrimeCategory::from_str(&r.crime_category)
                    .map_err(BluelineError::Store)?,
                temporal_context: r.temporal_context,
                weapon_involved: r.weapon_involved,
                tactical_advice: r.tactical_advice,
                llm_model: r.llm_model,
                prompt_version: r.prompt_version,
                processed_at: r.processed_at,
            },
        })
    }
}

#[async_trait]
impl IncidentStore for PgStore {
    async fn sync_sources(&self, seeds: &[SourceSeed]) -> Result<u32, BluelineError> {
        let mut written = 0u32;
        for seed in seeds {
            sqlx::query(
                r#"
                INSERT INTO sources
                    (agency_name, jurisdiction, region_label, source_type,
                     base_url, parser_id, active, use_browser)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ON CONFLICT (base_url) DO UPDATE SET
                    agency_name  = EXCLUDED.agency_name,
                    jurisdiction = EXCLUDED.jurisdiction,
                    region_label = EXCLUDED.region_label,
                    source_type  = EXCLUDED.source_type,
                    parser_id    = EXCLUDED.parser_id,
                    active       = EXCLUDED.active,
                    use_browser  = EXCLUDED.use_browser
                "#,
            )
            .bind(&seed.agency_name)
            .bind(&seed.jurisdiction)
            .bind(&seed.region_label)
            .bind(&seed.source_type)
            .bind(&seed.base_url)
            .bind(&seed.parser_id)
            .bind(seed.active)
            .bind(seed.use_browser)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
            written += 1;
        }
        Ok(written)
    }

    async fn active_sources_for(&self, region: &str) -> Result<Vec<Source>, BluelineError> {
        let rows = sqlx::query_as::<_, SourceRow>(&format!(
            "SELECT {SOURCE_COLUMNS} FROM sources \
             WHERE region_label = $1 AND active ORDER BY id"
        ))
        .bind(region)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(rows.into_iter().map(Source::from).collect())
    }

    async fn list_sources(&self) -> Result<Vec<Source>, BluelineError> {
        let rows = sqlx::query_as::<_, SourceRow>(&format!(
            "SELECT {SOURCE_COLUMNS} FROM sources ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(rows.into_iter().map(Source::from).collect())
    }

    async fn get_source(&self, source_id: i64) -> Result<Option<Source>, BluelineError> {
        let row = sqlx::query_as::<_, SourceRow>(&format!(
            "SELECT {SOURCE_COLUMNS} FROM sources WHERE id = $1"
        ))
        .bind(source_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(row.map(Source::from))
    }

    async fn touch_source(&self, source_id: i64, at: DateTime<Utc>) -> Result<(), BluelineError> {
        sqlx::query("UPDATE sources SET last_checked_at = $2 WHERE id = $1")
            .bind(source_id)
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn upsert_raw(&self, article: &NewRawArticle) -> Result<UpsertOutcome, BluelineError> {
        let inserted = sqlx::query_as::<_, (i64,)>(
            r#"
            INSERT INTO articles_raw
                (source_id, external_id, url, title_raw, body_raw, published_at, raw_html)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (source_id, external_id) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(article.source_id)
        .bind(&article.external_id)
        .bind(&article.url)
        .bind(&article.title_raw)
        .bind(&article.body_raw)
        .bind(article.published_at)
        .bind(&article.raw_html)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        if let Some((id,)) = inserted {
            return Ok(UpsertOutcome { id, inserted: true });
        }

        // Conflict: the row exists (possibly created by a racing refresh).
        let (id,) = sqlx::query_as::<_, (i64,)>(
            "SELECT id FROM articles_raw WHERE source_id = $1 AND external_id = $2",
        )
        .bind(article.source_id)
        .bind(&article.external_id)
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(UpsertOutcome {
            id,
            inserted: false,
        })
    }

    async fn store_enriched(&self, incident: &EnrichedIncident) -> Result<(), BluelineError> {
        let tags =
            serde_json::to_value(&incident.tags).map_err(|e| BluelineError::Store(e.to_string()))?;
        let entities = serde_json::to_value(&incident.entities)
            .map_err(|e| BluelineError::Store(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO incidents_enriched
                (id, severity, summary_tactical, tags, entities, location_label,
                 lat, lng, graph_cluster_key, crime_category, temporal_context,
                 weapon_involved, tactical_advice, llm_model, prompt_version, processed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(incident.id)
        .bind(incident.severity.as_str())
        .bind(&incident.summary_tactical)
        .bind(tags)
        .bind(entities)
        .bind(&incident.location_label)
        .bind(incident.lat)
        .bind(incident.lng)
        .bind(&incident.graph_cluster_key)
        .bind(incident.crime_category.as_str())
        .bind(&incident.temporal_context)
        .bind(&incident.weapon_involved)
        .bind(&incident.tactical_advice)
        .bind(&incident.llm_model)
        .bind(&incident.prompt_version)
        .bind(incident.processed_at)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(())
    }

    async fn list_incidents(
        &self,
        region: &str,
        limit: i64,
    ) -> Result<Vec<IncidentRecord>, BluelineError> {
        let rows = sqlx::query_as::<_, IncidentRow>(
            r#"
            SELECT
                s.id AS s_id, s.agency_name, s.jurisdiction, s.region_label,
                s.source_type, s.base_url, s.parser_id, s.active, s.use_browser,
                s.last_checked_at,
                a.id AS a_id, a.external_id, a.url, a.title_raw, a.body_raw,
                a.published_at, a.raw_html, a.created_at,
                e.severity, e.summary_tactical, e.tags, e.entities,
                e.location_label, e.lat, e.lng, e.graph_cluster_key,
                e.crime_category, e.temporal_context, e.weapon_involved,
                e.tactical_advice, e.llm_model, e.prompt_version, e.processed_at
            FROM incidents_enriched e
            JOIN articles_raw a ON a.id = e.id
            JOIN sources s ON s.id = a.source_id
            WHERE s.region_label = $1
            ORDER BY a.published_at DESC NULLS LAST, a.id DESC
            LIMIT $2
            "#,
        )
        .bind(region)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        rows.into_iter().map(IncidentRecord::try_from).collect()
    }

    async fn count_incidents(&self, region: &str) -> Result<i64, BluelineError> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM incidents_enriched e
            JOIN articles_raw a ON a.id = e.id
            JOIN sources s ON s.id = a.source_id
            WHERE s.region_label = $1
            "#,
        )
        .bind(region)
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(count)
    }

    async fn create_job(&self, region: &str) -> Result<RefreshJob, BluelineError> {
        let job_id = Uuid::new_v4();
        let row = sqlx::query_as::<_, JobRow>(&format!(
            "INSERT INTO refresh_jobs (job_id, region, status) \
             VALUES ($1, $2, 'pending') RETURNING {JOB_COLUMNS}"
        ))
        .bind(job_id)
        .bind(region)
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)?;

        row.try_into()
    }

    async fn get_job(&self, job_id: Uuid) -> Result<Option<RefreshJob>, BluelineError> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {JOB_COLUMNS} FROM refresh_jobs WHERE job_id = $1"
        ))
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        row.map(RefreshJob::try_from).transpose()
    }

    async fn mark_job_running(&self, job_id: Uuid) -> Result<(), BluelineError> {
        let result = sqlx::query(
            "UPDATE refresh_jobs SET status = 'running', started_at = now() \
             WHERE job_id = $1 AND status = 'pending'",
        )
        .bind(job_id)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        if result.rows_affected() == 0 {
            return Err(BluelineError::JobTransition(format!(
                "{job_id} is not pending"
            )));
        }
        Ok(())
    }

    async fn mark_job_succeeded(
        &self,
        job_id: Uuid,
        new_articles: i64,
        total_incidents: i64,
    ) -> Result<(), BluelineError> {
        let result = sqlx::query(
            "UPDATE refresh_jobs SET status = 'succeeded', new_articles = $2, \
             total_incidents = $3, completed_at = now() \
             WHERE job_id = $1 AND status = 'running'",
        )
        .bind(job_id)
        .bind(new_articles)
        .bind(total_incidents)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        if result.rows_affected() == 0 {
            return Err(BluelineError::JobTransition(format!(
                "{job_id} is not running"
            )));
        }
        Ok(())
    }

    async fn mark_job_failed(&self, job_id: Uuid, error: &str) -> Result<(), BluelineError> {
        let result = sqlx::query(
            "UPDATE refresh_jobs SET status = 'failed', error_message = $2, \
             completed_at = now() \
             WHERE job_id = $1 AND status = 'running'",
        )
        .bind(job_id)
        .bind(error)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        if result.rows_affected() == 0 {
            return Err(BluelineError::JobTransition(format!(
                "{job_id} is not running"
            )));
        }
        Ok(())
    }
}
