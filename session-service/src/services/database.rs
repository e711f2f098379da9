//! PostgreSQL store for session-service.

use crate::models::{split_tags, Session, SessionDraft};
use crate::services::error::SessionError;
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::query::{duration_from_mean_millis, DateRange, Page, SessionQuery};
use crate::services::store::SessionStore;
use crate::services::token::VersionToken;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions};
use sqlx::query::QueryAs;
use sqlx::{FromRow, Postgres};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

/// Unique index backing case-insensitive name uniqueness.
const NAME_UNIQUE_INDEX: &str = "sessions_name_lower_key";

const SESSION_COLUMNS: &str = "session_id, etag, created_utc, name, tags, duration_ms";

const FILTER_CLAUSE: &str = r#"
    ($1::text IS NULL OR name ILIKE '%' || $1 || '%' ESCAPE '\')
    AND ($2::text IS NULL OR EXISTS (
        SELECT 1 FROM unnest(string_to_array(tags, ',')) AS t(tag)
        WHERE t.tag ILIKE '%' || $2 || '%' ESCAPE '\'
    ))
"#;

#[derive(Debug, FromRow)]
struct SessionRow {
    session_id: Uuid,
    etag: Uuid,
    created_utc: DateTime<Utc>,
    name: String,
    tags: String,
    duration_ms: i64,
}

impl TryFrom<SessionRow> for Session {
    type Error = SessionError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        let duration_ms = u64::try_from(row.duration_ms)
            .map_err(|e| SessionError::store("Negative duration in sessions table", e))?;
        Ok(Session {
            session_id: row.session_id,
            etag: VersionToken::from_uuid(row.etag),
            created_utc: row.created_utc,
            name: row.name,
            tags: split_tags(&row.tags),
            duration: Duration::from_millis(duration_ms),
        })
    }
}

fn duration_ms(duration: Duration) -> Result<i64, SessionError> {
    i64::try_from(duration.as_millis())
        .map_err(|e| SessionError::store("Duration does not fit the sessions table", e))
}

/// Escapes LIKE metacharacters so filters match literally.
fn like_literal(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn write_error(context: &str, err: sqlx::Error) -> SessionError {
    match err {
        sqlx::Error::Database(ref db_err)
            if db_err.is_unique_violation() && db_err.constraint() == Some(NAME_UNIQUE_INDEX) =>
        {
            SessionError::DuplicateName
        }
        other => SessionError::store(context, other),
    }
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "session-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, SessionError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .idle_timeout(std::time::Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| SessionError::store("Failed to connect", e))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), SessionError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| SessionError::store("Migration failed", e))?;
        info!("Database migrations completed");
        Ok(())
    }

    async fn fetch_optional(
        &self,
        operation: &str,
        query: QueryAs<'_, Postgres, SessionRow, PgArguments>,
    ) -> Result<Option<Session>, SessionError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&[operation])
            .start_timer();

        let row = query
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| SessionError::store(&format!("Failed to {}", operation), e))?;

        timer.observe_duration();

        row.map(Session::try_from).transpose()
    }
}

fn select_where(predicate: &str) -> String {
    format!("SELECT {} FROM sessions WHERE {}", SESSION_COLUMNS, predicate)
}

#[async_trait]
impl SessionStore for PgSessionStore {
    #[instrument(skip(self))]
    async fn get(&self, session_id: Uuid) -> Result<Option<Session>, SessionError> {
        let sql = select_where("session_id = $1");
        self.fetch_optional("get_session", sqlx::query_as(&sql).bind(session_id))
            .await
    }

    #[instrument(skip(self))]
    async fn get_by_token(&self, etag: VersionToken) -> Result<Option<Session>, SessionError> {
        let sql = select_where("etag = $1");
        self.fetch_optional("get_session_by_token", sqlx::query_as(&sql).bind(etag.as_uuid()))
            .await
    }

    #[instrument(skip(self))]
    async fn get_by_name(&self, name: &str) -> Result<Option<Session>, SessionError> {
        let sql = select_where("lower(name) = lower($1)");
        self.fetch_optional("get_session_by_name", sqlx::query_as(&sql).bind(name))
            .await
    }

    #[instrument(skip(self, draft), fields(session_id = %draft.session_id))]
    async fn insert(&self, draft: SessionDraft) -> Result<Session, SessionError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_session"])
            .start_timer();

        let sql = format!(
            "INSERT INTO sessions (session_id, etag, name, tags, duration_ms) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            SESSION_COLUMNS
        );
        let row = sqlx::query_as::<_, SessionRow>(&sql)
            .bind(draft.session_id)
            .bind(draft.etag.as_uuid())
            .bind(&draft.fields.name)
            .bind(crate::models::join_tags(&draft.fields.tags))
            .bind(duration_ms(draft.fields.duration)?)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| write_error("Failed to insert session", e))?;

        timer.observe_duration();

        let session = Session::try_from(row)?;
        info!(session_id = %session.session_id, "Session inserted");
        Ok(session)
    }

    #[instrument(skip(self, session), fields(session_id = %session.session_id))]
    async fn update_if_current(
        &self,
        session: &Session,
        expected: VersionToken,
    ) -> Result<bool, SessionError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_session"])
            .start_timer();

        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET name = $3, tags = $4, duration_ms = $5, etag = $6
            WHERE session_id = $1 AND etag = $2
            "#,
        )
        .bind(session.session_id)
        .bind(expected.as_uuid())
        .bind(&session.name)
        .bind(session.tags_column())
        .bind(duration_ms(session.duration)?)
        .bind(session.etag.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|e| write_error("Failed to update session", e))?;

        timer.observe_duration();

        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip(self))]
    async fn remove_if_current(
        &self,
        session_id: Uuid,
        expected: VersionToken,
    ) -> Result<bool, SessionError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["remove_session"])
            .start_timer();

        let result = sqlx::query("DELETE FROM sessions WHERE session_id = $1 AND etag = $2")
            .bind(session_id)
            .bind(expected.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| SessionError::store("Failed to remove session", e))?;

        timer.observe_duration();

        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip(self))]
    async fn list(&self) -> Result<Vec<Session>, SessionError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_sessions"])
            .start_timer();

        let sql = format!(
            "SELECT {} FROM sessions ORDER BY created_utc, session_id",
            SESSION_COLUMNS
        );
        let rows = sqlx::query_as::<_, SessionRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| SessionError::store("Failed to list sessions", e))?;

        timer.observe_duration();

        rows.into_iter().map(Session::try_from).collect()
    }

    #[instrument(skip(self))]
    async fn query(&self, query: &SessionQuery) -> Result<Page<Session>, SessionError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["query_sessions"])
            .start_timer();

        let name = query.name.as_deref().map(like_literal);
        let tag = query.tag.as_deref().map(like_literal);
        let offset = i64::try_from(query.offset()).unwrap_or(i64::MAX);
        let limit = i64::try_from(query.limit()).unwrap_or(i64::MAX);

        let count_sql = format!("SELECT COUNT(*) FROM sessions WHERE {}", FILTER_CLAUSE);
        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(&name)
            .bind(&tag)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| SessionError::store("Failed to count sessions", e))?;

        let page_sql = format!(
            "SELECT {} FROM sessions WHERE {} ORDER BY created_utc, session_id OFFSET $3 LIMIT $4",
            SESSION_COLUMNS, FILTER_CLAUSE
        );
        let rows = sqlx::query_as::<_, SessionRow>(&page_sql)
            .bind(&name)
            .bind(&tag)
            .bind(offset)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| SessionError::store("Failed to query sessions", e))?;

        timer.observe_duration();

        Ok(Page {
            items: rows
                .into_iter()
                .map(Session::try_from)
                .collect::<Result<_, _>>()?,
            total: u64::try_from(total).unwrap_or_default(),
        })
    }

    #[instrument(skip(self))]
    async fn average_duration(&self, range: DateRange) -> Result<Duration, SessionError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["average_duration"])
            .start_timer();

        let mean_ms: Option<f64> = sqlx::query_scalar(
            r#"
            SELECT AVG(duration_ms)::FLOAT8
            FROM sessions
            WHERE (created_utc AT TIME ZONE 'UTC')::date BETWEEN $1 AND $2
            "#,
        )
        .bind(range.start)
        .bind(range.end)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| SessionError::store("Failed to average session durations", e))?;

        timer.observe_duration();

        Ok(mean_ms.map(duration_from_mean_millis).unwrap_or_default())
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), SessionError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Database health check failed: {}", e);
                SessionError::store("Database health check failed", e)
            })?;
        Ok(())
    }
}
