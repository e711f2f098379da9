use crate::models::Session;
use crate::services::query::SessionQuery;
use crate::services::token::VersionToken;
use crate::services::validation::{validate_duration, validate_tags};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;
use validator::Validate;

/// Absent fields deserialize to empty values so the field rules report them.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateSessionRequest {
    #[serde(default)]
    #[validate(length(min = 1, max = 50, message = "Name should be 1 - 50 characters in length"))]
    pub name: String,
    #[serde(default)]
    #[validate(custom(function = "validate_tags"))]
    pub tags: Vec<String>,
    #[serde(default)]
    #[validate(custom(function = "validate_duration"))]
    pub duration: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateSessionRequest {
    /// Nil when absent, which never matches a route id.
    #[serde(default)]
    pub id: Uuid,
    #[serde(default)]
    #[validate(length(min = 1, max = 50, message = "Name should be 1 - 50 characters in length"))]
    pub name: String,
    #[serde(default)]
    #[validate(custom(function = "validate_tags"))]
    pub tags: Vec<String>,
    #[serde(default)]
    #[validate(custom(function = "validate_duration"))]
    pub duration: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub id: Uuid,
    pub etag: VersionToken,
    pub created_at: DateTime<Utc>,
    pub name: String,
    pub tags: Vec<String>,
    #[serde(with = "crate::models::timespan::serde_timespan")]
    pub duration: Duration,
}

impl From<Session> for SessionResponse {
    fn from(session: Session) -> Self {
        Self {
            id: session.session_id,
            etag: session.etag,
            created_at: session.created_utc,
            name: session.name,
            tags: session.tags,
            duration: session.duration,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSessionsQuery {
    pub name: Option<String>,
    pub tag: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl From<ListSessionsQuery> for SessionQuery {
    fn from(query: ListSessionsQuery) -> Self {
        SessionQuery::new(query.name, query.tag, query.page, query.page_size)
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationInfo {
    /// Sessions matching the filters across all pages.
    pub total: u64,
    /// Sessions on this page.
    pub count: u64,
    pub page: u32,
    pub page_size: u32,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSessionsResponse {
    pub sessions: Vec<SessionResponse>,
    pub pagination: PaginationInfo,
}

/// Accepts `YYYY-MM-DD` or an RFC 3339 timestamp; only the date is used.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AverageDurationQuery {
    pub start_date: String,
    pub end_date: String,
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.with_timezone(&Utc).date_naive())
        })
        .or_else(|| {
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AverageDurationResponse {
    #[serde(with = "crate::models::timespan::serde_timespan")]
    pub average_duration: Duration,
    pub average_duration_seconds: f64,
}

impl From<Duration> for AverageDurationResponse {
    fn from(average: Duration) -> Self {
        Self {
            average_duration: average,
            average_duration_seconds: average.as_secs_f64(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}
