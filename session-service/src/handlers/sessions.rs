use crate::dtos::sessions::parse_date;
use crate::dtos::{
    AverageDurationQuery, AverageDurationResponse, CreateSessionRequest, ListSessionsQuery,
    ListSessionsResponse, MessageResponse, PaginationInfo, SessionResponse, UpdateSessionRequest,
};
use crate::models::Session;
use crate::services::error::{DELETE_TARGET_NOT_FOUND, UPDATE_TARGET_NOT_FOUND};
use crate::services::{DateRange, SessionError, SessionQuery, VersionToken};
use crate::startup::AppState;
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;
use service_core::extract::JsonBody;
use uuid::Uuid;

pub const SESSION_DELETED: &str = "Session deleted successfully";
const ROUTE_ID_MISMATCH: &str = "The route id and the session id don't match";

/// Version token sent by the caller in `ETag`, or `If-Match` as a fallback.
/// Surrounding quotes and a weak prefix are ignored. Anything unparseable is
/// treated as absent, which never matches a stored token.
pub fn caller_token(headers: &HeaderMap) -> Option<VersionToken> {
    let raw = headers
        .get(header::ETAG)
        .or_else(|| headers.get(header::IF_MATCH))?
        .to_str()
        .ok()?;
    raw.trim()
        .trim_start_matches("W/")
        .trim_matches('"')
        .parse()
        .ok()
}

fn with_etag(session: Session) -> impl IntoResponse {
    let etag = session.etag.to_string();
    ([(header::ETAG, etag)], Json(SessionResponse::from(session)))
}

/// Lookup misses on a write get a message naming the attempted operation.
fn write_error(err: SessionError, not_found: &'static str) -> AppError {
    match err {
        SessionError::NotFound => AppError::NotFound(anyhow::anyhow!(not_found)),
        other => other.into(),
    }
}

#[tracing::instrument(skip(state))]
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let session = state.sessions.get(session_id).await?;
    Ok(with_etag(session))
}

#[tracing::instrument(skip(state))]
pub async fn get_session_by_token(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let token: VersionToken = token
        .parse()
        .map_err(|_| AppError::from(SessionError::NotFound))?;
    let session = state.sessions.get_by_token(token).await?;
    Ok(with_etag(session))
}

#[tracing::instrument(skip(state))]
pub async fn list_sessions(
    State(state): State<AppState>,
    Query(params): Query<ListSessionsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let query = SessionQuery::from(params);
    let page = state.sessions.list(&query).await?;

    let sessions: Vec<SessionResponse> = page.items.into_iter().map(SessionResponse::from).collect();
    Ok(Json(ListSessionsResponse {
        pagination: PaginationInfo {
            total: page.total,
            count: sessions.len() as u64,
            page: query.page,
            page_size: query.page_size,
        },
        sessions,
    }))
}

#[tracing::instrument(skip(state))]
pub async fn average_duration(
    State(state): State<AppState>,
    Query(params): Query<AverageDurationQuery>,
) -> Result<impl IntoResponse, AppError> {
    let start = parse_date(&params.start_date).ok_or_else(|| {
        AppError::BadRequest(anyhow::anyhow!("startDate must be a date (YYYY-MM-DD)"))
    })?;
    let end = parse_date(&params.end_date).ok_or_else(|| {
        AppError::BadRequest(anyhow::anyhow!("endDate must be a date (YYYY-MM-DD)"))
    })?;

    let average = state
        .sessions
        .average_duration(DateRange::new(start, end))
        .await?;
    Ok(Json(AverageDurationResponse::from(average)))
}

#[tracing::instrument(skip(state, request), fields(name = %request.name))]
pub async fn create_session(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<CreateSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let fields = state.validator.validate_create(&request).await?;
    let session = state.sessions.create(fields).await?;

    let location = format!("/sessions/{}", session.session_id);
    let etag = session.etag.to_string();
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location), (header::ETAG, etag)],
        Json(SessionResponse::from(session)),
    ))
}

#[tracing::instrument(skip(state, headers, request))]
pub async fn update_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    headers: HeaderMap,
    JsonBody(request): JsonBody<UpdateSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    if request.id != session_id {
        return Err(AppError::BadRequest(anyhow::anyhow!(ROUTE_ID_MISMATCH)));
    }
    let fields = state.validator.validate_update(&request)?;

    let session = state
        .sessions
        .update(session_id, caller_token(&headers), fields)
        .await
        .map_err(|e| write_error(e, UPDATE_TARGET_NOT_FOUND))?;
    Ok(with_etag(session))
}

#[tracing::instrument(skip(state, headers))]
pub async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    state
        .sessions
        .delete(session_id, caller_token(&headers))
        .await
        .map_err(|e| write_error(e, DELETE_TARGET_NOT_FOUND))?;

    Ok(Json(MessageResponse {
        message: SESSION_DELETED.to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn caller_token_reads_etag_then_if_match() {
        let token = VersionToken::new();
        let mut headers = HeaderMap::new();
        assert_eq!(caller_token(&headers), None);

        headers.insert(
            header::IF_MATCH,
            HeaderValue::from_str(&format!("\"{}\"", token)).unwrap(),
        );
        assert_eq!(caller_token(&headers), Some(token));

        let other = VersionToken::new();
        headers.insert(
            header::ETAG,
            HeaderValue::from_str(&other.to_string()).unwrap(),
        );
        assert_eq!(caller_token(&headers), Some(other));
    }

    #[test]
    fn garbage_token_is_treated_as_absent() {
        let mut headers = HeaderMap::new();
        headers.insert(header::ETAG, HeaderValue::from_static("not-a-token"));
        assert_eq!(caller_token(&headers), None);
    }

    #[test]
    fn write_misses_name_the_operation() {
        let response = write_error(SessionError::NotFound, DELETE_TARGET_NOT_FOUND).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response =
            write_error(SessionError::PreconditionFailed, UPDATE_TARGET_NOT_FOUND).into_response();
        assert_eq!(response.status(), StatusCode::PRECONDITION_FAILED);
    }
}
