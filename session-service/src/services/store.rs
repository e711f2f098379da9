//! Persistence seam for session records.

use crate::models::{Session, SessionDraft};
use crate::services::error::SessionError;
use crate::services::query::{self, DateRange, Page, SessionQuery};
use crate::services::token::VersionToken;
use async_trait::async_trait;
use chrono::Utc;
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Raw record storage. Only [`crate::services::SessionGateway`] talks to it.
///
/// `update_if_current` and `remove_if_current` compare the stored token with
/// `expected` as part of the same write and return `false` when the record
/// has moved on (or no longer exists).
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, session_id: Uuid) -> Result<Option<Session>, SessionError>;
    async fn get_by_token(&self, etag: VersionToken) -> Result<Option<Session>, SessionError>;
    /// Names are unique case-insensitively, so lookup is case-insensitive.
    async fn get_by_name(&self, name: &str) -> Result<Option<Session>, SessionError>;
    async fn insert(&self, draft: SessionDraft) -> Result<Session, SessionError>;
    async fn update_if_current(
        &self,
        session: &Session,
        expected: VersionToken,
    ) -> Result<bool, SessionError>;
    async fn remove_if_current(
        &self,
        session_id: Uuid,
        expected: VersionToken,
    ) -> Result<bool, SessionError>;
    async fn list(&self) -> Result<Vec<Session>, SessionError>;
    async fn query(&self, query: &SessionQuery) -> Result<Page<Session>, SessionError>;
    async fn average_duration(&self, range: DateRange) -> Result<Duration, SessionError>;
    async fn health_check(&self) -> Result<(), SessionError>;
}

/// Process-local store used for development and tests. Insertion order is the
/// underlying order.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<Vec<Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from existing records, e.g. ones with back-dated `created_utc`.
    pub fn from_sessions(sessions: Vec<Session>) -> Self {
        Self {
            sessions: RwLock::new(sessions),
        }
    }
}

fn same_name(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, session_id: Uuid) -> Result<Option<Session>, SessionError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.iter().find(|s| s.session_id == session_id).cloned())
    }

    async fn get_by_token(&self, etag: VersionToken) -> Result<Option<Session>, SessionError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.iter().find(|s| s.etag == etag).cloned())
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Session>, SessionError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.iter().find(|s| same_name(&s.name, name)).cloned())
    }

    async fn insert(&self, draft: SessionDraft) -> Result<Session, SessionError> {
        let mut sessions = self.sessions.write().await;
        if sessions.iter().any(|s| same_name(&s.name, &draft.fields.name)) {
            return Err(SessionError::DuplicateName);
        }
        if sessions
            .iter()
            .any(|s| s.session_id == draft.session_id || s.etag == draft.etag)
        {
            return Err(SessionError::store(
                "Failed to insert session",
                "identifier or version token already in use",
            ));
        }
        let session = draft.into_session(Utc::now());
        sessions.push(session.clone());
        Ok(session)
    }

    async fn update_if_current(
        &self,
        session: &Session,
        expected: VersionToken,
    ) -> Result<bool, SessionError> {
        let mut sessions = self.sessions.write().await;
        let Some(index) = sessions
            .iter()
            .position(|s| s.session_id == session.session_id)
        else {
            return Ok(false);
        };
        if sessions[index].etag != expected {
            return Ok(false);
        }
        if sessions
            .iter()
            .any(|s| s.session_id != session.session_id && same_name(&s.name, &session.name))
        {
            return Err(SessionError::DuplicateName);
        }
        if sessions
            .iter()
            .any(|s| s.session_id != session.session_id && s.etag == session.etag)
        {
            return Err(SessionError::store(
                "Failed to update session",
                "version token already in use",
            ));
        }

        let stored = &mut sessions[index];
        stored.name = session.name.clone();
        stored.tags = session.tags.clone();
        stored.duration = session.duration;
        stored.etag = session.etag;
        Ok(true)
    }

    async fn remove_if_current(
        &self,
        session_id: Uuid,
        expected: VersionToken,
    ) -> Result<bool, SessionError> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|s| !(s.session_id == session_id && s.etag == expected));
        Ok(sessions.len() < before)
    }

    async fn list(&self) -> Result<Vec<Session>, SessionError> {
        Ok(self.sessions.read().await.clone())
    }

    async fn query(&self, query: &SessionQuery) -> Result<Page<Session>, SessionError> {
        let sessions = self.sessions.read().await;
        Ok(query::paginate(sessions.iter(), query))
    }

    async fn average_duration(&self, range: DateRange) -> Result<Duration, SessionError> {
        let sessions = self.sessions.read().await;
        Ok(query::average_duration(sessions.iter(), &range))
    }

    async fn health_check(&self) -> Result<(), SessionError> {
        Ok(())
    }
}
