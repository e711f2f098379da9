//! Optimistic concurrency for session writes.
//!
//! Every mutation is conditioned on the caller having observed the most
//! recently committed version token. The token is compared here first and
//! then re-checked by the gateway inside the store call, so two writers
//! holding the same token can never both succeed.

use crate::models::{Session, SessionDraft, SessionFields};
use crate::services::error::SessionError;
use crate::services::gateway::SessionGateway;
use crate::services::metrics::record_operation;
use crate::services::query::{DateRange, Page, SessionQuery};
use crate::services::token::{TokenAllocator, VersionToken};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

#[derive(Clone)]
pub struct SessionService {
    gateway: SessionGateway,
    allocator: Arc<dyn TokenAllocator>,
}

fn observe<T>(operation: &str, result: &Result<T, SessionError>) {
    let outcome = match result {
        Ok(_) => "success",
        Err(e) => e.kind(),
    };
    record_operation(operation, outcome);
}

/// Exact equality against the stored token. No token at all never matches.
fn check_token(stored: VersionToken, caller: Option<VersionToken>) -> Result<(), SessionError> {
    match caller {
        Some(token) if token == stored => Ok(()),
        _ => Err(SessionError::PreconditionFailed),
    }
}

impl SessionService {
    pub fn new(gateway: SessionGateway, allocator: Arc<dyn TokenAllocator>) -> Self {
        Self { gateway, allocator }
    }

    pub fn gateway(&self) -> &SessionGateway {
        &self.gateway
    }

    #[tracing::instrument(skip(self, fields), fields(name = %fields.name))]
    pub async fn create(&self, fields: SessionFields) -> Result<Session, SessionError> {
        let draft = SessionDraft::new(fields, self.allocator.allocate());
        let result = self.gateway.create(draft).await;
        observe("create", &result);

        let session = result.map_err(|e| {
            tracing::warn!(error = %e, "Session create rejected");
            e
        })?;
        tracing::info!(session_id = %session.session_id, "Session created");
        Ok(session)
    }

    pub async fn get(&self, session_id: Uuid) -> Result<Session, SessionError> {
        let result = self.gateway.get(session_id).await;
        observe("get", &result);
        result
    }

    pub async fn get_by_token(&self, etag: VersionToken) -> Result<Session, SessionError> {
        let result = self.gateway.get_by_token(etag).await;
        observe("get_by_token", &result);
        result
    }

    /// Fetch, compare, revise with a fresh token, persist. A new token is
    /// only allocated once the caller's token has matched.
    #[tracing::instrument(skip(self, caller_token, fields), fields(session_id = %session_id))]
    pub async fn update(
        &self,
        session_id: Uuid,
        caller_token: Option<VersionToken>,
        fields: SessionFields,
    ) -> Result<Session, SessionError> {
        let result = self.apply_update(session_id, caller_token, fields).await;
        observe("update", &result);

        match &result {
            Ok(session) => tracing::info!(etag = %session.etag, "Session updated"),
            Err(e) => tracing::warn!(error = %e, "Session update rejected"),
        }
        result
    }

    async fn apply_update(
        &self,
        session_id: Uuid,
        caller_token: Option<VersionToken>,
        fields: SessionFields,
    ) -> Result<Session, SessionError> {
        let mut session = self.gateway.get(session_id).await?;
        let observed = session.etag;
        check_token(observed, caller_token)?;

        session.revise(fields, self.allocator.allocate());
        self.gateway.update(&session, observed).await?;
        Ok(session)
    }

    #[tracing::instrument(skip(self, caller_token), fields(session_id = %session_id))]
    pub async fn delete(
        &self,
        session_id: Uuid,
        caller_token: Option<VersionToken>,
    ) -> Result<(), SessionError> {
        let result = self.apply_delete(session_id, caller_token).await;
        observe("delete", &result);

        match &result {
            Ok(()) => tracing::info!("Session deleted"),
            Err(e) => tracing::warn!(error = %e, "Session delete rejected"),
        }
        result
    }

    async fn apply_delete(
        &self,
        session_id: Uuid,
        caller_token: Option<VersionToken>,
    ) -> Result<(), SessionError> {
        let session = self.gateway.get(session_id).await?;
        check_token(session.etag, caller_token)?;
        self.gateway.remove(&session, session.etag).await
    }

    pub async fn list(&self, query: &SessionQuery) -> Result<Page<Session>, SessionError> {
        let result = self.gateway.query(query).await;
        observe("list", &result);
        result
    }

    pub async fn average_duration(&self, range: DateRange) -> Result<Duration, SessionError> {
        let result = self.gateway.average_duration(range).await;
        observe("average_duration", &result);
        result
    }

    pub async fn health_check(&self) -> Result<(), SessionError> {
        self.gateway.health_check().await
    }
}
