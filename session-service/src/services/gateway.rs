//! Serialized access to the session store.
//!
//! Every call takes the gateway's single permit for the duration of exactly one
//! store operation. Permits are granted in FIFO order and the wait has no
//! timeout. A sequence of calls is not atomic as a unit; token-conditional
//! writes (`update`, `remove`) re-check the caller's token inside the store
//! call to cover that gap.

use crate::models::{Session, SessionDraft};
use crate::services::error::SessionError;
use crate::services::metrics::GATEWAY_WAIT_SECONDS;
use crate::services::query::{DateRange, Page, SessionQuery};
use crate::services::store::SessionStore;
use crate::services::token::VersionToken;
use crate::services::validation::UniquenessChecker;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Semaphore, SemaphorePermit};
use uuid::Uuid;

#[derive(Clone)]
pub struct SessionGateway {
    store: Arc<dyn SessionStore>,
    admission: Arc<Semaphore>,
}

impl SessionGateway {
    /// Wraps `store`. Create one gateway per process and clone it; clones
    /// share the same admission slot.
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            store,
            admission: Arc::new(Semaphore::new(1)),
        }
    }

    async fn admit(&self) -> Result<SemaphorePermit<'_>, SessionError> {
        let timer = GATEWAY_WAIT_SECONDS.start_timer();
        let permit = self
            .admission
            .acquire()
            .await
            .map_err(|e| SessionError::store("Session gateway closed", e))?;
        timer.observe_duration();
        Ok(permit)
    }

    pub async fn get(&self, session_id: Uuid) -> Result<Session, SessionError> {
        let _permit = self.admit().await?;
        self.store
            .get(session_id)
            .await?
            .ok_or(SessionError::NotFound)
    }

    pub async fn get_by_token(&self, etag: VersionToken) -> Result<Session, SessionError> {
        let _permit = self.admit().await?;
        self.store
            .get_by_token(etag)
            .await?
            .ok_or(SessionError::NotFound)
    }

    pub async fn get_by_name(&self, name: &str) -> Result<Session, SessionError> {
        let _permit = self.admit().await?;
        self.store
            .get_by_name(name)
            .await?
            .ok_or(SessionError::NotFound)
    }

    pub async fn create(&self, draft: SessionDraft) -> Result<Session, SessionError> {
        let _permit = self.admit().await?;
        self.store.insert(draft).await
    }

    /// Persists `session` only if the stored token still equals `expected`.
    pub async fn update(
        &self,
        session: &Session,
        expected: VersionToken,
    ) -> Result<(), SessionError> {
        let _permit = self.admit().await?;
        if self.store.update_if_current(session, expected).await? {
            Ok(())
        } else {
            Err(SessionError::PreconditionFailed)
        }
    }

    /// Deletes `session` only if the stored token still equals `expected`.
    pub async fn remove(
        &self,
        session: &Session,
        expected: VersionToken,
    ) -> Result<(), SessionError> {
        let _permit = self.admit().await?;
        if self
            .store
            .remove_if_current(session.session_id, expected)
            .await?
        {
            Ok(())
        } else {
            Err(SessionError::PreconditionFailed)
        }
    }

    pub async fn list(&self) -> Result<Vec<Session>, SessionError> {
        let _permit = self.admit().await?;
        self.store.list().await
    }

    pub async fn query(&self, query: &SessionQuery) -> Result<Page<Session>, SessionError> {
        let _permit = self.admit().await?;
        self.store.query(query).await
    }

    pub async fn average_duration(&self, range: DateRange) -> Result<Duration, SessionError> {
        let _permit = self.admit().await?;
        self.store.average_duration(range).await
    }

    pub async fn health_check(&self) -> Result<(), SessionError> {
        let _permit = self.admit().await?;
        self.store.health_check().await
    }
}

#[async_trait]
impl UniquenessChecker for SessionGateway {
    async fn name_is_taken(&self, name: &str) -> Result<bool, SessionError> {
        match self.get_by_name(name).await {
            Ok(_) => Ok(true),
            Err(SessionError::NotFound) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SessionFields;
    use crate::services::store::InMemorySessionStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Store wrapper that tracks how many calls are inside the store at once.
    struct OverlapTracker {
        inner: InMemorySessionStore,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl OverlapTracker {
        fn new() -> Self {
            Self {
                inner: InMemorySessionStore::new(),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }

        async fn enter(&self) {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            // Give other tasks a chance to run while we are "inside" the store.
            tokio::task::yield_now().await;
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        fn leave(&self) {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl SessionStore for OverlapTracker {
        async fn get(&self, session_id: Uuid) -> Result<Option<Session>, SessionError> {
            self.enter().await;
            let result = self.inner.get(session_id).await;
            self.leave();
            result
        }
        async fn get_by_token(&self, etag: VersionToken) -> Result<Option<Session>, SessionError> {
            self.enter().await;
            let result = self.inner.get_by_token(etag).await;
            self.leave();
            result
        }
        async fn get_by_name(&self, name: &str) -> Result<Option<Session>, SessionError> {
            self.enter().await;
            let result = self.inner.get_by_name(name).await;
            self.leave();
            result
        }
        async fn insert(&self, draft: SessionDraft) -> Result<Session, SessionError> {
            self.enter().await;
            let result = self.inner.insert(draft).await;
            self.leave();
            result
        }
        async fn update_if_current(
            &self,
            session: &Session,
            expected: VersionToken,
        ) -> Result<bool, SessionError> {
            self.enter().await;
            let result = self.inner.update_if_current(session, expected).await;
            self.leave();
            result
        }
        async fn remove_if_current(
            &self,
            session_id: Uuid,
            expected: VersionToken,
        ) -> Result<bool, SessionError> {
            self.enter().await;
            let result = self.inner.remove_if_current(session_id, expected).await;
            self.leave();
            result
        }
        async fn list(&self) -> Result<Vec<Session>, SessionError> {
            self.enter().await;
            let result = self.inner.list().await;
            self.leave();
            result
        }
        async fn query(&self, query: &SessionQuery) -> Result<Page<Session>, SessionError> {
            self.enter().await;
            let result = self.inner.query(query).await;
            self.leave();
            result
        }
        async fn average_duration(&self, range: DateRange) -> Result<Duration, SessionError> {
            self.enter().await;
            let result = self.inner.average_duration(range).await;
            self.leave();
            result
        }
        async fn health_check(&self) -> Result<(), SessionError> {
            Ok(())
        }
    }

    fn draft(name: &str) -> SessionDraft {
        SessionDraft::new(
            SessionFields {
                name: name.to_string(),
                tags: Vec::new(),
                duration: Duration::from_secs(30),
            },
            VersionToken::new(),
        )
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn store_is_never_entered_concurrently() {
        let tracker = Arc::new(OverlapTracker::new());
        let gateway = SessionGateway::new(tracker.clone());

        let mut handles = Vec::new();
        for i in 0..16 {
            let gateway = gateway.clone();
            handles.push(tokio::spawn(async move {
                let created = gateway.create(draft(&format!("s{}", i))).await.unwrap();
                gateway.get(created.session_id).await.unwrap();
                gateway.query(&SessionQuery::default()).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(tracker.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(gateway.list().await.unwrap().len(), 16);
    }

    #[tokio::test]
    async fn lookups_miss_with_not_found() {
        let gateway = SessionGateway::new(Arc::new(InMemorySessionStore::new()));
        assert!(matches!(
            gateway.get(Uuid::new_v4()).await,
            Err(SessionError::NotFound)
        ));
        assert!(matches!(
            gateway.get_by_token(VersionToken::new()).await,
            Err(SessionError::NotFound)
        ));
        assert!(!gateway.name_is_taken("anything").await.unwrap());
    }

    #[tokio::test]
    async fn write_with_token_observed_before_a_commit_is_rejected() {
        let gateway = SessionGateway::new(Arc::new(InMemorySessionStore::new()));
        let original = gateway.create(draft("focus")).await.unwrap();

        // Two writers read the same revision.
        let mut first = gateway.get(original.session_id).await.unwrap();
        let mut second = gateway.get(original.session_id).await.unwrap();

        first.etag = VersionToken::new();
        gateway.update(&first, original.etag).await.unwrap();

        second.name = "renamed".to_string();
        second.etag = VersionToken::new();
        let result = gateway.update(&second, original.etag).await;
        assert!(matches!(result, Err(SessionError::PreconditionFailed)));

        let stored = gateway.get(original.session_id).await.unwrap();
        assert_eq!(stored.etag, first.etag);
        assert_eq!(stored.name, "focus");
    }

    #[tokio::test]
    async fn remove_with_stale_token_is_rejected() {
        let gateway = SessionGateway::new(Arc::new(InMemorySessionStore::new()));
        let created = gateway.create(draft("focus")).await.unwrap();

        let result = gateway.remove(&created, VersionToken::new()).await;
        assert!(matches!(result, Err(SessionError::PreconditionFailed)));

        gateway.remove(&created, created.etag).await.unwrap();
        assert!(matches!(
            gateway.get(created.session_id).await,
            Err(SessionError::NotFound)
        ));
    }
}
