use crate::config::{SessionConfig, StoreBackend};
use crate::handlers;
use crate::services::{
    InMemorySessionStore, PgSessionStore, RandomTokenAllocator, SessionGateway, SessionService,
    SessionStore, SessionValidator,
};
use axum::{middleware::from_fn, routing::get, Router};
use service_core::error::AppError;
use service_core::middleware::{metrics_middleware, request_id_middleware, security_headers_middleware};
use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub config: SessionConfig,
    pub sessions: SessionService,
    pub validator: SessionValidator,
}

impl AppState {
    /// Wires the gateway, guard and validator around `store`. The gateway is
    /// the only path to the store and is shared by every clone of the state.
    pub fn new(config: SessionConfig, store: Arc<dyn SessionStore>) -> Self {
        let gateway = SessionGateway::new(store);
        let validator = SessionValidator::new(Arc::new(gateway.clone()));
        let sessions = SessionService::new(gateway, Arc::new(RandomTokenAllocator));
        Self {
            config,
            sessions,
            validator,
        }
    }
}

pub async fn build_store(config: &SessionConfig) -> Result<Arc<dyn SessionStore>, AppError> {
    match config.database.backend {
        StoreBackend::Memory => {
            tracing::info!("Using in-memory session store");
            Ok(Arc::new(InMemorySessionStore::new()))
        }
        StoreBackend::Postgres => {
            let url = config.database.url.as_deref().ok_or_else(|| {
                AppError::ConfigError(anyhow::anyhow!(
                    "DATABASE_URL is required for the postgres backend"
                ))
            })?;
            let store = PgSessionStore::new(
                url,
                config.database.max_connections,
                config.database.min_connections,
            )
            .await
            .map_err(|e| {
                tracing::error!("Failed to connect to PostgreSQL: {}", e);
                AppError::from(e)
            })?;

            if config.database.run_migrations {
                store.run_migrations().await.map_err(|e| {
                    tracing::error!("Failed to run database migrations: {}", e);
                    AppError::from(e)
                })?;
            }
            tracing::info!("Using PostgreSQL session store");
            Ok(Arc::new(store))
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/sessions",
            get(handlers::list_sessions).post(handlers::create_session),
        )
        .route("/sessions/average-duration", get(handlers::average_duration))
        .route("/sessions/by-token/:token", get(handlers::get_session_by_token))
        .route(
            "/sessions/:id",
            get(handlers::get_session)
                .put(handlers::update_session)
                .delete(handlers::delete_session),
        )
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        .layer(
            ServiceBuilder::new()
                .layer(from_fn(request_id_middleware))
                .layer(TraceLayer::new_for_http())
                .layer(from_fn(metrics_middleware))
                .layer(from_fn(security_headers_middleware)),
        )
        .with_state(state)
}

pub struct Application {
    port: u16,
    server: Box<dyn Future<Output = std::io::Result<()>> + Send + Unpin>,
    state: AppState,
}

impl Application {
    pub async fn build(config: SessionConfig) -> Result<Self, AppError> {
        let store = build_store(&config).await?;
        Self::build_with_store(config, store).await
    }

    /// Same as [`Application::build`] with a caller-supplied store.
    pub async fn build_with_store(
        config: SessionConfig,
        store: Arc<dyn SessionStore>,
    ) -> Result<Self, AppError> {
        Self::build_with_shutdown(config, store, std::future::pending()).await
    }

    /// Builds a server that drains in-flight requests once `shutdown` resolves.
    pub async fn build_with_shutdown<F>(
        config: SessionConfig,
        store: Arc<dyn SessionStore>,
        shutdown: F,
    ) -> Result<Self, AppError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let state = AppState::new(config.clone(), store);
        let app = router(state.clone());

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Listening on {}", port);

        let server = axum::serve(listener, app).with_graceful_shutdown(shutdown);

        Ok(Self {
            port,
            server: Box::new(server.into_future()),
            state,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        self.server.await
    }
}
