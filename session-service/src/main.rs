use session_service::config::SessionConfig;
use session_service::services::init_metrics;
use session_service::startup::Application;
use service_core::observability::init_tracing;
use tokio::signal;

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}

#[tokio::main]
async fn main() -> Result<(), service_core::error::AppError> {
    // Fail fast on invalid configuration
    let config = SessionConfig::load()?;

    init_tracing(
        "session-service",
        &config.common.log_level,
        config.otlp_endpoint.as_deref(),
    )?;

    // Metrics recorder must be installed before any request is served
    init_metrics();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        backend = ?config.database.backend,
        "Starting session service"
    );

    let store = session_service::startup::build_store(&config).await?;
    let app = Application::build_with_shutdown(config, store, shutdown_signal()).await?;
    app.run_until_stopped().await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}
