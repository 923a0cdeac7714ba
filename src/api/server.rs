use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, routing::get, routing::post};
use tokio::net::TcpListener;
use tower_http::{
    cors::CorsLayer,
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};
use tracing::{error, info};

use super::{
    services::{download, health},
    state::AppState,
};
use crate::config::Config;
use crate::jobs::{AdmissionGate, JobOrchestrator, WorkspaceManager, YtDlpExtractor};
use crate::observability::Metrics;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Build the application router for `state`
pub fn router(state: AppState) -> Router {
    let static_dir = state.config.server.static_dir.clone();

    Router::new()
        .route("/download", post(download))
        .route("/health", get(health))
        .route_service("/", ServeFile::new(static_dir.join("index.html")))
        .nest_service("/static", ServeDir::new(static_dir))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

pub async fn run(config: Config, address_override: Option<SocketAddr>) -> Result<(), AnyError> {
    let address = address_override.unwrap_or(config.server.bind_addr);

    let workspace = WorkspaceManager::new(config.jobs.staging_dir.clone());
    workspace
        .ensure_root()
        .await
        .map_err(|e| format!("Failed to create staging directory: {}", e))?;
    workspace.sweep_stale(config.jobs.artifact_retention()).await;
    spawn_sweeper(workspace.clone(), &config);

    let extractor = YtDlpExtractor::discover(
        config.extractor.clone(),
        config.jobs.extraction_timeout(),
    );

    info!(cooldown_secs = config.jobs.cooldown_secs, "Configuring admission gate");
    let orchestrator = JobOrchestrator::new(
        Arc::new(AdmissionGate::new(config.jobs.cooldown())),
        workspace,
        Arc::new(extractor),
        Arc::new(Metrics::new()),
    );

    let state = AppState::new(config, orchestrator);
    let app = router(state);

    let listener = TcpListener::bind(address).await?;
    info!(%address, "mediagrab listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Periodically remove job directories nobody consumed
fn spawn_sweeper(workspace: WorkspaceManager, config: &Config) {
    let interval = config.jobs.sweep_interval();
    let retention = config.jobs.artifact_retention();

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // First tick fires immediately; startup already swept
        ticker.tick().await;
        loop {
            ticker.tick().await;
            workspace.sweep_stale(retention).await;
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
