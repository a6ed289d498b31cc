use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use parcel_desk::{
    DeskResult,
    config::AppConfig,
    handlers,
    services::refresh::spawn_auto_refresh,
    state::AppState,
};

#[tokio::main]
async fn main() -> DeskResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env()?;
    let app_state = Arc::new(AppState::new(config.clone())?);

    if let Err(err) = app_state.board.refresh().await {
        tracing::warn!("Initial package load failed: {}", err);
    }

    let refresher = config
        .refresh_interval
        .map(|every| spawn_auto_refresh(app_state.board.clone(), every));

    let app = handlers::router(app_state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("parcel-desk listening on {}", config.bind_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(refresher) = refresher {
        refresher.stop().await;
    }
    Ok(())
}

async fn shutdown_signal() {
    wait_for_shutdown(tokio::signal::ctrl_c()).await
}

/// Resolves when `signal` fires. If the signal handler cannot be installed
/// this never resolves, so the server keeps running.
async fn wait_for_shutdown<F>(signal: F)
where
    F: Future<Output = std::io::Result<()>>,
{
    match signal.await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(err) => {
            tracing::error!("Failed to listen for shutdown signal: {}", err);
            std::future::pending::<()>().await;
        }
    }
}
