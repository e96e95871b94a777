use std::sync::Arc;

use delivery_lifecycle::config::{Config, LogFormat};
use delivery_lifecycle::error::AppError;
use delivery_lifecycle::state::AppState;
use delivery_lifecycle::store::MemoryStore;
use delivery_lifecycle::store::blob::MemoryBlobStore;
use delivery_lifecycle::api;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false);
    match config.log_format {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Compact => subscriber.compact().init(),
    }

    let state = AppState::new(
        Arc::new(MemoryStore::new()),
        Arc::new(MemoryBlobStore::new(config.blob_base_url.clone())),
        Vec::new(),
        config.retry_policy(),
        config.event_buffer_size,
    );
    let app = api::rest::router(Arc::new(state));

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(http_port = config.http_port, "http server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::Internal(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
