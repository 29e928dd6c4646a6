use std::sync::Arc;

use anyhow::{self, Error as AnyhowError};
use executors::ProcessGateway;
use server::{
    AppState,
    config::{ConfigError, ServerConfig},
    routes,
};
use thiserror::Error;
use tracing_subscriber::{EnvFilter, prelude::*};
use utils::scratch::ScratchError;

#[derive(Debug, Error)]
pub enum BoardServerError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Scratch(#[from] ScratchError),
    #[error(transparent)]
    Other(#[from] AnyhowError),
}

#[tokio::main]
async fn main() -> Result<(), BoardServerError> {
    // Load `.env` so local runs pick up recognizer API keys
    dotenv::dotenv().ok();

    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let filter_string = format!(
        "warn,server={level},services={level},executors={level},utils={level},board={level},tower_http={level}",
        level = log_level
    );
    let env_filter = EnvFilter::try_new(filter_string)
        .map_err(|e| anyhow::anyhow!("failed to create tracing filter: {e}"))?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(env_filter))
        .init();

    let config = ServerConfig::load()?;
    tracing::info!(
        "Recognizer: {} {}",
        config.workers.recognize.program,
        config.workers.recognize.args.join(" ")
    );
    for (name, worker) in [
        ("basic export", &config.workers.basic_export),
        ("floor-unit export", &config.workers.floor_unit_export),
        ("convert", &config.workers.convert),
    ] {
        match worker {
            Some(worker) => tracing::info!("{} worker: {}", name, worker.program),
            None => tracing::debug!("{} runs in-process", name),
        }
    }

    let host = config.host.clone();
    let port = config.port;
    let state = AppState::new(config, Arc::new(ProcessGateway::new()));
    state.scratch().ensure().await?;

    let app_router = routes::router(state);
    let listener = tokio::net::TcpListener::bind(format!("{host}:{port}")).await?;
    let actual_port = listener.local_addr()?.port();
    tracing::info!("Server running on http://{host}:{actual_port}");

    axum::serve(listener, app_router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
