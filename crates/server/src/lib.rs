pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;

use std::sync::Arc;

use executors::WorkerGateway;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use utils::scratch::ScratchDir;

use crate::{config::ServerConfig, error::ApiError};

/// Shared handler state. Cloning is cheap; every field is behind an `Arc`
/// or is itself a small value.
#[derive(Clone)]
pub struct AppState {
    config: Arc<ServerConfig>,
    gateway: Arc<dyn WorkerGateway>,
    scratch: ScratchDir,
    permits: Arc<Semaphore>,
}

impl AppState {
    pub fn new(config: ServerConfig, gateway: Arc<dyn WorkerGateway>) -> Self {
        let scratch = ScratchDir::new(config.scratch_dir.clone());
        let permits = Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1)));
        Self {
            config: Arc::new(config),
            gateway,
            scratch,
            permits,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn gateway(&self) -> &dyn WorkerGateway {
        self.gateway.as_ref()
    }

    pub fn scratch(&self) -> &ScratchDir {
        &self.scratch
    }

    /// Wait for a job slot. Held for the duration of one encode or worker run.
    pub async fn acquire_job(&self) -> Result<OwnedSemaphorePermit, ApiError> {
        let available = self.permits.available_permits();
        if available == 0 {
            tracing::debug!("All job slots busy, waiting");
        }
        self.permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ApiError::InternalError("job limiter closed".to_string()))
    }
}
