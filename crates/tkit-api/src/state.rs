//! Application state.

use std::sync::Arc;

use tkit_media::{ensure_dir, MediaResult};
use tkit_worker::{JobExecutor, JobRegistry, ProcessingContext, WorkerConfig};

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub executor: Arc<JobExecutor>,
}

impl AppState {
    /// Create new application state.
    ///
    /// Creates the temp and output directories if they are missing.
    pub async fn new(config: ApiConfig) -> MediaResult<Self> {
        ensure_dir(&config.worker.temp_dir).await?;
        ensure_dir(&config.worker.output_dir).await?;

        let ctx = ProcessingContext::new(config.worker.clone(), JobRegistry::new());

        Ok(Self {
            config,
            executor: Arc::new(JobExecutor::new(ctx)),
        })
    }

    pub fn registry(&self) -> &JobRegistry {
        self.executor.registry()
    }

    pub fn worker_config(&self) -> &WorkerConfig {
        &self.executor.context().config
    }
}
