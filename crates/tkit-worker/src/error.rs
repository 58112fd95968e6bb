//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Media error: {0}")]
    Media(#[from] tkit_media::MediaError),

    #[error("Model error: {0}")]
    Model(#[from] tkit_models::ModelError),
}

impl WorkerError {
    pub fn job_not_found(job_id: impl Into<String>) -> Self {
        Self::JobNotFound(job_id.into())
    }

    /// Error text recorded on a failed job.
    pub fn detail(&self) -> String {
        match self {
            WorkerError::Media(e) => e.detail(),
            other => other.to_string(),
        }
    }
}
