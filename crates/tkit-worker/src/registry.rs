//! In-memory job registry.
//!
//! The registry is owned by the application state and handed to both the
//! HTTP handlers (readers) and the job runner (the only writer of a job
//! after creation). Nothing is persisted or evicted.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tkit_models::{JobId, ModelResult, VideoJob};

use crate::error::{WorkerError, WorkerResult};

/// Shared job registry handle.
#[derive(Debug, Clone, Default)]
pub struct JobRegistry {
    jobs: Arc<RwLock<HashMap<JobId, VideoJob>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job, replacing any record with the same id.
    pub async fn insert(&self, job: VideoJob) {
        let mut jobs = self.jobs.write().await;
        jobs.insert(job.job_id.clone(), job);
    }

    /// Snapshot of a job record.
    pub async fn get(&self, job_id: &JobId) -> Option<VideoJob> {
        self.jobs.read().await.get(job_id).cloned()
    }

    pub async fn contains(&self, job_id: &JobId) -> bool {
        self.jobs.read().await.contains_key(job_id)
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }

    /// Apply a status transition to a job.
    ///
    /// The change is committed only if `f` succeeds; returns the updated
    /// record.
    pub async fn update<F>(&self, job_id: &JobId, f: F) -> WorkerResult<VideoJob>
    where
        F: FnOnce(&mut VideoJob) -> ModelResult<()>,
    {
        let mut jobs = self.jobs.write().await;
        let current = jobs
            .get_mut(job_id)
            .ok_or_else(|| WorkerError::job_not_found(job_id.as_str()))?;

        let mut next = current.clone();
        f(&mut next)?;
        *current = next.clone();
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tkit_models::{CompressionMode, JobStatus, ModelError};

    #[tokio::test]
    async fn test_insert_and_get() {
        let registry = JobRegistry::new();
        assert!(registry.is_empty().await);

        let job = VideoJob::new(JobId::new(), "clip.mp4", CompressionMode::Standard);
        let id = job.job_id.clone();
        registry.insert(job).await;

        assert!(registry.contains(&id).await);
        assert_eq!(registry.len().await, 1);
        assert_eq!(registry.get(&id).await.unwrap().status, JobStatus::Uploaded);
        assert!(registry.get(&JobId::from_string("unknown")).await.is_none());
    }

    #[tokio::test]
    async fn test_update_commits_on_success() {
        let registry = JobRegistry::new();
        let job = VideoJob::new(JobId::new(), "clip.mp4", CompressionMode::Standard);
        let id = job.job_id.clone();
        registry.insert(job).await;

        let updated = registry.update(&id, |job| job.start_processing()).await.unwrap();
        assert_eq!(updated.status, JobStatus::Processing);
        assert_eq!(registry.get(&id).await.unwrap().status, JobStatus::Processing);
    }

    #[tokio::test]
    async fn test_update_rejects_invalid_transition() {
        let registry = JobRegistry::new();
        let job = VideoJob::new(JobId::new(), "clip.mp4", CompressionMode::Standard);
        let id = job.job_id.clone();
        registry.insert(job).await;

        let err = registry.update(&id, |job| job.complete(10, 5)).await.unwrap_err();
        assert!(matches!(
            err,
            WorkerError::Model(ModelError::InvalidTransition { .. })
        ));

        let stored = registry.get(&id).await.unwrap();
        assert_eq!(stored.status, JobStatus::Uploaded);
        assert_eq!(stored.original_size, None);
    }

    #[tokio::test]
    async fn test_update_unknown_job() {
        let registry = JobRegistry::new();
        let err = registry
            .update(&JobId::from_string("missing"), |job| job.start_processing())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::JobNotFound(_)));
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let registry = JobRegistry::new();
        let other = registry.clone();
        let job = VideoJob::new(JobId::new(), "clip.mp4", CompressionMode::Deep);
        let id = job.job_id.clone();
        other.insert(job).await;
        assert!(registry.contains(&id).await);
    }
}
