//! Job executor.
//!
//! Spawns one background task per upload. Every task carries its own
//! cancellation signal so a job can be stopped individually or as part of
//! shutdown.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{watch, Semaphore};
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

use tkit_models::JobId;

use crate::processor::{process_video, CompressionTask, ProcessingContext};
use crate::registry::JobRegistry;

type CancelSenders = Arc<Mutex<HashMap<JobId, watch::Sender<bool>>>>;

/// Runs compression jobs in the background.
pub struct JobExecutor {
    ctx: Arc<ProcessingContext>,
    job_semaphore: Option<Arc<Semaphore>>,
    cancel_senders: CancelSenders,
    tracker: TaskTracker,
}

impl JobExecutor {
    /// Create a new job executor.
    pub fn new(ctx: ProcessingContext) -> Self {
        let job_semaphore = ctx
            .config
            .max_concurrent_jobs
            .map(|n| Arc::new(Semaphore::new(n)));

        Self {
            ctx: Arc::new(ctx),
            job_semaphore,
            cancel_senders: Arc::new(Mutex::new(HashMap::new())),
            tracker: TaskTracker::new(),
        }
    }

    pub fn context(&self) -> &ProcessingContext {
        &self.ctx
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.ctx.registry
    }

    /// Number of spawned jobs that have not finished yet.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Schedule a job. Returns immediately.
    pub fn spawn(&self, task: CompressionTask) {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        lock(&self.cancel_senders).insert(task.job_id.clone(), cancel_tx);

        let ctx = Arc::clone(&self.ctx);
        let semaphore = self.job_semaphore.clone();
        let senders = Arc::clone(&self.cancel_senders);

        self.tracker.spawn(async move {
            let _permit = match semaphore {
                Some(semaphore) => match semaphore.acquire_owned().await {
                    Ok(permit) => Some(permit),
                    Err(_) => {
                        error!(job_id = %task.job_id.short(), "Job semaphore closed");
                        lock(&senders).remove(&task.job_id);
                        return;
                    }
                },
                None => None,
            };

            if let Err(e) = process_video(&ctx, &task, cancel_rx).await {
                error!(job_id = %task.job_id.short(), "Job {} aborted: {}", task.job_id, e);
            }

            lock(&senders).remove(&task.job_id);
        });
    }

    /// Signal a running or queued job to stop.
    ///
    /// Returns `false` if the job is unknown or already finished.
    pub fn cancel(&self, job_id: &JobId) -> bool {
        match lock(&self.cancel_senders).get(job_id) {
            Some(tx) => tx.send(true).is_ok(),
            None => false,
        }
    }

    /// Cancel every job and wait for them to finish.
    pub async fn shutdown(&self) {
        let pending: Vec<JobId> = lock(&self.cancel_senders).keys().cloned().collect();
        if !pending.is_empty() {
            info!("Cancelling {} in-flight jobs", pending.len());
        }
        for job_id in &pending {
            self.cancel(job_id);
        }

        self.tracker.close();
        if tokio::time::timeout(self.ctx.config.shutdown_timeout, self.tracker.wait())
            .await
            .is_err()
        {
            warn!(
                "Timed out after {:?} waiting for {} jobs",
                self.ctx.config.shutdown_timeout,
                self.in_flight()
            );
        }
        info!("Job executor stopped");
    }
}

fn lock(senders: &CancelSenders) -> MutexGuard<'_, HashMap<JobId, watch::Sender<bool>>> {
    senders.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
