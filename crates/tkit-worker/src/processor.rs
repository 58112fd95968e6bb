//! Video compression job runner.

use std::path::Path;
use std::time::Instant;

use tokio::sync::watch;

use tkit_media::{file_size, remove_file_if_exists, FfmpegCommand, FfmpegRunner};
use tkit_models::{CompressionMode, JobId, VideoJob};

use crate::config::WorkerConfig;
use crate::error::WorkerResult;
use crate::logging::JobLogger;
use crate::metrics;
use crate::registry::JobRegistry;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Shared dependencies of every job.
#[derive(Debug, Clone)]
pub struct ProcessingContext {
    pub config: WorkerConfig,
    pub registry: JobRegistry,
}

impl ProcessingContext {
    pub fn new(config: WorkerConfig, registry: JobRegistry) -> Self {
        Self { config, registry }
    }

    fn runner(&self, cancel_rx: watch::Receiver<bool>) -> FfmpegRunner {
        let runner = FfmpegRunner::with_program(&self.config.ffmpeg_path).with_cancel(cancel_rx);
        match self.config.job_timeout {
            Some(timeout) => runner.with_timeout(timeout),
            None => runner,
        }
    }
}

/// One unit of compression work.
#[derive(Debug, Clone)]
pub struct CompressionTask {
    pub job_id: JobId,
    /// File name inside the temp directory
    pub source_filename: String,
    pub mode: CompressionMode,
}

impl CompressionTask {
    pub fn new(job_id: JobId, source_filename: impl Into<String>, mode: CompressionMode) -> Self {
        Self {
            job_id,
            source_filename: source_filename.into(),
            mode,
        }
    }

    pub fn output_filename(&self) -> String {
        self.mode.output_filename(&self.source_filename)
    }
}

impl From<&VideoJob> for CompressionTask {
    fn from(job: &VideoJob) -> Self {
        Self::new(job.job_id.clone(), job.source_filename.clone(), job.compression_mode)
    }
}

/// Compress one uploaded video and record the outcome in the registry.
///
/// FFmpeg failures end up as a `failed` job, not as an `Err`; errors are
/// returned only when the registry rejects an update. The temp input is
/// gone afterwards either way.
pub async fn process_video(
    ctx: &ProcessingContext,
    task: &CompressionTask,
    cancel_rx: watch::Receiver<bool>,
) -> WorkerResult<VideoJob> {
    let logger = JobLogger::new(&task.job_id, "video_compression");
    let encoder = ctx.config.encoder;
    let temp_input = ctx.config.temp_path(&task.source_filename);
    let output_filename = task.output_filename();
    let output_path = ctx.config.output_path(&output_filename);

    ctx.registry
        .update(&task.job_id, |job| job.start_processing())
        .await?;
    metrics::record_job_started(task.mode);

    logger.log_start(&format!(
        "{} compression for {} using {}",
        task.mode, task.source_filename, encoder.encoder
    ));

    let started = Instant::now();
    let cmd = FfmpegCommand::compression(&encoder, task.mode, &temp_input, &output_path);
    let result = compress(ctx.runner(cancel_rx), &cmd, &temp_input, &output_path).await;
    metrics::record_ffmpeg_duration(encoder.encoder.ffmpeg_name(), started.elapsed().as_secs_f64());

    let job = match result {
        Ok((original_size, compressed_size)) => {
            let job = ctx
                .registry
                .update(&task.job_id, |job| job.complete(original_size, compressed_size))
                .await?;
            metrics::record_job_completed(task.mode, original_size, compressed_size);
            logger.log_completion(&format!(
                "{} -> {} (original {:.2} MB, compressed {:.2} MB, saved {:.1}%)",
                task.source_filename,
                output_filename,
                original_size as f64 / BYTES_PER_MB,
                compressed_size as f64 / BYTES_PER_MB,
                job.compression_ratio.unwrap_or_default()
            ));
            job
        }
        Err(e) => {
            let detail = e.detail();
            logger.log_error(&format!("compressing {} failed: {}", task.source_filename, detail));

            // A partial output cannot be downloaded once the job has failed
            if let Err(e) = remove_file_if_exists(&output_path).await {
                logger.log_warning(&format!("failed to remove partial output: {}", e));
            }

            let job = ctx
                .registry
                .update(&task.job_id, |job| job.fail(detail))
                .await?;
            metrics::record_job_failed(task.mode);
            job
        }
    };

    if let Err(e) = remove_file_if_exists(&temp_input).await {
        logger.log_warning(&format!("failed to remove temp input: {}", e));
    }

    Ok(job)
}

/// Run FFmpeg, then measure both files and drop the source.
async fn compress(
    runner: FfmpegRunner,
    cmd: &FfmpegCommand,
    temp_input: &Path,
    output_path: &Path,
) -> WorkerResult<(u64, u64)> {
    runner.run(cmd).await?;

    let original_size = file_size(temp_input).await?;
    let compressed_size = file_size(output_path).await?;
    remove_file_if_exists(temp_input).await?;

    Ok((original_size, compressed_size))
}
