//! Worker configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tkit_media::DEFAULT_FFMPEG;
use tkit_models::EncoderChoice;
use tracing::warn;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Directory receiving uploads
    pub temp_dir: PathBuf,
    /// Directory receiving compressed outputs
    pub output_dir: PathBuf,
    /// FFmpeg binary
    pub ffmpeg_path: PathBuf,
    /// Encoder used for every job
    pub encoder: EncoderChoice,
    /// Maximum concurrent jobs (`None` = unlimited)
    pub max_concurrent_jobs: Option<usize>,
    /// Per-job FFmpeg timeout (`None` = wait forever)
    pub job_timeout: Option<Duration>,
    /// Graceful shutdown timeout
    pub shutdown_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            temp_dir: PathBuf::from("temp"),
            output_dir: PathBuf::from("output"),
            ffmpeg_path: PathBuf::from(DEFAULT_FFMPEG),
            encoder: EncoderChoice::detect(),
            max_concurrent_jobs: None,
            job_timeout: None,
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let encoder = match std::env::var("ENCODER_OVERRIDE") {
            Ok(value) if !value.trim().is_empty() => {
                EncoderChoice::from_override(&value).unwrap_or_else(|| {
                    warn!("Unknown ENCODER_OVERRIDE '{}', using platform detection", value);
                    EncoderChoice::detect()
                })
            }
            _ => EncoderChoice::detect(),
        };

        Self {
            temp_dir: std::env::var("TEMP_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("temp")),
            output_dir: std::env::var("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("output")),
            ffmpeg_path: std::env::var("FFMPEG_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_FFMPEG)),
            encoder,
            max_concurrent_jobs: std::env::var("MAX_CONCURRENT_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &usize| *n > 0),
            job_timeout: std::env::var("JOB_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &u64| *n > 0)
                .map(Duration::from_secs),
            shutdown_timeout: Duration::from_secs(
                std::env::var("WORKER_SHUTDOWN_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        }
    }

    /// Path of an uploaded file.
    pub fn temp_path(&self, filename: &str) -> PathBuf {
        self.temp_dir.join(filename)
    }

    /// Path of a compressed output.
    pub fn output_path(&self, filename: &str) -> PathBuf {
        self.output_dir.join(filename)
    }

    /// Configuration rooted at a base directory, for tests and embedding.
    pub fn with_base_dir(base: impl AsRef<Path>) -> Self {
        let base = base.as_ref();
        Self {
            temp_dir: base.join("temp"),
            output_dir: base.join("output"),
            ..Default::default()
        }
    }
}
