//! Job metrics.

use metrics::{counter, histogram};
use tkit_models::CompressionMode;

pub mod names {
    pub const JOBS_STARTED_TOTAL: &str = "tkit_jobs_started_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "tkit_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "tkit_jobs_failed_total";
    pub const FFMPEG_DURATION_SECONDS: &str = "tkit_ffmpeg_duration_seconds";
    pub const BYTES_SAVED_TOTAL: &str = "tkit_bytes_saved_total";
}

pub fn record_job_started(mode: CompressionMode) {
    let labels = [("mode", mode.as_str().to_string())];
    counter!(names::JOBS_STARTED_TOTAL, &labels).increment(1);
}

pub fn record_job_completed(mode: CompressionMode, original_size: u64, compressed_size: u64) {
    let labels = [("mode", mode.as_str().to_string())];
    counter!(names::JOBS_COMPLETED_TOTAL, &labels).increment(1);
    counter!(names::BYTES_SAVED_TOTAL).increment(original_size.saturating_sub(compressed_size));
}

pub fn record_job_failed(mode: CompressionMode) {
    let labels = [("mode", mode.as_str().to_string())];
    counter!(names::JOBS_FAILED_TOTAL, &labels).increment(1);
}

pub fn record_ffmpeg_duration(encoder: &str, duration_secs: f64) {
    let labels = [("encoder", encoder.to_string())];
    histogram!(names::FFMPEG_DURATION_SECONDS, &labels).record(duration_secs);
}
