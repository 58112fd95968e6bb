//! Video compression job record.
//!
//! A job moves forward along `uploaded -> processing -> {completed|failed}`
//! and is never revisited once terminal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::compression::CompressionMode;
use crate::error::{ModelError, ModelResult};

/// Job identifier (UUID v4 string).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Generate a fresh identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight characters, for log lines.
    pub fn short(&self) -> &str {
        self.0.get(..8).unwrap_or(&self.0)
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Job processing status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Upload stored, waiting for the background task
    #[default]
    Uploaded,
    /// FFmpeg is running
    Processing,
    /// Output written
    Completed,
    /// FFmpeg or the filesystem failed
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Uploaded => "uploaded",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Position along the lifecycle; both terminal states share a rank.
    fn rank(&self) -> u8 {
        match self {
            JobStatus::Uploaded => 0,
            JobStatus::Processing => 1,
            JobStatus::Completed | JobStatus::Failed => 2,
        }
    }

    /// Whether moving from `self` to `next` goes strictly forward.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Size reduction in percent, `(1 - compressed / original) * 100`.
///
/// An empty original yields `0.0`.
pub fn compression_ratio(original_size: u64, compressed_size: u64) -> f64 {
    if original_size == 0 {
        return 0.0;
    }
    (1.0 - compressed_size as f64 / original_size as f64) * 100.0
}

/// Status record returned by the status endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoJob {
    pub job_id: JobId,
    pub status: JobStatus,
    /// Uploaded file name inside the temp directory
    pub source_filename: String,
    pub compression_mode: CompressionMode,
    /// Output file name; set once processing starts, cleared on failure
    pub filename: Option<String>,
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compressed_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression_ratio: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VideoJob {
    /// Create a record for a freshly stored upload.
    pub fn new(job_id: JobId, source_filename: impl Into<String>, mode: CompressionMode) -> Self {
        let now = Utc::now();
        Self {
            job_id,
            status: JobStatus::Uploaded,
            source_filename: source_filename.into(),
            compression_mode: mode,
            filename: None,
            error: None,
            original_size: None,
            compressed_size: None,
            compression_ratio: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Output file name derived from the source name and mode.
    pub fn output_filename(&self) -> String {
        self.compression_mode.output_filename(&self.source_filename)
    }

    fn transition(&mut self, next: JobStatus) -> ModelResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(ModelError::invalid_transition(self.status, next));
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Mark the job as processing.
    pub fn start_processing(&mut self) -> ModelResult<()> {
        self.transition(JobStatus::Processing)?;
        self.filename = Some(self.output_filename());
        self.error = None;
        Ok(())
    }

    /// Mark the job as completed with its size statistics.
    pub fn complete(&mut self, original_size: u64, compressed_size: u64) -> ModelResult<()> {
        if self.status != JobStatus::Processing {
            return Err(ModelError::invalid_transition(self.status, JobStatus::Completed));
        }
        self.transition(JobStatus::Completed)?;
        self.filename = Some(self.output_filename());
        self.original_size = Some(original_size);
        self.compressed_size = Some(compressed_size);
        self.compression_ratio = Some(compression_ratio(original_size, compressed_size));
        self.error = None;
        Ok(())
    }

    /// Mark the job as failed with an error message.
    pub fn fail(&mut self, error: impl Into<String>) -> ModelResult<()> {
        self.transition(JobStatus::Failed)?;
        self.filename = None;
        self.error = Some(error.into());
        Ok(())
    }
}
