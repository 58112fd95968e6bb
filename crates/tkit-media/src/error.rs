//! Error types for media operations.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during media processing.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found: {0}")]
    FfmpegNotFound(PathBuf),

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MediaError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Text to show the client: captured stderr when there is any,
    /// otherwise the error message itself.
    pub fn detail(&self) -> String {
        match self {
            MediaError::FfmpegFailed {
                stderr: Some(stderr),
                ..
            } if !stderr.trim().is_empty() => stderr.trim().to_string(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_prefers_stderr() {
        let err = MediaError::ffmpeg_failed(
            "FFmpeg exited with non-zero status",
            Some("clip.mp4: Invalid data found when processing input\n".to_string()),
            Some(1),
        );
        assert_eq!(err.detail(), "clip.mp4: Invalid data found when processing input");
    }

    #[test]
    fn test_detail_falls_back_to_message() {
        let err = MediaError::ffmpeg_failed("FFmpeg exited with non-zero status", None, Some(1));
        assert_eq!(err.detail(), "FFmpeg command failed: FFmpeg exited with non-zero status");

        let err = MediaError::ffmpeg_failed("exit 1", Some("  \n".to_string()), Some(1));
        assert_eq!(err.detail(), "FFmpeg command failed: exit 1");

        assert_eq!(
            MediaError::Timeout(Duration::from_secs(5)).detail(),
            "Operation timed out after 5s"
        );
    }
}
