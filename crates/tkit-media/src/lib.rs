//! FFmpeg CLI wrapper for video compression.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building, including the HEVC compression preset
//! - A runner that captures stderr and supports timeout and cancellation
//! - Filesystem helpers for the temp/output directories

pub mod command;
pub mod error;
pub mod fs_utils;

pub use command::{check_ffmpeg, FfmpegCommand, FfmpegRunner, DEFAULT_FFMPEG};
pub use error::{MediaError, MediaResult};
pub use fs_utils::{ensure_dir, file_size, remove_file_if_exists};
