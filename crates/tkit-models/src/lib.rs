//! Shared data models for the toolkit video compressor.
//!
//! This crate provides Serde-serializable types for:
//! - Video compression jobs and their status lifecycle
//! - Compression modes and output naming
//! - Encoder selection and the per-encoder quality table

pub mod compression;
pub mod encoding;
pub mod error;
pub mod job;

// Re-export common types
pub use compression::CompressionMode;
pub use encoding::{CodecDetails, Encoder, EncoderChoice, HwAccel, Preset, QualityParams};
pub use error::{ModelError, ModelResult};
pub use job::{compression_ratio, JobId, JobStatus, VideoJob};
