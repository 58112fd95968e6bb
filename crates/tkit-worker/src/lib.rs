//! Background video compression jobs.
//!
//! This crate provides:
//! - An injected job registry shared with the HTTP handlers
//! - The job runner that drives FFmpeg and records the outcome
//! - A job executor that spawns jobs with cancellation, an optional
//!   concurrency cap and graceful shutdown

pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod metrics;
pub mod processor;
pub mod registry;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::JobExecutor;
pub use logging::JobLogger;
pub use processor::{process_video, CompressionTask, ProcessingContext};
pub use registry::JobRegistry;
