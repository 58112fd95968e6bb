//! Axum HTTP API server for the video compressor.
//!
//! This crate provides:
//! - Upload, status and download endpoints backed by the job executor
//! - Health and readiness probes
//! - Request id, logging and security header middleware
//! - Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
