//! Video compression handlers.

use std::path::{Component, PathBuf};
use std::time::Instant;

use axum::body::Body;
use axum::extract::multipart::Field;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures_util::StreamExt;
use serde::Serialize;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::{info, warn};

use tkit_media::{remove_file_if_exists, MediaError};
use tkit_models::{CodecDetails, CompressionMode, JobId, VideoJob};
use tkit_worker::CompressionTask;

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Response for an accepted upload.
#[derive(Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub job_id: JobId,
    pub filename: String,
    pub size: u64,
    pub encoder: String,
    pub codec_details: CodecDetails,
    pub compression_mode: CompressionMode,
}

/// Store an uploaded video and start compressing it in the background.
///
/// Multipart fields: `file` (required) and `compression_mode` (optional,
/// `standard` or `deep`).
pub async fn upload_video(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let started = Instant::now();
    let mut stored: Option<(String, u64)> = None;
    let mut mode = CompressionMode::default();

    if let Err(e) = read_upload_form(&state, &mut multipart, &mut stored, &mut mode).await {
        // No job will ever own a file stored before the form failed
        if let Some((filename, _)) = &stored {
            let path = state.worker_config().temp_path(filename);
            if let Err(remove_err) = remove_file_if_exists(&path).await {
                warn!("Failed to remove abandoned upload {}: {}", path.display(), remove_err);
            }
        }
        return Err(e);
    }

    let (filename, size) = stored.ok_or_else(|| ApiError::bad_request("No filename provided"))?;

    let job = VideoJob::new(JobId::new(), filename.clone(), mode);
    let job_id = job.job_id.clone();
    let task = CompressionTask::from(&job);
    state.registry().insert(job).await;

    info!(
        job_id = %job_id.short(),
        "Uploaded {} ({:.2} MB)",
        filename,
        size as f64 / BYTES_PER_MB
    );
    metrics::record_upload(mode.as_str(), size, started.elapsed().as_secs_f64());

    state.executor.spawn(task);

    let encoder = state.worker_config().encoder;
    Ok(Json(UploadResponse {
        message: format!(
            "Successfully uploaded {}. Compression started in background.",
            filename
        ),
        job_id,
        filename,
        size,
        encoder: encoder.label().to_string(),
        codec_details: CodecDetails::describe(&encoder, mode),
        compression_mode: mode,
    }))
}

/// Read every form field, storing the first `file` field in the temp directory.
async fn read_upload_form(
    state: &AppState,
    multipart: &mut Multipart,
    stored: &mut Option<(String, u64)>,
    mode: &mut CompressionMode,
) -> ApiResult<()> {
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("file") if stored.is_none() => {
                let filename = upload_filename(field.file_name())
                    .ok_or_else(|| ApiError::bad_request("No filename provided"))?;
                let path = state.worker_config().temp_path(&filename);
                let size = save_field(field, &path).await?;
                *stored = Some((filename, size));
            }
            Some("compression_mode") => {
                *mode = CompressionMode::parse_lenient(&field.text().await?);
            }
            _ => {}
        }
    }
    Ok(())
}

/// Get the status of a compression job.
pub async fn get_job_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<VideoJob>> {
    state
        .registry()
        .get(&JobId::from_string(job_id))
        .await
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Job not found"))
}

/// Stream a compressed video, then delete it and its temp input.
pub async fn download_video(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> ApiResult<Response> {
    if !is_plain_filename(&filename) {
        return Err(ApiError::bad_request("Invalid filename"));
    }

    let config = state.worker_config();
    let path = config.output_path(&filename);

    let size = match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => meta.len(),
        Ok(_) => return Err(ApiError::not_found("File not found")),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::not_found("File not found"))
        }
        Err(e) => return Err(MediaError::from(e).into()),
    };
    let file = match File::open(&path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::not_found("File not found"))
        }
        Err(e) => return Err(MediaError::from(e).into()),
    };

    let cleanup = DownloadCleanup {
        output: path,
        temp_input: CompressionMode::source_filename(&filename).map(|s| config.temp_path(s)),
    };

    let stream = ReaderStream::new(file).map(move |chunk| {
        // Moves the guard into the stream; cleanup runs when the body is finished or dropped
        let _ = &cleanup;
        chunk
    });

    metrics::record_download();
    info!("Serving {} ({} bytes)", filename, size);

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("video/mp4")),
            (header::CONTENT_LENGTH, HeaderValue::from(size)),
            (header::CONTENT_DISPOSITION, content_disposition(&filename)?),
        ],
        Body::from_stream(stream),
    )
        .into_response())
}

/// Final path component of a client-supplied file name.
fn upload_filename(raw: Option<&str>) -> Option<String> {
    let name = raw?.rsplit(['/', '\\']).next()?.trim();
    is_plain_filename(name).then(|| name.to_string())
}

/// A single normal path component: no separators, not `.` or `..`.
fn is_plain_filename(name: &str) -> bool {
    if name.contains(['/', '\\']) {
        return false;
    }
    let mut components = std::path::Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

fn content_disposition(filename: &str) -> ApiResult<HeaderValue> {
    let value = format!("attachment; filename=\"{}\"", filename.replace('"', "\\\""));
    HeaderValue::from_bytes(value.as_bytes())
        .map_err(|_| ApiError::bad_request("Invalid filename"))
}

/// Write a multipart field to disk chunk by chunk.
async fn save_field(mut field: Field<'_>, path: &std::path::Path) -> ApiResult<u64> {
    let mut file = File::create(path).await.map_err(MediaError::from)?;

    let mut written = 0u64;
    let result: ApiResult<()> = async {
        while let Some(chunk) = field.chunk().await? {
            file.write_all(&chunk).await.map_err(MediaError::from)?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(MediaError::from)?;
        Ok(())
    }
    .await;

    if let Err(e) = result {
        drop(file);
        if let Err(remove_err) = remove_file_if_exists(path).await {
            warn!("Failed to remove partial upload {}: {}", path.display(), remove_err);
        }
        return Err(e);
    }

    Ok(written)
}

/// Removes a downloaded output and its temp input when dropped.
struct DownloadCleanup {
    output: PathBuf,
    temp_input: Option<PathBuf>,
}

impl Drop for DownloadCleanup {
    fn drop(&mut self) {
        let output = std::mem::take(&mut self.output);
        let temp_input = self.temp_input.take();

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(cleanup_files(output, temp_input));
            }
            Err(_) => warn!("No runtime available, skipping cleanup of {}", output.display()),
        }
    }
}

async fn cleanup_files(output: PathBuf, temp_input: Option<PathBuf>) {
    match remove_file_if_exists(&output).await {
        Ok(true) => info!("Cleaned up compressed file: {}", output.display()),
        Ok(false) => {}
        Err(e) => {
            warn!("Cleanup error for {}: {}", output.display(), e);
            metrics::record_cleanup_failure("output");
        }
    }

    if let Some(temp_input) = temp_input {
        match remove_file_if_exists(&temp_input).await {
            Ok(true) => info!("Cleaned up temp file: {}", temp_input.display()),
            Ok(false) => {}
            Err(e) => {
                warn!("Cleanup error for {}: {}", temp_input.display(), e);
                metrics::record_cleanup_failure("temp_input");
            }
        }
    }
}
