//! FFmpeg command builder and runner.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use tkit_models::encoding::{AUDIO_BITRATE, AUDIO_CODEC, MOVFLAGS, VIDEO_TAG};
use tkit_models::{CompressionMode, EncoderChoice, QualityParams};

use crate::error::{MediaError, MediaResult};

/// Default FFmpeg program name, resolved through `PATH`.
pub const DEFAULT_FFMPEG: &str = "ffmpeg";

/// Builder for FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Input file path
    input: PathBuf,
    /// Output file path
    output: PathBuf,
    /// Input arguments (before -i)
    input_args: Vec<String>,
    /// Output arguments (after -i)
    output_args: Vec<String>,
    /// Whether to overwrite output
    overwrite: bool,
    /// Log level
    log_level: Option<String>,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command.
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            input_args: Vec::new(),
            output_args: Vec::new(),
            overwrite: true,
            log_level: None,
        }
    }

    /// HEVC compression command for an encoder choice and mode.
    ///
    /// Produces
    /// `-v error [-hwaccel <hw>] -i <input> -c:v <enc> <quality> -c:a aac -b:a 128k
    /// -tag:v hvc1 -movflags +faststart -y <output>`.
    pub fn compression(
        choice: &EncoderChoice,
        mode: CompressionMode,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
    ) -> Self {
        let mut cmd = Self::new(input, output).log_level("error");

        if let Some(hwaccel) = choice.hwaccel {
            cmd = cmd.hwaccel(hwaccel.as_str());
        }

        cmd.video_codec(choice.encoder.ffmpeg_name())
            .output_args(QualityParams::lookup(choice.encoder, mode).to_ffmpeg_args())
            .audio_codec(AUDIO_CODEC)
            .audio_bitrate(AUDIO_BITRATE)
            .video_tag(VIDEO_TAG)
            .movflags(MOVFLAGS)
    }

    /// Add input arguments (before -i).
    pub fn input_arg(mut self, arg: impl Into<String>) -> Self {
        self.input_args.push(arg.into());
        self
    }

    /// Add output arguments (after -i).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set hardware acceleration for decoding.
    pub fn hwaccel(self, method: impl Into<String>) -> Self {
        self.input_arg("-hwaccel").input_arg(method)
    }

    /// Set video codec.
    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:v").output_arg(codec)
    }

    /// Set audio codec.
    pub fn audio_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:a").output_arg(codec)
    }

    /// Set audio bitrate.
    pub fn audio_bitrate(self, bitrate: impl Into<String>) -> Self {
        self.output_arg("-b:a").output_arg(bitrate)
    }

    /// Set the video codec tag.
    pub fn video_tag(self, tag: impl Into<String>) -> Self {
        self.output_arg("-tag:v").output_arg(tag)
    }

    /// Set muxer flags.
    pub fn movflags(self, flags: impl Into<String>) -> Self {
        self.output_arg("-movflags").output_arg(flags)
    }

    /// Set log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = Some(level.into());
        self
    }

    /// Set whether an existing output file is overwritten.
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if let Some(level) = &self.log_level {
            args.push("-v".to_string());
            args.push(level.clone());
        }

        // Input args
        args.extend(self.input_args.iter().cloned());

        // Input file
        args.push("-i".to_string());
        args.push(self.input.to_string_lossy().to_string());

        // Output args
        args.extend(self.output_args.iter().cloned());

        // Overwrite flag
        if self.overwrite {
            args.push("-y".to_string());
        }

        // Output file
        args.push(self.output.to_string_lossy().to_string());

        args
    }
}

/// Runner for FFmpeg commands with stderr capture, timeout and cancellation.
#[derive(Debug, Clone)]
pub struct FfmpegRunner {
    /// FFmpeg binary
    program: PathBuf,
    /// Cancellation signal receiver
    cancel_rx: Option<watch::Receiver<bool>>,
    /// Timeout
    timeout: Option<Duration>,
}

impl Default for FfmpegRunner {
    fn default() -> Self {
        Self::new()
    }
}

enum WaitOutcome {
    Exited(std::io::Result<ExitStatus>),
    TimedOut(Duration),
    Cancelled,
}

impl FfmpegRunner {
    /// Create a new runner using `ffmpeg` from `PATH`.
    pub fn new() -> Self {
        Self::with_program(DEFAULT_FFMPEG)
    }

    /// Create a runner for a specific FFmpeg binary.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            cancel_rx: None,
            timeout: None,
        }
    }

    /// Set cancellation signal.
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    /// Set timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Run an FFmpeg command to completion.
    ///
    /// A non-zero exit becomes [`MediaError::FfmpegFailed`] carrying the
    /// captured stderr.
    pub async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        let args = cmd.build_args();
        debug!("Running FFmpeg: {} {}", self.program.display(), args.join(" "));

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => MediaError::FfmpegNotFound(self.program.clone()),
                _ => MediaError::from(e),
            })?;

        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::internal("stderr not captured"))?;

        // Drain stderr concurrently so a chatty encoder cannot fill the pipe
        let stderr_handle = tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = stderr.read_to_end(&mut buf).await;
            String::from_utf8_lossy(&buf).into_owned()
        });

        let result = self.wait_for_completion(&mut child).await;
        let stderr_text = stderr_handle.await.unwrap_or_default();
        let status = result?;

        if status.success() {
            Ok(())
        } else {
            let stderr = (!stderr_text.trim().is_empty()).then_some(stderr_text);
            Err(MediaError::ffmpeg_failed(
                "FFmpeg exited with non-zero status",
                stderr,
                status.code(),
            ))
        }
    }

    /// Wait for child process with cancellation and timeout.
    async fn wait_for_completion(&self, child: &mut Child) -> MediaResult<ExitStatus> {
        let timeout = self.timeout;
        let timed_out = async move {
            match timeout {
                Some(limit) => {
                    tokio::time::sleep(limit).await;
                    limit
                }
                None => std::future::pending().await,
            }
        };

        let outcome = tokio::select! {
            status = child.wait() => WaitOutcome::Exited(status),
            limit = timed_out => WaitOutcome::TimedOut(limit),
            _ = cancelled(self.cancel_rx.clone()) => WaitOutcome::Cancelled,
        };

        match outcome {
            WaitOutcome::Exited(status) => Ok(status?),
            WaitOutcome::TimedOut(limit) => {
                warn!("FFmpeg timed out after {:?}, killing process", limit);
                let _ = child.kill().await;
                Err(MediaError::Timeout(limit))
            }
            WaitOutcome::Cancelled => {
                info!("FFmpeg cancelled, killing process");
                let _ = child.kill().await;
                Err(MediaError::Cancelled)
            }
        }
    }
}

/// Resolves once the signal flips to `true`; never resolves without one.
async fn cancelled(cancel_rx: Option<watch::Receiver<bool>>) {
    let Some(mut rx) = cancel_rx else {
        return std::future::pending().await;
    };

    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            // Sender gone without cancelling
            return std::future::pending().await;
        }
    }
}

/// Check if FFmpeg is available.
pub fn check_ffmpeg(program: impl AsRef<Path>) -> MediaResult<PathBuf> {
    let program = program.as_ref();
    which::which(program).map_err(|_| MediaError::FfmpegNotFound(program.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compression_args(choice: EncoderChoice, mode: CompressionMode) -> Vec<String> {
        FfmpegCommand::compression(&choice, mode, "temp/clip.mp4", "output/compressed_clip.mp4")
            .build_args()
    }

    #[test]
    fn test_command_builder() {
        let cmd = FfmpegCommand::new("input.mp4", "output.mp4")
            .hwaccel("qsv")
            .video_codec("hevc_qsv")
            .audio_codec("aac");

        let args = cmd.build_args();
        assert_eq!(
            args,
            vec!["-hwaccel", "qsv", "-i", "input.mp4", "-c:v", "hevc_qsv", "-c:a", "aac", "-y", "output.mp4"]
        );
    }

    #[test]
    fn test_no_overwrite() {
        let args = FfmpegCommand::new("in.mp4", "out.mp4").overwrite(false).build_args();
        assert!(!args.contains(&"-y".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("out.mp4"));
    }

    #[test]
    fn test_quick_sync_compression_args() {
        let args = compression_args(EncoderChoice::QUICK_SYNC, CompressionMode::Standard);
        assert_eq!(
            args,
            vec![
                "-v", "error",
                "-hwaccel", "qsv",
                "-i", "temp/clip.mp4",
                "-c:v", "hevc_qsv",
                "-global_quality", "25",
                "-preset", "slow",
                "-c:a", "aac",
                "-b:a", "128k",
                "-tag:v", "hvc1",
                "-movflags", "+faststart",
                "-y",
                "output/compressed_clip.mp4",
            ]
        );
    }

    #[test]
    fn test_software_has_no_hwaccel() {
        let args = compression_args(EncoderChoice::SOFTWARE, CompressionMode::Deep);
        assert!(!args.contains(&"-hwaccel".to_string()));
        let crf = args.iter().position(|a| a == "-crf").unwrap();
        assert_eq!(args[crf + 1], "30");
        let preset = args.iter().position(|a| a == "-preset").unwrap();
        assert_eq!(args[preset + 1], "veryslow");
    }

    #[test]
    fn test_videotoolbox_args() {
        let args = compression_args(EncoderChoice::VIDEOTOOLBOX, CompressionMode::Standard);
        let hw = args.iter().position(|a| a == "-hwaccel").unwrap();
        assert_eq!(args[hw + 1], "videotoolbox");
        assert!(hw < args.iter().position(|a| a == "-i").unwrap());
        let bitrate = args.iter().position(|a| a == "-b:v").unwrap();
        assert_eq!(args[bitrate + 1], "2M");
    }

    #[test]
    fn test_builder_is_deterministic() {
        for choice in [EncoderChoice::VIDEOTOOLBOX, EncoderChoice::QUICK_SYNC, EncoderChoice::SOFTWARE] {
            for mode in [CompressionMode::Standard, CompressionMode::Deep] {
                assert_eq!(compression_args(choice, mode), compression_args(choice, mode));
            }
        }
    }

    #[test]
    fn test_trailing_args_common_to_all_encoders() {
        for choice in [EncoderChoice::VIDEOTOOLBOX, EncoderChoice::QUICK_SYNC, EncoderChoice::SOFTWARE] {
            let args = compression_args(choice, CompressionMode::Deep);
            let tail: Vec<&str> = args[args.len() - 10..].iter().map(String::as_str).collect();
            assert_eq!(
                tail,
                vec![
                    "-c:a", "aac", "-b:a", "128k", "-tag:v", "hvc1", "-movflags", "+faststart", "-y",
                    "output/compressed_clip.mp4"
                ]
            );
        }
    }

    #[tokio::test]
    async fn test_missing_program() {
        let runner = FfmpegRunner::with_program("/nonexistent/ffmpeg-binary");
        let cmd = FfmpegCommand::new("in.mp4", "out.mp4");
        let err = runner.run(&cmd).await.unwrap_err();
        assert!(matches!(err, MediaError::FfmpegNotFound(_)));
    }

    #[cfg(unix)]
    mod process {
        use super::*;
        use std::os::unix::fs::PermissionsExt;
        use tempfile::TempDir;

        fn script(dir: &TempDir, body: &str) -> PathBuf {
            let path = dir.path().join("fake-ffmpeg");
            std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        #[tokio::test]
        async fn test_success_writes_output() {
            let dir = TempDir::new().unwrap();
            // Last argument is the output path
            let program = script(&dir, "for last; do :; done\nprintf 'hevc' > \"$last\"");
            let output = dir.path().join("out.mp4");

            let runner = FfmpegRunner::with_program(program);
            runner
                .run(&FfmpegCommand::new("in.mp4", &output))
                .await
                .unwrap();
            assert_eq!(std::fs::read(&output).unwrap(), b"hevc");
        }

        #[tokio::test]
        async fn test_failure_captures_stderr() {
            let dir = TempDir::new().unwrap();
            let program = script(&dir, "echo 'in.mp4: Invalid data found when processing input' >&2\nexit 1");

            let runner = FfmpegRunner::with_program(program);
            let err = runner
                .run(&FfmpegCommand::new("in.mp4", "out.mp4"))
                .await
                .unwrap_err();

            match &err {
                MediaError::FfmpegFailed { stderr, exit_code, .. } => {
                    assert_eq!(*exit_code, Some(1));
                    assert!(stderr.as_deref().unwrap().contains("Invalid data"));
                }
                other => panic!("unexpected error: {other:?}"),
            }
            assert_eq!(err.detail(), "in.mp4: Invalid data found when processing input");
        }

        #[tokio::test]
        async fn test_timeout_kills_process() {
            let dir = TempDir::new().unwrap();
            let program = script(&dir, "exec sleep 10");

            let runner = FfmpegRunner::with_program(program).with_timeout(Duration::from_millis(200));
            let started = std::time::Instant::now();
            let err = runner
                .run(&FfmpegCommand::new("in.mp4", "out.mp4"))
                .await
                .unwrap_err();

            assert!(matches!(err, MediaError::Timeout(_)));
            assert!(started.elapsed() < Duration::from_secs(5));
        }

        #[tokio::test]
        async fn test_cancellation_kills_process() {
            let dir = TempDir::new().unwrap();
            let program = script(&dir, "exec sleep 10");
            let (cancel_tx, cancel_rx) = watch::channel(false);

            let runner = FfmpegRunner::with_program(program).with_cancel(cancel_rx);
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                let _ = cancel_tx.send(true);
            });

            let err = runner
                .run(&FfmpegCommand::new("in.mp4", "out.mp4"))
                .await
                .unwrap_err();
            assert!(matches!(err, MediaError::Cancelled));
        }
    }
}
