//! Export encoding: the frame-encoder contract and its implementations.
//!
//! The export pipeline (driven by the engine) renders the timeline on a
//! fixed frame grid and feeds composited frames plus PCM blocks into a
//! [`FrameEncoder`]. Timestamps are quantized to the frame/sample grid
//! by the caller and monotonically increasing; an encoder may trust
//! them. `FfmpegEncoder` drives an external ffmpeg process: raw RGBA
//! frames over stdin, mixed PCM as an f32le sidecar, then a mux pass.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use playcut_backend_core::{FramePixels, MediaBackend, MediaHandle};
use playcut_common::{EngineError, EngineResult};
use playcut_timeline_model::{ExportFormat, ExportSettings};

/// Encoder configuration resolved from export settings and backend
/// capabilities.
#[derive(Debug, Clone)]
pub struct EncoderConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub sample_rate: u32,
    pub channels: u16,
    pub video_bitrate_kbps: u32,
    pub audio_bitrate_kbps: u32,
    pub format: ExportFormat,
}

impl EncoderConfig {
    pub fn from_settings(settings: &ExportSettings, channels: u16) -> Self {
        Self {
            width: settings.width,
            height: settings.height,
            fps: settings.fps,
            sample_rate: settings.sample_rate,
            channels,
            video_bitrate_kbps: settings.video_bitrate_kbps,
            audio_bitrate_kbps: settings.audio_bitrate_kbps,
            format: settings.format,
        }
    }
}

/// Reference to the finished export.
#[derive(Debug, Clone, Default)]
pub struct ExportOutput {
    /// Encoded video frames.
    pub video_frames: u64,
    /// Encoded audio sample frames.
    pub audio_sample_frames: u64,
    /// Output file, for encoders that write to disk.
    pub path: Option<PathBuf>,
    /// Output buffer, for encoders that finalize in memory.
    pub bytes: Option<Vec<u8>>,
}

/// How an export run ended.
#[derive(Debug)]
pub enum ExportOutcome {
    Completed(ExportOutput),
    /// Cancelled; partial output was discarded.
    Aborted,
}

/// Cancellation handle for a running export. Cloneable; aborting from
/// any clone cancels the run at its next suspension or frame boundary.
#[derive(Debug, Clone, Default)]
pub struct ExportAbort(Arc<AtomicBool>);

impl ExportAbort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Progress callback for export rendering.
pub type ProgressCallback = Box<dyn Fn(ExportProgress) + Send>;

/// Export progress report.
#[derive(Debug, Clone)]
pub struct ExportProgress {
    /// Current progress [0.0, 1.0].
    pub progress: f64,

    /// Frames rendered so far.
    pub frames_rendered: u64,

    /// Total frames to render.
    pub total_frames: u64,

    /// Estimated time remaining in seconds.
    pub eta_secs: f64,

    /// Current stage.
    pub stage: ExportStage,
}

/// Stages of the export process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportStage {
    Preparing,
    Rendering,
    Finalizing,
    Complete,
    Aborted,
    Failed,
}

/// Sink for composited frames and PCM blocks.
pub trait FrameEncoder: Send {
    /// Validate and apply the output configuration. Fails with
    /// `EncoderUnsupported` when the configuration cannot be produced.
    fn configure(&mut self, config: &EncoderConfig) -> EngineResult<()>;

    /// Encode one video frame with its quantized timestamp.
    fn write_video_frame(&mut self, frame: &FramePixels, timestamp_us: u64) -> EngineResult<()>;

    /// Encode one block of interleaved f32 PCM with its sample-derived
    /// timestamp.
    fn write_audio_block(&mut self, samples: &[f32], timestamp_us: u64) -> EngineResult<()>;

    /// Flush both streams and finalize the container.
    fn finish(&mut self) -> EngineResult<ExportOutput>;

    /// Discard all partial output. Must leave the encoder reusable
    /// after a fresh `configure`.
    fn abort(&mut self);
}

/// In-memory encoder that records what it was fed. Used by tests and
/// synthetic CLI exports to verify stream structure without a codec.
#[derive(Debug, Default)]
pub struct CollectingEncoder {
    config: Option<EncoderConfig>,
    /// Timestamps of every encoded video frame, in order.
    pub video_timestamps: Vec<u64>,
    /// Timestamps of every encoded audio block, in order.
    pub audio_timestamps: Vec<u64>,
    audio_sample_frames: u64,
    /// Make `configure` fail (EncoderUnsupported testing).
    pub reject_configuration: bool,
    aborted: bool,
}

impl CollectingEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn was_aborted(&self) -> bool {
        self.aborted
    }
}

impl FrameEncoder for CollectingEncoder {
    fn configure(&mut self, config: &EncoderConfig) -> EngineResult<()> {
        if self.reject_configuration {
            return Err(EngineError::encoder_unsupported(format!(
                "{}x{} @ {} rejected by test encoder",
                config.width, config.height, config.fps
            )));
        }
        self.config = Some(config.clone());
        self.video_timestamps.clear();
        self.audio_timestamps.clear();
        self.audio_sample_frames = 0;
        self.aborted = false;
        Ok(())
    }

    fn write_video_frame(&mut self, frame: &FramePixels, timestamp_us: u64) -> EngineResult<()> {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| EngineError::export("encoder not configured"))?;
        if frame.width != config.width || frame.height != config.height {
            return Err(EngineError::export(format!(
                "frame size {}x{} does not match configured {}x{}",
                frame.width, frame.height, config.width, config.height
            )));
        }
        if let Some(last) = self.video_timestamps.last() {
            if timestamp_us <= *last {
                return Err(EngineError::export("non-monotonic video timestamp"));
            }
        }
        self.video_timestamps.push(timestamp_us);
        Ok(())
    }

    fn write_audio_block(&mut self, samples: &[f32], timestamp_us: u64) -> EngineResult<()> {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| EngineError::export("encoder not configured"))?;
        self.audio_timestamps.push(timestamp_us);
        self.audio_sample_frames += samples.len() as u64 / u64::from(config.channels.max(1));
        Ok(())
    }

    fn finish(&mut self) -> EngineResult<ExportOutput> {
        Ok(ExportOutput {
            video_frames: self.video_timestamps.len() as u64,
            audio_sample_frames: self.audio_sample_frames,
            path: None,
            bytes: None,
        })
    }

    fn abort(&mut self) {
        self.aborted = true;
        self.config = None;
        self.video_timestamps.clear();
        self.audio_timestamps.clear();
        self.audio_sample_frames = 0;
    }
}

/// Encoder backed by an external ffmpeg process.
///
/// Pass one pipes raw RGBA frames into ffmpeg's stdin and encodes the
/// video stream to a temp file while PCM accumulates in memory; `finish`
/// writes the PCM as raw f32le and runs a second ffmpeg pass muxing both
/// streams into the final container.
pub struct FfmpegEncoder {
    output_path: PathBuf,
    config: Option<EncoderConfig>,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    pcm: Vec<f32>,
    video_frames: u64,
    temp_video: Option<PathBuf>,
    temp_audio: Option<PathBuf>,
}

impl FfmpegEncoder {
    pub fn new(output_path: impl Into<PathBuf>) -> Self {
        Self {
            output_path: output_path.into(),
            config: None,
            child: None,
            stdin: None,
            pcm: Vec::new(),
            video_frames: 0,
            temp_video: None,
            temp_audio: None,
        }
    }

    /// Whether ffmpeg is available on this system.
    pub fn is_available() -> bool {
        command_exists("ffmpeg")
    }

    fn cleanup_temps(&mut self) {
        for path in [self.temp_video.take(), self.temp_audio.take()]
            .into_iter()
            .flatten()
        {
            let _ = std::fs::remove_file(path);
        }
    }
}

impl FrameEncoder for FfmpegEncoder {
    fn configure(&mut self, config: &EncoderConfig) -> EngineResult<()> {
        if !Self::is_available() {
            return Err(EngineError::encoder_unsupported(
                "ffmpeg not found in PATH",
            ));
        }
        if config.width == 0 || config.height == 0 || config.fps == 0 {
            return Err(EngineError::encoder_unsupported(
                "zero-sized output configuration",
            ));
        }

        let stem = self
            .output_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "export".to_string());
        let temp_dir = std::env::temp_dir();
        let temp_video = temp_dir.join(format!(
            "playcut-{stem}-video.{}",
            temp_video_extension(config.format)
        ));
        let temp_audio = temp_dir.join(format!("playcut-{stem}-audio.f32le"));

        let mut args: Vec<String> = vec![
            "-y".into(),
            "-hide_banner".into(),
            "-loglevel".into(),
            "error".into(),
            "-f".into(),
            "rawvideo".into(),
            "-pix_fmt".into(),
            "rgba".into(),
            "-s".into(),
            format!("{}x{}", config.width, config.height),
            "-r".into(),
            config.fps.to_string(),
            "-i".into(),
            "-".into(),
            "-an".into(),
        ];
        args.extend(video_codec_args(config));
        args.push(temp_video.display().to_string());

        tracing::debug!(?args, "Starting ffmpeg video pass");
        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| EngineError::export(format!("Failed to start ffmpeg: {e}")))?;

        self.stdin = child.stdin.take();
        self.child = Some(child);
        self.config = Some(config.clone());
        self.pcm.clear();
        self.video_frames = 0;
        self.temp_video = Some(temp_video);
        self.temp_audio = Some(temp_audio);
        Ok(())
    }

    fn write_video_frame(&mut self, frame: &FramePixels, _timestamp_us: u64) -> EngineResult<()> {
        if frame.rgba.len() != frame.expected_len() {
            return Err(EngineError::export("malformed frame buffer"));
        }
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| EngineError::export("encoder not configured"))?;
        stdin
            .write_all(&frame.rgba)
            .map_err(|e| EngineError::export(format!("ffmpeg pipe write failed: {e}")))?;
        self.video_frames += 1;
        Ok(())
    }

    fn write_audio_block(&mut self, samples: &[f32], _timestamp_us: u64) -> EngineResult<()> {
        self.pcm.extend_from_slice(samples);
        Ok(())
    }

    fn finish(&mut self) -> EngineResult<ExportOutput> {
        let config = self
            .config
            .take()
            .ok_or_else(|| EngineError::export("encoder not configured"))?;

        // Close stdin so ffmpeg flushes and exits.
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let status = child
                .wait()
                .map_err(|e| EngineError::export(format!("Failed to wait on ffmpeg: {e}")))?;
            if !status.success() {
                self.cleanup_temps();
                return Err(EngineError::export(format!(
                    "ffmpeg video pass failed (status {status})"
                )));
            }
        }

        let temp_video = self
            .temp_video
            .clone()
            .ok_or_else(|| EngineError::export("missing video temp"))?;
        let temp_audio = self
            .temp_audio
            .clone()
            .ok_or_else(|| EngineError::export("missing audio temp"))?;

        // Raw little-endian f32 sidecar for the mux pass.
        let mut bytes = Vec::<u8>::with_capacity(self.pcm.len() * 4);
        for &sample in &self.pcm {
            bytes.extend_from_slice(&sample.clamp(-1.0, 1.0).to_le_bytes());
        }
        std::fs::write(&temp_audio, bytes)
            .map_err(|e| EngineError::export(format!("Failed to write PCM sidecar: {e}")))?;

        let mut args: Vec<String> = vec![
            "-y".into(),
            "-hide_banner".into(),
            "-loglevel".into(),
            "error".into(),
            "-i".into(),
            temp_video.display().to_string(),
            "-f".into(),
            "f32le".into(),
            "-ar".into(),
            config.sample_rate.to_string(),
            "-ac".into(),
            config.channels.to_string(),
            "-i".into(),
            temp_audio.display().to_string(),
            "-c:v".into(),
            "copy".into(),
        ];
        args.extend(audio_codec_args(&config));
        args.push("-shortest".into());
        args.push(self.output_path.display().to_string());

        tracing::debug!(?args, "Starting ffmpeg mux pass");
        let status = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| EngineError::export(format!("Failed to start ffmpeg mux: {e}")))?;

        self.cleanup_temps();
        if !status.success() {
            return Err(EngineError::export(format!(
                "ffmpeg mux pass failed (status {status})"
            )));
        }

        let audio_sample_frames = self.pcm.len() as u64 / u64::from(config.channels.max(1));
        tracing::info!(
            path = %self.output_path.display(),
            video_frames = self.video_frames,
            audio_sample_frames,
            "Export container finalized"
        );
        Ok(ExportOutput {
            video_frames: self.video_frames,
            audio_sample_frames,
            path: Some(self.output_path.clone()),
            bytes: None,
        })
    }

    fn abort(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        self.pcm.clear();
        self.video_frames = 0;
        self.config = None;
        self.cleanup_temps();
    }
}

impl Drop for FfmpegEncoder {
    fn drop(&mut self) {
        // Abandoned encoder: make sure no orphan process or temp files
        // outlive it.
        if self.child.is_some() {
            self.abort();
        }
    }
}

fn temp_video_extension(format: ExportFormat) -> &'static str {
    match format {
        ExportFormat::Mp4H264 | ExportFormat::Mp4H265 => "mp4",
        ExportFormat::Webm => "webm",
    }
}

fn video_codec_args(config: &EncoderConfig) -> Vec<String> {
    let bitrate = format!("{}k", config.video_bitrate_kbps.max(1000));
    match config.format {
        ExportFormat::Mp4H264 => vec![
            "-c:v".into(),
            "libx264".into(),
            "-preset".into(),
            "medium".into(),
            "-pix_fmt".into(),
            "yuv420p".into(),
            "-b:v".into(),
            bitrate,
        ],
        ExportFormat::Mp4H265 => vec![
            "-c:v".into(),
            "libx265".into(),
            "-preset".into(),
            "medium".into(),
            "-pix_fmt".into(),
            "yuv420p".into(),
            "-b:v".into(),
            bitrate,
        ],
        ExportFormat::Webm => vec![
            "-c:v".into(),
            "libvpx-vp9".into(),
            "-b:v".into(),
            bitrate,
        ],
    }
}

fn audio_codec_args(config: &EncoderConfig) -> Vec<String> {
    let bitrate = format!("{}k", config.audio_bitrate_kbps.max(64));
    match config.format {
        ExportFormat::Mp4H264 | ExportFormat::Mp4H265 => {
            vec!["-c:a".into(), "aac".into(), "-b:a".into(), bitrate]
        }
        ExportFormat::Webm => vec!["-c:a".into(), "libopus".into(), "-b:a".into(), bitrate],
    }
}

fn command_exists(binary: &str) -> bool {
    Command::new("sh")
        .arg("-c")
        .arg(format!("command -v {binary} >/dev/null 2>&1"))
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Reposition every source to its timeline-zero position and wait for
/// all seeks to complete, with a bounded timeout.
///
/// A timeout is logged and tolerated: starting slightly desynchronized
/// beats blocking the export forever on one slow source.
pub(crate) async fn preroll_barrier(
    media: &mut dyn MediaBackend,
    targets: &[(MediaHandle, f64)],
    timeout: Duration,
    poll: Duration,
    abort: &ExportAbort,
) -> EngineResult<()> {
    for (handle, secs) in targets {
        media.reposition(*handle, *secs);
    }

    let deadline = Instant::now() + timeout;
    loop {
        if abort.is_aborted() {
            return Err(EngineError::ExportAborted);
        }

        let mut pending = 0usize;
        for (handle, _) in targets {
            if !media.seek_completed(*handle) {
                pending += 1;
            }
        }
        if pending == 0 {
            return Ok(());
        }
        if Instant::now() >= deadline {
            tracing::warn!(pending, "Pre-roll barrier timed out; starting anyway");
            return Ok(());
        }
        tokio::time::sleep(poll).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collecting_encoder_rejects_non_monotonic_timestamps() {
        let mut encoder = CollectingEncoder::new();
        encoder
            .configure(&EncoderConfig {
                width: 64,
                height: 36,
                fps: 30,
                sample_rate: 48000,
                channels: 2,
                video_bitrate_kbps: 1000,
                audio_bitrate_kbps: 128,
                format: ExportFormat::Mp4H264,
            })
            .unwrap();

        let frame = FramePixels {
            width: 64,
            height: 36,
            rgba: vec![0; 64 * 36 * 4],
        };
        encoder.write_video_frame(&frame, 0).unwrap();
        encoder.write_video_frame(&frame, 33333).unwrap();
        assert!(encoder.write_video_frame(&frame, 33333).is_err());
    }

    #[test]
    fn abort_discards_partial_state() {
        let mut encoder = CollectingEncoder::new();
        encoder
            .configure(&EncoderConfig {
                width: 64,
                height: 36,
                fps: 30,
                sample_rate: 48000,
                channels: 2,
                video_bitrate_kbps: 1000,
                audio_bitrate_kbps: 128,
                format: ExportFormat::Mp4H264,
            })
            .unwrap();
        encoder.write_audio_block(&[0.0; 128], 0).unwrap();
        encoder.abort();

        assert!(encoder.was_aborted());
        assert!(encoder.video_timestamps.is_empty());
        assert!(encoder.audio_timestamps.is_empty());
    }

    #[tokio::test]
    async fn preroll_barrier_waits_for_all_targets() {
        use playcut_backend_core::synthetic::SyntheticMedia;

        let mut media = SyntheticMedia::new();
        media.seek_latency_polls = 2;
        let a = media.open("a.mp4");
        let b = media.open("bgm.mp3");

        let abort = ExportAbort::new();
        preroll_barrier(
            &mut media,
            &[(a, 0.0), (b, 10.0)],
            Duration::from_millis(500),
            Duration::from_millis(1),
            &abort,
        )
        .await
        .unwrap();

        assert!((media.probe(b).position_secs - 10.0).abs() < 1e-9);
        assert!(!media.probe(a).seeking);
    }

    #[tokio::test]
    async fn preroll_barrier_times_out_on_stuck_source() {
        use playcut_backend_core::synthetic::SyntheticMedia;

        let mut media = SyntheticMedia::new();
        media.seek_latency_polls = 1;
        let a = media.open("a.mp4");
        media.source_mut(a).unwrap().never_complete_seeks = true;
        media.reposition(a, 0.0);

        let abort = ExportAbort::new();
        let result = preroll_barrier(
            &mut media,
            &[(a, 0.0)],
            Duration::from_millis(30),
            Duration::from_millis(5),
            &abort,
        )
        .await;
        assert!(result.is_ok());
    }
}
