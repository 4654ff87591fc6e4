//! Export a project to video.

use std::path::PathBuf;

use playcut_backend_core::synthetic::{
    synthetic_capabilities, SoftwareSurface, SyntheticAudioGraph, SyntheticMedia,
};
use playcut_common::EngineConfig;
use playcut_playback_engine::{
    CollectingEncoder, Engine, ExportAbort, ExportOutcome, ExportProgress, FfmpegEncoder,
    FrameEncoder,
};
use playcut_timeline_model::ProjectFile;

pub async fn run(
    path: PathBuf,
    output: Option<PathBuf>,
    width: Option<u32>,
    height: Option<u32>,
    fps: Option<u32>,
    dry_run: bool,
) -> anyhow::Result<()> {
    let project =
        ProjectFile::load(&path).map_err(|e| anyhow::anyhow!("Failed to load project: {e}"))?;
    project
        .validate()
        .map_err(|e| anyhow::anyhow!("Project failed validation: {e}"))?;

    let mut settings = project.export.clone();
    if let Some(width) = width {
        settings.width = width;
    }
    if let Some(height) = height {
        settings.height = height;
    }
    if let Some(fps) = fps {
        settings.fps = fps;
    }

    let output_path = output.unwrap_or_else(|| path.with_extension("mp4"));

    // Decode goes through the synthetic backend here: the CLI has no
    // platform media stack, so exports exercise the full pipeline with
    // deterministic sources.
    let media = SyntheticMedia::new();
    let surface = SoftwareSurface::new(settings.width, settings.height);
    let audio = SyntheticAudioGraph::new(settings.sample_rate, 2);
    let capabilities = synthetic_capabilities(&audio, &surface);
    let mut engine = Engine::new(media, surface, audio, capabilities, EngineConfig::default());
    engine.mount_project(&project);

    let progress: playcut_playback_engine::ProgressCallback = Box::new(|report: ExportProgress| {
        if report.total_frames > 0 && report.frames_rendered % 150 == 0 {
            tracing::info!(
                progress = format!("{:.0}%", report.progress * 100.0),
                frames = report.frames_rendered,
                total = report.total_frames,
                stage = ?report.stage,
                "Export progress"
            );
        }
    });

    let mut encoder: Box<dyn FrameEncoder> = if dry_run || !FfmpegEncoder::is_available() {
        if !dry_run {
            tracing::warn!("ffmpeg not available; falling back to dry-run export");
        }
        Box::new(CollectingEncoder::new())
    } else {
        Box::new(FfmpegEncoder::new(&output_path))
    };

    let outcome = engine
        .export(&settings, encoder.as_mut(), Some(progress), ExportAbort::new())
        .await
        .map_err(|e| anyhow::anyhow!("Export failed: {e}"))?;

    match outcome {
        ExportOutcome::Completed(result) => {
            println!(
                "Export complete: {} video frames, {} audio sample frames",
                result.video_frames, result.audio_sample_frames
            );
            if let Some(path) = result.path {
                println!("Output: {}", path.display());
            } else {
                println!("(dry run; no container written)");
            }
        }
        ExportOutcome::Aborted => {
            println!("Export aborted; no output written.");
        }
    }

    let stats = engine.stats();
    tracing::info!(
        frames_rendered = stats.frames_rendered,
        frames_held = stats.frames_held,
        reloads = stats.reloads_issued,
        ramps = stats.ramps_issued,
        "Engine stats"
    );

    Ok(())
}
