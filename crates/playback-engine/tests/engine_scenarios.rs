//! Engine behavior against the synthetic backend: generation
//! invalidation, hold frames, seek semantics, and deterministic export.

use std::time::Instant;

use playcut_backend_core::synthetic::{
    synthetic_capabilities, DrawOp, SoftwareSurface, SyntheticAudioGraph, SyntheticMedia,
};
use playcut_backend_core::{AudioGraph, GainNodeId, MediaBackend, MediaHandle, ReadyLevel};
use playcut_common::{EngineConfig, EngineError};
use playcut_playback_engine::{
    CollectingEncoder, EncoderConfig, Engine, ExportAbort, ExportOutcome, FrameEncoder,
    TickOutcome,
};
use playcut_timeline_model::{
    AudioTrack, Caption, Clip, ClipId, ProjectFile, Timeline, TrackId, TrackKind,
};

type SyntheticEngine = Engine<SyntheticMedia, SoftwareSurface, SyntheticAudioGraph>;

fn test_project(total_secs: f64) -> ProjectFile {
    let mut project = ProjectFile::new("scenario");
    let half = total_secs / 2.0;
    project
        .timeline
        .push(Clip::video(ClipId(1), "a.mp4", half));
    project
        .timeline
        .push(Clip::video(ClipId(2), "b.mp4", half));

    let mut bgm = AudioTrack::new(TrackId(1), "bgm.mp3", TrackKind::Bgm, 60.0);
    bgm.delay = 2.0;
    bgm.start_point = 10.0;
    project.audio_tracks.push(bgm);
    project
}

fn build_engine(project: &ProjectFile) -> SyntheticEngine {
    build_engine_with(project, SyntheticMedia::new(), SoftwareSurface::new(64, 36))
}

fn build_engine_with(
    project: &ProjectFile,
    media: SyntheticMedia,
    surface: SoftwareSurface,
) -> SyntheticEngine {
    let audio = SyntheticAudioGraph::new(48000, 2);
    let capabilities = synthetic_capabilities(&audio, &surface);
    let mut engine = Engine::new(
        media,
        surface,
        audio,
        capabilities,
        EngineConfig::default(),
    );
    engine.mount_project(project);
    engine
}

#[test]
fn second_start_supersedes_first_loop() {
    let project = test_project(10.0);
    let mut engine = build_engine(&project);

    let first = engine.start_playback(0.0);
    let second = engine.start_playback(0.0);

    // A tick captured under the first generation is a no-op.
    assert_eq!(engine.tick(first, Instant::now()), TickOutcome::Stale);
    assert!(matches!(
        engine.tick(second, Instant::now()),
        TickOutcome::Render { .. }
    ));
    assert!(engine.is_playing());
}

#[test]
fn stop_halts_sources_and_invalidates_ticks() {
    let project = test_project(10.0);
    let mut engine = build_engine(&project);

    let token = engine.start_playback(0.0);
    engine.tick(token, Instant::now());

    // Clip A is the first source mounted by mount_project.
    let clip_a = MediaHandle(1);
    assert!(engine.media().is_playing(clip_a));

    engine.stop_playback();
    assert!(!engine.is_playing());
    assert!(!engine.media().is_playing(clip_a));
    assert_eq!(engine.tick(token, Instant::now()), TickOutcome::Stale);
}

#[test]
fn not_ready_source_holds_previous_frame() {
    let project = test_project(10.0);
    let mut media = SyntheticMedia::new();
    media.default_ready = ReadyLevel::Metadata;
    let mut engine = build_engine_with(&project, media, SoftwareSurface::new(64, 36));

    let handle = MediaHandle(1);
    engine.media_mut().set_ready(handle, ReadyLevel::Enough);
    let report = engine.render(1.0, false, false);
    assert!(!report.held);
    let drawn_serial = engine.surface().serial();
    assert!(drawn_serial > 0);

    // Source loses its buffer: the surface must not be touched.
    engine.media_mut().set_ready(handle, ReadyLevel::Metadata);
    let report = engine.render(1.1, false, false);
    assert!(report.held);
    assert_eq!(engine.surface().serial(), drawn_serial);
    assert_eq!(engine.stats().frames_held, 1);
}

#[test]
fn stalled_source_reload_is_cooldown_limited() {
    let project = test_project(10.0);
    let mut media = SyntheticMedia::new();
    media.default_ready = ReadyLevel::Metadata;
    let mut engine = build_engine_with(&project, media, SoftwareSurface::new(64, 36));
    let handle = MediaHandle(1);

    // Rapid renders issue exactly one reload within the cooldown.
    engine.render(1.0, false, false);
    engine.render(1.01, false, false);
    engine.render(1.02, false, false);
    assert_eq!(engine.media().source(handle).unwrap().reload_count, 1);
}

#[tokio::test]
async fn seek_is_idempotent() {
    let project = test_project(10.0);
    let mut engine = build_engine(&project);

    engine.seek_to(4.0);
    engine.end_seek().await.unwrap();
    let handle = MediaHandle(1);
    let position_once = engine.media().source(handle).unwrap().position;
    let time_once = engine.current_time();

    engine.seek_to(4.0);
    engine.seek_to(4.0);
    engine.seek_to(4.0);
    engine.end_seek().await.unwrap();

    assert!((engine.media().source(handle).unwrap().position - position_once).abs() < 1e-9);
    assert!((engine.current_time() - time_once).abs() < 1e-9);
    assert!(!engine.is_playing());
}

#[tokio::test]
async fn seek_resumes_playback_that_was_running() {
    let project = test_project(10.0);
    let mut engine = build_engine(&project);

    engine.start_playback(0.0);
    engine.seek_to(6.5);
    assert!(!engine.is_playing());
    assert!(engine.is_seeking());

    engine.end_seek().await.unwrap();
    assert!(engine.is_playing());
    assert!((engine.current_time() - 6.5).abs() < 1e-9);

    // 6.5s resolves into clip B at local offset 1.5 -> source position
    // trim_start + 1.5.
    let clip_b = MediaHandle(2);
    assert!((engine.media().source(clip_b).unwrap().position - 1.5).abs() < 1e-9);
}

#[tokio::test]
async fn seek_timeout_resumes_anyway() {
    let project = test_project(10.0);
    let mut media = SyntheticMedia::new();
    media.seek_latency_polls = 1;

    let audio = SyntheticAudioGraph::new(48000, 2);
    let surface = SoftwareSurface::new(64, 36);
    let capabilities = synthetic_capabilities(&audio, &surface);
    let mut config = EngineConfig::default();
    config.seek_complete_timeout_ms = 20;
    config.seek_poll_interval_ms = 1;
    let mut engine = Engine::new(media, surface, audio, capabilities, config);
    engine.mount_project(&project);

    let handle = MediaHandle(1);
    engine
        .media_mut()
        .source_mut(handle)
        .unwrap()
        .never_complete_seeks = true;

    engine.start_playback(0.0);
    engine.seek_to(2.0);
    engine.end_seek().await.unwrap();

    // Bounded fallback fired; playback resumed best-effort.
    assert!(engine.is_playing());
}

#[test]
fn remounting_a_clip_never_duplicates_gain_nodes() {
    let project = test_project(10.0);
    let mut engine = build_engine(&project);

    let edges_before = engine.audio().connected_count();
    let clip = project.timeline.clips[0].clone();
    engine.mount_clip(&clip);
    engine.mount_clip(&clip);

    assert_eq!(engine.audio().connected_count(), edges_before);
}

#[test]
fn bgm_gain_follows_delay_and_start_point() {
    let project = test_project(10.0);
    let mut engine = build_engine(&project);
    // mount_project creates gain nodes for clip A, clip B, then the BGM
    // track, in order.
    let node = GainNodeId(3);
    let bgm_handle = MediaHandle(3);

    // Before the delay: silent.
    engine.render(1.0, true, false);
    assert_eq!(engine.audio().gain(node), 0.0);

    // After the delay: unity volume, source at start_point offset.
    engine.render(3.0, true, false);
    assert!((engine.audio().gain(node) - 1.0).abs() < 1e-9);
    assert!((engine.media().source(bgm_handle).unwrap().position - 11.0).abs() < 1e-9);
}

#[tokio::test]
async fn export_produces_exact_frame_grid() {
    let project = test_project(10.0);
    let mut engine = build_engine(&project);
    let mut encoder = CollectingEncoder::new();

    let outcome = engine
        .export(
            &project.export,
            &mut encoder,
            None,
            ExportAbort::new(),
        )
        .await
        .unwrap();

    let output = match outcome {
        ExportOutcome::Completed(output) => output,
        ExportOutcome::Aborted => panic!("export should complete"),
    };

    // 10s at 30fps: exactly 300 frames on a constant grid.
    assert_eq!(output.video_frames, 300);
    assert_eq!(encoder.video_timestamps.len(), 300);
    assert_eq!(encoder.video_timestamps[0], 0);
    assert_eq!(encoder.video_timestamps[1], 33333);
    assert_eq!(encoder.video_timestamps[2], 66667);
    assert_eq!(encoder.video_timestamps[299], 9_966_667);

    // Audio timestamps derive from encoded sample count, not wall clock.
    assert_eq!(output.audio_sample_frames, 480_000);
    assert_eq!(encoder.audio_timestamps[0], 0);
    assert_eq!(encoder.audio_timestamps[1], 33333);
}

#[tokio::test]
async fn export_preroll_repositions_audio_to_timeline_zero() {
    let project = test_project(10.0);
    let mut engine = build_engine(&project);
    let mut encoder = CollectingEncoder::new();

    engine
        .export(&project.export, &mut encoder, None, ExportAbort::new())
        .await
        .unwrap();

    // BGM was pre-rolled to its start_point before frame 0.
    let bgm_handle = MediaHandle(3);
    let source = engine.media().source(bgm_handle).unwrap();
    assert!(source.reposition_count >= 1);
}

/// Encoder that cancels the export from inside the stream after a set
/// number of frames, simulating a user cancel mid-run.
struct AbortAfter {
    inner: CollectingEncoder,
    abort: ExportAbort,
    after_frames: u64,
    written: u64,
}

impl FrameEncoder for AbortAfter {
    fn configure(&mut self, config: &EncoderConfig) -> Result<(), EngineError> {
        self.inner.configure(config)
    }

    fn write_video_frame(
        &mut self,
        frame: &playcut_backend_core::FramePixels,
        timestamp_us: u64,
    ) -> Result<(), EngineError> {
        self.written += 1;
        if self.written == self.after_frames {
            self.abort.abort();
        }
        self.inner.write_video_frame(frame, timestamp_us)
    }

    fn write_audio_block(&mut self, samples: &[f32], timestamp_us: u64) -> Result<(), EngineError> {
        self.inner.write_audio_block(samples, timestamp_us)
    }

    fn finish(&mut self) -> Result<playcut_playback_engine::ExportOutput, EngineError> {
        self.inner.finish()
    }

    fn abort(&mut self) {
        self.inner.abort();
    }
}

#[tokio::test]
async fn cancelled_export_discards_output_and_engine_stays_usable() {
    let project = test_project(10.0);
    let mut engine = build_engine(&project);

    let abort = ExportAbort::new();
    let mut encoder = AbortAfter {
        inner: CollectingEncoder::new(),
        abort: abort.clone(),
        after_frames: 100,
        written: 0,
    };

    let outcome = engine
        .export(&project.export, &mut encoder, None, abort)
        .await
        .unwrap();
    assert!(matches!(outcome, ExportOutcome::Aborted));
    assert!(encoder.inner.was_aborted());
    assert!(encoder.inner.video_timestamps.is_empty());

    // A fresh export afterwards runs cleanly to completion.
    let mut encoder = CollectingEncoder::new();
    let outcome = engine
        .export(&project.export, &mut encoder, None, ExportAbort::new())
        .await
        .unwrap();
    match outcome {
        ExportOutcome::Completed(output) => assert_eq!(output.video_frames, 300),
        ExportOutcome::Aborted => panic!("second export should complete"),
    }
}

#[tokio::test]
async fn unsupported_encoder_configuration_fails_export_only() {
    let project = test_project(10.0);
    let mut engine = build_engine(&project);

    let mut encoder = CollectingEncoder::new();
    encoder.reject_configuration = true;

    let error = engine
        .export(&project.export, &mut encoder, None, ExportAbort::new())
        .await
        .unwrap_err();
    assert!(matches!(error, EngineError::EncoderUnsupported { .. }));

    // Preview is unaffected by the failed export.
    let report = engine.render(1.0, false, false);
    assert!(!report.held);
}

#[test]
fn captions_draw_with_layered_blur_fallback() {
    let mut project = test_project(10.0);
    let mut caption = Caption::new(0.5, 3.0, "hello world");
    caption.style.blur_radius = 6.0;
    project.captions.push(caption);

    let surface = SoftwareSurface::new(64, 36).without_native_blur();
    let mut engine = build_engine_with(&project, SyntheticMedia::new(), surface);

    engine.render(1.0, false, false);
    let text_ops = engine
        .surface()
        .draw_log
        .iter()
        .filter(|op| matches!(op, DrawOp::Text { .. }))
        .count();
    // Four passes in four directions plus the sharp pass.
    assert_eq!(text_ops, 17);
}

#[test]
fn empty_timeline_renders_black() {
    let mut project = ProjectFile::new("empty");
    project.timeline = Timeline::new();
    let mut engine = build_engine(&project);

    let report = engine.render(0.0, false, false);
    assert!(report.active.is_none());
    assert_eq!(
        engine.surface().draw_log.last(),
        Some(&DrawOp::Clear)
    );
}

#[test]
fn unmount_all_releases_every_handle_and_edge() {
    let project = test_project(10.0);
    let mut engine = build_engine(&project);
    assert!(engine.audio().connected_count() > 0);

    engine.unmount_all();
    assert_eq!(engine.audio().connected_count(), 0);

    let report = engine.render(1.0, false, false);
    // Sources are gone; the frame is held rather than corrupted.
    assert!(report.held);
}

#[test]
fn upcoming_cut_triggers_preload() {
    // Clip B trims into its source, so the preload has a real target.
    let mut project = test_project(10.0);
    let mut clip_b = Clip::video(ClipId(2), "b.mp4", 10.0);
    clip_b.trim_start = 1.0;
    clip_b.trim_end = 6.0;
    project.timeline.clips[1] = clip_b;
    let mut engine = build_engine(&project);

    // 2.4s before the cut at 5.0s: clip B is repositioned to its
    // trim-in point ahead of the transition.
    engine.render(2.6, true, false);
    let source = engine.media().source(MediaHandle(2)).unwrap();
    assert_eq!(source.reposition_count, 1);
    assert!((source.position - 1.0).abs() < 1e-9);

    // Subsequent frames do not re-issue the preload.
    engine.render(2.7, true, false);
    let source = engine.media().source(MediaHandle(2)).unwrap();
    assert_eq!(source.reposition_count, 1);
}

#[test]
fn sources_are_used_via_registry_identity() {
    let project = test_project(10.0);
    let mut engine = build_engine(&project);

    // Rebinding clip A invalidates its old handle and uses the new one.
    let clip = project.timeline.clips[0].clone();
    let new_handle = engine.mount_clip(&clip);
    engine.render(1.0, false, false);

    let drew_new = engine.surface().draw_log.iter().any(|op| {
        matches!(op, DrawOp::Source { handle, .. } if *handle == new_handle)
    });
    assert!(drew_new);
}
