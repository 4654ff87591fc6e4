//! The engine facade: owns the backends, the registry, and the state
//! machine, and exposes the API the editing layer drives.

use std::time::{Duration, Instant};

use playcut_backend_core::{
    AudioCaptureStrategy, AudioGraph, BackendCapabilities, HandleRegistry, MediaBackend,
    MediaHandle, RenderSurface, SourceId,
};
use playcut_common::{
    frame_timestamp_us, sample_timestamp_us, EngineConfig, EngineError, EngineResult, Generation,
};
use playcut_timeline_model::{
    AudioTrack, Caption, Clip, ClipId, ClipKind, ExportSettings, ProjectFile, Timeline, TrackId,
};

use crate::compositor::{Compositor, FrameReport, FrameRequest};
use crate::export::{
    preroll_barrier, EncoderConfig, ExportAbort, ExportOutcome, ExportProgress, ExportStage,
    FrameEncoder, ProgressCallback,
};
use crate::mixer::{Mixer, MixerInput};
use crate::player::{EngineState, TickOutcome};
use crate::readiness::ReadinessProbe;
use crate::seek::{ScrubAction, SeekCoordinator};

/// Why a playback run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEnd {
    /// The playhead reached the timeline end.
    ReachedEnd,
    /// Another operation superseded the loop.
    Superseded,
}

/// Counters surfaced for diagnostics.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineStats {
    pub frames_rendered: u64,
    pub frames_held: u64,
    pub draw_errors: u64,
    pub reloads_issued: u64,
    pub ramps_issued: u64,
}

/// The playback/compositing/export engine.
///
/// Single-threaded by construction: every method takes `&mut self`, and
/// asynchronous suspensions (seek waits, export barriers, tick delays)
/// re-check the loop generation on resume instead of locking.
pub struct Engine<M: MediaBackend, S: RenderSurface, A: AudioGraph> {
    media: M,
    surface: S,
    audio: A,
    capabilities: BackendCapabilities,
    config: EngineConfig,
    registry: HandleRegistry,
    timeline: Timeline,
    tracks: Vec<AudioTrack>,
    captions: Vec<Caption>,
    state: EngineState,
    compositor: Compositor,
    mixer: Mixer,
    readiness: ReadinessProbe,
    seek: SeekCoordinator,
    frames_rendered: u64,
    frames_held: u64,
    draw_errors: u64,
}

impl<M: MediaBackend, S: RenderSurface, A: AudioGraph> Engine<M, S, A> {
    /// Construct an engine over a backend trio. Capabilities are
    /// queried once here; strategy selection never happens again.
    pub fn new(
        media: M,
        surface: S,
        audio: A,
        capabilities: BackendCapabilities,
        config: EngineConfig,
    ) -> Self {
        tracing::info!(
            audio_capture = ?capabilities.audio_capture_strategy(),
            blur = ?capabilities.blur_strategy(),
            refresh_hz = capabilities.display_refresh_hz,
            "Engine constructed"
        );
        Self {
            compositor: Compositor::new(capabilities.blur_strategy()),
            mixer: Mixer::new(config.gain_ramp_time_constant_secs, config.min_gain_delta),
            readiness: ReadinessProbe::new(
                Duration::from_secs_f64(config.reload_cooldown_secs),
                config.preload_horizon_secs,
            ),
            seek: SeekCoordinator::new(Duration::from_millis(config.seek_throttle_ms)),
            media,
            surface,
            audio,
            capabilities,
            config,
            registry: HandleRegistry::new(),
            timeline: Timeline::new(),
            tracks: Vec::new(),
            captions: Vec::new(),
            state: EngineState::new(),
            frames_rendered: 0,
            frames_held: 0,
            draw_errors: 0,
        }
    }

    // Snapshot updates

    /// Replace the timeline snapshot the engine renders from.
    pub fn set_timeline(&mut self, timeline: Timeline) {
        self.timeline = timeline;
    }

    /// Replace the audio track snapshot.
    pub fn set_audio_tracks(&mut self, tracks: Vec<AudioTrack>) {
        self.tracks = tracks;
    }

    /// Replace the caption snapshot.
    pub fn set_captions(&mut self, captions: Vec<Caption>) {
        self.captions = captions;
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    // Source lifecycle

    /// Bind a clip's source to a live media handle (and gain node for
    /// video). Rebinding replaces the previous resources atomically.
    pub fn mount_clip(&mut self, clip: &Clip) -> MediaHandle {
        let audible = clip.kind == ClipKind::Video;
        self.registry.bind(
            SourceId::Clip(clip.id),
            &clip.source,
            audible,
            &mut self.media,
            &mut self.audio,
        )
    }

    /// Bind an audio track's source.
    pub fn mount_track(&mut self, track: &AudioTrack) -> MediaHandle {
        self.registry.bind(
            SourceId::Track(track.id),
            &track.source,
            true,
            &mut self.media,
            &mut self.audio,
        )
    }

    /// Release a clip's resources.
    pub fn unmount_clip(&mut self, id: ClipId) {
        self.registry
            .release(SourceId::Clip(id), &mut self.media, &mut self.audio);
    }

    /// Release a track's resources.
    pub fn unmount_track(&mut self, id: TrackId) {
        self.registry
            .release(SourceId::Track(id), &mut self.media, &mut self.audio);
    }

    /// Release everything (player unmount / timeline clear).
    pub fn unmount_all(&mut self) {
        self.state.stop();
        self.registry.release_all(&mut self.media, &mut self.audio);
    }

    /// Adopt a validated project: snapshots plus mounted sources.
    pub fn mount_project(&mut self, project: &ProjectFile) {
        self.set_timeline(project.timeline.clone());
        self.set_audio_tracks(project.audio_tracks.clone());
        self.set_captions(project.captions.clone());
        let clips = self.timeline.clips.clone();
        for clip in &clips {
            self.mount_clip(clip);
        }
        let tracks = self.tracks.clone();
        for track in &tracks {
            self.mount_track(track);
        }
    }

    // Rendering

    /// Render one frame at `time` and drive the mixer to match.
    ///
    /// Shared by the playback loop, the scrub path, and the export
    /// pipeline; `is_exporting` selects the tighter sync tolerances.
    pub fn render(&mut self, time: f64, is_playing: bool, is_exporting: bool) -> FrameReport {
        let now = Instant::now();

        if let Some(resolved) = self.timeline.resolve(time) {
            let clip_id = self.timeline.clips[resolved.index].id;
            if let Some(handle) = self.registry.media(SourceId::Clip(clip_id)) {
                self.readiness.assess(&mut self.media, handle, now);
            }
            if !is_exporting {
                self.readiness
                    .preload_upcoming(&mut self.media, &self.registry, &self.timeline, time);
            }
        }

        let tolerances = if is_exporting {
            self.config.export
        } else {
            self.config.preview
        };
        let report = self.compositor.render(
            FrameRequest {
                time,
                is_playing,
                is_exporting,
            },
            &self.timeline,
            &self.captions,
            &self.registry,
            &self.media,
            &mut self.surface,
            &tolerances,
        );

        self.mixer.update(
            MixerInput {
                time,
                total_duration: self.timeline.total_duration(),
                is_playing,
                is_seeking: self.seek.is_seeking(),
                active: report.active,
                clip_gain: report.clip_gain,
                tolerances: &tolerances,
            },
            &self.timeline,
            &self.tracks,
            &self.registry,
            &mut self.media,
            &mut self.audio,
        );

        self.frames_rendered += 1;
        if report.held {
            self.frames_held += 1;
        }
        self.draw_errors += u64::from(report.errors);
        report
    }

    // Playback

    /// Start (or restart) playback from `from`. The returned token must
    /// be carried into every subsequent [`Engine::tick`].
    pub fn start_playback(&mut self, from: f64) -> Generation {
        self.state.start(from)
    }

    /// Stop playback: invalidates in-flight operations, pauses every
    /// source, and cancels pending gain ramps.
    pub fn stop_playback(&mut self) {
        self.state.stop();
        self.mixer
            .halt(&self.registry, &mut self.media, &mut self.audio);
    }

    /// One iteration of the wall-clock loop. A stale token makes this a
    /// no-op; reaching the end pauses and silences every source.
    pub fn tick(&mut self, token: Generation, now: Instant) -> TickOutcome {
        let total = self.timeline.total_duration();
        let outcome = self.state.tick(token, now, total);
        match outcome {
            TickOutcome::Render { time } => {
                self.render(time, true, false);
            }
            TickOutcome::Finished => {
                self.mixer
                    .halt(&self.registry, &mut self.media, &mut self.audio);
            }
            TickOutcome::Stale => {}
        }
        outcome
    }

    /// Drive the playback loop at the display refresh rate until it
    /// finishes or is superseded.
    pub async fn run_until_end(&mut self, token: Generation) -> PlaybackEnd {
        let interval =
            Duration::from_secs(1) / self.capabilities.display_refresh_hz.max(1);
        loop {
            tokio::time::sleep(interval).await;
            match self.tick(token, Instant::now()) {
                TickOutcome::Stale => return PlaybackEnd::Superseded,
                TickOutcome::Finished => return PlaybackEnd::ReachedEnd,
                TickOutcome::Render { .. } => {}
            }
        }
    }

    // Seeking

    /// Feed one scrub input. Starts a seek if none is active: play
    /// state is recorded, the loop stops, and sources pause. Every
    /// input renders; source repositions are throttled.
    pub fn seek_to(&mut self, time: f64) {
        if !self.seek.is_seeking() {
            let was_playing = self.state.is_playing();
            self.seek.begin(was_playing);
            if was_playing {
                self.state.stop();
            }
            self.mixer
                .halt(&self.registry, &mut self.media, &mut self.audio);
        }

        self.state.set_current_time(time);
        if self.seek.scrub(time, Instant::now()) == ScrubAction::RenderAndReposition {
            self.reposition_active(time);
        }
        self.readiness.reset_preload();
        self.render(time, false, false);
    }

    /// Finish the seek: commit the exact position, wait (bounded) for
    /// the active source's own seek, and resume playback if it was
    /// running when the seek began.
    pub async fn end_seek(&mut self) -> EngineResult<()> {
        if !self.seek.is_seeking() {
            return Ok(());
        }
        let end = self.seek.end();
        let time = end.target.unwrap_or_else(|| self.state.current_time());
        self.state.set_current_time(time);
        self.reposition_active(time);
        self.render(time, false, false);

        if !end.resume {
            return Ok(());
        }

        let token = self.state.generation();
        self.wait_active_seek_complete(time, token).await;
        if !self.state.is_current(token) {
            // Superseded while waiting; the newer operation wins.
            return Ok(());
        }
        self.start_playback(time);
        Ok(())
    }

    /// Whether a scrub is currently in progress.
    pub fn is_seeking(&self) -> bool {
        self.seek.is_seeking()
    }

    fn reposition_active(&mut self, time: f64) {
        let Some(resolved) = self.timeline.resolve(time) else {
            return;
        };
        let clip = &self.timeline.clips[resolved.index];
        if clip.kind != ClipKind::Video {
            return;
        }
        let target = clip.source_position(resolved.local_offset);
        if let Some(handle) = self.registry.media(SourceId::Clip(clip.id)) {
            self.media.reposition(handle, target);
        }
    }

    /// Poll the active source's seek completion with a bounded timeout.
    /// On timeout playback resumes anyway (best-effort sync).
    async fn wait_active_seek_complete(&mut self, time: f64, token: Generation) {
        let handle = match self.timeline.resolve(time) {
            Some(resolved) => {
                let clip = &self.timeline.clips[resolved.index];
                if clip.kind != ClipKind::Video {
                    return;
                }
                match self.registry.media(SourceId::Clip(clip.id)) {
                    Some(handle) => handle,
                    None => return,
                }
            }
            None => return,
        };

        let timeout = Duration::from_millis(self.config.seek_complete_timeout_ms);
        let poll = Duration::from_millis(self.config.seek_poll_interval_ms.max(1));
        let deadline = Instant::now() + timeout;

        loop {
            if self.media.seek_completed(handle) {
                return;
            }
            if !self.state.is_current(token) {
                return;
            }
            if Instant::now() >= deadline {
                let error = EngineError::SeekTimeout {
                    waited_ms: self.config.seek_complete_timeout_ms,
                };
                tracing::warn!(error = %error, "Resuming without seek confirmation");
                return;
            }
            tokio::time::sleep(poll).await;
        }
    }

    // Export

    /// Re-render the timeline deterministically into `encoder`.
    ///
    /// Not wall-clock paced: time advances by exactly `1/fps` per frame
    /// and timestamps are quantized to the frame/sample grid.
    /// Cancellation goes through the `abort` handle; an aborted run
    /// discards partial output and returns `ExportOutcome::Aborted`,
    /// leaving the engine reusable.
    pub async fn export(
        &mut self,
        settings: &ExportSettings,
        encoder: &mut dyn FrameEncoder,
        progress: Option<ProgressCallback>,
        abort: ExportAbort,
    ) -> EngineResult<ExportOutcome> {
        if self.state.is_playing() {
            self.stop_playback();
        }

        let total_duration = self.timeline.total_duration();
        if total_duration <= 0.0 {
            return Err(EngineError::export("timeline is empty"));
        }

        let started = Instant::now();
        let fps = settings.fps.max(1);
        let total_frames = (total_duration * f64::from(fps)).ceil() as u64;

        report_progress(&progress, 0, total_frames, 0.0, ExportStage::Preparing);

        // The capture paths deliver PCM at the graph's rate and pixels
        // at the surface's size, whatever the settings request.
        let mut encoder_config = EncoderConfig::from_settings(settings, self.audio.channels());
        encoder_config.sample_rate = self.audio.sample_rate();
        let (surface_width, surface_height) = self.surface.size();
        encoder_config.width = surface_width;
        encoder_config.height = surface_height;
        encoder.configure(&encoder_config)?;

        tracing::info!(
            total_frames,
            fps,
            duration_secs = total_duration,
            strategy = ?self.capabilities.audio_capture_strategy(),
            "Starting export"
        );

        // Pre-roll barrier: every source at its timeline-zero sample
        // before the first frame is encoded.
        let mut targets: Vec<(MediaHandle, f64)> = Vec::new();
        if let Some(resolved) = self.timeline.resolve(0.0) {
            let clip = &self.timeline.clips[resolved.index];
            if clip.kind == ClipKind::Video {
                if let Some(handle) = self.registry.media(SourceId::Clip(clip.id)) {
                    targets.push((handle, clip.source_position(resolved.local_offset)));
                }
            }
        }
        for track in &self.tracks {
            if let Some(handle) = self.registry.media(SourceId::Track(track.id)) {
                targets.push((handle, track.start_point));
            }
        }
        let barrier = preroll_barrier(
            &mut self.media,
            &targets,
            Duration::from_millis(self.config.preroll_timeout_ms),
            Duration::from_millis(self.config.seek_poll_interval_ms.max(1)),
            &abort,
        )
        .await;
        match barrier {
            Err(EngineError::ExportAborted) => {
                encoder.abort();
                report_progress(&progress, 0, total_frames, 0.0, ExportStage::Aborted);
                return Ok(ExportOutcome::Aborted);
            }
            other => other?,
        }

        let strategy = self.capabilities.audio_capture_strategy();
        let sample_rate = encoder_config.sample_rate.max(1);
        let mut sample_frames_written: u64 = 0;

        let mut frame_error: Option<EngineError> = None;
        'frames: for frame in 0..total_frames {
            if abort.is_aborted() {
                tracing::info!(frame, "Export aborted");
                encoder.abort();
                self.mixer
                    .halt(&self.registry, &mut self.media, &mut self.audio);
                report_progress(&progress, frame, total_frames, 0.0, ExportStage::Aborted);
                return Ok(ExportOutcome::Aborted);
            }

            let time = frame as f64 / f64::from(fps);
            self.render(time, true, true);

            let pixels = match self.surface.capture_frame() {
                Ok(pixels) => pixels,
                Err(e) => {
                    frame_error = Some(e);
                    break 'frames;
                }
            };
            if let Err(e) = encoder.write_video_frame(&pixels, frame_timestamp_us(frame, fps)) {
                frame_error = Some(e);
                break 'frames;
            }

            match strategy {
                AudioCaptureStrategy::MixedBus => {
                    let target_total =
                        (frame + 1) * u64::from(sample_rate) / u64::from(fps);
                    let needed = target_total.saturating_sub(sample_frames_written);
                    if needed > 0 {
                        if let Some(block) = self.audio.read_bus_block(needed as u32) {
                            let timestamp =
                                sample_timestamp_us(sample_frames_written, sample_rate);
                            if let Err(e) = encoder.write_audio_block(&block, timestamp) {
                                frame_error = Some(e);
                                break 'frames;
                            }
                            sample_frames_written = target_total;
                        }
                    }
                }
                AudioCaptureStrategy::PcmTap => {
                    for block in self.audio.take_tap_blocks() {
                        let timestamp = sample_timestamp_us(sample_frames_written, sample_rate);
                        if let Err(e) = encoder.write_audio_block(&block.samples, timestamp) {
                            frame_error = Some(e);
                            break 'frames;
                        }
                        sample_frames_written += u64::from(block.frames);
                    }
                }
            }

            if frame % 30 == 0 {
                let elapsed = started.elapsed().as_secs_f64();
                let eta = if frame > 0 {
                    elapsed / frame as f64 * (total_frames - frame) as f64
                } else {
                    0.0
                };
                report_progress(&progress, frame, total_frames, eta, ExportStage::Rendering);
            }
            // Yield so an abort issued from another task can land.
            if frame % 8 == 7 {
                tokio::task::yield_now().await;
            }
        }

        // The export drove sources as playing; quiesce them regardless
        // of how the run ends.
        self.mixer
            .halt(&self.registry, &mut self.media, &mut self.audio);

        if let Some(error) = frame_error {
            tracing::error!(error = %error, "Export failed");
            encoder.abort();
            report_progress(&progress, 0, total_frames, 0.0, ExportStage::Failed);
            return Err(error);
        }

        report_progress(
            &progress,
            total_frames,
            total_frames,
            0.0,
            ExportStage::Finalizing,
        );
        let output = match encoder.finish() {
            Ok(output) => output,
            Err(e) => {
                report_progress(&progress, total_frames, total_frames, 0.0, ExportStage::Failed);
                return Err(e);
            }
        };

        report_progress(
            &progress,
            total_frames,
            total_frames,
            0.0,
            ExportStage::Complete,
        );
        tracing::info!(
            elapsed_secs = started.elapsed().as_secs_f64(),
            video_frames = output.video_frames,
            audio_sample_frames = output.audio_sample_frames,
            "Export finished"
        );
        Ok(ExportOutcome::Completed(output))
    }

    // Introspection

    pub fn current_time(&self) -> f64 {
        self.state.current_time()
    }

    pub fn is_playing(&self) -> bool {
        self.state.is_playing()
    }

    pub fn capabilities(&self) -> BackendCapabilities {
        self.capabilities
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            frames_rendered: self.frames_rendered,
            frames_held: self.frames_held,
            draw_errors: self.draw_errors,
            reloads_issued: self.readiness.reloads_issued(),
            ramps_issued: self.mixer.ramps_issued(),
        }
    }

    pub fn media(&self) -> &M {
        &self.media
    }

    pub fn media_mut(&mut self) -> &mut M {
        &mut self.media
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn audio(&self) -> &A {
        &self.audio
    }

    pub fn audio_mut(&mut self) -> &mut A {
        &mut self.audio
    }
}

fn report_progress(
    progress: &Option<ProgressCallback>,
    frames_rendered: u64,
    total_frames: u64,
    eta_secs: f64,
    stage: ExportStage,
) {
    if let Some(cb) = progress {
        let ratio = if total_frames == 0 {
            0.0
        } else {
            frames_rendered as f64 / total_frames as f64
        };
        cb(ExportProgress {
            progress: ratio.clamp(0.0, 1.0),
            frames_rendered,
            total_frames,
            eta_secs,
            stage,
        });
    }
}
