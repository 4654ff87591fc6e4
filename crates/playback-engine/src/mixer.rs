//! Audio gain control and fade scheduling.
//!
//! Computes a target gain for every audible source each frame and moves
//! the graph toward it with smoothed ramps. Targets derive from
//! mute/volume/fade/delay/trim state; transitions are never stepped
//! (clicks) and never scheduled when the change is inaudible.

use playcut_backend_core::{
    AudioGraph, AudioGraphState, GainNodeId, HandleRegistry, MediaBackend, SourceId,
};
use playcut_common::{SyncDrift, SyncTolerances};
use playcut_timeline_model::{AudioTrack, ClipKind, ResolvedClip, Timeline};

/// Per-frame inputs to the mixer.
#[derive(Debug, Clone, Copy)]
pub struct MixerInput<'a> {
    pub time: f64,
    pub total_duration: f64,
    pub is_playing: bool,
    pub is_seeking: bool,
    /// The active visual clip, from the compositor.
    pub active: Option<ResolvedClip>,
    /// Target gain for the active clip's embedded audio
    /// (volume × fade alpha), from the compositor.
    pub clip_gain: Option<f64>,
    pub tolerances: &'a SyncTolerances,
}

/// The audio mixer and fade scheduler.
#[derive(Debug)]
pub struct Mixer {
    time_constant_secs: f64,
    min_gain_delta: f64,
    was_suspended: bool,
    ramps_issued: u64,
}

impl Mixer {
    pub fn new(time_constant_secs: f64, min_gain_delta: f64) -> Self {
        Self {
            time_constant_secs,
            min_gain_delta,
            was_suspended: false,
            ramps_issued: 0,
        }
    }

    /// Smoothed transitions scheduled since construction.
    pub fn ramps_issued(&self) -> u64 {
        self.ramps_issued
    }

    /// Drive every audible source toward its target state for `time`.
    pub fn update(
        &mut self,
        input: MixerInput<'_>,
        timeline: &Timeline,
        tracks: &[AudioTrack],
        registry: &HandleRegistry,
        media: &mut dyn MediaBackend,
        audio: &mut dyn AudioGraph,
    ) {
        self.ensure_running(audio);

        for (index, clip) in timeline.clips.iter().enumerate() {
            let Some(entry) = registry.get(SourceId::Clip(clip.id)) else {
                continue;
            };
            let is_active = input.active.map(|a| a.index) == Some(index);

            if clip.kind == ClipKind::Video {
                let should_play = is_active && input.is_playing && !input.is_seeking;
                if should_play && !media.is_playing(entry.media) {
                    media.play(entry.media);
                } else if !should_play && media.is_playing(entry.media) {
                    media.pause(entry.media);
                }
            }

            if let Some(node) = entry.gain {
                let target = if is_active && clip.is_audible() {
                    input.clip_gain.unwrap_or(0.0)
                } else {
                    // Inactive sources are driven toward silence, never
                    // stepped there.
                    0.0
                };
                self.apply(audio, node, target);
            }
        }

        for track in tracks {
            let Some(entry) = registry.get(SourceId::Track(track.id)) else {
                continue;
            };
            let Some(node) = entry.gain else { continue };

            match track.source_position(input.time) {
                None => {
                    // Before the delay (or past the source end): silent
                    // and paused.
                    if media.is_playing(entry.media) {
                        media.pause(entry.media);
                    }
                    self.apply(audio, node, 0.0);
                }
                Some(source_pos) => {
                    let probe = media.probe(entry.media);
                    let threshold = if input.is_seeking {
                        input.tolerances.seeking_reposition_threshold_secs
                    } else {
                        input.tolerances.reposition_threshold_secs
                    };
                    let drift = SyncDrift {
                        expected_secs: source_pos,
                        actual_secs: probe.position_secs,
                    };
                    if !probe.seeking && drift.exceeds(threshold) {
                        tracing::debug!(
                            track = track.id.0,
                            drift_secs = drift.secs(),
                            "Repositioning drifted audio track"
                        );
                        media.reposition(entry.media, source_pos);
                    }

                    let should_play = input.is_playing && !input.is_seeking;
                    if should_play && !media.is_playing(entry.media) {
                        media.play(entry.media);
                    } else if !should_play && media.is_playing(entry.media) {
                        media.pause(entry.media);
                    }

                    self.apply(audio, node, track_gain(track, input.time, input.total_duration));
                }
            }
        }
    }

    /// Pause every bound source and cancel in-flight ramps (stop path).
    pub fn halt(
        &mut self,
        registry: &HandleRegistry,
        media: &mut dyn MediaBackend,
        audio: &mut dyn AudioGraph,
    ) {
        for (_, entry) in registry.iter() {
            if media.is_playing(entry.media) {
                media.pause(entry.media);
            }
            if let Some(node) = entry.gain {
                audio.cancel_ramps(node);
            }
        }
    }

    fn apply(&mut self, audio: &mut dyn AudioGraph, node: GainNodeId, target: f64) {
        let current = audio.gain(node);
        if (current - target).abs() <= self.min_gain_delta {
            return;
        }
        audio.ramp_gain(node, target, self.time_constant_secs);
        self.ramps_issued += 1;
    }

    fn ensure_running(&mut self, audio: &mut dyn AudioGraph) {
        if audio.state() == AudioGraphState::Running {
            self.was_suspended = false;
            return;
        }
        if audio.resume() {
            if self.was_suspended {
                tracing::info!("Audio graph resumed");
            }
            self.was_suspended = false;
        } else if !self.was_suspended {
            tracing::warn!("Audio graph suspended and resume failed; will keep retrying");
            self.was_suspended = true;
        }
    }
}

/// Target gain for an independent audio track at `time`.
///
/// Fade-in is measured from the track's delay; fade-out is measured
/// against the end of the timeline.
pub fn track_gain(track: &AudioTrack, time: f64, total_duration: f64) -> f64 {
    let mut gain = track.volume;
    if track.fade_in && track.fade_in_duration > 0.0 {
        gain *= ((time - track.delay) / track.fade_in_duration).clamp(0.0, 1.0);
    }
    if track.fade_out && track.fade_out_duration > 0.0 {
        gain *= ((total_duration - time) / track.fade_out_duration).clamp(0.0, 1.0);
    }
    gain.max(0.0)
}
