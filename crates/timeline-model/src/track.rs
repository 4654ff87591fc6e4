//! Independent audio tracks.
//!
//! A track is an audio layer that plays alongside the visual timeline:
//! background music or a narration clip. Placement on the timeline is a
//! `delay` (when the track starts) plus a `start_point` (where inside
//! the source file playback begins).

use serde::{Deserialize, Serialize};

use crate::clip::{validate_fade_duration, MAX_VOLUME};
use crate::{ModelError, ModelResult};

/// Stable identity of an audio track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackId(pub u64);

/// The role of an audio track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    /// Background music, typically spanning the whole timeline.
    Bgm,
    /// A narration clip placed at a specific timeline offset.
    Narration,
}

/// One audio layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioTrack {
    /// Stable identity.
    pub id: TrackId,

    /// Opaque source locator, bound to a live handle by the registry.
    pub source: String,

    /// BGM or narration.
    pub kind: TrackKind,

    /// Duration of the source file in seconds.
    pub duration: f64,

    /// Offset into the source file where playback begins.
    #[serde(default)]
    pub start_point: f64,

    /// Offset into the timeline where the track becomes audible.
    #[serde(default)]
    pub delay: f64,

    /// Gain multiplier (1.0 = unity).
    pub volume: f64,

    /// Fade windows. Fade-in is measured from `delay`; fade-out is
    /// measured against the end of the timeline.
    #[serde(default)]
    pub fade_in: bool,
    #[serde(default)]
    pub fade_out: bool,
    #[serde(default = "default_track_fade")]
    pub fade_in_duration: f64,
    #[serde(default = "default_track_fade")]
    pub fade_out_duration: f64,
}

fn default_track_fade() -> f64 {
    1.0
}

impl AudioTrack {
    /// Create a track with neutral placement and unity gain.
    pub fn new(id: TrackId, source: impl Into<String>, kind: TrackKind, duration: f64) -> Self {
        Self {
            id,
            source: source.into(),
            kind,
            duration,
            start_point: 0.0,
            delay: 0.0,
            volume: 1.0,
            fade_in: false,
            fade_out: false,
            fade_in_duration: default_track_fade(),
            fade_out_duration: default_track_fade(),
        }
    }

    /// Position inside the source file for a given timeline position,
    /// or `None` when the track is not active at that time.
    pub fn source_position(&self, timeline_time: f64) -> Option<f64> {
        if timeline_time < self.delay {
            return None;
        }
        let local = timeline_time - self.delay + self.start_point;
        if local <= self.duration {
            Some(local)
        } else {
            None
        }
    }

    /// Check all invariants.
    pub fn validate(&self) -> ModelResult<()> {
        let fail = |message: String| ModelError::InvalidTrack {
            id: self.id.0,
            message,
        };

        if self.duration <= 0.0 {
            return Err(fail("duration must be positive".to_string()));
        }
        if !(0.0..=self.duration).contains(&self.start_point) {
            return Err(fail(format!(
                "start_point {} outside [0, {}]",
                self.start_point, self.duration
            )));
        }
        if self.delay < 0.0 {
            return Err(fail(format!("delay {} is negative", self.delay)));
        }
        if !(0.0..=MAX_VOLUME).contains(&self.volume) {
            return Err(fail(format!("volume {} outside [0, {MAX_VOLUME}]", self.volume)));
        }
        if self.fade_in {
            validate_fade_duration(self.fade_in_duration).map_err(&fail)?;
        }
        if self.fade_out {
            validate_fade_duration(self.fade_out_duration).map_err(&fail)?;
        }
        Ok(())
    }
}
