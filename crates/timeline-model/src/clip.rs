//! Visual clip records.
//!
//! A clip is one entry in the visual timeline: a trimmed span of a video
//! source, or an image shown for an explicit duration. Clips carry their
//! own transform (scale, position), audio properties (video only), and
//! fade windows. They never own decode resources; `source` is an opaque
//! locator the editing layer binds to a live handle via the registry.

use serde::{Deserialize, Serialize};

use crate::{ModelError, ModelResult};

/// Stable identity of a clip across edits and reloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClipId(pub u64);

/// What kind of visual source a clip plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClipKind {
    Video,
    Image,
}

/// Allowed uniform scale range.
pub const MIN_CLIP_SCALE: f64 = 0.5;
pub const MAX_CLIP_SCALE: f64 = 3.0;

/// Allowed pixel-offset magnitude for clip positioning.
pub const MAX_CLIP_POSITION: f64 = 4096.0;

/// Allowed volume range (1.0 = unity, above amplifies).
pub const MAX_VOLUME: f64 = 2.5;

/// The discrete fade-duration choices offered by the editing layer.
pub const FADE_DURATION_CHOICES: [f64; 3] = [0.5, 1.0, 2.0];

/// One visual timeline entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Clip {
    /// Stable identity.
    pub id: ClipId,

    /// Opaque source locator (path or URL), resolved to a live decode
    /// handle by the media backend registry.
    pub source: String,

    /// Video or still image.
    pub kind: ClipKind,

    /// Full duration of the underlying source file (video).
    pub original_duration: f64,

    /// Trim-in point into the source (video, seconds).
    #[serde(default)]
    pub trim_start: f64,

    /// Trim-out point into the source (video, seconds).
    pub trim_end: f64,

    /// Display duration for image clips.
    #[serde(default)]
    pub image_duration: f64,

    /// Uniform scale multiplier applied on top of contain-fit.
    pub scale: f64,

    /// Pixel offset from the surface center.
    #[serde(default)]
    pub position_x: f64,
    #[serde(default)]
    pub position_y: f64,

    /// Embedded-audio volume (video clips only).
    pub volume: f64,

    /// Whether embedded audio is muted.
    #[serde(default)]
    pub is_muted: bool,

    /// Visual+audio fade windows at the clip edges.
    #[serde(default)]
    pub fade_in: bool,
    #[serde(default)]
    pub fade_out: bool,
    #[serde(default = "default_fade_duration")]
    pub fade_in_duration: f64,
    #[serde(default = "default_fade_duration")]
    pub fade_out_duration: f64,

    /// Locked clips are protected from editing actions.
    #[serde(default)]
    pub is_locked: bool,
}

fn default_fade_duration() -> f64 {
    1.0
}

impl Clip {
    /// Create a video clip spanning the whole source, untransformed.
    pub fn video(id: ClipId, source: impl Into<String>, original_duration: f64) -> Self {
        Self {
            id,
            source: source.into(),
            kind: ClipKind::Video,
            original_duration,
            trim_start: 0.0,
            trim_end: original_duration,
            image_duration: 0.0,
            scale: 1.0,
            position_x: 0.0,
            position_y: 0.0,
            volume: 1.0,
            is_muted: false,
            fade_in: false,
            fade_out: false,
            fade_in_duration: default_fade_duration(),
            fade_out_duration: default_fade_duration(),
            is_locked: false,
        }
    }

    /// Create an image clip shown for `duration` seconds.
    pub fn image(id: ClipId, source: impl Into<String>, duration: f64) -> Self {
        Self {
            id,
            source: source.into(),
            kind: ClipKind::Image,
            original_duration: duration,
            trim_start: 0.0,
            trim_end: duration,
            image_duration: duration,
            scale: 1.0,
            position_x: 0.0,
            position_y: 0.0,
            volume: 0.0,
            is_muted: true,
            fade_in: false,
            fade_out: false,
            fade_in_duration: default_fade_duration(),
            fade_out_duration: default_fade_duration(),
            is_locked: false,
        }
    }

    /// Timeline duration of this clip.
    ///
    /// Derived, never stored: `trim_end - trim_start` for video, the
    /// explicit display duration for images.
    pub fn duration(&self) -> f64 {
        match self.kind {
            ClipKind::Video => self.trim_end - self.trim_start,
            ClipKind::Image => self.image_duration,
        }
    }

    /// Map a clip-local offset to a position in the source file.
    pub fn source_position(&self, local_offset: f64) -> f64 {
        self.trim_start + local_offset
    }

    /// Whether this clip contributes audio.
    pub fn is_audible(&self) -> bool {
        self.kind == ClipKind::Video && !self.is_muted && self.volume > 0.0
    }

    /// Check all invariants.
    pub fn validate(&self) -> ModelResult<()> {
        let fail = |message: String| ModelError::InvalidClip {
            id: self.id.0,
            message,
        };

        if self.kind == ClipKind::Video {
            if !(self.trim_start < self.trim_end) {
                return Err(fail(format!(
                    "trim_start {} must be < trim_end {}",
                    self.trim_start, self.trim_end
                )));
            }
            if self.trim_end > self.original_duration + f64::EPSILON {
                return Err(fail(format!(
                    "trim_end {} exceeds original duration {}",
                    self.trim_end, self.original_duration
                )));
            }
            if self.trim_start < 0.0 {
                return Err(fail(format!("trim_start {} is negative", self.trim_start)));
            }
        }
        if self.duration() <= 0.0 {
            return Err(fail("duration must be positive".to_string()));
        }
        if !(MIN_CLIP_SCALE..=MAX_CLIP_SCALE).contains(&self.scale) {
            return Err(fail(format!(
                "scale {} outside [{MIN_CLIP_SCALE}, {MAX_CLIP_SCALE}]",
                self.scale
            )));
        }
        if self.position_x.abs() > MAX_CLIP_POSITION || self.position_y.abs() > MAX_CLIP_POSITION {
            return Err(fail("position offset out of bounds".to_string()));
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

/// Accept only the discrete fade durations the editing layer offers.
pub(crate) fn validate_fade_duration(duration: f64) -> Result<(), String> {
    let allowed = FADE_DURATION_CHOICES
        .iter()
        .any(|choice| (duration - choice).abs() < 1e-9);
    if allowed {
        Ok(())
    } else {
        Err(format!(
            "fade duration {duration} not in {FADE_DURATION_CHOICES:?}"
        ))
    }
}
