//! Timed caption overlays.
//!
//! Captions are drawn by the compositor on top of the active clip.
//! Several captions may be simultaneously active; each is composited
//! independently with its own fade window.

use serde::{Deserialize, Serialize};

use crate::{ModelError, ModelResult};

/// A timed text overlay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Caption {
    /// Timeline time the caption appears.
    pub start_time: f64,

    /// Timeline time the caption disappears (exclusive).
    pub end_time: f64,

    /// Text content.
    pub text: String,

    /// Style overrides.
    #[serde(default)]
    pub style: CaptionStyle,

    /// Fade windows at the caption edges (seconds; 0 disables).
    #[serde(default)]
    pub fade_in_duration: f64,
    #[serde(default)]
    pub fade_out_duration: f64,
}

/// Caption rendering style.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptionStyle {
    /// Font size in surface pixels.
    pub font_size: f64,

    /// Fill color (CSS hex).
    pub fill_color: String,

    /// Stroke color drawn under the fill (CSS hex).
    pub stroke_color: String,

    /// Stroke width in pixels.
    pub stroke_width: f64,

    /// Background blur radius in pixels (0 disables).
    pub blur_radius: f64,

    /// Vertical position as a fraction of surface height.
    pub baseline: f64,
}

impl Default for CaptionStyle {
    fn default() -> Self {
        Self {
            font_size: 42.0,
            fill_color: "#ffffff".to_string(),
            stroke_color: "#000000".to_string(),
            stroke_width: 3.0,
            blur_radius: 0.0,
            baseline: 0.85,
        }
    }
}

impl Caption {
    /// Create a caption with default styling.
    pub fn new(start_time: f64, end_time: f64, text: impl Into<String>) -> Self {
        Self {
            start_time,
            end_time,
            text: text.into(),
            style: CaptionStyle::default(),
            fade_in_duration: 0.0,
            fade_out_duration: 0.0,
        }
    }

    /// Whether the caption is visible at `time`.
    pub fn active_at(&self, time: f64) -> bool {
        time >= self.start_time && time < self.end_time
    }

    /// Check invariants.
    pub fn validate(&self) -> ModelResult<()> {
        if !(self.start_time < self.end_time) {
            return Err(ModelError::InvalidCaption {
                message: format!(
                    "start_time {} must be < end_time {}",
                    self.start_time, self.end_time
                ),
            });
        }
        if self.fade_in_duration < 0.0 || self.fade_out_duration < 0.0 {
            return Err(ModelError::InvalidCaption {
                message: "fade durations must be non-negative".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_window_is_half_open() {
        let caption = Caption::new(1.0, 3.0, "hello");
        assert!(!caption.active_at(0.99));
        assert!(caption.active_at(1.0));
        assert!(caption.active_at(2.9));
        assert!(!caption.active_at(3.0));
    }

    #[test]
    fn overlapping_captions_are_both_active() {
        let a = Caption::new(0.0, 5.0, "a");
        let b = Caption::new(2.0, 4.0, "b");
        assert!(a.active_at(3.0) && b.active_at(3.0));
    }

    #[test]
    fn rejects_empty_window() {
        let caption = Caption::new(2.0, 2.0, "x");
        assert!(caption.validate().is_err());
    }
}
