//! Backend capability report and strategy selection.
//!
//! Capabilities are queried once when the engine is constructed; the
//! code paths that differ per platform (audio export capture, caption
//! blur) are selected here rather than branched at runtime.

use serde::{Deserialize, Serialize};

/// What the concrete backend can do.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BackendCapabilities {
    /// Whether the mixed audio bus can be read directly during export.
    pub readable_mix_bus: bool,

    /// Whether the render surface has a native blur filter.
    pub native_blur: bool,

    /// Display refresh rate driving the preview loop.
    pub display_refresh_hz: u32,

    /// Audio output sample rate.
    pub audio_sample_rate: u32,

    /// Audio output channel count.
    pub audio_channels: u16,
}

impl Default for BackendCapabilities {
    fn default() -> Self {
        Self {
            readable_mix_bus: true,
            native_blur: true,
            display_refresh_hz: 60,
            audio_sample_rate: 48000,
            audio_channels: 2,
        }
    }
}

/// How export audio is captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioCaptureStrategy {
    /// Pull fixed-size blocks straight off the mixed bus.
    MixedBus,
    /// Receive fixed-size PCM blocks from a tap node.
    PcmTap,
}

/// How caption blur is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlurStrategy {
    /// The surface's own blur filter.
    Native,
    /// Repeated offset low-alpha passes approximating a blur.
    LayeredPasses,
}

impl BackendCapabilities {
    /// Select the export audio capture strategy.
    pub fn audio_capture_strategy(&self) -> AudioCaptureStrategy {
        if self.readable_mix_bus {
            AudioCaptureStrategy::MixedBus
        } else {
            AudioCaptureStrategy::PcmTap
        }
    }

    /// Select the caption blur strategy.
    pub fn blur_strategy(&self) -> BlurStrategy {
        if self.native_blur {
            BlurStrategy::Native
        } else {
            BlurStrategy::LayeredPasses
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategies_follow_capabilities() {
        let mut caps = BackendCapabilities::default();
        assert_eq!(caps.audio_capture_strategy(), AudioCaptureStrategy::MixedBus);
        assert_eq!(caps.blur_strategy(), BlurStrategy::Native);

        caps.readable_mix_bus = false;
        caps.native_blur = false;
        assert_eq!(caps.audio_capture_strategy(), AudioCaptureStrategy::PcmTap);
        assert_eq!(caps.blur_strategy(), BlurStrategy::LayeredPasses);
    }
}
