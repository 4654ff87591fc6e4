//! Per-frame compositing.
//!
//! One invocation draws one frame: resolve the active clip, decide
//! whether to hold the previous frame, draw the source with its
//! transform and fade alpha, then draw active captions. The same path
//! serves preview, scrubbing, and export.

use playcut_backend_core::{
    BlurStrategy, DrawTransform, HandleRegistry, MediaBackend, RenderSurface, SourceId, TextSpec,
};
use playcut_common::SyncTolerances;
use playcut_timeline_model::{Caption, ClipKind, ResolvedClip, Timeline};

/// Inputs to one composited frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameRequest {
    /// Absolute timeline position.
    pub time: f64,
    /// Whether the playback loop is actively running.
    pub is_playing: bool,
    /// Whether the export pipeline is driving (tighter sync, capture).
    pub is_exporting: bool,
}

/// What one invocation did.
#[derive(Debug, Clone)]
pub struct FrameReport {
    /// The previous frame was left on screen (source not ready).
    pub held: bool,
    /// The clip that was (or would have been) drawn.
    pub active: Option<ResolvedClip>,
    /// Target gain for the active clip's embedded audio, when audible.
    pub clip_gain: Option<f64>,
    /// Draw errors swallowed this frame.
    pub errors: u32,
}

/// Number of offset passes used to approximate blur on surfaces
/// without a native filter.
const BLUR_FALLBACK_PASSES: u32 = 4;

/// Linear fade alpha for a position inside a clip-local window.
///
/// Fade-in ramps 0→1 over `[0, fade_in_duration)`; fade-out ramps 1→0
/// over the final `fade_out_duration`. The windows are independent and
/// each clamps to `[0, 1]`.
pub fn fade_alpha(
    local_time: f64,
    duration: f64,
    fade_in: bool,
    fade_in_duration: f64,
    fade_out: bool,
    fade_out_duration: f64,
) -> f64 {
    let mut alpha = 1.0f64;
    if fade_in && fade_in_duration > 0.0 {
        alpha *= (local_time / fade_in_duration).clamp(0.0, 1.0);
    }
    if fade_out && fade_out_duration > 0.0 {
        let remaining = (duration - local_time).max(0.0);
        alpha *= (remaining / fade_out_duration).clamp(0.0, 1.0);
    }
    alpha.clamp(0.0, 1.0)
}

/// Contain-fit scale for a source inside the surface, multiplied by the
/// clip's own scale.
pub fn contain_fit_scale(
    surface: (u32, u32),
    source: (u32, u32),
    clip_scale: f64,
) -> f64 {
    let (sw, sh) = (f64::from(surface.0), f64::from(surface.1));
    let (nw, nh) = (
        f64::from(source.0.max(1)),
        f64::from(source.1.max(1)),
    );
    (sw / nw).min(sh / nh) * clip_scale
}

/// The frame compositor.
#[derive(Debug)]
pub struct Compositor {
    blur: BlurStrategy,
}

impl Compositor {
    pub fn new(blur: BlurStrategy) -> Self {
        Self { blur }
    }

    /// Compose one frame.
    ///
    /// Draw failures are logged and counted, never propagated: a single
    /// bad frame must not kill the loop.
    pub fn render(
        &self,
        request: FrameRequest,
        timeline: &Timeline,
        captions: &[Caption],
        registry: &HandleRegistry,
        media: &dyn MediaBackend,
        surface: &mut dyn RenderSurface,
        tolerances: &SyncTolerances,
    ) -> FrameReport {
        let mut report = FrameReport {
            held: false,
            active: None,
            clip_gain: None,
            errors: 0,
        };

        let Some(resolved) = timeline.resolve(request.time) else {
            // Empty timeline: nothing to show.
            surface.clear();
            return report;
        };
        report.active = Some(resolved);

        let clip = &timeline.clips[resolved.index];
        let alpha = fade_alpha(
            resolved.local_offset,
            clip.duration(),
            clip.fade_in,
            clip.fade_in_duration,
            clip.fade_out,
            clip.fade_out_duration,
        );
        if clip.is_audible() {
            // Same fade windows, applied to gain instead of draw alpha.
            report.clip_gain = Some(clip.volume * alpha);
        }

        match registry.media(SourceId::Clip(clip.id)) {
            Some(handle) => {
                let probe = media.probe(handle);
                let drifted = request.is_exporting
                    && clip.kind == ClipKind::Video
                    && (probe.position_secs - clip.source_position(resolved.local_offset)).abs()
                        > tolerances.hold_threshold_secs;

                if !probe.ready.can_present() || probe.seeking || probe.errored || drifted {
                    // Hold: leave the previous frame untouched rather
                    // than blank to black.
                    report.held = true;
                } else {
                    surface.clear();
                    let scale = contain_fit_scale(
                        surface.size(),
                        probe.natural_size.unwrap_or(surface.size()),
                        clip.scale,
                    );
                    let transform = DrawTransform {
                        scale,
                        dx: clip.position_x,
                        dy: clip.position_y,
                        alpha,
                    };
                    if let Err(e) = surface.draw_source(handle, transform) {
                        tracing::warn!(clip = clip.id.0, error = %e, "Frame draw failed");
                        report.errors += 1;
                    }
                }
            }
            None => {
                // Source not mounted yet; treat like not-ready.
                report.held = true;
            }
        }

        if !report.held {
            report.errors += self.draw_captions(request.time, captions, surface);
        }

        report
    }

    /// Draw every caption active at `time`, each with its own fade.
    fn draw_captions(
        &self,
        time: f64,
        captions: &[Caption],
        surface: &mut dyn RenderSurface,
    ) -> u32 {
        let mut errors = 0;
        let (width, height) = surface.size();

        for caption in captions.iter().filter(|c| c.active_at(time)) {
            let local = time - caption.start_time;
            let duration = caption.end_time - caption.start_time;
            let alpha = fade_alpha(
                local,
                duration,
                caption.fade_in_duration > 0.0,
                caption.fade_in_duration,
                caption.fade_out_duration > 0.0,
                caption.fade_out_duration,
            );
            if alpha <= 0.0 {
                continue;
            }

            let spec = TextSpec {
                text: caption.text.clone(),
                x: f64::from(width) / 2.0,
                y: f64::from(height) * caption.style.baseline,
                font_size: caption.style.font_size,
                fill_color: caption.style.fill_color.clone(),
                stroke_color: caption.style.stroke_color.clone(),
                stroke_width: caption.style.stroke_width,
                alpha,
                blur_radius: caption.style.blur_radius,
            };

            let result = if spec.blur_radius > 0.0 && self.blur == BlurStrategy::LayeredPasses {
                self.draw_blurred_fallback(&spec, surface)
            } else {
                surface.draw_text(&spec)
            };
            if let Err(e) = result {
                tracing::warn!(error = %e, "Caption draw failed");
                errors += 1;
            }
        }
        errors
    }

    /// Approximate blur with repeated offset low-alpha passes, then the
    /// sharp pass on top.
    fn draw_blurred_fallback(
        &self,
        spec: &TextSpec,
        surface: &mut dyn RenderSurface,
    ) -> playcut_common::EngineResult<()> {
        let passes = BLUR_FALLBACK_PASSES;
        let step = spec.blur_radius / f64::from(passes);
        for i in 1..=passes {
            let offset = step * f64::from(i);
            for (dx, dy) in [(offset, 0.0), (-offset, 0.0), (0.0, offset), (0.0, -offset)] {
                let pass = TextSpec {
                    x: spec.x + dx,
                    y: spec.y + dy,
                    alpha: spec.alpha / (f64::from(passes) * 4.0),
                    blur_radius: 0.0,
                    ..spec.clone()
                };
                surface.draw_text(&pass)?;
            }
        }
        surface.draw_text(&TextSpec {
            blur_radius: 0.0,
            ..spec.clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn alpha_is_one_outside_fade_windows() {
        assert_eq!(fade_alpha(5.0, 10.0, true, 1.0, true, 1.0), 1.0);
        assert_eq!(fade_alpha(5.0, 10.0, false, 0.0, false, 0.0), 1.0);
    }

    #[test]
    fn fade_in_ramps_linearly() {
        let alpha = fade_alpha(0.5, 10.0, true, 2.0, false, 0.0);
        assert!((alpha - 0.25).abs() < 1e-9);
        assert_eq!(fade_alpha(0.0, 10.0, true, 2.0, false, 0.0), 0.0);
        assert_eq!(fade_alpha(2.0, 10.0, true, 2.0, false, 0.0), 1.0);
    }

    #[test]
    fn fade_out_ramps_to_zero_at_end() {
        let alpha = fade_alpha(9.0, 10.0, false, 0.0, true, 2.0);
        assert!((alpha - 0.5).abs() < 1e-9);
        assert_eq!(fade_alpha(10.0, 10.0, false, 0.0, true, 2.0), 0.0);
    }

    #[test]
    fn contain_fit_letterboxes_wide_sources() {
        // 1920x1080 surface, 1280x720 source: fits at 1.5.
        let scale = contain_fit_scale((1920, 1080), (1280, 720), 1.0);
        assert!((scale - 1.5).abs() < 1e-9);

        // Tall source is bounded by height.
        let scale = contain_fit_scale((1920, 1080), (1080, 1920), 1.0);
        assert!((scale - 1080.0 / 1920.0).abs() < 1e-9);

        // Clip scale multiplies on top.
        let scale = contain_fit_scale((1920, 1080), (1920, 1080), 2.0);
        assert!((scale - 2.0).abs() < 1e-9);
    }

    proptest! {
        /// With only a fade-in, alpha is monotonically non-decreasing on
        /// [0, d) and exactly 1 from d on.
        #[test]
        fn fade_in_alpha_is_monotone(
            duration in 1.0f64..30.0,
            fade in 0.5f64..2.0,
            a in 0.0f64..1.0,
            b in 0.0f64..1.0,
        ) {
            let clip_len = duration + fade;
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let alpha_lo = fade_alpha(lo * fade, clip_len, true, fade, false, 0.0);
            let alpha_hi = fade_alpha(hi * fade, clip_len, true, fade, false, 0.0);
            prop_assert!(alpha_lo <= alpha_hi + 1e-12);

            let after = fade_alpha(fade + (clip_len - fade) * 0.5, clip_len, true, fade, false, 0.0);
            prop_assert!((after - 1.0).abs() < 1e-12);
        }

        /// Alpha always stays inside [0, 1].
        #[test]
        fn alpha_is_clamped(
            local in -5.0f64..40.0,
            duration in 0.5f64..30.0,
            fade_in_d in 0.0f64..3.0,
            fade_out_d in 0.0f64..3.0,
        ) {
            let alpha = fade_alpha(local, duration, true, fade_in_d, true, fade_out_d);
            prop_assert!((0.0..=1.0).contains(&alpha));
        }
    }
}
