//! Render surface contract.

use playcut_common::EngineResult;

use crate::media::MediaHandle;

/// Placement of a source on the surface.
///
/// `scale` is the final uniform scale (contain-fit times the clip's own
/// multiplier); `dx`/`dy` offset the draw from the surface center.
#[derive(Debug, Clone, Copy)]
pub struct DrawTransform {
    pub scale: f64,
    pub dx: f64,
    pub dy: f64,
    /// Compositing alpha in `[0, 1]`.
    pub alpha: f64,
}

/// A text draw request: stroke first, then fill, at the given alpha.
#[derive(Debug, Clone)]
pub struct TextSpec {
    pub text: String,
    /// Center position in surface pixels.
    pub x: f64,
    pub y: f64,
    pub font_size: f64,
    pub fill_color: String,
    pub stroke_color: String,
    pub stroke_width: f64,
    pub alpha: f64,
    /// Blur radius in pixels; honored natively only when the surface
    /// reports blur support.
    pub blur_radius: f64,
}

/// Raw pixels captured from the surface (RGBA8, row-major).
#[derive(Debug, Clone)]
pub struct FramePixels {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl FramePixels {
    /// Byte length expected for the dimensions.
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

/// 2D drawing target the compositor renders into.
///
/// The surface retains its contents between calls: when the compositor
/// decides to hold a frame it simply issues no draw, and the previous
/// frame stays visible.
pub trait RenderSurface {
    /// Surface dimensions in pixels.
    fn size(&self) -> (u32, u32);

    /// Clear the whole surface to opaque black.
    fn clear(&mut self);

    /// Draw the current frame of a source with the given placement.
    /// Failures are per-frame: the compositor logs and moves on.
    fn draw_source(&mut self, handle: MediaHandle, transform: DrawTransform) -> EngineResult<()>;

    /// Draw text with stroke-then-fill rendering.
    fn draw_text(&mut self, spec: &TextSpec) -> EngineResult<()>;

    /// Whether the surface has a native blur filter. Without one, the
    /// compositor approximates blur with repeated offset low-alpha
    /// passes.
    fn supports_blur(&self) -> bool;

    /// Capture the current surface contents (export path).
    fn capture_frame(&self) -> EngineResult<FramePixels>;
}
