//! PlayCut backend contracts.
//!
//! The engine core never touches platform media APIs directly. Every
//! platform-specific concern sits behind one of three trait seams:
//!
//! - **[`MediaBackend`]:** Decodable sources: probe readiness,
//!   reposition, play/pause, reload
//! - **[`RenderSurface`]:** A 2D drawing target with transform, alpha,
//!   stroke/fill text, and optional blur
//! - **[`AudioGraph`]:** Gain nodes with smoothed ramps plus the export
//!   capture surface (readable mix bus or PCM tap)
//!
//! A concrete backend supplies all three (a browser build from media
//! elements/canvas/web audio; a native build from a decode framework, a
//! software bitmap, and a mixing library). [`BackendCapabilities`] is
//! queried once at engine construction and selects strategies for the
//! paths that differ per platform.
//!
//! [`synthetic`] provides a deterministic in-memory implementation used
//! by the engine's tests and the CLI.

pub mod audio;
pub mod capabilities;
pub mod media;
pub mod registry;
pub mod surface;
pub mod synthetic;

pub use audio::*;
pub use capabilities::*;
pub use media::*;
pub use registry::*;
pub use surface::*;
