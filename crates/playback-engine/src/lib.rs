//! PlayCut Playback Engine
//!
//! The playback, compositing, and export core: keeps independently
//! buffered media sources visually and aurally synchronized to one
//! logical clock, and re-renders the same timeline deterministically
//! for export.
//!
//! # Architecture
//!
//! ```text
//! timeline ──► Resolver ──► Compositor ──► Render Surface   (preview)
//!    │            │             │              │
//!    │            │             │              └──► Frame Encoder (export)
//!    │            │             ▼
//!    │            │          Mixer ──► Audio Graph ──► bus / tap ─► Audio Encoder
//!    │            ▼
//!    │       Readiness Probe ──► Media Backend (reload / preload)
//!    │
//!    └──► Playback Loop (wall clock, generations)
//!         Seek Coordinator (throttled scrub, resume)
//!         Export Pipeline (fixed-step, pre-roll barrier)
//! ```
//!
//! Preview and scrubbing share a single render path; export drives the
//! same path on a fixed frame grid instead of the wall clock. Every
//! asynchronous suspension re-checks the loop generation before applying
//! side effects, so superseded operations die silently.

pub mod compositor;
pub mod engine;
pub mod export;
pub mod mixer;
pub mod player;
pub mod readiness;
pub mod seek;

pub use compositor::*;
pub use engine::*;
pub use export::*;
pub use mixer::*;
pub use player::*;
pub use readiness::*;
pub use seek::*;
