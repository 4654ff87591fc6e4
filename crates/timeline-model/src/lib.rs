//! PlayCut Timeline Model
//!
//! Defines the core data contracts for PlayCut projects:
//! - **Clips:** Ordered visual timeline entries (video/image) with
//!   trim, transform, volume, and fade properties
//! - **Timeline:** The clip sequence and the position resolver
//! - **Tracks:** Independent audio layers (BGM, narration) with timeline
//!   placement and in-source offsets
//! - **Captions:** Timed text overlays consumed by the compositor
//! - **Project:** Serialized container tying the above together
//!
//! Everything here is pure data: no decode resources, no platform
//! handles. Live media handles are owned by the backend registry and
//! bound to these records by id.

pub mod caption;
pub mod clip;
pub mod project;
pub mod timeline;
pub mod track;

pub use caption::*;
pub use clip::*;
pub use project::*;
pub use timeline::*;
pub use track::*;

/// Errors produced when validating or loading model data.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Invalid clip {id}: {message}")]
    InvalidClip { id: u64, message: String },

    #[error("Invalid audio track {id}: {message}")]
    InvalidTrack { id: u64, message: String },

    #[error("Invalid caption: {message}")]
    InvalidCaption { message: String },

    #[error("Invalid project: {message}")]
    InvalidProject { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Result type alias using ModelError.
pub type ModelResult<T> = Result<T, ModelError>;
