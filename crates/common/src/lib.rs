//! PlayCut Common Utilities
//!
//! Shared infrastructure for all PlayCut crates:
//! - Error types and result aliases
//! - Playback clock, loop generations, and timestamp quantization
//! - Tracing/logging initialization
//! - Engine configuration and sync tolerances

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
