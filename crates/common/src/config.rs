//! Engine configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Global engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Sync tolerances used during live preview.
    pub preview: SyncTolerances,

    /// Sync tolerances used during export (tighter, since export is not
    /// paced by the wall clock).
    pub export: SyncTolerances,

    /// Minimum interval between committed source repositions while
    /// scrubbing (milliseconds). Render updates are not throttled.
    pub seek_throttle_ms: u64,

    /// Bounded wait for a source's own seek to complete before playback
    /// resumes anyway.
    pub seek_complete_timeout_ms: u64,

    /// Poll interval while waiting on seek completion or readiness.
    pub seek_poll_interval_ms: u64,

    /// Minimum interval between reload attempts for a stalled source.
    pub reload_cooldown_secs: f64,

    /// How far ahead of the playhead upcoming clips are repositioned and
    /// preloaded so cuts are seamless.
    pub preload_horizon_secs: f64,

    /// Time constant for smoothed gain ramps (seconds).
    pub gain_ramp_time_constant_secs: f64,

    /// Gain deltas smaller than this do not schedule a ramp.
    pub min_gain_delta: f64,

    /// Bounded wait for the export pre-roll barrier.
    pub preroll_timeout_ms: u64,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Tunable synchronization thresholds.
///
/// These are empirical knobs, not contracts: acceptable values vary with
/// decoder latency and platform, and should be validated against real
/// sources rather than preserved exactly.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SyncTolerances {
    /// Drift beyond which the compositor holds the previous frame
    /// instead of drawing a desynchronized one.
    pub hold_threshold_secs: f64,

    /// Drift beyond which an audio source is repositioned.
    pub reposition_threshold_secs: f64,

    /// Looser reposition threshold used while a scrub is in progress,
    /// so rapid input does not thrash the source.
    pub seeking_reposition_threshold_secs: f64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "playcut=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            preview: SyncTolerances {
                hold_threshold_secs: 0.25,
                reposition_threshold_secs: 0.25,
                seeking_reposition_threshold_secs: 0.75,
            },
            export: SyncTolerances {
                hold_threshold_secs: 0.05,
                reposition_threshold_secs: 0.05,
                seeking_reposition_threshold_secs: 0.05,
            },
            seek_throttle_ms: 150,
            seek_complete_timeout_ms: 1000,
            seek_poll_interval_ms: 10,
            reload_cooldown_secs: 2.0,
            preload_horizon_secs: 3.0,
            gain_ramp_time_constant_secs: 0.03,
            min_gain_delta: 0.005,
            preroll_timeout_ms: 2000,
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl EngineConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

/// Standard config file location.
fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("playcut").join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip_through_json() {
        let config = EngineConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let restored: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(
            restored.preview.hold_threshold_secs,
            config.preview.hold_threshold_secs
        );
        assert_eq!(restored.seek_throttle_ms, config.seek_throttle_ms);
    }

    #[test]
    fn export_tolerances_are_tighter_than_preview() {
        let config = EngineConfig::default();
        assert!(config.export.hold_threshold_secs < config.preview.hold_threshold_secs);
    }
}
