//! Clock and cancellation utilities for playback and export.
//!
//! Playback derives the playhead from a monotonic anchor: the clock is
//! anchored so that `position = start_position + (now - anchored_at)`,
//! which makes the playhead immune to per-tick scheduling jitter. Export
//! never consults this clock; it advances time by fixed frame steps and
//! derives timestamps from frame/sample counts instead.

use std::time::{Duration, Instant};

/// Monotonic counter that invalidates superseded playback loops.
///
/// Every operation that can outlive its scheduling context (a tick, an
/// awaited seek, a readiness wait) captures the generation when it starts
/// and compares before applying side effects. `advance` is called by any
/// state transition that must cancel in-flight work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Generation(u64);

impl Generation {
    /// Move to the next generation, invalidating every token captured
    /// before this call. Returns the new current token.
    pub fn advance(&mut self) -> Generation {
        self.0 += 1;
        *self
    }

    /// Capture the current token without advancing.
    pub fn capture(&self) -> Generation {
        *self
    }

    /// Whether a previously captured token is still current.
    pub fn is_current(&self, captured: Generation) -> bool {
        self.0 == captured.0
    }
}

/// An anchored playback clock.
///
/// `anchor(from)` records "playback of position `from` started now"; the
/// playhead at any later instant is `from + elapsed wall time`.
#[derive(Debug, Clone)]
pub struct PlaybackClock {
    anchored_at: Instant,
    start_position: f64,
    anchored_wall: String,
}

impl PlaybackClock {
    /// Anchor a clock at the given timeline position, starting now.
    pub fn anchor(start_position: f64) -> Self {
        Self {
            anchored_at: Instant::now(),
            start_position,
            anchored_wall: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Timeline position at `now`.
    pub fn position_at(&self, now: Instant) -> f64 {
        self.start_position + now.duration_since(self.anchored_at).as_secs_f64()
    }

    /// Timeline position right now.
    pub fn position(&self) -> f64 {
        self.position_at(Instant::now())
    }

    /// The position the clock was anchored at.
    pub fn start_position(&self) -> f64 {
        self.start_position
    }

    /// Wall-clock time at anchoring (for logs).
    pub fn anchored_wall(&self) -> &str {
        &self.anchored_wall
    }
}

/// Tick pacing for the wall-clock render loop.
#[derive(Debug)]
pub struct RateController {
    target_interval: Duration,
    last_tick: Option<Instant>,
}

impl RateController {
    /// Create a controller targeting the given Hz rate.
    pub fn new(target_hz: u32) -> Self {
        Self {
            target_interval: Duration::from_secs(1) / target_hz.max(1),
            last_tick: None,
        }
    }

    /// Check if enough time has passed for the next tick.
    /// Returns true and updates internal state if ready.
    /// The first call always returns true.
    pub fn should_tick(&mut self, now: Instant) -> bool {
        match self.last_tick {
            None => {
                self.last_tick = Some(now);
                true
            }
            Some(last) if now.duration_since(last) >= self.target_interval => {
                self.last_tick = Some(now);
                true
            }
            _ => false,
        }
    }

    /// Target interval between ticks.
    pub fn interval(&self) -> Duration {
        self.target_interval
    }
}

/// Drift between the logical playhead and an actual source position.
#[derive(Debug, Clone, Copy)]
pub struct SyncDrift {
    /// Where the source should be (seconds).
    pub expected_secs: f64,
    /// Where the source actually is (seconds).
    pub actual_secs: f64,
}

impl SyncDrift {
    /// Signed drift in seconds (positive = source is ahead).
    pub fn secs(&self) -> f64 {
        self.actual_secs - self.expected_secs
    }

    /// Whether drift exceeds an acceptable threshold.
    pub fn exceeds(&self, threshold_secs: f64) -> bool {
        self.secs().abs() > threshold_secs
    }
}

/// Presentation timestamp of a video frame in microseconds.
///
/// Quantized to the frame grid with round-half-up rational math so the
/// stream is constant-rate: 30 fps yields 0, 33333, 66667, 100000, ...
/// regardless of how long each frame took to render.
pub fn frame_timestamp_us(frame_index: u64, fps: u32) -> u64 {
    let fps = u128::from(fps.max(1));
    let num = u128::from(frame_index) * 1_000_000;
    ((num * 2 + fps) / (2 * fps)) as u64
}

/// Presentation timestamp of an audio block in microseconds, derived from
/// the number of sample frames encoded before it.
pub fn sample_timestamp_us(total_sample_frames: u64, sample_rate: u32) -> u64 {
    let rate = u128::from(sample_rate.max(1));
    let num = u128::from(total_sample_frames) * 1_000_000;
    ((num * 2 + rate) / (2 * rate)) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_invalidates_captured_tokens() {
        let mut generation = Generation::default();
        let first = generation.capture();
        assert!(generation.is_current(first));

        let second = generation.advance();
        assert!(!generation.is_current(first));
        assert!(generation.is_current(second));
    }

    #[test]
    fn anchored_clock_offsets_position() {
        let clock = PlaybackClock::anchor(4.5);
        let later = clock.anchored_at + Duration::from_millis(1500);
        assert!((clock.position_at(later) - 6.0).abs() < 1e-9);
    }

    #[test]
    fn rate_controller_paces_ticks() {
        let mut ctrl = RateController::new(60);
        let t0 = Instant::now();
        assert!(ctrl.should_tick(t0)); // first tick always fires
        assert!(!ctrl.should_tick(t0 + Duration::from_millis(1)));
        assert!(ctrl.should_tick(t0 + Duration::from_millis(17)));
    }

    #[test]
    fn frame_timestamps_are_quantized_constant_rate() {
        assert_eq!(frame_timestamp_us(0, 30), 0);
        assert_eq!(frame_timestamp_us(1, 30), 33333);
        assert_eq!(frame_timestamp_us(2, 30), 66667);
        assert_eq!(frame_timestamp_us(3, 30), 100000);
        assert_eq!(frame_timestamp_us(300, 30), 10_000_000);
    }

    #[test]
    fn sample_timestamps_follow_encoded_count() {
        assert_eq!(sample_timestamp_us(0, 48_000), 0);
        assert_eq!(sample_timestamp_us(48_000, 48_000), 1_000_000);
        assert_eq!(sample_timestamp_us(1024, 48_000), 21333);
    }

    #[test]
    fn drift_threshold() {
        let drift = SyncDrift {
            expected_secs: 10.0,
            actual_secs: 10.3,
        };
        assert!((drift.secs() - 0.3).abs() < 1e-9);
        assert!(drift.exceeds(0.25));
        assert!(!drift.exceeds(0.5));
    }
}
