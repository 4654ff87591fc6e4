//! Playback state machine and wall-clock loop core.
//!
//! Two states, Stopped and Running, keyed by a loop [`Generation`].
//! Starting playback advances the generation and anchors the clock so
//! the playhead is derived, not accumulated; stopping advances it again.
//! A tick scheduled under an older generation observes the mismatch and
//! terminates silently; this is the engine's cancellation mechanism for
//! everything asynchronous.

use std::time::Instant;

use playcut_common::{Generation, PlaybackClock};

/// Playback loop state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayState {
    Stopped,
    Running,
}

/// What a tick decided.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// The tick's generation was superseded; do nothing.
    Stale,
    /// Playback reached the end of the timeline and stopped.
    Finished,
    /// Render at the given playhead and schedule the next tick.
    Render { time: f64 },
}

/// The engine's explicit mutable state.
///
/// One struct owns everything the loop, the seek coordinator, and the
/// export pipeline used to scatter across cross-cutting refs: playhead,
/// play state, clock anchor, and the loop generation.
#[derive(Debug)]
pub struct EngineState {
    play: PlayState,
    current_time: f64,
    generation: Generation,
    clock: Option<PlaybackClock>,
}

impl Default for EngineState {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineState {
    pub fn new() -> Self {
        Self {
            play: PlayState::Stopped,
            current_time: 0.0,
            generation: Generation::default(),
            clock: None,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.play == PlayState::Running
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    /// Update the playhead without touching the clock (seek bookkeeping).
    pub fn set_current_time(&mut self, time: f64) {
        self.current_time = time.max(0.0);
    }

    /// Capture the current generation token.
    pub fn generation(&self) -> Generation {
        self.generation.capture()
    }

    /// Whether a captured token is still current.
    pub fn is_current(&self, captured: Generation) -> bool {
        self.generation.is_current(captured)
    }

    /// Invalidate all in-flight operations without changing play state.
    pub fn invalidate(&mut self) -> Generation {
        self.generation.advance()
    }

    /// Start playback from `from`: advance the generation (killing any
    /// prior loop), anchor the clock, and return the token the new loop
    /// must carry into every tick.
    pub fn start(&mut self, from: f64) -> Generation {
        let token = self.generation.advance();
        let clock = PlaybackClock::anchor(from);
        tracing::debug!(
            from,
            anchored_wall = clock.anchored_wall(),
            "Playback started"
        );
        self.clock = Some(clock);
        self.current_time = from;
        self.play = PlayState::Running;
        token
    }

    /// Stop playback: advance the generation so pending ticks and awaited
    /// operations become no-ops.
    pub fn stop(&mut self) -> Generation {
        let token = self.generation.advance();
        self.play = PlayState::Stopped;
        self.clock = None;
        token
    }

    /// Advance one tick of the wall-clock loop.
    ///
    /// `captured` is the token the loop took from [`EngineState::start`];
    /// if anything advanced the generation since, the tick is stale and
    /// must have no effect.
    pub fn tick(&mut self, captured: Generation, now: Instant, total_duration: f64) -> TickOutcome {
        if !self.generation.is_current(captured) || self.play != PlayState::Running {
            return TickOutcome::Stale;
        }

        let Some(clock) = &self.clock else {
            return TickOutcome::Stale;
        };

        let elapsed = clock.position_at(now);
        if elapsed >= total_duration {
            self.generation.advance();
            self.play = PlayState::Stopped;
            self.clock = None;
            self.current_time = total_duration;
            tracing::debug!(total_duration, "Playback reached end");
            return TickOutcome::Finished;
        }

        self.current_time = elapsed;
        TickOutcome::Render { time: elapsed }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn tick_renders_elapsed_position() {
        let mut state = EngineState::new();
        let token = state.start(2.0);
        let now = Instant::now() + Duration::from_millis(500);

        match state.tick(token, now, 10.0) {
            TickOutcome::Render { time } => assert!((time - 2.5).abs() < 0.05),
            other => panic!("expected render, got {other:?}"),
        }
        assert!(state.is_playing());
    }

    #[test]
    fn second_start_invalidates_first_loop() {
        let mut state = EngineState::new();
        let first = state.start(0.0);
        let second = state.start(0.0);

        // A tick captured under the first generation is a no-op.
        assert_eq!(
            state.tick(first, Instant::now(), 10.0),
            TickOutcome::Stale
        );
        // The second loop still ticks.
        assert!(matches!(
            state.tick(second, Instant::now(), 10.0),
            TickOutcome::Render { .. }
        ));
    }

    #[test]
    fn stop_makes_pending_tick_stale() {
        let mut state = EngineState::new();
        let token = state.start(0.0);
        state.stop();
        assert_eq!(state.tick(token, Instant::now(), 10.0), TickOutcome::Stale);
        assert!(!state.is_playing());
    }

    #[test]
    fn reaching_end_stops_and_invalidates() {
        let mut state = EngineState::new();
        let token = state.start(9.9);
        let now = Instant::now() + Duration::from_millis(200);

        assert_eq!(state.tick(token, now, 10.0), TickOutcome::Finished);
        assert!(!state.is_playing());
        assert!((state.current_time() - 10.0).abs() < 1e-9);
        // The finishing transition also invalidated the token.
        assert_eq!(state.tick(token, now, 10.0), TickOutcome::Stale);
    }

    #[test]
    fn set_current_time_does_not_affect_generation() {
        let mut state = EngineState::new();
        let token = state.generation();
        state.set_current_time(4.2);
        assert!(state.is_current(token));
        assert!((state.current_time() - 4.2).abs() < 1e-9);
    }
}
