//! Scrub/seek coordination.
//!
//! Scrub input arrives far faster than sources can reposition. The
//! coordinator renders every input for visual responsiveness but
//! commits an actual source reposition at most once per throttle
//! window; the exact position is committed when the seek ends. Play
//! state from before the seek is preserved and restored on completion.

use std::time::{Duration, Instant};

/// What a scrub input should do beyond updating the playhead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrubAction {
    /// Render only; the reposition is throttled away.
    Render,
    /// Render and commit a source reposition.
    RenderAndReposition,
}

/// Terminal state handed back by [`SeekCoordinator::end`].
#[derive(Debug, Clone, Copy)]
pub struct SeekEnd {
    /// The final scrub target, if any input arrived.
    pub target: Option<f64>,
    /// Whether playback was running when the seek began.
    pub resume: bool,
}

/// The scrub/seek state machine.
#[derive(Debug, Default)]
pub struct SeekCoordinator {
    seeking: bool,
    resume_after: bool,
    throttle: Duration,
    last_commit: Option<Instant>,
    pending_target: Option<f64>,
}

impl SeekCoordinator {
    pub fn new(throttle: Duration) -> Self {
        Self {
            throttle,
            ..Self::default()
        }
    }

    /// Whether a seek is in progress.
    pub fn is_seeking(&self) -> bool {
        self.seeking
    }

    /// Begin a seek, recording whether playback should resume when it
    /// ends. No-op if already seeking.
    pub fn begin(&mut self, was_playing: bool) {
        if self.seeking {
            return;
        }
        self.seeking = true;
        self.resume_after = was_playing;
        self.last_commit = None;
        self.pending_target = None;
        tracing::debug!(was_playing, "Seek started");
    }

    /// Feed one scrub input. Returns whether this input may commit a
    /// source reposition or only update the render.
    pub fn scrub(&mut self, target: f64, now: Instant) -> ScrubAction {
        self.pending_target = Some(target);

        let window_open = match self.last_commit {
            None => true,
            Some(last) => now.duration_since(last) >= self.throttle,
        };
        if window_open {
            self.last_commit = Some(now);
            ScrubAction::RenderAndReposition
        } else {
            ScrubAction::Render
        }
    }

    /// End the seek, returning the exact target to commit and whether
    /// to resume playback.
    pub fn end(&mut self) -> SeekEnd {
        let end = SeekEnd {
            target: self.pending_target.take(),
            resume: self.resume_after,
        };
        self.seeking = false;
        self.resume_after = false;
        self.last_commit = None;
        end
    }
}
