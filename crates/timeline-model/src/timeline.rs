//! The visual timeline and position resolver.

use serde::{Deserialize, Serialize};

use crate::clip::{Clip, ClipId};
use crate::ModelResult;

/// Backoff from the timeline end used when resolving positions at or
/// past the last clip, so the tail never resolves to "no clip" and the
/// final frame stays visible.
pub const RESOLVE_TAIL_EPSILON: f64 = 0.001;

/// The ordered sequence of visual clips.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Timeline {
    /// Clips in playback order.
    pub clips: Vec<Clip>,
}

/// Result of resolving an absolute timeline position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedClip {
    /// Index of the active clip.
    pub index: usize,
    /// Offset into the active clip, in `[0, clip.duration())`.
    pub local_offset: f64,
}

impl Timeline {
    /// Create an empty timeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a timeline from an ordered clip list.
    pub fn from_clips(clips: Vec<Clip>) -> Self {
        Self { clips }
    }

    /// Total duration: always the sum of clip durations, recomputed on
    /// every call so it can never go stale across mutations.
    pub fn total_duration(&self) -> f64 {
        self.clips.iter().map(Clip::duration).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    /// Append a clip to the end of the timeline.
    pub fn push(&mut self, clip: Clip) {
        self.clips.push(clip);
    }

    /// Remove a clip by identity. Returns the removed clip, if present.
    pub fn remove(&mut self, id: ClipId) -> Option<Clip> {
        let index = self.clips.iter().position(|c| c.id == id)?;
        Some(self.clips.remove(index))
    }

    /// Remove every clip.
    pub fn clear(&mut self) {
        self.clips.clear();
    }

    /// Resolve an absolute timeline position to the active clip.
    ///
    /// Walks the sequence accumulating durations and returns the first
    /// clip whose half-open window contains `t`. Positions at or past
    /// the timeline end (seek slack, floating-point drift) resolve to
    /// the **last** clip just before its end, never to `None`, so the
    /// tail frame is held instead of blanking.
    ///
    /// Pure and idempotent; shared by the render path and the seek path.
    pub fn resolve(&self, t: f64) -> Option<ResolvedClip> {
        if self.clips.is_empty() {
            return None;
        }

        let t = t.max(0.0);
        let mut accumulated = 0.0;
        for (index, clip) in self.clips.iter().enumerate() {
            let duration = clip.duration();
            if t < accumulated + duration {
                return Some(ResolvedClip {
                    index,
                    local_offset: t - accumulated,
                });
            }
            accumulated += duration;
        }

        // Past the end: hold the last clip at its final presentable offset.
        let index = self.clips.len() - 1;
        let duration = self.clips[index].duration();
        Some(ResolvedClip {
            index,
            local_offset: (duration - RESOLVE_TAIL_EPSILON).max(0.0),
        })
    }

    /// Timeline position where the clip at `index` begins.
    pub fn start_offset(&self, index: usize) -> Option<f64> {
        if index >= self.clips.len() {
            return None;
        }
        Some(self.clips[..index].iter().map(Clip::duration).sum())
    }

    /// The clip active at `t`.
    pub fn clip_at(&self, t: f64) -> Option<&Clip> {
        self.resolve(t).map(|r| &self.clips[r.index])
    }

    /// Seconds until the clip active at `t` ends, or `None` on an empty
    /// timeline. Used by the preload path to spot upcoming cuts.
    pub fn time_until_clip_end(&self, t: f64) -> Option<f64> {
        let resolved = self.resolve(t)?;
        let remaining = self.clips[resolved.index].duration() - resolved.local_offset;
        Some(remaining.max(0.0))
    }

    /// Index of the clip that follows the one active at `t`.
    pub fn next_clip_index(&self, t: f64) -> Option<usize> {
        let resolved = self.resolve(t)?;
        let next = resolved.index + 1;
        (next < self.clips.len()).then_some(next)
    }

    /// Validate every clip.
    pub fn validate(&self) -> ModelResult<()> {
        for clip in &self.clips {
            clip.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::ClipKind;
    use proptest::prelude::*;

    fn two_clip_timeline() -> Timeline {
        // [clip A: 0-5s][clip B: 5-8s]
        let a = Clip::video(ClipId(1), "a.mp4", 5.0);
        let b = Clip::video(ClipId(2), "b.mp4", 3.0);
        Timeline::from_clips(vec![a, b])
    }

    #[test]
    fn resolves_into_second_clip() {
        let timeline = two_clip_timeline();
        let resolved = timeline.resolve(6.5).unwrap();
        assert_eq!(resolved.index, 1);
        assert!((resolved.local_offset - 1.5).abs() < 1e-9);
    }

    #[test]
    fn resolves_boundary_to_following_clip() {
        let timeline = two_clip_timeline();
        let resolved = timeline.resolve(5.0).unwrap();
        assert_eq!(resolved.index, 1);
        assert!(resolved.local_offset.abs() < 1e-9);
    }

    #[test]
    fn past_end_resolves_to_last_clip_tail() {
        let timeline = two_clip_timeline();
        for t in [8.0, 8.0001, 100.0] {
            let resolved = timeline.resolve(t).unwrap();
            assert_eq!(resolved.index, 1);
            assert!((resolved.local_offset - (3.0 - RESOLVE_TAIL_EPSILON)).abs() < 1e-9);
        }
    }

    #[test]
    fn empty_timeline_resolves_to_none() {
        assert!(Timeline::new().resolve(0.0).is_none());
    }

    #[test]
    fn total_duration_tracks_mutations() {
        let mut timeline = two_clip_timeline();
        assert!((timeline.total_duration() - 8.0).abs() < 1e-9);

        timeline.remove(ClipId(1));
        assert!((timeline.total_duration() - 3.0).abs() < 1e-9);

        timeline.push(Clip::image(ClipId(3), "c.png", 2.0));
        assert!((timeline.total_duration() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn start_offset_accumulates() {
        let timeline = two_clip_timeline();
        assert_eq!(timeline.start_offset(0), Some(0.0));
        assert_eq!(timeline.start_offset(1), Some(5.0));
        assert_eq!(timeline.start_offset(2), None);
    }

    #[test]
    fn time_until_clip_end_counts_down_to_cut() {
        let timeline = two_clip_timeline();
        assert!((timeline.time_until_clip_end(3.0).unwrap() - 2.0).abs() < 1e-9);
        assert!((timeline.time_until_clip_end(6.0).unwrap() - 2.0).abs() < 1e-9);
        assert_eq!(timeline.next_clip_index(3.0), Some(1));
        assert_eq!(timeline.next_clip_index(6.0), None);
    }

    proptest! {
        /// For any position inside the timeline exactly one clip resolves,
        /// with a local offset inside that clip's duration.
        #[test]
        fn resolver_is_total_within_duration(
            durations in prop::collection::vec(0.2f64..30.0, 1..8),
            fraction in 0.0f64..0.9999,
        ) {
            let clips: Vec<Clip> = durations
                .iter()
                .enumerate()
                .map(|(i, d)| Clip::image(ClipId(i as u64), format!("{i}.png"), *d))
                .collect();
            let timeline = Timeline::from_clips(clips);
            let total = timeline.total_duration();
            let t = total * fraction;

            let resolved = timeline.resolve(t).unwrap();
            prop_assert!(resolved.index < timeline.len());
            let duration = timeline.clips[resolved.index].duration();
            prop_assert!(resolved.local_offset >= 0.0);
            prop_assert!(resolved.local_offset < duration);

            // Resolving is idempotent: the clip's window contains t.
            let start = timeline.start_offset(resolved.index).unwrap();
            prop_assert!(t >= start - 1e-9);
            prop_assert!(t < start + duration + 1e-9);
        }

        /// Positions at or past the end resolve to the last clip with an
        /// offset just inside it.
        #[test]
        fn resolver_tail_policy_holds(
            durations in prop::collection::vec(0.2f64..30.0, 1..8),
            slack in 0.0f64..10.0,
        ) {
            let clips: Vec<Clip> = durations
                .iter()
                .enumerate()
                .map(|(i, d)| Clip::image(ClipId(i as u64), format!("{i}.png"), *d))
                .collect();
            let timeline = Timeline::from_clips(clips);
            let total = timeline.total_duration();

            let resolved = timeline.resolve(total + slack).unwrap();
            prop_assert_eq!(resolved.index, timeline.len() - 1);
            let duration = timeline.clips[resolved.index].duration();
            prop_assert!(resolved.local_offset < duration);
            prop_assert!(resolved.local_offset >= duration - RESOLVE_TAIL_EPSILON - 1e-9);
        }
    }

    #[test]
    fn image_clips_are_valid_resolver_fixtures() {
        // Guard for the proptest generators above.
        let clip = Clip::image(ClipId(0), "0.png", 0.5);
        assert_eq!(clip.kind, ClipKind::Image);
        assert!(clip.validate().is_ok());
    }
}
