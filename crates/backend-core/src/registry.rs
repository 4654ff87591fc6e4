//! Registry of live media handles and their gain nodes.
//!
//! The registry is the single owner of externally-held resources: one
//! entry per clip/track that currently has a decodable source, holding
//! the media handle and, for audible sources, the gain node wired into
//! the audio graph. Entries are bound when the editing layer mounts a
//! source and released when the clip/track is removed or the player
//! unmounts, never tied to component re-mount timing.

use std::collections::HashMap;

use playcut_timeline_model::{ClipId, TrackId};

use crate::audio::{AudioGraph, GainNodeId};
use crate::media::{MediaBackend, MediaHandle};

/// Identity of a source owner: a visual clip or an audio track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceId {
    Clip(ClipId),
    Track(TrackId),
}

/// Live resources bound to one clip or track.
#[derive(Debug, Clone, Copy)]
pub struct RegistryEntry {
    pub media: MediaHandle,
    pub gain: Option<GainNodeId>,
}

/// Arena of live source handles, keyed by typed ids.
#[derive(Debug, Default)]
pub struct HandleRegistry {
    entries: HashMap<SourceId, RegistryEntry>,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a source locator to `id`, opening a fresh media handle and,
    /// for audible sources, creating and connecting a gain node.
    ///
    /// Rebinding an id that is already live first tears the old entry
    /// down completely: the stale gain node is disconnected before the
    /// new one is wired, so the graph can never carry two edges for one
    /// logical source.
    pub fn bind(
        &mut self,
        id: SourceId,
        locator: &str,
        audible: bool,
        media: &mut dyn MediaBackend,
        audio: &mut dyn AudioGraph,
    ) -> MediaHandle {
        if self.entries.contains_key(&id) {
            self.release(id, media, audio);
        }

        let handle = media.open(locator);
        let gain = if audible {
            let node = audio.create_gain();
            audio.connect(node);
            Some(node)
        } else {
            None
        };

        tracing::debug!(?id, ?handle, audible, "Bound media source");
        self.entries.insert(id, RegistryEntry { media: handle, gain });
        handle
    }

    /// Release the resources bound to `id`, if any. Disconnects the
    /// gain node before closing the media handle.
    pub fn release(&mut self, id: SourceId, media: &mut dyn MediaBackend, audio: &mut dyn AudioGraph) {
        let Some(entry) = self.entries.remove(&id) else {
            return;
        };
        if let Some(node) = entry.gain {
            audio.cancel_ramps(node);
            audio.disconnect(node);
        }
        media.close(entry.media);
        tracing::debug!(?id, handle = ?entry.media, "Released media source");
    }

    /// Release every entry (full-timeline clear or player unmount).
    pub fn release_all(&mut self, media: &mut dyn MediaBackend, audio: &mut dyn AudioGraph) {
        let ids: Vec<SourceId> = self.entries.keys().copied().collect();
        for id in ids {
            self.release(id, media, audio);
        }
    }

    /// Look up the live entry for an id.
    pub fn get(&self, id: SourceId) -> Option<RegistryEntry> {
        self.entries.get(&id).copied()
    }

    /// Media handle for an id.
    pub fn media(&self, id: SourceId) -> Option<MediaHandle> {
        self.get(id).map(|e| e.media)
    }

    /// Gain node for an id.
    pub fn gain(&self, id: SourceId) -> Option<GainNodeId> {
        self.get(id).and_then(|e| e.gain)
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over all live entries.
    pub fn iter(&self) -> impl Iterator<Item = (SourceId, RegistryEntry)> + '_ {
        self.entries.iter().map(|(id, entry)| (*id, *entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::{SyntheticAudioGraph, SyntheticMedia};

    #[test]
    fn rebind_never_duplicates_gain_edges() {
        let mut media = SyntheticMedia::new();
        let mut audio = SyntheticAudioGraph::new(48000, 2);
        let mut registry = HandleRegistry::new();
        let id = SourceId::Clip(ClipId(1));

        let first = registry.bind(id, "a.mp4", true, &mut media, &mut audio);
        assert_eq!(audio.connected_count(), 1);

        let second = registry.bind(id, "a.mp4", true, &mut media, &mut audio);
        assert_ne!(first, second);
        assert_eq!(audio.connected_count(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn release_disconnects_and_closes() {
        let mut media = SyntheticMedia::new();
        let mut audio = SyntheticAudioGraph::new(48000, 2);
        let mut registry = HandleRegistry::new();
        let id = SourceId::Track(TrackId(7));

        let handle = registry.bind(id, "bgm.mp3", true, &mut media, &mut audio);
        registry.release(id, &mut media, &mut audio);

        assert_eq!(audio.connected_count(), 0);
        assert!(registry.is_empty());
        assert!(media.probe(handle).errored);
    }

    #[test]
    fn silent_sources_get_no_gain_node() {
        let mut media = SyntheticMedia::new();
        let mut audio = SyntheticAudioGraph::new(48000, 2);
        let mut registry = HandleRegistry::new();
        let id = SourceId::Clip(ClipId(2));

        registry.bind(id, "still.png", false, &mut media, &mut audio);
        assert_eq!(audio.connected_count(), 0);
        assert!(registry.gain(id).is_none());
    }
}
