//! Deterministic in-memory backend for tests and headless runs.
//!
//! Behaves like a real backend at the trait level (asynchronous seeks,
//! readiness levels, gain-node bookkeeping, a capturable surface) but
//! with fully controllable, clock-free behavior so engine tests are
//! exact. The CLI also uses it for `check` and synthetic exports.

use std::collections::{HashMap, VecDeque};

use playcut_common::EngineResult;

use crate::audio::{AudioGraph, AudioGraphState, GainNodeId, PcmBlock};
use crate::capabilities::BackendCapabilities;
use crate::media::{MediaBackend, MediaHandle, MediaProbe, ReadyLevel};
use crate::surface::{DrawTransform, FramePixels, RenderSurface, TextSpec};

/// One simulated decodable source.
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    pub locator: String,
    pub position: f64,
    pub playing: bool,
    pub seeking: bool,
    pub ready: ReadyLevel,
    pub errored: bool,
    pub natural_size: (u32, u32),
    pub reload_count: u32,
    pub reposition_count: u32,
    /// Simulate a source whose seeks never finish (timeout testing).
    pub never_complete_seeks: bool,
    pending_position: f64,
    seek_polls_remaining: u32,
}

/// Simulated media backend.
#[derive(Debug)]
pub struct SyntheticMedia {
    sources: HashMap<MediaHandle, SyntheticSource>,
    next_handle: u64,
    /// `seek_completed` polls a seek takes before finishing. Zero makes
    /// repositions complete synchronously.
    pub seek_latency_polls: u32,
    /// Readiness level newly opened sources report.
    pub default_ready: ReadyLevel,
}

impl Default for SyntheticMedia {
    fn default() -> Self {
        Self::new()
    }
}

impl SyntheticMedia {
    pub fn new() -> Self {
        Self {
            sources: HashMap::new(),
            next_handle: 0,
            seek_latency_polls: 0,
            default_ready: ReadyLevel::Enough,
        }
    }

    /// Inspect a simulated source.
    pub fn source(&self, handle: MediaHandle) -> Option<&SyntheticSource> {
        self.sources.get(&handle)
    }

    /// Mutate a simulated source (fault injection).
    pub fn source_mut(&mut self, handle: MediaHandle) -> Option<&mut SyntheticSource> {
        self.sources.get_mut(&handle)
    }

    /// Put a source into the error state.
    pub fn fail(&mut self, handle: MediaHandle) {
        if let Some(source) = self.sources.get_mut(&handle) {
            source.errored = true;
            source.ready = ReadyLevel::Nothing;
        }
    }

    /// Set a source's readiness level.
    pub fn set_ready(&mut self, handle: MediaHandle, ready: ReadyLevel) {
        if let Some(source) = self.sources.get_mut(&handle) {
            source.ready = ready;
        }
    }
}

impl MediaBackend for SyntheticMedia {
    fn open(&mut self, locator: &str) -> MediaHandle {
        self.next_handle += 1;
        let handle = MediaHandle(self.next_handle);
        self.sources.insert(
            handle,
            SyntheticSource {
                locator: locator.to_string(),
                position: 0.0,
                playing: false,
                seeking: false,
                ready: self.default_ready,
                errored: false,
                natural_size: (1280, 720),
                reload_count: 0,
                reposition_count: 0,
                never_complete_seeks: false,
                pending_position: 0.0,
                seek_polls_remaining: 0,
            },
        );
        handle
    }

    fn close(&mut self, handle: MediaHandle) {
        self.sources.remove(&handle);
    }

    fn probe(&self, handle: MediaHandle) -> MediaProbe {
        match self.sources.get(&handle) {
            Some(source) => MediaProbe {
                ready: source.ready,
                seeking: source.seeking,
                errored: source.errored,
                natural_size: Some(source.natural_size),
                position_secs: source.position,
            },
            None => MediaProbe::unavailable(),
        }
    }

    fn reposition(&mut self, handle: MediaHandle, secs: f64) {
        let latency = self.seek_latency_polls;
        if let Some(source) = self.sources.get_mut(&handle) {
            source.reposition_count += 1;
            if latency == 0 && !source.never_complete_seeks {
                source.position = secs;
                source.seeking = false;
            } else {
                source.seeking = true;
                source.pending_position = secs;
                source.seek_polls_remaining = latency.max(1);
            }
        }
    }

    fn play(&mut self, handle: MediaHandle) {
        if let Some(source) = self.sources.get_mut(&handle) {
            source.playing = true;
        }
    }

    fn pause(&mut self, handle: MediaHandle) {
        if let Some(source) = self.sources.get_mut(&handle) {
            source.playing = false;
        }
    }

    fn is_playing(&self, handle: MediaHandle) -> bool {
        self.sources.get(&handle).is_some_and(|s| s.playing)
    }

    fn reload(&mut self, handle: MediaHandle) {
        let default_ready = self.default_ready;
        if let Some(source) = self.sources.get_mut(&handle) {
            source.reload_count += 1;
            source.errored = false;
            source.ready = default_ready;
        }
    }

    fn seek_completed(&mut self, handle: MediaHandle) -> bool {
        let Some(source) = self.sources.get_mut(&handle) else {
            return true;
        };
        if !source.seeking {
            return true;
        }
        if source.never_complete_seeks {
            return false;
        }
        source.seek_polls_remaining = source.seek_polls_remaining.saturating_sub(1);
        if source.seek_polls_remaining == 0 {
            source.seeking = false;
            source.position = source.pending_position;
            true
        } else {
            false
        }
    }
}

/// A recorded surface operation.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Clear,
    Source { handle: MediaHandle, alpha: f64 },
    Text { text: String, alpha: f64 },
}

/// Software render surface: an RGBA buffer plus a draw log.
#[derive(Debug)]
pub struct SoftwareSurface {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
    native_blur: bool,
    /// Every operation issued against the surface, in order.
    pub draw_log: Vec<DrawOp>,
    serial: u64,
}

impl SoftwareSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            rgba: vec![0; width as usize * height as usize * 4],
            native_blur: true,
            draw_log: Vec::new(),
            serial: 0,
        }
    }

    /// Disable the native blur filter (forces layered-pass captions).
    pub fn without_native_blur(mut self) -> Self {
        self.native_blur = false;
        self
    }

    /// Monotonic counter bumped by every draw; a tick that holds the
    /// previous frame leaves it unchanged.
    pub fn serial(&self) -> u64 {
        self.serial
    }
}

impl RenderSurface for SoftwareSurface {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn clear(&mut self) {
        for pixel in self.rgba.chunks_exact_mut(4) {
            pixel.copy_from_slice(&[0, 0, 0, 255]);
        }
        self.draw_log.push(DrawOp::Clear);
        self.serial += 1;
    }

    fn draw_source(&mut self, handle: MediaHandle, transform: DrawTransform) -> EngineResult<()> {
        // Deterministic stand-in for decoded pixels: flood the buffer
        // with a handle-derived color at the requested alpha.
        let alpha = transform.alpha.clamp(0.0, 1.0);
        let shade = ((handle.0 * 37) % 200 + 55) as u8;
        let value = (f64::from(shade) * alpha) as u8;
        for pixel in self.rgba.chunks_exact_mut(4) {
            pixel.copy_from_slice(&[value, value, value, 255]);
        }
        self.draw_log.push(DrawOp::Source {
            handle,
            alpha: transform.alpha,
        });
        self.serial += 1;
        Ok(())
    }

    fn draw_text(&mut self, spec: &TextSpec) -> EngineResult<()> {
        self.draw_log.push(DrawOp::Text {
            text: spec.text.clone(),
            alpha: spec.alpha,
        });
        self.serial += 1;
        Ok(())
    }

    fn supports_blur(&self) -> bool {
        self.native_blur
    }

    fn capture_frame(&self) -> EngineResult<FramePixels> {
        Ok(FramePixels {
            width: self.width,
            height: self.height,
            rgba: self.rgba.clone(),
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct GainNode {
    gain: f64,
    connected: bool,
}

/// Simulated audio graph. Ramps complete instantly but are counted, so
/// tests can assert on scheduling behavior without real time.
#[derive(Debug)]
pub struct SyntheticAudioGraph {
    nodes: HashMap<GainNodeId, GainNode>,
    next_node: u64,
    state: AudioGraphState,
    clock: f64,
    sample_rate: u32,
    channels: u16,
    /// Whether the mixed bus is readable (MixedBus strategy).
    pub readable_bus: bool,
    tap_queue: VecDeque<PcmBlock>,
    /// Smoothed transitions scheduled so far.
    pub ramp_count: u64,
    /// Ramps cancelled so far.
    pub cancel_count: u64,
}

impl SyntheticAudioGraph {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            nodes: HashMap::new(),
            next_node: 0,
            state: AudioGraphState::Running,
            clock: 0.0,
            sample_rate,
            channels,
            readable_bus: true,
            tap_queue: VecDeque::new(),
            ramp_count: 0,
            cancel_count: 0,
        }
    }

    /// Simulate a platform suspension.
    pub fn suspend(&mut self) {
        self.state = AudioGraphState::Suspended;
    }

    /// Queue a PCM block for the tap capture path.
    pub fn push_tap_block(&mut self, block: PcmBlock) {
        self.tap_queue.push_back(block);
    }
}

impl AudioGraph for SyntheticAudioGraph {
    fn create_gain(&mut self) -> GainNodeId {
        self.next_node += 1;
        let id = GainNodeId(self.next_node);
        self.nodes.insert(
            id,
            GainNode {
                gain: 0.0,
                connected: false,
            },
        );
        id
    }

    fn connect(&mut self, node: GainNodeId) {
        if let Some(n) = self.nodes.get_mut(&node) {
            n.connected = true;
        }
    }

    fn disconnect(&mut self, node: GainNodeId) {
        if let Some(n) = self.nodes.get_mut(&node) {
            n.connected = false;
        }
    }

    fn connected_count(&self) -> usize {
        self.nodes.values().filter(|n| n.connected).count()
    }

    fn set_gain(&mut self, node: GainNodeId, value: f64) {
        if let Some(n) = self.nodes.get_mut(&node) {
            n.gain = value;
        }
    }

    fn ramp_gain(&mut self, node: GainNodeId, target: f64, _time_constant_secs: f64) {
        if let Some(n) = self.nodes.get_mut(&node) {
            n.gain = target;
            self.ramp_count += 1;
        }
    }

    fn cancel_ramps(&mut self, _node: GainNodeId) {
        self.cancel_count += 1;
    }

    fn gain(&self, node: GainNodeId) -> f64 {
        self.nodes.get(&node).map(|n| n.gain).unwrap_or(0.0)
    }

    fn state(&self) -> AudioGraphState {
        self.state
    }

    fn resume(&mut self) -> bool {
        self.state = AudioGraphState::Running;
        true
    }

    fn clock_secs(&self) -> f64 {
        self.clock
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn read_bus_block(&mut self, frames: u32) -> Option<Vec<f32>> {
        if !self.readable_bus {
            return None;
        }
        self.clock += f64::from(frames) / f64::from(self.sample_rate.max(1));
        Some(vec![0.0; frames as usize * usize::from(self.channels)])
    }

    fn take_tap_blocks(&mut self) -> Vec<PcmBlock> {
        self.tap_queue.drain(..).collect()
    }
}

/// Capabilities a synthetic backend trio reports.
pub fn synthetic_capabilities(audio: &SyntheticAudioGraph, surface: &SoftwareSurface) -> BackendCapabilities {
    BackendCapabilities {
        readable_mix_bus: audio.readable_bus,
        native_blur: surface.supports_blur(),
        display_refresh_hz: 60,
        audio_sample_rate: audio.sample_rate(),
        audio_channels: audio.channels(),
    }
}
