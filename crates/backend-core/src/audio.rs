//! Audio graph contract.

/// Identity of a gain node inside the audio graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GainNodeId(pub u64);

/// Whether the platform audio graph is currently processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioGraphState {
    Running,
    /// Platform power saving or autoplay policy suspended the graph.
    Suspended,
}

/// A fixed-size block of interleaved f32 PCM delivered by the tap
/// capture path.
#[derive(Debug, Clone)]
pub struct PcmBlock {
    /// Interleaved samples.
    pub samples: Vec<f32>,
    /// Sample frames in this block (samples / channels).
    pub frames: u32,
}

/// Gain-node graph the mixer schedules against.
///
/// Gain changes go through `ramp_gain` with a short time constant so
/// transitions never step audibly; `set_gain` is reserved for initial
/// wiring and teardown where a click cannot occur.
pub trait AudioGraph {
    /// Create a new, unconnected gain node at gain 0.
    fn create_gain(&mut self) -> GainNodeId;

    /// Connect a node into the output graph.
    fn connect(&mut self, node: GainNodeId);

    /// Disconnect a node from the output graph.
    fn disconnect(&mut self, node: GainNodeId);

    /// Number of nodes currently connected to the output. One logical
    /// source must never contribute more than one edge.
    fn connected_count(&self) -> usize;

    /// Set a gain immediately, without smoothing.
    fn set_gain(&mut self, node: GainNodeId, value: f64);

    /// Schedule a smoothed transition toward `target` over the given
    /// time constant.
    fn ramp_gain(&mut self, node: GainNodeId, target: f64, time_constant_secs: f64);

    /// Cancel any in-flight ramps on the node, freezing current gain.
    fn cancel_ramps(&mut self, node: GainNodeId);

    /// Current gain value of a node.
    fn gain(&self, node: GainNodeId) -> f64;

    /// Processing state of the graph.
    fn state(&self) -> AudioGraphState;

    /// Attempt to resume a suspended graph. Returns whether the graph
    /// is running afterwards.
    fn resume(&mut self) -> bool;

    /// Current audio-clock time in seconds.
    fn clock_secs(&self) -> f64;

    /// Output sample rate.
    fn sample_rate(&self) -> u32;

    /// Output channel count.
    fn channels(&self) -> u16;

    /// Read `frames` sample frames from the mixed output bus, when the
    /// platform exposes a readable bus. Returns `None` where the bus
    /// cannot be read directly (the tap path is used instead).
    fn read_bus_block(&mut self, frames: u32) -> Option<Vec<f32>>;

    /// Drain PCM blocks delivered by the capture tap since the last
    /// call. Empty on platforms using the readable-bus path.
    fn take_tap_blocks(&mut self) -> Vec<PcmBlock>;
}
