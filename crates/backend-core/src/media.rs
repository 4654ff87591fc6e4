//! Media decode backend contract.

/// Opaque handle to a live decodable resource.
///
/// Handles are allocated by [`MediaBackend::open`] and owned by the
/// [`crate::registry::HandleRegistry`]; the timeline model itself never
/// holds one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MediaHandle(pub u64);

/// How much of a source is buffered around its current position.
///
/// The ladder mirrors the readiness levels media frameworks report:
/// nothing decoded yet, metadata only, the current frame, some frames
/// ahead, or enough to sustain playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReadyLevel {
    Nothing,
    Metadata,
    CurrentFrame,
    NearFuture,
    Enough,
}

impl ReadyLevel {
    /// Whether the current frame can be presented.
    pub fn can_present(self) -> bool {
        self >= ReadyLevel::CurrentFrame
    }

    /// Whether playback can proceed without an immediate stall.
    pub fn can_play(self) -> bool {
        self >= ReadyLevel::NearFuture
    }
}

/// Snapshot of a source's state.
#[derive(Debug, Clone, Copy)]
pub struct MediaProbe {
    /// Buffering level around the current position.
    pub ready: ReadyLevel,

    /// Whether the source is mid-seek.
    pub seeking: bool,

    /// Whether the source is in a decode/load error state.
    pub errored: bool,

    /// Intrinsic pixel size, once metadata is available.
    pub natural_size: Option<(u32, u32)>,

    /// The source's actual playback position in seconds.
    pub position_secs: f64,
}

impl MediaProbe {
    /// A probe for a handle the backend does not know.
    pub fn unavailable() -> Self {
        Self {
            ready: ReadyLevel::Nothing,
            seeking: false,
            errored: true,
            natural_size: None,
            position_secs: 0.0,
        }
    }
}

/// Decodable-source operations the engine drives.
///
/// All calls are non-blocking: `reposition` starts a seek that completes
/// asynchronously (observed via `seek_completed`/`probe().seeking`), and
/// `reload` restarts a failed or stalled load. Errors surface through
/// `probe().errored` rather than return values so a dead source can
/// never halt the render loop.
pub trait MediaBackend {
    /// Open a source locator, returning a fresh handle.
    fn open(&mut self, locator: &str) -> MediaHandle;

    /// Release a handle and its decode resources.
    fn close(&mut self, handle: MediaHandle);

    /// Snapshot the source state.
    fn probe(&self, handle: MediaHandle) -> MediaProbe;

    /// Begin an asynchronous seek to `secs`.
    fn reposition(&mut self, handle: MediaHandle, secs: f64);

    /// Start playback of the source.
    fn play(&mut self, handle: MediaHandle);

    /// Pause the source.
    fn pause(&mut self, handle: MediaHandle);

    /// Whether the source is currently playing.
    fn is_playing(&self, handle: MediaHandle) -> bool;

    /// Restart loading after an error or stall.
    fn reload(&mut self, handle: MediaHandle);

    /// Poll whether the last `reposition` has finished. Implementations
    /// may use this call to advance simulated seek latency.
    fn seek_completed(&mut self, handle: MediaHandle) -> bool;
}
