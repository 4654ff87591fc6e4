//! Error types shared across PlayCut crates.

/// Top-level error type for PlayCut operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A media source failed to load or decode. Non-fatal to playback:
    /// the compositor holds the previous frame and the readiness probe
    /// retries the source on a cooldown.
    #[error("Source unavailable: {message}")]
    SourceUnavailable { message: String },

    /// A source did not report seek completion within the bounded wait.
    /// Playback resumes anyway; sync is best-effort after this point.
    #[error("Seek did not complete within {waited_ms}ms")]
    SeekTimeout { waited_ms: u64 },

    /// The encoder rejected the requested output configuration.
    /// Fatal to the export only; preview is unaffected.
    #[error("Encoder configuration unsupported: {message}")]
    EncoderUnsupported { message: String },

    /// Export was cancelled. Partial output is discarded; callers should
    /// not surface this as a failure to the user.
    #[error("Export aborted")]
    ExportAborted,

    /// The platform audio graph is suspended and could not be resumed.
    #[error("Audio graph suspended: {message}")]
    AudioSuspended { message: String },

    #[error("Render error: {message}")]
    Render { message: String },

    #[error("Export error: {message}")]
    Export { message: String },

    #[error("Timeline error: {message}")]
    Timeline { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using EngineError.
pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    pub fn source_unavailable(msg: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            message: msg.into(),
        }
    }

    pub fn encoder_unsupported(msg: impl Into<String>) -> Self {
        Self::EncoderUnsupported {
            message: msg.into(),
        }
    }

    pub fn audio_suspended(msg: impl Into<String>) -> Self {
        Self::AudioSuspended {
            message: msg.into(),
        }
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render {
            message: msg.into(),
        }
    }

    pub fn export(msg: impl Into<String>) -> Self {
        Self::Export {
            message: msg.into(),
        }
    }

    pub fn timeline(msg: impl Into<String>) -> Self {
        Self::Timeline {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Whether this error may stop an export. Frame-level render errors
    /// are logged and skipped; everything else halts the pipeline.
    pub fn is_fatal_to_export(&self) -> bool {
        !matches!(
            self,
            Self::SourceUnavailable { .. } | Self::Render { .. } | Self::SeekTimeout { .. }
        )
    }
}
