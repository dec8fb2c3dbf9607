use thiserror::Error;

/// Errors that can occur while acquiring or recording sensor streams.
///
/// Per-frame misses never surface here; they are reported as `None`/`false`
/// by the device traits and the capture loops keep going.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("device not available")]
    DeviceNotAvailable,

    #[error("reader unavailable: {0}")]
    ReaderUnavailable(String),

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),

    #[error("acquisition already running")]
    AlreadyRunning,

    #[error("already recording")]
    AlreadyRecording,

    #[error("storage error: {0}")]
    StorageError(String),

    #[error("buffer too small: need {needed} bytes, have {available}")]
    BufferTooSmall { needed: usize, available: usize },

    #[error("unknown record field: {0}")]
    UnknownField(String),

    #[error("missing recording context for {0}")]
    MissingContext(String),

    #[error("timeout")]
    Timeout,

    #[error("unknown error: {0}")]
    Unknown(String),
}
