use thiserror::Error;

/// Errors that can occur while capturing and encoding a recording.
///
/// Every variant is fatal for the operation that produced it; nothing in the
/// core retries.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// Open/start/stop/close failure reported by the capture source.
    #[error("device error: {0}")]
    Device(String),

    /// Writing the provisional AIFF header failed.
    #[error("header write failed: {0}")]
    HeaderWrite(String),

    /// Patching the size fields at finalize failed.
    #[error("header patch failed: {0}")]
    Patch(String),

    /// A seek would have moved the cursor before the start of the buffer.
    #[error("invalid offset: {offset}")]
    InvalidOffset { offset: i64 },

    /// The capture source failed while delivering a frame.
    #[error("frame read failed: {0}")]
    FrameRead(String),

    /// An operation was called in a state that does not allow it.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Bytes handed to the header parser are not an AIFF header of the
    /// expected layout.
    #[error("malformed header: {0}")]
    MalformedHeader(String),

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),
}

impl CaptureError {
    /// Whether this error came from the capture source rather than the encoder.
    pub fn is_device_fault(&self) -> bool {
        matches!(self, Self::Device(_) | Self::FrameRead(_))
    }
}
