use crate::models::config::StreamParameters;
use crate::models::error::CaptureError;

/// Interface for a blocking microphone capture source.
///
/// The session drives it in a fixed order:
/// `open_default → start → read_frame* → stop → close`.
/// `close` is called on every exit path once `open_default` succeeded,
/// including after a fault.
///
/// Implemented by:
/// - `CpalMicSource` (aiff-capture-cpal, `cpal` feature)
pub trait CaptureSource: Send {
    /// Open the default input device for mono i32 capture.
    fn open_default(&mut self, params: &StreamParameters) -> Result<(), CaptureError>;

    /// Start hardware capture.
    fn start(&mut self) -> Result<(), CaptureError>;

    /// Block until one full frame is available and copy it into `frame`.
    ///
    /// `frame.len()` equals the frame size passed to `open_default`.
    fn read_frame(&mut self, frame: &mut [i32]) -> Result<(), CaptureError>;

    /// Stop hardware capture.
    fn stop(&mut self) -> Result<(), CaptureError>;

    /// Release the device.
    fn close(&mut self) -> Result<(), CaptureError>;

    /// Human-readable name of the device backing this source.
    fn device_name(&self) -> String {
        "default input".into()
    }
}
