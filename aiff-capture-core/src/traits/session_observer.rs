use crate::models::error::CaptureError;
use crate::models::recording_result::RecordingResult;
use crate::models::state::SessionState;

/// Event observer for capture session notifications.
///
/// Every method is called on the thread that drives the session through
/// `begin`, `end`, or `run`, never from the producer thread. Calls happen
/// while a session method is in progress, so implementations should hand off
/// to their own thread if they do real work.
pub trait SessionObserver: Send + Sync {
    /// Called when the session state changes.
    fn on_state_changed(&self, state: &SessionState);

    /// Called when a fault ends the session.
    fn on_error(&self, error: &CaptureError);

    /// Called when capture completes and the header is finalized.
    fn on_capture_finished(&self, result: &RecordingResult);
}
