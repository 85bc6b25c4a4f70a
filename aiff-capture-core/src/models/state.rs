use super::error::CaptureError;

/// Capture session state machine.
///
/// State transitions:
/// ```text
/// idle → capturing → stopped
///            ↓
///         faulted
/// ```
/// `Stopped` and `Faulted` are terminal; a session is never resumed.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Idle,
    Capturing,
    Stopped { total_samples: u64 },
    Faulted(CaptureError),
}

impl SessionState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_capturing(&self) -> bool {
        matches!(self, Self::Capturing)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped { .. } | Self::Faulted(_))
    }

    /// The fault that ended the session, if any.
    pub fn fault(&self) -> Option<&CaptureError> {
        match self {
            Self::Faulted(err) => Some(err),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Capturing => "capturing",
            Self::Stopped { .. } => "stopped",
            Self::Faulted(_) => "faulted",
        }
    }
}

/// AIFF encoder state machine: `unstarted → header written → finalized`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderState {
    Unstarted,
    HeaderWritten,
    Finalized,
}
